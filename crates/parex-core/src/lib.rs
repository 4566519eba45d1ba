//! Parallel, root-confined archive extraction.
//!
//! `parex-core` writes the entries of a ZIP archive under a single root
//! directory. File bodies are decoded and written concurrently under a
//! configurable bound; directories and symlinks are created in archive
//! order on the calling thread. Every node gets its permission bits,
//! modification time and, where the platform allows, ownership restored.
//! No entry can write outside the root.
//!
//! # Examples
//!
//! ```no_run
//! use parex_core::ExtractionConfig;
//! use parex_core::extract_archive;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExtractionConfig::default().with_concurrency(8);
//! let report = extract_archive("archive.zip", "/output/dir", &config)?;
//! println!("Extracted {} files", report.files_extracted);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod copy;
pub mod error;
pub mod extraction;
pub mod formats;
pub mod io;
pub mod platform;
pub mod report;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod test_utils;

// Re-export main API types
pub use api::extract_archive;
pub use config::ExtractionConfig;
pub use error::ExtractionError;
pub use error::Result;
pub use extraction::Extractor;
pub use report::ExtractionReport;

pub use types::DestDir;
pub use types::EntryKind;
pub use types::SafePath;
