//! Type-safe wrappers for archive extraction operations.
//!
//! # Design Principles
//!
//! - Type-driven security: an output path only exists once it has been
//!   proven to stay inside the root
//! - No `From<RawType>` implementations for security types
//! - All constructors perform validation

pub mod dest_dir;
pub mod entry_kind;
pub mod safe_path;

pub use dest_dir::DestDir;
pub use entry_kind::EntryKind;
pub use safe_path::SafePath;
