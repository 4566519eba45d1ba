//! Archive codec adapters.

pub mod extra;
pub mod traits;
pub mod zip;

pub use traits::ArchiveEntry;
pub use traits::Decompressor;
pub use traits::EntrySource;
pub use zip::MemoryReader;
pub use zip::ZipEntry;
pub use zip::ZipSource;
