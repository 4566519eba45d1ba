//! Seams between the extraction pipeline and an archive codec.

use std::io::Read;
use std::time::SystemTime;

use crate::Result;
use crate::types::EntryKind;

/// Metadata of a single archive entry, as read from the central directory.
pub trait ArchiveEntry {
    /// Slash-separated, archive-relative name.
    fn name(&self) -> &str;

    /// Unix mode: file-type bits plus permission bits.
    fn mode(&self) -> u32;

    /// Last modification time.
    fn modified(&self) -> SystemTime;

    /// Raw extra-field block, empty if the entry carries none.
    fn extra(&self) -> &[u8];

    /// Classifies the entry by its mode.
    fn kind(&self) -> EntryKind {
        EntryKind::from_mode(self.mode())
    }
}

/// A random-access archive whose entries can be opened concurrently.
///
/// `read_entry` takes `&self` and is called from many threads at once, so
/// implementations hand each call an independent reader.
pub trait EntrySource: Sync {
    /// Entry metadata type.
    type Entry: ArchiveEntry + Sync;

    /// All entries in archive order.
    fn entries(&self) -> &[Self::Entry];

    /// Opens the decompressed content of the entry at `index` and passes it
    /// to `f`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be located or opened, or
    /// whatever `f` returns.
    fn read_entry<T, F>(&self, index: usize, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Read) -> Result<T>;
}

/// Wraps the raw compressed stream of an entry in a decoding reader.
///
/// Registered per compression method; see
/// [`ZipSource::register_decompressor`](crate::formats::ZipSource::register_decompressor).
pub trait Decompressor: Send + Sync {
    /// Returns a reader producing the decompressed bytes of `raw`.
    fn decompress<'a>(&self, raw: Box<dyn Read + 'a>) -> Box<dyn Read + 'a>;
}
