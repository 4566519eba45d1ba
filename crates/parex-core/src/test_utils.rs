//! Test utilities for building archives in memory.
//!
//! [`MemoryArchive`] is an [`EntrySource`] assembled entry by entry, with
//! hooks for the failure modes that are awkward to produce in a real ZIP
//! file: readers that error midway, readers that stall, and irregular
//! file types. [`ZipTestBuilder`] produces real ZIP bytes.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::io::{self};
use std::thread;
use std::time::Duration;
use std::time::SystemTime;

use crate::Result;
use crate::formats::ArchiveEntry;
use crate::formats::EntrySource;
use crate::formats::extra;
use crate::types::entry_kind::PERMISSION_MASK;
use crate::types::entry_kind::S_IFDIR;
use crate::types::entry_kind::S_IFLNK;
use crate::types::entry_kind::S_IFREG;

/// Modification time given to entries unless overridden:
/// 2020-01-02 03:04:06 UTC.
pub const DEFAULT_MODIFIED_SECS: u64 = 1_577_934_246;

#[derive(Debug, Clone)]
enum Content {
    Bytes(Vec<u8>),
    Failing { after: usize },
    Slow { data: Vec<u8>, delay: Duration },
}

/// One entry of a [`MemoryArchive`].
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    name: String,
    mode: u32,
    modified: SystemTime,
    extra: Vec<u8>,
    content: Content,
}

impl ArchiveEntry for MemoryEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> u32 {
        self.mode
    }

    fn modified(&self) -> SystemTime {
        self.modified
    }

    fn extra(&self) -> &[u8] {
        &self.extra
    }
}

/// An in-memory entry source.
///
/// # Examples
///
/// ```
/// use parex_core::formats::EntrySource;
/// use parex_core::test_utils::MemoryArchive;
///
/// let archive = MemoryArchive::new()
///     .dir("docs/")
///     .file("docs/readme.txt", b"hello")
///     .with_owner(1000, 1000)
///     .symlink("latest", "docs/readme.txt");
/// assert_eq!(archive.entries().len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: Vec<MemoryEntry>,
}

impl MemoryArchive {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry with an explicit unix mode, type bits included.
    #[must_use]
    pub fn entry(self, name: &str, mode: u32, data: &[u8]) -> Self {
        self.push(name, mode, Content::Bytes(data.to_vec()))
    }

    /// Adds a regular file with mode 0644.
    #[must_use]
    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.file_with_mode(name, data, 0o644)
    }

    /// Adds a regular file with the given permission bits.
    #[must_use]
    pub fn file_with_mode(self, name: &str, data: &[u8], permissions: u32) -> Self {
        self.entry(name, S_IFREG | (permissions & PERMISSION_MASK), data)
    }

    /// Adds a directory with mode 0755.
    #[must_use]
    pub fn dir(self, name: &str) -> Self {
        self.dir_with_mode(name, 0o755)
    }

    /// Adds a directory with the given permission bits.
    #[must_use]
    pub fn dir_with_mode(self, name: &str, permissions: u32) -> Self {
        self.entry(name, S_IFDIR | (permissions & PERMISSION_MASK), b"")
    }

    /// Adds a symlink whose content is `target`.
    #[must_use]
    pub fn symlink(self, name: &str, target: &str) -> Self {
        self.entry(name, S_IFLNK | 0o777, target.as_bytes())
    }

    /// Adds a FIFO entry, which extraction skips.
    #[must_use]
    pub fn fifo(self, name: &str) -> Self {
        self.entry(name, 0o010_644, b"")
    }

    /// Adds a file whose reader yields `after` bytes and then fails.
    #[must_use]
    pub fn failing_file(self, name: &str, after: usize) -> Self {
        self.push(name, S_IFREG | 0o644, Content::Failing { after })
    }

    /// Adds a file whose reader stalls for `delay` before producing data.
    #[must_use]
    pub fn slow_file(self, name: &str, data: &[u8], delay: Duration) -> Self {
        self.push(
            name,
            S_IFREG | 0o644,
            Content::Slow {
                data: data.to_vec(),
                delay,
            },
        )
    }

    /// Sets the modification time of the most recently added entry.
    #[must_use]
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.modified = modified;
        }
        self
    }

    /// Attaches an Info-ZIP unix ownership field to the most recently added
    /// entry.
    #[must_use]
    pub fn with_owner(self, uid: u32, gid: u32) -> Self {
        self.with_extra(&extra::encode_unix_owner(uid, gid))
    }

    /// Appends raw extra-field bytes to the most recently added entry.
    #[must_use]
    pub fn with_extra(mut self, bytes: &[u8]) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.extra.extend_from_slice(bytes);
        }
        self
    }

    fn push(mut self, name: &str, mode: u32, content: Content) -> Self {
        self.entries.push(MemoryEntry {
            name: name.to_string(),
            mode,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(DEFAULT_MODIFIED_SECS),
            extra: Vec::new(),
            content,
        });
        self
    }
}

impl EntrySource for MemoryArchive {
    type Entry = MemoryEntry;

    fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    fn read_entry<T, F>(&self, index: usize, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Read) -> Result<T>,
    {
        let entry = self.entries.get(index).ok_or_else(|| {
            crate::ExtractionError::InvalidArchive(format!("no entry at index {index}"))
        })?;
        match &entry.content {
            Content::Bytes(data) => f(&mut Cursor::new(data.as_slice())),
            Content::Failing { after } => f(&mut FailingReader { remaining: *after }),
            Content::Slow { data, delay } => {
                thread::sleep(*delay);
                f(&mut Cursor::new(data.as_slice()))
            }
        }
    }
}

struct FailingReader {
    remaining: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "simulated corrupt entry",
            ));
        }
        let n = buf.len().min(self.remaining);
        buf[..n].fill(b'x');
        self.remaining -= n;
        Ok(n)
    }
}

/// Creates an in-memory ZIP archive from a list of entries.
///
/// Each entry is a tuple of (path, content). Files are stored uncompressed
/// with mode 0o644.
///
/// # Examples
///
/// ```
/// use parex_core::test_utils::create_test_zip;
///
/// let zip_data = create_test_zip(vec![("file.txt", b"hello"), ("dir/nested.txt", b"world")]);
/// ```
#[must_use]
pub fn create_test_zip(entries: Vec<(&str, &[u8])>) -> Vec<u8> {
    entries
        .into_iter()
        .fold(ZipTestBuilder::new(), |builder, (path, data)| {
            builder.add_file(path, data)
        })
        .build()
}

/// Builder for ZIP test archives.
///
/// # Examples
///
/// ```
/// use parex_core::test_utils::ZipTestBuilder;
///
/// let zip_data = ZipTestBuilder::new()
///     .add_file("file.txt", b"content")
///     .add_directory("dir/")
///     .build();
/// ```
pub struct ZipTestBuilder {
    zip: zip::ZipWriter<Cursor<Vec<u8>>>,
    modified: Option<zip::DateTime>,
}

impl ZipTestBuilder {
    /// Creates a new ZIP test builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            zip: zip::ZipWriter::new(Cursor::new(Vec::new())),
            modified: None,
        }
    }

    /// Stamps every entry added afterwards with this MS-DOS time.
    #[must_use]
    pub fn modified_at(mut self, year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        self.modified =
            Some(zip::DateTime::from_date_and_time(year, month, day, hour, minute, second).unwrap());
        self
    }

    /// Adds a regular file to the archive.
    #[must_use]
    pub fn add_file(self, path: &str, data: &[u8]) -> Self {
        self.add_file_with_mode(path, data, 0o644)
    }

    /// Adds a regular file with custom mode.
    #[must_use]
    pub fn add_file_with_mode(mut self, path: &str, data: &[u8], mode: u32) -> Self {
        let options = self
            .options(zip::CompressionMethod::Stored)
            .unix_permissions(mode);

        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    /// Adds a deflate-compressed regular file.
    #[must_use]
    pub fn add_deflated_file(mut self, path: &str, data: &[u8]) -> Self {
        let options = self
            .options(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    /// Adds a directory to the archive.
    #[must_use]
    pub fn add_directory(self, path: &str) -> Self {
        self.add_directory_with_mode(path, 0o755)
    }

    /// Adds a directory with custom mode.
    #[must_use]
    pub fn add_directory_with_mode(mut self, path: &str, mode: u32) -> Self {
        let options = self
            .options(zip::CompressionMethod::Stored)
            .unix_permissions(mode);
        self.zip.add_directory(path, options).unwrap();
        self
    }

    /// Adds a symlink to the archive.
    #[must_use]
    pub fn add_symlink(mut self, path: &str, target: &str) -> Self {
        let options = self.options(zip::CompressionMethod::Stored);
        self.zip.add_symlink(path, target, options).unwrap();
        self
    }

    /// Builds and returns the ZIP archive data.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.zip.finish().unwrap().into_inner()
    }

    fn options(&self, method: zip::CompressionMethod) -> zip::write::SimpleFileOptions {
        let options = zip::write::SimpleFileOptions::default().compression_method(method);
        match self.modified {
            Some(modified) => options.last_modified_time(modified),
            None => options,
        }
    }
}

impl Default for ZipTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ZipSource;
    use crate::types::EntryKind;

    #[test]
    fn test_create_test_zip() {
        let zip_data = create_test_zip(vec![("file.txt", b"hello")]);
        assert!(!zip_data.is_empty());
    }

    #[test]
    fn test_zip_builder_kinds() {
        let zip_data = ZipTestBuilder::new()
            .add_file("file.txt", b"content")
            .add_directory("dir/")
            .add_symlink("link", "file.txt")
            .build();

        let source = ZipSource::from_bytes(zip_data).unwrap();
        let kinds: Vec<_> = source.entries().iter().map(ArchiveEntry::kind).collect();
        assert_eq!(
            kinds,
            [EntryKind::File, EntryKind::Directory, EntryKind::Symlink]
        );
    }

    #[test]
    fn test_memory_archive_modifiers_apply_to_last_entry() {
        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
        let archive = MemoryArchive::new()
            .file("a", b"")
            .file("b", b"")
            .with_modified(when)
            .with_owner(7, 8);

        let entries = archive.entries();
        assert_eq!(entries[0].modified(), SystemTime::UNIX_EPOCH + Duration::from_secs(DEFAULT_MODIFIED_SECS));
        assert!(entries[0].extra().is_empty());
        assert_eq!(entries[1].modified(), when);
        let owner = extra::parse(entries[1].extra()).unwrap().owner.unwrap();
        assert_eq!((owner.uid, owner.gid), (7, 8));
    }

    #[test]
    fn test_failing_file_reader() {
        let archive = MemoryArchive::new().failing_file("bad", 3);
        let result = archive.read_entry(0, |reader| {
            let mut out = Vec::new();
            reader.read_to_end(&mut out)?;
            Ok(out)
        });
        assert!(result.is_err());
    }
}
