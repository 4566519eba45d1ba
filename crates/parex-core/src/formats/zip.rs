//! ZIP archive adapter.
//!
//! Reads the central directory once at open, then serves each entry's
//! content from a clone of the archive handle. Clones share the parsed
//! directory, and over a [`SharedFile`] or an in-memory buffer they also
//! share the underlying bytes, so file tasks read in parallel without
//! locking.

use std::fmt;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use zip::CompressionMethod;
use zip::DateTime;

use super::extra;
use super::traits::ArchiveEntry;
use super::traits::Decompressor;
use super::traits::EntrySource;
use crate::ExtractionError;
use crate::Result;
use crate::io::SharedFile;
use crate::types::entry_kind::S_IFDIR;
use crate::types::entry_kind::S_IFMT;
use crate::types::entry_kind::S_IFREG;

/// Reader type used for archives held entirely in memory.
pub type MemoryReader = Cursor<Arc<[u8]>>;

/// Mode given to directories whose entry carries no unix mode.
const DEFAULT_DIR_MODE: u32 = S_IFDIR | 0o777;
/// Mode given to files whose entry carries no unix mode.
const DEFAULT_FILE_MODE: u32 = S_IFREG | 0o666;

/// Metadata of one ZIP entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    name: String,
    mode: u32,
    modified: SystemTime,
    extra: Vec<u8>,
    method: CompressionMethod,
    size: u64,
}

impl ZipEntry {
    /// Compression method recorded for the entry.
    #[must_use]
    pub fn compression(&self) -> CompressionMethod {
        self.method
    }

    /// Uncompressed size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl ArchiveEntry for ZipEntry {
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

/// A ZIP archive opened for parallel extraction.
///
/// # Examples
///
/// ```no_run
/// use parex_core::formats::ArchiveEntry;
/// use parex_core::formats::EntrySource;
/// use parex_core::formats::ZipSource;
///
/// let source = ZipSource::open("archive.zip")?;
/// for entry in source.entries() {
///     println!("{} {:o}", entry.name(), entry.mode());
/// }
/// # Ok::<(), parex_core::ExtractionError>(())
/// ```
pub struct ZipSource<R = SharedFile> {
    archive: zip::ZipArchive<R>,
    entries: Vec<ZipEntry>,
    decompressors: Vec<(CompressionMethod, Arc<dyn Decompressor>)>,
}

impl ZipSource<SharedFile> {
    /// Opens the ZIP archive at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its central
    /// directory cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(SharedFile::open(path)?)
    }
}

impl ZipSource<MemoryReader> {
    /// Reads a ZIP archive held in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the central directory cannot be read.
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::new(Cursor::new(data.into()))
    }
}

impl<R> ZipSource<R>
where
    R: Read + Seek + Clone,
{
    /// Reads the central directory from `reader`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArchive` if the data is not a readable ZIP archive.
    pub fn new(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)
            .map_err(|e| ExtractionError::InvalidArchive(format!("failed to open ZIP archive: {e}")))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).map_err(|e| {
                ExtractionError::InvalidArchive(format!("failed to read ZIP entry {index}: {e}"))
            })?;
            let extra = file.extra_data().map(<[u8]>::to_vec).unwrap_or_default();
            let modified = extra::parse(&extra)
                .ok()
                .and_then(|fields| fields.modified)
                .or_else(|| file.last_modified().and_then(dos_time_to_system_time))
                .unwrap_or(SystemTime::UNIX_EPOCH);

            entries.push(ZipEntry {
                name: file.name().to_string(),
                mode: entry_mode(file.unix_mode(), file.is_dir()),
                modified,
                extra,
                method: file.compression(),
                size: file.size(),
            });
        }

        Ok(Self {
            archive,
            entries,
            decompressors: Vec::new(),
        })
    }
}

impl<R> ZipSource<R> {
    /// Number of entries in the archive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the archive has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Routes entries compressed with `method` through `decompressor`.
    ///
    /// The decompressor receives the raw, still-compressed entry stream.
    /// Registering a method twice replaces the earlier decompressor.
    pub fn register_decompressor(
        &mut self,
        method: CompressionMethod,
        decompressor: Arc<dyn Decompressor>,
    ) {
        self.decompressors.retain(|(m, _)| *m != method);
        self.decompressors.push((method, decompressor));
    }

    fn decompressor_for(&self, method: CompressionMethod) -> Option<&Arc<dyn Decompressor>> {
        self.decompressors
            .iter()
            .find_map(|(m, d)| (*m == method).then_some(d))
    }
}

impl<R> EntrySource for ZipSource<R>
where
    R: Read + Seek + Clone + Sync,
{
    type Entry = ZipEntry;

    fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    fn read_entry<T, F>(&self, index: usize, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Read) -> Result<T>,
    {
        let entry = self.entries.get(index).ok_or_else(|| {
            ExtractionError::InvalidArchive(format!("no entry at index {index}"))
        })?;

        let mut archive = self.archive.clone();
        if let Some(decompressor) = self.decompressor_for(entry.method) {
            let raw = archive.by_index_raw(index)?;
            let mut reader = decompressor.decompress(Box::new(raw));
            f(&mut reader)
        } else {
            let mut file = archive.by_index(index)?;
            f(&mut file)
        }
    }
}

impl<R> fmt::Debug for ZipSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipSource")
            .field("entries", &self.entries.len())
            .field(
                "decompressors",
                &self.decompressors.iter().map(|(m, _)| *m).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Fills in file-type bits the archive left out.
fn entry_mode(unix_mode: Option<u32>, is_dir: bool) -> u32 {
    match unix_mode {
        Some(mode) if is_dir => (mode & !S_IFMT) | S_IFDIR,
        Some(mode) if mode & S_IFMT == 0 => mode | S_IFREG,
        Some(mode) => mode,
        None if is_dir => DEFAULT_DIR_MODE,
        None => DEFAULT_FILE_MODE,
    }
}

/// Interprets an MS-DOS timestamp as UTC.
#[allow(deprecated)]
fn dos_time_to_system_time(dt: DateTime) -> Option<SystemTime> {
    dt.to_time()
        .ok()
        .map(|t| extra::unix_time(t.unix_timestamp()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use zip::write::SimpleFileOptions;
    use zip::write::ZipWriter;

    fn build(f: impl FnOnce(&mut ZipWriter<Cursor<Vec<u8>>>)) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        f(&mut zip);
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_dos_time_is_utc() {
        let dt = DateTime::from_date_and_time(2021, 6, 15, 12, 30, 40).unwrap();
        assert_eq!(
            dos_time_to_system_time(dt),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_623_760_240))
        );
    }

    #[test]
    fn test_entry_mode_fallbacks() {
        assert_eq!(entry_mode(None, true), 0o040_777);
        assert_eq!(entry_mode(None, false), 0o100_666);
        assert_eq!(entry_mode(Some(0o644), false), 0o100_644);
        assert_eq!(entry_mode(Some(0o100_755), true), 0o040_755);
        assert_eq!(entry_mode(Some(0o120_777), false), 0o120_777);
    }

    #[test]
    fn test_collects_entry_metadata() {
        let data = build(|zip| {
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(0o640)
                .last_modified_time(DateTime::from_date_and_time(2021, 6, 15, 12, 30, 40).unwrap());
            zip.start_file("docs/readme.txt", options).unwrap();
            zip.write_all(b"read me").unwrap();
            zip.add_directory("docs/", SimpleFileOptions::default()).unwrap();
        });

        let source = ZipSource::from_bytes(data).unwrap();
        assert_eq!(source.len(), 2);

        let file = &source.entries()[0];
        assert_eq!(file.name(), "docs/readme.txt");
        assert_eq!(file.mode() & 0o777, 0o640);
        assert!(file.kind().is_file());
        assert_eq!(file.size(), 7);
        assert_eq!(file.compression(), CompressionMethod::Deflated);
        assert_eq!(
            file.modified(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_623_760_240)
        );

        assert!(source.entries()[1].kind().is_directory());
    }

    #[test]
    fn test_read_entry_decompresses() {
        let data = build(|zip| {
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            zip.start_file("a.txt", options).unwrap();
            zip.write_all(&b"abc".repeat(1000)).unwrap();
        });

        let source = ZipSource::from_bytes(data).unwrap();
        let content = source
            .read_entry(0, |reader| {
                let mut out = Vec::new();
                reader.read_to_end(&mut out)?;
                Ok(out)
            })
            .unwrap();
        assert_eq!(content, b"abc".repeat(1000));
    }

    #[test]
    fn test_read_entry_out_of_range() {
        let data = build(|_| {});
        let source = ZipSource::from_bytes(data).unwrap();
        assert!(source.is_empty());
        let result = source.read_entry(3, |_| Ok(()));
        assert!(matches!(result, Err(ExtractionError::InvalidArchive(_))));
    }

    struct Reverse;

    impl Decompressor for Reverse {
        fn decompress<'a>(&self, mut raw: Box<dyn Read + 'a>) -> Box<dyn Read + 'a> {
            let mut data = Vec::new();
            raw.read_to_end(&mut data).unwrap();
            data.reverse();
            Box::new(Cursor::new(data))
        }
    }

    #[test]
    fn test_registered_decompressor_sees_raw_stream() {
        let data = build(|zip| {
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            zip.start_file("r.txt", options).unwrap();
            zip.write_all(b"olleh").unwrap();
        });

        let mut source = ZipSource::from_bytes(data).unwrap();
        source.register_decompressor(CompressionMethod::Stored, Arc::new(Reverse));
        let content = source
            .read_entry(0, |reader| {
                let mut out = String::new();
                reader.read_to_string(&mut out)?;
                Ok(out)
            })
            .unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn test_register_decompressor_replaces() {
        let data = build(|_| {});
        let mut source = ZipSource::from_bytes(data).unwrap();
        source.register_decompressor(CompressionMethod::Stored, Arc::new(Reverse));
        source.register_decompressor(CompressionMethod::Stored, Arc::new(Reverse));
        assert_eq!(source.decompressors.len(), 1);
    }

    #[test]
    fn test_rejects_garbage() {
        let result = ZipSource::from_bytes(b"definitely not a zip".to_vec());
        assert!(matches!(result, Err(ExtractionError::InvalidArchive(_))));
    }
}
