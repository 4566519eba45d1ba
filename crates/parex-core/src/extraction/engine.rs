//! The extraction pipeline.
//!
//! Entries are processed in archive order on the calling thread:
//!
//! 1. the name is resolved under the root, or the whole extraction fails
//! 2. the parent directory chain is created
//! 3. directories are created and queued for the final pass, symlinks are
//!    created and restored inline, file bodies are handed to the
//!    [`Scheduler`]
//!
//! Once every file task has finished, queued directories get their
//! metadata, deepest first, so writing children can no longer disturb a
//! directory's restored modification time.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use log::info;
use log::trace;

use super::metadata::MetadataRestorer;
use super::scheduler::Scheduler;
use super::scheduler::Semaphore;
use super::writer;
use crate::ExtractionConfig;
use crate::ExtractionError;
use crate::ExtractionReport;
use crate::Result;
use crate::copy::BufferPool;
use crate::formats::ArchiveEntry;
use crate::formats::Decompressor;
use crate::formats::EntrySource;
use crate::formats::ZipSource;
use crate::io::SharedFile;
use crate::platform;
use crate::platform::Platform;
use crate::report::Tally;
use crate::types::DestDir;
use crate::types::EntryKind;
use crate::types::SafePath;

/// Extracts the entries of an [`EntrySource`] under a single root.
///
/// # Examples
///
/// ```no_run
/// use parex_core::ExtractionConfig;
/// use parex_core::extraction::Extractor;
///
/// # fn main() -> Result<(), parex_core::ExtractionError> {
/// let extractor = Extractor::open("archive.zip", "/tmp/out", ExtractionConfig::default())?
///     .with_ownership_error_handler(|name, err| {
///         eprintln!("keeping default owner for {name}: {err}");
///         Ok(())
///     });
/// let report = extractor.extract()?;
/// println!("{} files, {} bytes", report.files_extracted, report.bytes_written);
/// extractor.close();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Extractor<S> {
    source: S,
    dest: DestDir,
    config: ExtractionConfig,
    semaphore: Arc<Semaphore>,
    buffers: Arc<BufferPool>,
    restorer: MetadataRestorer,
}

impl Extractor<ZipSource<SharedFile>> {
    /// Opens the ZIP archive at `archive` for extraction into `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read, the root cannot be
    /// created, or `config` is invalid.
    pub fn open(
        archive: impl AsRef<Path>,
        root: impl AsRef<Path>,
        config: ExtractionConfig,
    ) -> Result<Self> {
        Self::new(ZipSource::open(archive)?, root, config)
    }

    /// Releases the archive handle.
    pub fn close(self) {
        drop(self);
    }
}

impl<R> Extractor<ZipSource<R>> {
    /// Routes entries compressed with `method` through `decompressor`.
    #[must_use]
    pub fn register_decompressor(
        mut self,
        method: zip::CompressionMethod,
        decompressor: Arc<dyn Decompressor>,
    ) -> Self {
        self.source.register_decompressor(method, decompressor);
        self
    }
}

impl<S: EntrySource> Extractor<S> {
    /// Creates an extractor writing under `root`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero concurrency limit or buffer size,
    /// or an I/O error if the root cannot be created.
    pub fn new(source: S, root: impl AsRef<Path>, config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        let dest = DestDir::create(root.as_ref())?;
        Ok(Self {
            source,
            dest,
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            buffers: Arc::new(BufferPool::new(config.buffer_size)),
            restorer: MetadataRestorer::new(platform::native()),
            config,
        })
    }

    /// Installs a handler for ownership restore failures.
    ///
    /// Without one, an ownership failure aborts the extraction.
    #[must_use]
    pub fn with_ownership_error_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&str, ExtractionError) -> Result<()> + Send + 'static,
    {
        self.restorer = self.restorer.with_ownership_error_handler(Box::new(handler));
        self
    }

    /// Draws concurrency permits from `semaphore` instead of a private one.
    ///
    /// Sharing a semaphore across extractors bounds their combined
    /// concurrency.
    #[must_use]
    pub fn with_semaphore(mut self, semaphore: Arc<Semaphore>) -> Self {
        self.semaphore = semaphore;
        self
    }

    /// Checks write buffers out of `buffers` instead of a private pool.
    #[must_use]
    pub fn with_buffer_pool(mut self, buffers: Arc<BufferPool>) -> Self {
        self.buffers = buffers;
        self
    }

    /// Uses `platform` for ownership, permission and symlink primitives.
    #[must_use]
    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.restorer = self.restorer.with_platform(platform);
        self
    }

    /// Entries of the underlying archive.
    #[must_use]
    pub fn files(&self) -> &[S::Entry] {
        self.source.entries()
    }

    /// The canonical extraction root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dest.as_path()
    }

    /// Configuration this extractor was built with.
    #[must_use]
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Consumes the extractor, returning the entry source.
    #[must_use]
    pub fn into_source(self) -> S {
        self.source
    }

    /// Extracts every entry under the root.
    ///
    /// The first error stops new work from starting; tasks already running
    /// finish, and that error is returned. Nothing extracted before the
    /// failure is rolled back.
    ///
    /// # Errors
    ///
    /// - `PathEscape` if any entry resolves outside the root
    /// - `Io` if a node cannot be created or written
    /// - `Metadata`, `Ownership` or `InvalidArchive` if restoring an
    ///   entry's metadata fails
    pub fn extract(&self) -> Result<ExtractionReport> {
        let start = Instant::now();
        let entries = self.source.entries();
        info!(
            "extracting {} entries into {}",
            entries.len(),
            self.dest.as_path().display()
        );

        let tally = Tally::default();
        let mut directories: Vec<(usize, SafePath)> = Vec::new();
        let scheduler = Scheduler::new(Arc::clone(&self.semaphore));

        scheduler.run(|tasks| {
            for (index, entry) in entries.iter().enumerate() {
                let kind = entry.kind();
                if !kind.is_supported() {
                    trace!("skipping {} with mode {:o}", entry.name(), entry.mode());
                    tally.skipped();
                    continue;
                }

                let path = SafePath::resolve(entry.name(), &self.dest)?;
                if path.is_root() && !kind.is_directory() {
                    return Err(ExtractionError::InvalidArchive(format!(
                        "entry {:?} would replace the extraction root",
                        entry.name()
                    )));
                }
                if let Some(parent) = path.as_path().parent()
                    && !path.is_root()
                {
                    fs::create_dir_all(parent)?;
                }

                if tasks.is_cancelled() {
                    break;
                }
                debug!("{kind:?} {}", entry.name());

                match kind {
                    EntryKind::Directory => {
                        writer::create_directory(path.as_path())?;
                        directories.push((index, path));
                    }
                    EntryKind::Symlink => {
                        self.extract_symlink(index, entry, path.as_path())?;
                        tally.symlink();
                    }
                    EntryKind::File => {
                        let tally = &tally;
                        tasks.spawn(move || {
                            let bytes = self.extract_file(index, entry, path.as_path())?;
                            tally.file(bytes);
                            Ok(())
                        });
                    }
                    EntryKind::Irregular => {}
                }
            }
            Ok(())
        })?;

        // Children can no longer touch these directories; deepest first.
        directories.sort_by(|(_, a), (_, b)| b.depth().cmp(&a.depth()));
        for (index, path) in &directories {
            self.restorer.restore(path.as_path(), &entries[*index])?;
            tally.directory();
        }

        let report = tally.into_report(start.elapsed());
        info!(
            "extracted {} files, {} directories, {} symlinks ({} bytes) in {:?}",
            report.files_extracted,
            report.directories_created,
            report.symlinks_created,
            report.bytes_written,
            report.duration
        );
        Ok(report)
    }

    fn extract_file(&self, index: usize, entry: &S::Entry, path: &Path) -> Result<u64> {
        let bytes = {
            let mut buffer = self.buffers.checkout();
            self.source.read_entry(index, |reader| {
                writer::write_file(path, entry.mode(), reader, &mut buffer)
            })?
        };
        self.restorer.restore(path, entry)?;
        Ok(bytes)
    }

    fn extract_symlink(&self, index: usize, entry: &S::Entry, path: &Path) -> Result<()> {
        let target = self.source.read_entry(index, |reader| {
            let mut target = Vec::new();
            reader.read_to_end(&mut target)?;
            Ok(target)
        })?;
        writer::create_symlink(self.restorer.platform().as_ref(), path, target)?;
        self.restorer.restore(path, entry)
    }
}
