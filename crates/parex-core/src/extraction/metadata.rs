//! Restores modification time, permission bits and ownership of a
//! materialized node.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use filetime::FileTime;
use log::trace;
use log::warn;

use crate::ExtractionError;
use crate::Result;
use crate::formats::ArchiveEntry;
use crate::formats::extra;
use crate::platform::Platform;
use crate::types::entry_kind::PERMISSION_MASK;

/// Callback deciding whether an ownership failure is fatal.
///
/// Receives the archive-relative entry name and the
/// [`ExtractionError::Ownership`] error. Returning `Ok(())` absorbs the
/// failure; returning an error aborts the extraction with it.
pub type OwnershipErrorHandler = Box<dyn FnMut(&str, ExtractionError) -> Result<()> + Send>;

/// Applies entry metadata to nodes on disk.
///
/// Shared by all file tasks; the ownership handler is serialized behind a
/// mutex so it never runs concurrently with itself.
pub struct MetadataRestorer {
    platform: Arc<dyn Platform>,
    on_ownership_error: Option<Mutex<OwnershipErrorHandler>>,
}

impl MetadataRestorer {
    /// Creates a restorer without an ownership error handler.
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            on_ownership_error: None,
        }
    }

    /// Installs the handler consulted when ownership cannot be applied.
    #[must_use]
    pub fn with_ownership_error_handler(mut self, handler: OwnershipErrorHandler) -> Self {
        self.on_ownership_error = Some(Mutex::new(handler));
        self
    }

    /// Replaces the platform primitives, keeping any installed handler.
    #[must_use]
    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    /// Platform primitives used by this restorer.
    #[must_use]
    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Restores metadata of `entry` onto the node at `path`.
    ///
    /// Order is modification time, then permission bits, then ownership.
    /// Symlinks are never followed.
    ///
    /// # Errors
    ///
    /// - `InvalidArchive` if the entry's extra field is malformed
    /// - `Metadata` if times or permissions cannot be set
    /// - `Ownership`, or whatever the handler returns, if ownership cannot
    ///   be set and the handler does not absorb the failure
    pub fn restore<E>(&self, path: &Path, entry: &E) -> Result<()>
    where
        E: ArchiveEntry + ?Sized,
    {
        let fields = extra::parse(entry.extra())?;
        let is_symlink = entry.kind().is_symlink();

        filetime::set_symlink_file_times(
            path,
            FileTime::now(),
            FileTime::from_system_time(entry.modified()),
        )
        .map_err(|source| ExtractionError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;

        self.platform
            .lchmod(path, entry.mode() & PERMISSION_MASK, is_symlink)
            .map_err(|source| ExtractionError::Metadata {
                path: path.to_path_buf(),
                source,
            })?;

        let Some(owner) = fields.owner else {
            return Ok(());
        };
        if !self.platform.supports_ownership() {
            trace!("ownership not supported, skipping {}", entry.name());
            return Ok(());
        }

        match self.platform.lchown(path, owner.uid, owner.gid) {
            Ok(()) => Ok(()),
            Err(source) => self.ownership_failed(entry.name(), source),
        }
    }

    fn ownership_failed(&self, name: &str, source: std::io::Error) -> Result<()> {
        let err = ExtractionError::Ownership {
            name: name.to_string(),
            source,
        };
        let Some(handler) = &self.on_ownership_error else {
            return Err(err);
        };

        let message = err.to_string();
        let mut handler = handler.lock().unwrap_or_else(PoisonError::into_inner);
        (*handler)(name, err)?;
        warn!("{message}; continuing");
        Ok(())
    }
}

impl fmt::Debug for MetadataRestorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataRestorer")
            .field("platform", &self.platform)
            .field("on_ownership_error", &self.on_ownership_error.is_some())
            .finish()
    }
}
