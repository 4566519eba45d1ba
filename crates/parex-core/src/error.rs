//! Error types for archive extraction operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ExtractionError`.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Errors that can occur during archive extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// I/O operation failed while reading, writing or creating a node.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive is corrupted, unreadable, or carries a malformed extra field.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// Entry name resolves outside the extraction root.
    #[error("{path} cannot be extracted outside of root ({root})")]
    PathEscape {
        /// The offending entry path as resolved against the root.
        path: PathBuf,
        /// The extraction root.
        root: PathBuf,
    },

    /// Restoring modification time or permission bits failed.
    #[error("failed to restore metadata for {path}: {source}")]
    Metadata {
        /// The node whose metadata could not be restored.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Restoring ownership failed and no handler absorbed the error.
    #[error("failed to restore ownership of {name}: {source}")]
    Ownership {
        /// Archive-relative entry name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Extraction configuration is invalid.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },
}

impl ExtractionError {
    /// Returns `true` if this error represents a security violation.
    ///
    /// A path escape means the archive is malicious or corrupt; it is never
    /// retried or skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use parex_core::ExtractionError;
    /// use std::path::PathBuf;
    ///
    /// let err = ExtractionError::PathEscape {
    ///     path: PathBuf::from("/etc/passwd"),
    ///     root: PathBuf::from("/tmp/out"),
    /// };
    /// assert!(err.is_security_violation());
    ///
    /// let err = ExtractionError::InvalidArchive("truncated".into());
    /// assert!(!err.is_security_violation());
    /// ```
    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(self, Self::PathEscape { .. })
    }

    /// Returns `true` if a caller-supplied handler may absorb this error.
    ///
    /// Only ownership failures are recoverable; everything else aborts the
    /// extraction.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Ownership { .. })
    }

    /// Returns a context string for this error, if available.
    ///
    /// # Examples
    ///
    /// ```
    /// use parex_core::ExtractionError;
    ///
    /// let err = ExtractionError::InvalidArchive("bad header".to_string());
    /// assert_eq!(err.context(), Some("bad header"));
    /// ```
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::InvalidArchive(msg) => Some(msg),
            Self::InvalidConfig { reason } => Some(reason),
            Self::Ownership { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for ExtractionError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::InvalidArchive(other.to_string()),
        }
    }
}
