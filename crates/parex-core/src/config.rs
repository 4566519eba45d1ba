//! Extraction configuration.

use crate::ExtractionError;
use crate::Result;

/// Default size of each pooled write buffer (32 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Tunables for a single extraction.
///
/// # Examples
///
/// ```
/// use parex_core::ExtractionConfig;
///
/// let config = ExtractionConfig::default().with_concurrency(4);
/// assert_eq!(config.concurrency, 4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Maximum number of file bodies written concurrently.
    pub concurrency: usize,

    /// Size in bytes of each pooled write buffer.
    pub buffer_size: usize,
}

impl Default for ExtractionConfig {
    /// Creates a config with one worker per logical CPU and 32 KiB buffers.
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ExtractionConfig {
    /// Sets the concurrency limit.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the pooled buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Checks that the configuration can drive an extraction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the concurrency limit or buffer size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ExtractionError::InvalidConfig {
                reason: "concurrency must be at least 1".into(),
            });
        }
        if self.buffer_size == 0 {
            return Err(ExtractionError::InvalidConfig {
                reason: "buffer size must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

/// Returns the number of logical CPUs, or 1 if it cannot be determined.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
