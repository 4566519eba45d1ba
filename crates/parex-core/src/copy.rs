//! Pooled copy buffers for streaming entry content to disk.
//!
//! File tasks run concurrently, so each one checks a buffer out of a shared
//! [`BufferPool`] instead of allocating its own. Buffers are zeroed when
//! they return to the pool and never carry bytes from one entry into the
//! next.

use std::io::Read;
use std::io::Write;
use std::io::{self};
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::ExtractionError;
use crate::config::DEFAULT_BUFFER_SIZE;

/// A thread-safe pool of fixed-size byte buffers.
///
/// # Examples
///
/// ```
/// use parex_core::copy::BufferPool;
///
/// let pool = BufferPool::new(1024);
/// {
///     let buffer = pool.checkout();
///     assert_eq!(buffer.len(), 1024);
/// }
/// // The buffer went back to the pool and is reused.
/// let _again = pool.checkout();
/// assert_eq!(pool.allocated(), 1);
/// ```
#[derive(Debug)]
pub struct BufferPool {
    buffer_size: usize,
    idle: Mutex<PoolState>,
}

#[derive(Debug, Default)]
struct PoolState {
    free: Vec<Box<[u8]>>,
    allocated: usize,
}

impl BufferPool {
    /// Creates an empty pool handing out buffers of `buffer_size` bytes.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            idle: Mutex::new(PoolState::default()),
        }
    }

    /// Size in bytes of every buffer in this pool.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of buffers ever allocated by this pool.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.state().allocated
    }

    /// Number of buffers currently waiting in the pool.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.state().free.len()
    }

    /// Takes a buffer from the pool, allocating one if none is idle.
    ///
    /// The buffer returns to the pool when the guard is dropped.
    pub fn checkout(&self) -> PooledBuffer<'_> {
        let reused = {
            let mut state = self.state();
            let buffer = state.free.pop();
            if buffer.is_none() {
                state.allocated += 1;
            }
            buffer
        };
        let buf = reused.unwrap_or_else(|| vec![0u8; self.buffer_size].into_boxed_slice());
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    fn checkin(&self, mut buf: Box<[u8]>) {
        buf.fill(0);
        self.state().free.push(buf);
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// A buffer checked out of a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Box<[u8]>>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.checkin(buf);
        }
    }
}

/// Copies data from reader to writer through the provided buffer.
///
/// Only the bytes produced by the current read are ever written, so a
/// buffer's previous contents cannot leak into the output.
///
/// # Errors
///
/// Returns an error if reading or writing fails, or if the byte count
/// overflows `u64`.
///
/// # Examples
///
/// ```
/// use parex_core::copy::copy_with_buffer;
/// use std::io::Cursor;
///
/// let mut buffer = vec![0u8; 4];
/// let mut output = Vec::new();
/// let copied = copy_with_buffer(&mut Cursor::new(b"hello world"), &mut output, &mut buffer)?;
/// assert_eq!(copied, 11);
/// assert_eq!(output, b"hello world");
/// # Ok::<(), parex_core::ExtractionError>(())
/// ```
pub fn copy_with_buffer<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut [u8],
) -> Result<u64, ExtractionError> {
    let mut total: u64 = 0;

    loop {
        let bytes_read = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ExtractionError::Io(e)),
        };

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(ExtractionError::Io)?;

        total = total.checked_add(bytes_read as u64).ok_or_else(|| {
            ExtractionError::InvalidArchive("entry size overflows u64".into())
        })?;
    }

    Ok(total)
}
