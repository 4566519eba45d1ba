//! Bounded fan-out of file tasks with first-error cancellation.
//!
//! The orchestrator walks entries on the calling thread and hands file
//! bodies to [`TaskScope::spawn`]. Spawning blocks until one of the
//! [`Semaphore`] permits is free, so at most `capacity` tasks ever run at
//! once. The first error, from a task or from the orchestrator itself,
//! is kept and flips the shared [`CancellationToken`]; tasks that have not
//! started yet see the token and return without doing any work.
//!
//! Tasks run on scoped threads, so they may borrow the archive and the
//! extractor for the duration of [`Scheduler::run`] without `'static`
//! bounds.

use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;

use crate::ExtractionError;
use crate::Result;

#[derive(Debug, Default)]
struct Permits {
    in_use: usize,
    peak: usize,
}

/// Counting semaphore bounding the number of concurrent file tasks.
///
/// A semaphore can be shared by several extractors to put one global
/// bound on their combined concurrency.
///
/// # Examples
///
/// ```
/// use parex_core::extraction::Semaphore;
/// use std::sync::Arc;
///
/// let semaphore = Arc::new(Semaphore::new(2));
/// let a = semaphore.acquire();
/// let b = semaphore.acquire();
/// assert_eq!(semaphore.in_use(), 2);
/// drop((a, b));
/// assert_eq!(semaphore.in_use(), 0);
/// assert_eq!(semaphore.peak(), 2);
/// ```
#[derive(Debug)]
pub struct Semaphore {
    capacity: usize,
    state: Mutex<Permits>,
    released: Condvar,
}

impl Semaphore {
    /// Creates a semaphore with `permits` slots; zero is raised to one.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            capacity: permits.max(1),
            state: Mutex::new(Permits::default()),
            released: Condvar::new(),
        }
    }

    /// Blocks until a permit is free and takes it.
    pub fn acquire(self: &Arc<Self>) -> OwnedPermit {
        let mut state = self.lock();
        while state.in_use >= self.capacity {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.in_use += 1;
        state.peak = state.peak.max(state.in_use);
        OwnedPermit {
            semaphore: Arc::clone(self),
        }
    }

    /// Maximum number of permits held at once.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits currently held.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.lock().in_use
    }

    /// Highest number of permits ever held at the same time.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    fn release(&self) {
        let mut state = self.lock();
        state.in_use = state.in_use.saturating_sub(1);
        drop(state);
        self.released.notify_one();
    }

    // Poison-tolerant: permits must still be released after a task panics.
    fn lock(&self) -> MutexGuard<'_, Permits> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A held permit; released on drop.
#[derive(Debug)]
pub struct OwnedPermit {
    semaphore: Arc<Semaphore>,
}

impl Drop for OwnedPermit {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// Shared flag telling in-flight work to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct Shared {
    token: CancellationToken,
    first_error: Mutex<Option<ExtractionError>>,
}

impl Shared {
    fn record(&self, err: ExtractionError) {
        let mut slot = self
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
        drop(slot);
        self.token.cancel();
    }

    fn take(&self) -> Option<ExtractionError> {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Runs one batch of file tasks under a shared concurrency bound.
#[derive(Debug)]
pub struct Scheduler {
    semaphore: Arc<Semaphore>,
    shared: Shared,
}

impl Scheduler {
    /// Creates a scheduler drawing permits from `semaphore`.
    #[must_use]
    pub fn new(semaphore: Arc<Semaphore>) -> Self {
        Self {
            semaphore,
            shared: Shared::default(),
        }
    }

    /// Token cancelled as soon as any error is recorded.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.shared.token.clone()
    }

    /// Runs `orchestrate`, waits for every task it spawned, and returns the
    /// first error recorded.
    ///
    /// An error returned by `orchestrate` is recorded like a task error;
    /// if a task failed earlier, the task's error wins.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the orchestrator or any task.
    ///
    /// # Examples
    ///
    /// ```
    /// use parex_core::extraction::Scheduler;
    /// use parex_core::extraction::Semaphore;
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// let done = AtomicUsize::new(0);
    /// let scheduler = Scheduler::new(Arc::new(Semaphore::new(4)));
    /// scheduler.run(|tasks| {
    ///     for _ in 0..16 {
    ///         tasks.spawn(|| {
    ///             done.fetch_add(1, Ordering::Relaxed);
    ///             Ok(())
    ///         });
    ///     }
    ///     Ok(())
    /// })?;
    /// assert_eq!(done.load(Ordering::Relaxed), 16);
    /// # Ok::<(), parex_core::ExtractionError>(())
    /// ```
    pub fn run<'env, F>(&'env self, orchestrate: F) -> Result<()>
    where
        F: for<'scope> FnOnce(&TaskScope<'scope, 'env>) -> Result<()>,
    {
        thread::scope(|scope| {
            let tasks = TaskScope {
                scope,
                scheduler: self,
            };
            if let Err(err) = orchestrate(&tasks) {
                self.shared.record(err);
            }
        });

        self.shared.take().map_or(Ok(()), Err)
    }
}

/// Handle for spawning tasks inside [`Scheduler::run`].
#[derive(Debug)]
pub struct TaskScope<'scope, 'env: 'scope> {
    scope: &'scope thread::Scope<'scope, 'env>,
    scheduler: &'env Scheduler,
}

impl<'scope> TaskScope<'scope, '_> {
    /// Spawns `task` once a permit is free.
    ///
    /// Blocks the caller while all permits are held. Does nothing if the
    /// batch is already cancelled.
    pub fn spawn<T>(&self, task: T)
    where
        T: FnOnce() -> Result<()> + Send + 'scope,
    {
        if self.is_cancelled() {
            return;
        }
        let permit = self.scheduler.semaphore.acquire();
        let shared = &self.scheduler.shared;
        self.scope.spawn(move || {
            let _permit = permit;
            if shared.token.is_cancelled() {
                return;
            }
            if let Err(err) = task() {
                shared.record(err);
            }
        });
    }

    /// Returns `true` once any error has been recorded.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.scheduler.shared.token.is_cancelled()
    }
}
