//! Parallel extraction: scheduling, writing and metadata restoration.

pub mod engine;
pub mod metadata;
pub mod scheduler;
pub mod writer;

pub use engine::Extractor;
pub use metadata::MetadataRestorer;
pub use metadata::OwnershipErrorHandler;
pub use scheduler::CancellationToken;
pub use scheduler::OwnedPermit;
pub use scheduler::Scheduler;
pub use scheduler::Semaphore;
pub use scheduler::TaskScope;
