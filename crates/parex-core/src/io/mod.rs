//! I/O utilities for archive operations.

pub mod shared;

pub use shared::SharedFile;
