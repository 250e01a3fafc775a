//! File persistence for knowledge graphs.
//!
//! - [`codec`]: encode and decode a whole graph ([`CodecProfile`])
//! - [`lock`]: per-path reader/writer locks ([`FileLockRegistry`])
//! - [`file`]: locked read, write and read-modify-write transactions ([`GraphFiles`])

pub mod codec;
pub mod file;
pub mod lock;

pub use codec::CodecProfile;
pub use file::GraphFiles;
pub use lock::{FileLockRegistry, PathLock};

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
