//! Storage Error Types
//!
//! Errors raised by the per-namespace stores, the actor worker and the
//! registry.
//!
//! ## Error Categories
//!
//! - `Codec`: a file format violation bubbled up from the codec layer
//! - `Corrupted`: a file was found locked or failed its checks; handled
//!   inside the open path by recovery and never escapes the actor
//! - `CapacityMismatch`: an iterator rewrite tried to change a slot's size
//! - `Stopped`: the request outlived its namespace (normal during shutdown)
//! - `NamespaceNotFound` / `NameTaken` / `Unusable`: registry-level failures

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Codec error: {0}")]
    Codec(#[from] recengine_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] recengine_metadata::MetadataError),

    #[error("Corrupted file: {0}")]
    Corrupted(String),

    #[error("Entry capacity mismatch: slot holds {expected}, got {actual}")]
    CapacityMismatch { expected: u32, actual: u32 },

    #[error("Iterated past the last entry")]
    EndOfEntries,

    #[error("The namespace stopped")]
    Stopped,

    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("Namespace name already taken: {0}")]
    NameTaken(String),

    #[error("Namespace unusable (failed to start): {0}")]
    Unusable(String),
}
