//! Error Types for RecEngine Core
//!
//! This module defines the errors shared by the binary codecs and the profile
//! domain types.
//!
//! ## Error Categories
//!
//! ### Data Integrity Errors
//! - `InvalidMagic`: a file doesn't start with the expected magic bytes
//!   (`RECDB`, `RECIDX` or `RECDELTA`)
//! - `ChecksumInvalid`: a delta entry's stored checksum disagrees with the
//!   recomputed one
//! - `ShortRead`: the stream ended in the middle of a header or entry
//!
//! ### Version/Compatibility Errors
//! - `UnsupportedVersion`: the file was written by a newer format revision
//! - `InvalidOp`: unknown delta opcode byte
//! - `InvalidEntryType`: the database header declares a payload kind we
//!   don't understand
//!
//! ### Capacity Errors
//! - `CapacityOverflow`: an entry's payload doesn't fit the slot capacity it
//!   declares (either on write, or a corrupted slot on read)
//!
//! All codec functions return `Result<T>` aliased to `Result<T, Error>`, so
//! errors propagate with `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Unexpected end of file")]
    ShortRead,

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid checksum: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumInvalid { expected: u8, actual: u8 },

    #[error("Unknown delta opcode: {0:#04x}")]
    InvalidOp(u8),

    #[error("Unknown entry type: {0:?}")]
    InvalidEntryType([u8; 8]),

    #[error("Entry capacity {capacity} cannot hold a payload of {payload} bytes")]
    CapacityOverflow { capacity: u32, payload: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
