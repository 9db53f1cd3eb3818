//! Binary File Codecs
//!
//! RecEngine persists each namespace in three files that share a common
//! shape: an ASCII magic prefix, a fixed-size header carrying a version byte,
//! a `locked` byte and an entry count, then a sequence of entries. All
//! multi-byte integers are big-endian.
//!
//! | File | Magic | Entries |
//! |---|---|---|
//! | `recdelta` | `RECDELTA` | checksummed `(op, user, item)` tuples |
//! | `recidx` | `RECIDX` | `(user_id, offset)` pairs |
//! | `recdb` | `RECDB` | capacity-padded profile slots |
//!
//! The `locked` byte is set to 1 while a process holds the file and cleared
//! only on clean close. A file found locked on open was abandoned by a crash
//! and must be recovered (delta, recdb) or rebuilt (recidx) before use.
//!
//! Codec functions are generic over `std::io::{Read, Write, Seek}` so tests
//! can run against `Cursor<Vec<u8>>` while production uses `File`.

pub mod delta;
pub mod index;
pub mod recdb;

use std::io::{self, Read};

use crate::error::{Error, Result};

/// `read_exact` that reports a truncated stream as `Error::ShortRead`
/// instead of a bare IO error.
pub(crate) fn read_exact_or_short<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::ShortRead
        } else {
            Error::Io(e)
        }
    })
}

/// Consumes and discards `count` bytes from the reader.
pub(crate) fn skip_bytes<R: Read>(reader: &mut R, count: usize) -> Result<()> {
    let mut buf = [0u8; 256];
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(buf.len());
        read_exact_or_short(reader, &mut buf[..n])?;
        remaining -= n;
    }
    Ok(())
}

/// Writes `count` zero bytes (slot padding).
pub(crate) fn write_zeros<W: io::Write>(writer: &mut W, count: usize) -> Result<()> {
    const ZEROS: [u8; 256] = [0u8; 256];
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(ZEROS.len());
        writer.write_all(&ZEROS[..n])?;
        remaining -= n;
    }
    Ok(())
}
