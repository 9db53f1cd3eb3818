//! Index File Format (`recidx`)
//!
//! The index maps a `user_id` to the byte offset of that user's slot in the
//! main database file, backing O(1) profile lookups.
//!
//! ## File Format
//!
//! ```text
//! ┌────────┬─────────┬────────┬─────────────┬─────────────────┐
//! │ RECIDX │ version │ locked │ num_entries │ entries...      │
//! │(6 byte)│ (1 byte)│(1 byte)│ (4 bytes BE)│ (16 bytes each) │
//! └────────┴─────────┴────────┴─────────────┴─────────────────┘
//!
//! Entry: user_id (8 bytes BE) ++ offset (8 bytes BE)
//! ```
//!
//! Index entries carry no checksum: the index is disposable. A locked file at
//! open time is simply truncated and rebuilt from the database iterator.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::codec::read_exact_or_short;
use crate::error::{Error, Result};

/// The file prefix, aka "magic number".
pub const MAGIC: [u8; 6] = *b"RECIDX";

/// Current index file format version.
pub const VERSION: u8 = 1;

/// Header size in bytes (the magic is not part of the header).
pub const HEADER_SIZE: usize = 1 + 1 + 4;

/// Entry size in bytes.
pub const ENTRY_SIZE: usize = 8 + 8;

/// Offset of the first entry from the beginning of the file.
pub const ENTRIES_OFFSET: u64 = (MAGIC.len() + HEADER_SIZE) as u64;

/// Offset of the `locked` byte from the beginning of the file.
const LOCKED_OFFSET: u64 = MAGIC.len() as u64 + 1;

/// Index file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u8,
    pub locked: bool,
    pub num_entries: u32,
}

/// One `user_id → database offset` pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub user_id: u64,
    pub offset: u64,
}

pub fn write_magic<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(&MAGIC)?;
    Ok(())
}

pub fn read_magic<R: Read>(reader: &mut R) -> Result<()> {
    let mut buf = [0u8; MAGIC.len()];
    read_exact_or_short(reader, &mut buf)?;
    if buf != MAGIC {
        return Err(Error::InvalidMagic);
    }
    Ok(())
}

pub fn write_header<W: Write>(writer: &mut W, header: &IndexHeader) -> Result<()> {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0] = header.version;
    buf[1] = header.locked as u8;
    buf[2..6].copy_from_slice(&header.num_entries.to_be_bytes());
    writer.write_all(&buf)?;
    Ok(())
}

pub fn read_header<R: Read>(reader: &mut R) -> Result<IndexHeader> {
    let mut buf = [0u8; HEADER_SIZE];
    read_exact_or_short(reader, &mut buf)?;
    Ok(IndexHeader {
        version: buf[0],
        locked: buf[1] != 0,
        num_entries: u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]),
    })
}

pub fn write_entry<W: Write>(writer: &mut W, entry: &IndexEntry) -> Result<()> {
    let mut buf = [0u8; ENTRY_SIZE];
    buf[..8].copy_from_slice(&entry.user_id.to_be_bytes());
    buf[8..].copy_from_slice(&entry.offset.to_be_bytes());
    writer.write_all(&buf)?;
    Ok(())
}

pub fn read_entry<R: Read>(reader: &mut R) -> Result<IndexEntry> {
    let mut buf = [0u8; ENTRY_SIZE];
    read_exact_or_short(reader, &mut buf)?;
    Ok(IndexEntry {
        user_id: u64::from_be_bytes(buf[..8].try_into().unwrap()),
        offset: u64::from_be_bytes(buf[8..].try_into().unwrap()),
    })
}

/// Writes the `locked` byte without disturbing the current file position.
pub fn write_locked<F: Write + Seek>(file: &mut F, locked: bool) -> Result<()> {
    let pos = file.stream_position()?;
    file.seek(SeekFrom::Start(LOCKED_OFFSET))?;
    file.write_all(&[locked as u8])?;
    file.seek(SeekFrom::Start(pos))?;
    Ok(())
}

/// Checks the `locked` byte without disturbing the current file position.
pub fn is_locked<F: Read + Seek>(file: &mut F) -> Result<bool> {
    let pos = file.stream_position()?;
    file.seek(SeekFrom::Start(LOCKED_OFFSET))?;
    let mut buf = [0u8; 1];
    read_exact_or_short(file, &mut buf)?;
    file.seek(SeekFrom::Start(pos))?;
    Ok(buf[0] != 0)
}
