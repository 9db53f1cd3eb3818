//! Delta Log File Format (`recdelta`)
//!
//! The delta log is an append-only stream of profile changes layered over the
//! main database. It is the authoritative source of unflushed writes: for any
//! `(user, item)` pair the last delta entry wins over the database payload.
//!
//! ## File Format
//!
//! ```text
//! ┌──────────┬─────────┬────────┬─────────────┬─────────────────┐
//! │ RECDELTA │ version │ locked │ num_entries │ entries...      │
//! │ (8 bytes)│ (1 byte)│(1 byte)│ (4 bytes BE)│ (18 bytes each) │
//! └──────────┴─────────┴────────┴─────────────┴─────────────────┘
//!
//! Entry:
//! ┌─────────┬─────────────┬─────────────┬──────────┐
//! │ op      │ user_id     │ item_id     │ checksum │
//! │ (1 byte)│ (8 bytes BE)│ (8 bytes BE)│ (1 byte) │
//! └─────────┴─────────────┴─────────────┴──────────┘
//! ```
//!
//! The checksum is `(op + byte_sum(user_id) + byte_sum(item_id)) mod 256`.
//! Entries are fixed-size, so recovery can skip a corrupted entry and keep
//! reading the ones after it.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::codec::read_exact_or_short;
use crate::error::{Error, Result};

/// The file prefix, aka "magic number".
pub const MAGIC: [u8; 8] = *b"RECDELTA";

/// Current delta file format version.
pub const VERSION: u8 = 1;

/// Header size in bytes (the magic is not part of the header).
pub const HEADER_SIZE: usize = 1 + 1 + 4;

/// Entry size in bytes.
pub const ENTRY_SIZE: usize = 1 + 8 + 8 + 1;

/// Offset of the first entry from the beginning of the file.
pub const ENTRIES_OFFSET: u64 = (MAGIC.len() + HEADER_SIZE) as u64;

/// Offset of the `locked` byte from the beginning of the file.
const LOCKED_OFFSET: u64 = MAGIC.len() as u64 + 1;

/// A single pending change to a profile's like or dislike set.
///
/// The opcode alphabet covers both sides of a profile: `+`/`-` flip the like
/// set, `d`/`u` flip the dislike set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeltaOp {
    LikeAdd = b'+',
    LikeRemove = b'-',
    DislikeAdd = b'd',
    DislikeRemove = b'u',
}

impl DeltaOp {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DeltaOp {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            b'+' => Ok(DeltaOp::LikeAdd),
            b'-' => Ok(DeltaOp::LikeRemove),
            b'd' => Ok(DeltaOp::DislikeAdd),
            b'u' => Ok(DeltaOp::DislikeRemove),
            other => Err(Error::InvalidOp(other)),
        }
    }
}

/// Delta file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaHeader {
    pub version: u8,
    pub locked: bool,
    pub num_entries: u32,
}

/// A decoded delta entry. The checksum is computed on write and verified on
/// read, so it doesn't appear here; see [`RawDeltaEntry`] for the wire view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaEntry {
    pub op: DeltaOp,
    pub user_id: u64,
    pub item_id: u64,
}

/// A delta entry as read off the wire, before checksum validation. Recovery
/// iterates raw entries so it can drop the invalid ones and keep the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDeltaEntry {
    pub op: u8,
    pub user_id: u64,
    pub item_id: u64,
    pub checksum: u8,
}

impl RawDeltaEntry {
    /// Recomputes the checksum from the entry fields.
    pub fn computed_checksum(&self) -> u8 {
        entry_checksum(self.op, self.user_id, self.item_id)
    }

    /// True if the stored checksum matches the recomputed one and the opcode
    /// is part of the alphabet.
    pub fn is_valid(&self) -> bool {
        self.checksum == self.computed_checksum() && DeltaOp::try_from(self.op).is_ok()
    }

    /// Validates and converts into a [`DeltaEntry`].
    pub fn decode(&self) -> Result<DeltaEntry> {
        let expected = self.computed_checksum();
        if self.checksum != expected {
            return Err(Error::ChecksumInvalid {
                expected,
                actual: self.checksum,
            });
        }
        Ok(DeltaEntry {
            op: DeltaOp::try_from(self.op)?,
            user_id: self.user_id,
            item_id: self.item_id,
        })
    }
}

/// Computes the one-byte checksum for an entry.
pub fn entry_checksum(op: u8, user_id: u64, item_id: u64) -> u8 {
    let sum_bytes = |v: u64| v.to_be_bytes().iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    op.wrapping_add(sum_bytes(user_id)).wrapping_add(sum_bytes(item_id))
}

/// Writes the file magic, which verifies the type of the file.
pub fn write_magic<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(&MAGIC)?;
    Ok(())
}

/// Reads and verifies the file magic.
pub fn read_magic<R: Read>(reader: &mut R) -> Result<()> {
    let mut buf = [0u8; MAGIC.len()];
    read_exact_or_short(reader, &mut buf)?;
    if buf != MAGIC {
        return Err(Error::InvalidMagic);
    }
    Ok(())
}

/// Writes the file header (without the magic).
pub fn write_header<W: Write>(writer: &mut W, header: &DeltaHeader) -> Result<()> {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0] = header.version;
    buf[1] = header.locked as u8;
    buf[2..6].copy_from_slice(&header.num_entries.to_be_bytes());
    writer.write_all(&buf)?;
    Ok(())
}

/// Reads the file header (without the magic).
pub fn read_header<R: Read>(reader: &mut R) -> Result<DeltaHeader> {
    let mut buf = [0u8; HEADER_SIZE];
    read_exact_or_short(reader, &mut buf)?;
    Ok(DeltaHeader {
        version: buf[0],
        locked: buf[1] != 0,
        num_entries: u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]),
    })
}

/// Writes a delta entry, computing its checksum.
pub fn write_entry<W: Write>(writer: &mut W, entry: &DeltaEntry) -> Result<()> {
    let mut buf = [0u8; ENTRY_SIZE];
    buf[0] = entry.op.as_u8();
    buf[1..9].copy_from_slice(&entry.user_id.to_be_bytes());
    buf[9..17].copy_from_slice(&entry.item_id.to_be_bytes());
    buf[17] = entry_checksum(buf[0], entry.user_id, entry.item_id);
    writer.write_all(&buf)?;
    Ok(())
}

/// Reads a delta entry without validating it.
pub fn read_raw_entry<R: Read>(reader: &mut R) -> Result<RawDeltaEntry> {
    let mut buf = [0u8; ENTRY_SIZE];
    read_exact_or_short(reader, &mut buf)?;
    Ok(RawDeltaEntry {
        op: buf[0],
        user_id: u64::from_be_bytes(buf[1..9].try_into().unwrap()),
        item_id: u64::from_be_bytes(buf[9..17].try_into().unwrap()),
        checksum: buf[17],
    })
}

/// Reads and validates a delta entry.
pub fn read_entry<R: Read>(reader: &mut R) -> Result<DeltaEntry> {
    read_raw_entry(reader)?.decode()
}

/// Writes the `locked` byte of the header without disturbing the current
/// file position: save position, seek to the byte, write, restore.
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

/// Recovers a corrupted delta stream into `writer`, making its data
/// consistent. Entries whose checksum doesn't match are dropped; the stream
/// is truncated cleanly at the first short read. Returns the number of
/// entries recovered.
///
/// The output always carries a valid magic and an unlocked header, even when
/// the source is empty or unreadable.
pub fn recover<R: Read, W: Write + Seek>(reader: &mut R, writer: &mut W) -> Result<u32> {
    let mut header = DeltaHeader {
        version: VERSION,
        locked: false,
        num_entries: 0,
    };

    write_magic(writer)?;

    if read_magic(reader).is_err() {
        write_header(writer, &header)?;
        return Ok(0);
    }

    match read_header(reader) {
        Ok(h) => header.num_entries = h.num_entries,
        Err(_) => {
            write_header(writer, &header)?;
            return Ok(0);
        }
    }
    write_header(writer, &header)?;

    // Copy valid entries. Entries are fixed-size, so a bad checksum only
    // costs that one entry; any read error ends the stream.
    let mut recovered: u32 = 0;
    loop {
        let raw = match read_raw_entry(reader) {
            Ok(raw) => raw,
            Err(_) => break,
        };
        if !raw.is_valid() {
            continue;
        }
        write_entry(
            writer,
            &DeltaEntry {
                op: DeltaOp::try_from(raw.op)?,
                user_id: raw.user_id,
                item_id: raw.item_id,
            },
        )?;
        recovered += 1;
    }

    if header.num_entries != recovered {
        writer.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        header.num_entries = recovered;
        write_header(writer, &header)?;
    }

    Ok(recovered)
}
