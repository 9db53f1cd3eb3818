//! Profile Database File Format (`recdb`)
//!
//! The main database is a slotted file of profile entries. Each slot reserves
//! `capacity` bytes on disk (entry header included), chosen at insert time
//! with headroom so in-place mutation up to some growth is free. Payloads
//! smaller than the capacity are zero-padded.
//!
//! ## File Format
//!
//! ```text
//! ┌───────┬─────────┬────────────┬────────┬─────────────┬────────────┐
//! │ RECDB │ version │ entry_type │ locked │ num_entries │ entries... │
//! │(5 byte)│ (1 byte)│ (8 bytes) │(1 byte)│ (4 bytes BE)│            │
//! └───────┴─────────┴────────────┴────────┴─────────────┴────────────┘
//!
//! Entry (slot):
//! ┌─────────────┬─────────┬─────────────────────┬─────────────┐
//! │ capacity    │ deleted │ payload             │ zero padding│
//! │ (4 bytes BE)│ (1 byte)│ (entry_type-defined)│ to capacity │
//! └─────────────┴─────────┴─────────────────────┴─────────────┘
//!
//! Like-profile payload:
//! user_id (8) ++ like_count (4) ++ likes (8 each)
//!            ++ dislike_count (4) ++ dislikes (8 each)
//! ```
//!
//! `capacity` counts the whole slot, header fields included. `num_entries`
//! counts slots, live and tombstoned, so iteration knows when to stop.
//!
//! The payload is polymorphic by the header's `entry_type` tag; today the
//! only kind is `"LIKE    "` (space-padded ASCII). The codec dispatches on
//! the tag through [`EntryKind`], keeping the dispatch closed.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::codec::{read_exact_or_short, skip_bytes, write_zeros};
use crate::error::{Error, Result};
use crate::profile::Profile;

/// The file prefix, aka "magic number".
pub const MAGIC: [u8; 5] = *b"RECDB";

/// Current database file format version.
pub const VERSION: u8 = 1;

/// Header size in bytes (the magic is not part of the header).
pub const HEADER_SIZE: usize = 1 + 8 + 1 + 4;

/// The slot fields stored before the payload.
pub const ENTRY_HEADER_SIZE: usize = 4 + 1;

/// Minimum slot capacity, entry header included. Leaves room for roughly 30
/// item ids before a freshly inserted profile outgrows its slot.
pub const MIN_ENTRY_CAPACITY: usize = ENTRY_HEADER_SIZE + 240;

/// Offset of the first entry from the beginning of the file.
pub const ENTRIES_OFFSET: u64 = (MAGIC.len() + HEADER_SIZE) as u64;

/// Offset of the `locked` byte from the beginning of the file.
const LOCKED_OFFSET: u64 = MAGIC.len() as u64 + 1 + 8;

/// The smallest payload any kind can encode (an empty like profile).
const MIN_PAYLOAD_SIZE: usize = 8 + 4 + 4;

/// The kind of payload a database file stores, as declared by the header's
/// `entry_type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Like,
}

impl EntryKind {
    pub fn tag(self) -> [u8; 8] {
        match self {
            EntryKind::Like => *b"LIKE    ",
        }
    }

    pub fn from_tag(tag: [u8; 8]) -> Result<Self> {
        match &tag {
            b"LIKE    " => Ok(EntryKind::Like),
            _ => Err(Error::InvalidEntryType(tag)),
        }
    }
}

/// Database file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbHeader {
    pub version: u8,
    pub kind: EntryKind,
    pub locked: bool,
    pub num_entries: u32,
}

/// A slot payload, tagged by [`EntryKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum EntryPayload {
    LikeProfile(Profile),
}

impl EntryPayload {
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryPayload::LikeProfile(_) => EntryKind::Like,
        }
    }

    /// The number of bytes the payload spans once serialized.
    pub fn encoded_size(&self) -> usize {
        match self {
            EntryPayload::LikeProfile(p) => {
                8 + 4 + p.likes.len() * 8 + 4 + p.dislikes.len() * 8
            }
        }
    }
}

/// A database slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DbEntry {
    /// Whole-slot byte span, entry header included.
    pub capacity: u32,
    pub deleted: bool,
    pub payload: EntryPayload,
}

/// The number of bytes an entry needs at minimum (payload + entry header).
pub fn predict_entry_size(payload: &EntryPayload) -> usize {
    payload.encoded_size() + ENTRY_HEADER_SIZE
}

/// The capacity policy: at least [`MIN_ENTRY_CAPACITY`], and at least one
/// and a half times the serialized entry so in-place growth stays cheap.
pub fn predict_capacity(payload: &EntryPayload) -> u32 {
    let size = predict_entry_size(payload);
    (size + size / 2).max(MIN_ENTRY_CAPACITY) as u32
}

/// Initializes an empty database: magic plus a blank unlocked header.
pub fn create<W: Write>(writer: &mut W, kind: EntryKind) -> Result<()> {
    write_magic(writer)?;
    write_header(
        writer,
        &DbHeader {
            version: VERSION,
            kind,
            locked: false,
            num_entries: 0,
        },
    )
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

pub fn write_header<W: Write>(writer: &mut W, header: &DbHeader) -> Result<()> {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0] = header.version;
    buf[1..9].copy_from_slice(&header.kind.tag());
    buf[9] = header.locked as u8;
    buf[10..14].copy_from_slice(&header.num_entries.to_be_bytes());
    writer.write_all(&buf)?;
    Ok(())
}

pub fn read_header<R: Read>(reader: &mut R) -> Result<DbHeader> {
    let mut buf = [0u8; HEADER_SIZE];
    read_exact_or_short(reader, &mut buf)?;
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&buf[1..9]);
    Ok(DbHeader {
        version: buf[0],
        kind: EntryKind::from_tag(tag)?,
        locked: buf[9] != 0,
        num_entries: u32::from_be_bytes([buf[10], buf[11], buf[12], buf[13]]),
    })
}

/// Writes a payload (no slot header, no padding). Returns bytes written.
pub fn write_payload<W: Write>(writer: &mut W, payload: &EntryPayload) -> Result<usize> {
    match payload {
        EntryPayload::LikeProfile(profile) => {
            writer.write_all(&profile.user_id.to_be_bytes())?;
            writer.write_all(&(profile.likes.len() as u32).to_be_bytes())?;
            for item in &profile.likes {
                writer.write_all(&item.to_be_bytes())?;
            }
            writer.write_all(&(profile.dislikes.len() as u32).to_be_bytes())?;
            for item in &profile.dislikes {
                writer.write_all(&item.to_be_bytes())?;
            }
        }
    }
    Ok(payload.encoded_size())
}

/// Reads a payload of the given kind, never consuming more than
/// `payload_capacity` bytes. Returns the payload and its serialized size.
///
/// Item counts are validated against the capacity before any allocation, so
/// a corrupted count can't trigger a huge buffer.
pub fn read_payload<R: Read>(
    reader: &mut R,
    kind: EntryKind,
    payload_capacity: usize,
) -> Result<(EntryPayload, usize)> {
    match kind {
        EntryKind::Like => {
            let overflow = |size: usize| Error::CapacityOverflow {
                capacity: (payload_capacity + ENTRY_HEADER_SIZE) as u32,
                payload: size,
            };

            let mut buf8 = [0u8; 8];
            let mut buf4 = [0u8; 4];

            read_exact_or_short(reader, &mut buf8)?;
            let user_id = u64::from_be_bytes(buf8);

            read_exact_or_short(reader, &mut buf4)?;
            let like_count = u32::from_be_bytes(buf4) as usize;
            let mut size = 8 + 4 + like_count * 8 + 4;
            if size > payload_capacity {
                return Err(overflow(size));
            }
            let mut likes = Vec::with_capacity(like_count);
            for _ in 0..like_count {
                read_exact_or_short(reader, &mut buf8)?;
                likes.push(u64::from_be_bytes(buf8));
            }

            read_exact_or_short(reader, &mut buf4)?;
            let dislike_count = u32::from_be_bytes(buf4) as usize;
            size += dislike_count * 8;
            if size > payload_capacity {
                return Err(overflow(size));
            }
            let mut dislikes = Vec::with_capacity(dislike_count);
            for _ in 0..dislike_count {
                read_exact_or_short(reader, &mut buf8)?;
                dislikes.push(u64::from_be_bytes(buf8));
            }

            let payload = EntryPayload::LikeProfile(Profile {
                user_id,
                likes,
                dislikes,
            });
            Ok((payload, size))
        }
    }
}

/// Writes a whole slot: entry header, payload, zero padding up to the slot's
/// capacity. Fails with `CapacityOverflow` if the payload doesn't fit.
pub fn write_entry<W: Write>(writer: &mut W, entry: &DbEntry) -> Result<()> {
    let payload_size = entry.payload.encoded_size();
    let needed = payload_size + ENTRY_HEADER_SIZE;
    if needed > entry.capacity as usize {
        return Err(Error::CapacityOverflow {
            capacity: entry.capacity,
            payload: payload_size,
        });
    }
    writer.write_all(&entry.capacity.to_be_bytes())?;
    writer.write_all(&[entry.deleted as u8])?;
    write_payload(writer, &entry.payload)?;
    write_zeros(writer, entry.capacity as usize - needed)?;
    Ok(())
}

/// Reads a whole slot, leaving the stream positioned at the next slot.
pub fn read_entry<R: Read>(reader: &mut R, kind: EntryKind) -> Result<DbEntry> {
    let mut buf4 = [0u8; 4];
    read_exact_or_short(reader, &mut buf4)?;
    let capacity = u32::from_be_bytes(buf4);

    let mut flag = [0u8; 1];
    read_exact_or_short(reader, &mut flag)?;
    let deleted = flag[0] != 0;

    if (capacity as usize) < ENTRY_HEADER_SIZE + MIN_PAYLOAD_SIZE {
        return Err(Error::CapacityOverflow {
            capacity,
            payload: MIN_PAYLOAD_SIZE,
        });
    }

    let payload_capacity = capacity as usize - ENTRY_HEADER_SIZE;
    let (payload, payload_size) = read_payload(reader, kind, payload_capacity)?;
    skip_bytes(reader, payload_capacity - payload_size)?;

    Ok(DbEntry {
        capacity,
        deleted,
        payload,
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
