//! Profile Database
//!
//! The slotted `recdb` file store. Every entry reserves `capacity` bytes so
//! mutations that still fit rewrite in place; a grown entry tombstones its
//! old slot and appends a fresh one. The header's `num_entries` counts slots
//! (live and tombstoned) so iteration knows when to stop.
//!
//! ## Write Path
//!
//! 1. Look up the user's offset in the index store. A miss means append.
//! 2. Seek and read the slot, compute the new payload's encoded size.
//! 3. Fits within the slot's capacity → rewrite in place.
//! 4. Otherwise → write the old slot back tombstoned, append a new slot with
//!    capacity chosen by the policy, update the index mapping.
//!
//! ## Recovery
//!
//! A database left locked by a crash is rebuilt best-effort: slots stream
//! into a scratch buffer, a slot whose payload is inconsistent is dropped
//! (its declared capacity still tells where the next slot starts), an insane
//! capacity or a short read truncates the stream. The caller must then
//! discard the index and look at the delta log afresh.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use recengine_core::codec::recdb::{
    self, DbEntry, DbHeader, EntryKind, EntryPayload, ENTRIES_OFFSET, ENTRY_HEADER_SIZE, MAGIC,
    VERSION,
};

use crate::error::{Error, Result};

/// The slotted profile database for one namespace.
pub struct ProfileDb {
    file: File,
    kind: EntryKind,
    num_entries: u32,
}

impl ProfileDb {
    /// Opens a database file, creating it if empty. A locked file is
    /// rejected as corrupted (use [`ProfileDb::open_or_recover`]). The file
    /// is locked until [`ProfileDb::close`].
    pub fn open(mut file: File, kind: EntryKind) -> Result<Self> {
        let size = file.seek(SeekFrom::End(0))?;
        let num_entries;

        if size == 0 {
            file.seek(SeekFrom::Start(0))?;
            recdb::create(&mut file, kind)?;
            num_entries = 0;
        } else {
            file.seek(SeekFrom::Start(0))?;
            recdb::read_magic(&mut file)?;
            let header = recdb::read_header(&mut file)?;
            if header.version != VERSION {
                return Err(recengine_core::Error::UnsupportedVersion(header.version).into());
            }
            if header.kind != kind {
                return Err(recengine_core::Error::InvalidEntryType(header.kind.tag()).into());
            }
            if header.locked {
                return Err(Error::Corrupted("database file is locked".into()));
            }
            num_entries = header.num_entries;
        }

        recdb::write_locked(&mut file, true)?;

        Ok(ProfileDb {
            file,
            kind,
            num_entries,
        })
    }

    /// Opens a database file, rebuilding it first if it was left locked by a
    /// crash. Returns the store and whether a rebuild happened; in that
    /// case the caller must discard the index and rebuild it.
    pub fn open_or_recover(mut file: File, kind: EntryKind) -> Result<(Self, bool)> {
        let size = file.seek(SeekFrom::End(0))?;
        let mut recovered = false;
        if size > 0 {
            let locked = recdb::is_locked(&mut file).unwrap_or(true);
            if locked {
                let kept = Self::recover(&mut file, kind)?;
                tracing::warn!(entries = kept, "recovered corrupted database file");
                recovered = true;
            }
        }
        Ok((Self::open(file, kind)?, recovered))
    }

    /// Rebuilds a corrupted database in place. Returns the number of slots
    /// kept (tombstoned ones included).
    pub fn recover(file: &mut File, kind: EntryKind) -> Result<u32> {
        let file_size = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;

        let mut scratch = Cursor::new(Vec::new());
        recdb::create(&mut scratch, kind)?;

        let mut kept: u32 = 0;
        if recdb::read_magic(file).is_ok() && recdb::read_header(file).is_ok() {
            let mut pos = ENTRIES_OFFSET;
            loop {
                let mut buf4 = [0u8; 4];
                if file.read_exact(&mut buf4).is_err() {
                    break;
                }
                let capacity = u32::from_be_bytes(buf4);
                let mut flag = [0u8; 1];
                if file.read_exact(&mut flag).is_err() {
                    break;
                }

                // An insane capacity means we've lost the slot boundaries:
                // truncate here rather than guess.
                let payload_capacity = capacity as usize;
                if payload_capacity < ENTRY_HEADER_SIZE + 16
                    || pos + capacity as u64 > file_size
                {
                    break;
                }
                let payload_capacity = payload_capacity - ENTRY_HEADER_SIZE;

                let mut slot = vec![0u8; payload_capacity];
                if file.read_exact(&mut slot).is_err() {
                    break;
                }
                pos += capacity as u64;

                // A slot whose payload doesn't parse is dropped, but the
                // capacity kept us aligned with the next slot.
                let mut slot_reader = Cursor::new(&slot[..]);
                match recdb::read_payload(&mut slot_reader, kind, payload_capacity) {
                    Ok((payload, _)) => {
                        recdb::write_entry(
                            &mut scratch,
                            &DbEntry {
                                capacity,
                                deleted: flag[0] != 0,
                                payload,
                            },
                        )?;
                        kept += 1;
                    }
                    Err(_) => continue,
                }
            }
        }

        // Fix up the entry count, then swap the rebuilt image in.
        scratch.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        recdb::write_header(
            &mut scratch,
            &DbHeader {
                version: VERSION,
                kind,
                locked: false,
                num_entries: kept,
            },
        )?;

        let buf = scratch.into_inner();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buf)?;
        file.set_len(buf.len() as u64)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(kept)
    }

    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }

    pub fn file_size(&mut self) -> Result<u64> {
        Ok(self.file.seek(SeekFrom::End(0))?)
    }

    /// Reads the slot at a byte offset.
    pub fn read_at(&mut self, offset: u64) -> Result<DbEntry> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(recdb::read_entry(&mut self.file, self.kind)?)
    }

    /// Rewrites the slot at a byte offset. The entry's capacity must match
    /// the slot being replaced; `read_at` + same capacity guarantees that.
    pub fn write_at(&mut self, offset: u64, entry: &DbEntry) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        recdb::write_entry(&mut self.file, entry)?;
        Ok(())
    }

    /// Marks the slot at a byte offset deleted. The slot's bytes stay in
    /// place until a vacuum reclaims them.
    pub fn tombstone_at(&mut self, offset: u64) -> Result<()> {
        // The deleted flag sits right after the 4-byte capacity.
        self.file.seek(SeekFrom::Start(offset + 4))?;
        self.file.write_all(&[1])?;
        Ok(())
    }

    /// Appends a fresh slot with capacity chosen by the policy and bumps the
    /// header's entry count. Returns the new slot's byte offset.
    pub fn append(&mut self, payload: EntryPayload) -> Result<u64> {
        let entry = DbEntry {
            capacity: recdb::predict_capacity(&payload),
            deleted: false,
            payload,
        };
        let offset = self.file.seek(SeekFrom::End(0))?;
        recdb::write_entry(&mut self.file, &entry)?;
        self.num_entries += 1;
        self.write_header()?;
        Ok(offset)
    }

    /// Rewrites the file without its tombstoned slots and returns the
    /// surviving `(user_id, new_offset)` pairs so the caller can rebuild the
    /// index.
    pub fn vacuum(&mut self) -> Result<Vec<(u64, u64)>> {
        let mut scratch = Cursor::new(Vec::new());
        recdb::create(&mut scratch, self.kind)?;

        let mut mapping = Vec::new();
        let mut kept: u32 = 0;
        {
            let mut iter = self.iter()?;
            while iter.has_next() {
                let entry = iter.next_entry()?;
                if entry.deleted {
                    continue;
                }
                let EntryPayload::LikeProfile(ref profile) = entry.payload;
                let offset = scratch.position();
                mapping.push((profile.user_id, offset));
                recdb::write_entry(&mut scratch, &entry)?;
                kept += 1;
            }
        }

        scratch.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        recdb::write_header(
            &mut scratch,
            &DbHeader {
                version: VERSION,
                kind: self.kind,
                locked: true,
                num_entries: kept,
            },
        )?;

        let buf = scratch.into_inner();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        self.file.set_len(buf.len() as u64)?;
        self.num_entries = kept;
        Ok(mapping)
    }

    /// Starts iteration over all slots, tombstoned ones included.
    pub fn iter(&mut self) -> Result<EntryIter<'_>> {
        self.file.seek(SeekFrom::Start(ENTRIES_OFFSET))?;
        Ok(EntryIter {
            db: self,
            entry_index: 0,
            offset: ENTRIES_OFFSET,
            previous: None,
        })
    }

    /// Rewrites the header in place with the current entry count.
    fn write_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        recdb::write_header(
            &mut self.file,
            &DbHeader {
                version: VERSION,
                kind: self.kind,
                locked: true,
                num_entries: self.num_entries,
            },
        )?;
        Ok(())
    }

    /// Persists the header with a cleared locked byte and releases the file.
    pub fn close(mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        recdb::write_header(
            &mut self.file,
            &DbHeader {
                version: VERSION,
                kind: self.kind,
                locked: false,
                num_entries: self.num_entries,
            },
        )?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// The database entry iterator, the only read path that walks the file.
///
/// Reads go straight to the file (no read-ahead buffer), so a
/// [`EntryIter::set_previous`] rewrite never has to reconcile with buffered
/// bytes: after the write the position is exactly the start of the next slot.
pub struct EntryIter<'a> {
    db: &'a mut ProfileDb,
    entry_index: u32,
    /// Byte offset of the next slot to read.
    offset: u64,
    /// Offset and capacity of the slot returned by the last `next_entry`.
    previous: Option<(u64, u32)>,
}

impl<'a> EntryIter<'a> {
    /// Moves the iterator back to the first slot.
    pub fn rewind(&mut self) -> Result<()> {
        self.db.file.seek(SeekFrom::Start(ENTRIES_OFFSET))?;
        self.entry_index = 0;
        self.offset = ENTRIES_OFFSET;
        self.previous = None;
        Ok(())
    }

    /// True if at least one more slot can be read.
    pub fn has_next(&self) -> bool {
        self.entry_index < self.db.num_entries
    }

    /// Reads the current slot and advances. Returns a copy; the iterator
    /// retains its position.
    pub fn next_entry(&mut self) -> Result<DbEntry> {
        if !self.has_next() {
            return Err(Error::EndOfEntries);
        }
        let entry = recdb::read_entry(&mut self.db.file, self.db.kind)?;
        self.previous = Some((self.offset, entry.capacity));
        self.offset += entry.capacity as u64;
        self.entry_index += 1;
        Ok(entry)
    }

    /// Rewrites the slot just returned by `next_entry`. Fails if the
    /// supplied entry's capacity differs from the slot's.
    pub fn set_previous(&mut self, entry: &DbEntry) -> Result<()> {
        let (offset, capacity) = self.previous.ok_or(Error::EndOfEntries)?;
        if entry.capacity != capacity {
            return Err(Error::CapacityMismatch {
                expected: capacity,
                actual: entry.capacity,
            });
        }
        self.db.file.seek(SeekFrom::Start(offset))?;
        recdb::write_entry(&mut self.db.file, entry)?;
        // The write spans exactly `capacity` bytes, leaving the position at
        // the start of the next slot.
        Ok(())
    }

    /// Byte offset of the slot returned by the last `next_entry`.
    pub fn previous_offset(&self) -> Option<u64> {
        self.previous.map(|(offset, _)| offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recengine_core::Profile;
    use std::path::Path;

    fn open_at(path: &Path) -> ProfileDb {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .unwrap();
        ProfileDb::open(file, EntryKind::Like).unwrap()
    }

    fn profile(user_id: u64, likes: &[u64], dislikes: &[u64]) -> Profile {
        Profile {
            user_id,
            likes: likes.to_vec(),
            dislikes: dislikes.to_vec(),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_at(&dir.path().join("test.recdb"));

        let p = profile(42, &[1, 2], &[10]);
        let offset = db.append(EntryPayload::LikeProfile(p.clone())).unwrap();
        assert_eq!(db.num_entries(), 1);

        let entry = db.read_at(offset).unwrap();
        assert!(!entry.deleted);
        assert_eq!(entry.payload, EntryPayload::LikeProfile(p));
    }

    #[test]
    fn test_in_place_rewrite_keeps_capacity_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdb");
        let mut db = open_at(&path);

        // Insert with 2 likes + 1 dislike, then grow to 3 likes + 2
        // dislikes: still far below the minimum slot capacity.
        let offset = db
            .append(EntryPayload::LikeProfile(profile(42, &[1, 2], &[10])))
            .unwrap();
        let entry = db.read_at(offset).unwrap();
        let original_capacity = entry.capacity;

        let grown = DbEntry {
            capacity: entry.capacity,
            deleted: false,
            payload: EntryPayload::LikeProfile(profile(42, &[1, 2, 3], &[10, 20])),
        };
        db.write_at(offset, &grown).unwrap();

        assert_eq!(db.num_entries(), 1);
        let read = db.read_at(offset).unwrap();
        assert_eq!(read.capacity, original_capacity);
        assert_eq!(
            read.payload,
            EntryPayload::LikeProfile(profile(42, &[1, 2, 3], &[10, 20]))
        );
    }

    #[test]
    fn test_iterator_walks_all_slots() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_at(&dir.path().join("test.recdb"));
        for user in 0..5u64 {
            db.append(EntryPayload::LikeProfile(profile(user, &[user], &[])))
                .unwrap();
        }

        let mut iter = db.iter().unwrap();
        let mut users = Vec::new();
        while iter.has_next() {
            let entry = iter.next_entry().unwrap();
            let EntryPayload::LikeProfile(p) = entry.payload;
            users.push(p.user_id);
        }
        assert_eq!(users, vec![0, 1, 2, 3, 4]);
        assert!(matches!(iter.next_entry(), Err(Error::EndOfEntries)));

        iter.rewind().unwrap();
        assert!(iter.has_next());
    }

    #[test]
    fn test_set_previous_rejects_capacity_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_at(&dir.path().join("test.recdb"));
        db.append(EntryPayload::LikeProfile(profile(1, &[1], &[])))
            .unwrap();

        let mut iter = db.iter().unwrap();
        let entry = iter.next_entry().unwrap();
        let bad = DbEntry {
            capacity: entry.capacity + 8,
            ..entry
        };
        assert!(matches!(
            iter.set_previous(&bad),
            Err(Error::CapacityMismatch { .. })
        ));
    }

    #[test]
    fn test_set_previous_rewrites_and_keeps_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_at(&dir.path().join("test.recdb"));
        db.append(EntryPayload::LikeProfile(profile(1, &[1], &[])))
            .unwrap();
        db.append(EntryPayload::LikeProfile(profile(2, &[2], &[])))
            .unwrap();

        let mut iter = db.iter().unwrap();
        let mut first = iter.next_entry().unwrap();
        let EntryPayload::LikeProfile(ref mut p) = first.payload;
        p.like(99);
        iter.set_previous(&first).unwrap();

        // Iteration continues at the second slot.
        let second = iter.next_entry().unwrap();
        let EntryPayload::LikeProfile(p2) = second.payload;
        assert_eq!(p2.user_id, 2);

        let reread = db.read_at(ENTRIES_OFFSET).unwrap();
        let EntryPayload::LikeProfile(p1) = reread.payload;
        assert_eq!(p1.likes, vec![1, 99]);
    }

    #[test]
    fn test_tombstone() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_at(&dir.path().join("test.recdb"));
        let offset = db
            .append(EntryPayload::LikeProfile(profile(1, &[1], &[])))
            .unwrap();
        db.tombstone_at(offset).unwrap();

        let entry = db.read_at(offset).unwrap();
        assert!(entry.deleted);
        assert_eq!(db.num_entries(), 1);
    }

    #[test]
    fn test_close_then_reopen_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdb");
        {
            let mut db = open_at(&path);
            db.append(EntryPayload::LikeProfile(profile(7, &[1, 2, 3], &[9])))
                .unwrap();
            db.close().unwrap();
        }
        let mut db = open_at(&path);
        assert_eq!(db.num_entries(), 1);
        let entry = db.read_at(ENTRIES_OFFSET).unwrap();
        assert_eq!(
            entry.payload,
            EntryPayload::LikeProfile(profile(7, &[1, 2, 3], &[9]))
        );
    }

    #[test]
    fn test_open_rejects_locked_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdb");
        open_at(&path); // dropped without close, stays locked

        let file = File::options().read(true).write(true).open(&path).unwrap();
        assert!(matches!(
            ProfileDb::open(file, EntryKind::Like),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_recover_truncates_partial_trailing_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdb");
        {
            let mut db = open_at(&path);
            db.append(EntryPayload::LikeProfile(profile(1, &[1], &[])))
                .unwrap();
            db.append(EntryPayload::LikeProfile(profile(2, &[2], &[])))
                .unwrap();
            // dropped without close: stays locked
        }
        // Chop the second slot in half.
        let full = std::fs::metadata(&path).unwrap().len();
        let file = File::options().read(true).write(true).open(&path).unwrap();
        file.set_len(full - 100).unwrap();

        let (mut db, recovered) =
            ProfileDb::open_or_recover(file, EntryKind::Like).unwrap();
        assert!(recovered);
        assert_eq!(db.num_entries(), 1);
        let entry = db.read_at(ENTRIES_OFFSET).unwrap();
        let EntryPayload::LikeProfile(p) = entry.payload;
        assert_eq!(p.user_id, 1);
    }

    #[test]
    fn test_recover_drops_slot_with_garbled_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdb");
        let first_capacity;
        {
            let mut db = open_at(&path);
            let off1 = db
                .append(EntryPayload::LikeProfile(profile(1, &[1], &[])))
                .unwrap();
            let entry = db.read_at(off1).unwrap();
            first_capacity = entry.capacity;
            db.append(EntryPayload::LikeProfile(profile(2, &[2], &[])))
                .unwrap();
            // dropped without close
        }
        // Garble the first slot's like_count (capacity stays intact, so the
        // second slot must survive recovery).
        {
            let mut file = File::options().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(ENTRIES_OFFSET + 4 + 1 + 8)).unwrap();
            file.write_all(&u32::MAX.to_be_bytes()).unwrap();
        }

        let file = File::options().read(true).write(true).open(&path).unwrap();
        let (mut db, recovered) =
            ProfileDb::open_or_recover(file, EntryKind::Like).unwrap();
        assert!(recovered);
        assert_eq!(db.num_entries(), 1);
        let entry = db.read_at(ENTRIES_OFFSET).unwrap();
        assert_eq!(entry.capacity, first_capacity); // same policy, same size
        let EntryPayload::LikeProfile(p) = entry.payload;
        assert_eq!(p.user_id, 2);
    }

    #[test]
    fn test_vacuum_drops_tombstones_and_remaps() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_at(&dir.path().join("test.recdb"));
        let off1 = db
            .append(EntryPayload::LikeProfile(profile(1, &[1], &[])))
            .unwrap();
        db.append(EntryPayload::LikeProfile(profile(2, &[2], &[])))
            .unwrap();
        db.append(EntryPayload::LikeProfile(profile(3, &[3], &[])))
            .unwrap();
        db.tombstone_at(off1).unwrap();

        let mapping = db.vacuum().unwrap();
        assert_eq!(db.num_entries(), 2);
        let users: Vec<u64> = mapping.iter().map(|(u, _)| *u).collect();
        assert_eq!(users, vec![2, 3]);

        for (user, offset) in mapping {
            let entry = db.read_at(offset).unwrap();
            let EntryPayload::LikeProfile(p) = entry.payload;
            assert_eq!(p.user_id, user);
        }
    }
}
