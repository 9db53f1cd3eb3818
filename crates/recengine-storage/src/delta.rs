//! Delta Log Store
//!
//! In-memory last-write-wins view over the append-only `recdelta` file. The
//! delta data complements the profiles stored in the main database, which is
//! only rewritten at compaction time. Roughly, the delta file is to the
//! database what a patch is to a branch.
//!
//! ## State
//!
//! - `delta_cache`: the on-disk entries, loaded at open time
//! - `new_delta`: operations accepted but not yet flushed
//!
//! `add` only touches memory; `flush` rewrites the header (entry count, with
//! the file still locked) and appends the new entries, so durability is
//! batched. A crash loses at most the unflushed tail, and `recover` makes the
//! remaining prefix consistent by dropping entries with bad checksums.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Seek, SeekFrom, Write};

use recengine_core::codec::delta::{
    self, DeltaEntry, DeltaHeader, DeltaOp, ENTRY_SIZE, HEADER_SIZE, MAGIC, VERSION,
};

use crate::error::{Error, Result};

/// One pending operation on a user's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ItemDelta {
    item: u64,
    op: DeltaOp,
}

/// A storage of pending profile changes, backed by an append-only file.
pub struct DeltaStore {
    file: File,
    /// On-disk entries, keyed by user id, oldest first.
    delta_cache: HashMap<u64, Vec<ItemDelta>>,
    /// Unflushed entries, keyed by user id, oldest first.
    new_delta: HashMap<u64, Vec<ItemDelta>>,
    /// Flushed + unflushed item count; equals the on-disk entry count after
    /// a flush.
    total_items: usize,
    unflushed_items: usize,
}

impl DeltaStore {
    /// Opens a delta file. An empty file is initialized in place; a locked
    /// file is rejected as corrupted (use [`DeltaStore::open_or_recover`]).
    /// The file is locked until [`DeltaStore::close`].
    pub fn open(mut file: File) -> Result<Self> {
        let size = file.seek(SeekFrom::End(0))?;
        let mut delta_cache: HashMap<u64, Vec<ItemDelta>> = HashMap::new();
        let mut total_items = 0usize;

        if size == 0 {
            file.seek(SeekFrom::Start(0))?;
            delta::write_magic(&mut file)?;
            delta::write_header(
                &mut file,
                &DeltaHeader {
                    version: VERSION,
                    locked: false,
                    num_entries: 0,
                },
            )?;
        } else {
            file.seek(SeekFrom::Start(0))?;
            let mut reader = BufReader::new(&mut file);
            delta::read_magic(&mut reader)?;
            let header = delta::read_header(&mut reader)?;
            if header.version != VERSION {
                return Err(recengine_core::Error::UnsupportedVersion(header.version).into());
            }
            if header.locked {
                return Err(Error::Corrupted("delta file is locked".into()));
            }
            for _ in 0..header.num_entries {
                let entry = delta::read_entry(&mut reader)?;
                delta_cache.entry(entry.user_id).or_default().push(ItemDelta {
                    item: entry.item_id,
                    op: entry.op,
                });
            }
            total_items = header.num_entries as usize;
        }

        delta::write_locked(&mut file, true)?;

        Ok(DeltaStore {
            file,
            delta_cache,
            new_delta: HashMap::new(),
            total_items,
            unflushed_items: 0,
        })
    }

    /// Rewrites a corrupted delta file in place, keeping only entries with
    /// valid checksums and truncating at the first short read.
    pub fn recover(file: &mut File) -> Result<u32> {
        file.seek(SeekFrom::Start(0))?;
        let mut scratch = Cursor::new(Vec::new());
        let recovered = {
            let mut reader = BufReader::new(&mut *file);
            delta::recover(&mut reader, &mut scratch)?
        };
        let buf = scratch.into_inner();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buf)?;
        file.set_len(buf.len() as u64)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(recovered)
    }

    /// Opens a delta file, recovering it first if it was left locked by a
    /// crash.
    pub fn open_or_recover(mut file: File) -> Result<Self> {
        let size = file.seek(SeekFrom::End(0))?;
        if size > 0 {
            let locked = delta::is_locked(&mut file).unwrap_or(true);
            if locked {
                let recovered = Self::recover(&mut file)?;
                tracing::warn!(entries = recovered, "recovered corrupted delta file");
            }
        }
        Self::open(file)
    }

    /// Adds an operation to a user's pending changes. A repeated operation
    /// for the same `(user, item)` pair overwrites in place (idempotence; an
    /// opposing op cancels and replaces), so the counters only move on
    /// genuine insertions. Does not touch the disk.
    pub fn add(&mut self, op: DeltaOp, user: u64, item: u64) {
        let deltas = self.new_delta.entry(user).or_default();
        if let Some(existing) = deltas.iter_mut().find(|d| d.item == item) {
            existing.op = op;
            return;
        }
        deltas.push(ItemDelta { item, op });
        self.unflushed_items += 1;
        self.total_items += 1;
    }

    /// Returns the last operation recorded for a `(user, item)` pair:
    /// unflushed entries win over flushed ones, newer over older.
    pub fn get(&self, user: u64, item: u64) -> Option<DeltaOp> {
        for deltas in [self.new_delta.get(&user), self.delta_cache.get(&user)]
            .into_iter()
            .flatten()
        {
            if let Some(found) = deltas.iter().rev().find(|d| d.item == item) {
                return Some(found.op);
            }
        }
        None
    }

    /// True if the user has any pending deltas, flushed or not.
    pub fn has_user(&self, user: u64) -> bool {
        self.delta_cache.contains_key(&user) || self.new_delta.contains_key(&user)
    }

    /// All pending operations for a user in application order (flushed
    /// first, then unflushed, each oldest first).
    pub fn deltas_for(&self, user: u64) -> impl Iterator<Item = (u64, DeltaOp)> + '_ {
        self.delta_cache
            .get(&user)
            .into_iter()
            .flatten()
            .chain(self.new_delta.get(&user).into_iter().flatten())
            .map(|d| (d.item, d.op))
    }

    /// Every user with pending deltas.
    pub fn users(&self) -> impl Iterator<Item = u64> + '_ {
        self.delta_cache.keys().copied().chain(
            self.new_delta
                .keys()
                .filter(|user| !self.delta_cache.contains_key(user))
                .copied(),
        )
    }

    pub fn user_count(&self) -> usize {
        let unflushed_only = self
            .new_delta
            .keys()
            .filter(|user| !self.delta_cache.contains_key(user))
            .count();
        self.delta_cache.len() + unflushed_only
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn unflushed_items(&self) -> usize {
        self.unflushed_items
    }

    /// The file size needed to hold all current entries.
    pub fn file_size(&self) -> u64 {
        (MAGIC.len() + HEADER_SIZE + self.total_items * ENTRY_SIZE) as u64
    }

    /// Flushes unflushed entries: rewrites the header in place (still
    /// locked, with the updated entry count), appends the new entries, and
    /// moves them into the flushed cache.
    pub fn flush(&mut self) -> Result<()> {
        if self.unflushed_items == 0 && self.new_delta.is_empty() {
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        delta::write_header(
            &mut self.file,
            &DeltaHeader {
                version: VERSION,
                locked: true,
                num_entries: self.total_items as u32,
            },
        )?;

        self.file.seek(SeekFrom::End(0))?;
        let mut writer = BufWriter::new(&mut self.file);
        for (user, deltas) in &self.new_delta {
            for delta_item in deltas {
                delta::write_entry(
                    &mut writer,
                    &DeltaEntry {
                        op: delta_item.op,
                        user_id: *user,
                        item_id: delta_item.item,
                    },
                )?;
            }
        }
        writer.flush()?;
        drop(writer);

        for (user, deltas) in self.new_delta.drain() {
            self.delta_cache.entry(user).or_default().extend(deltas);
        }
        self.unflushed_items = 0;
        Ok(())
    }

    /// Drops every entry for a user and rewrites the file from the surviving
    /// state. Used by profile deletion so stale deltas can't resurrect it.
    pub fn purge_user(&mut self, user: u64) -> Result<()> {
        let cached = self.delta_cache.remove(&user).map_or(0, |d| d.len());
        let fresh = self.new_delta.remove(&user).map_or(0, |d| d.len());
        if cached == 0 && fresh == 0 {
            return Ok(());
        }
        self.total_items -= cached + fresh;
        self.unflushed_items -= fresh;
        self.rewrite()
    }

    /// Empties the store and truncates the file to a bare header. Called
    /// after compaction evacuates the deltas into the database.
    pub fn clear(&mut self) -> Result<()> {
        self.delta_cache.clear();
        self.new_delta.clear();
        self.total_items = 0;
        self.unflushed_items = 0;
        self.rewrite()
    }

    /// Rewrites the whole file from the in-memory state. Everything written
    /// counts as flushed afterwards.
    fn rewrite(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        let mut writer = BufWriter::new(&mut self.file);
        delta::write_magic(&mut writer)?;
        delta::write_header(
            &mut writer,
            &DeltaHeader {
                version: VERSION,
                locked: true,
                num_entries: self.total_items as u32,
            },
        )?;
        for map in [&self.delta_cache, &self.new_delta] {
            for (user, deltas) in map {
                for delta_item in deltas {
                    delta::write_entry(
                        &mut writer,
                        &DeltaEntry {
                            op: delta_item.op,
                            user_id: *user,
                            item_id: delta_item.item,
                        },
                    )?;
                }
            }
        }
        writer.flush()?;
        drop(writer);

        for (user, deltas) in self.new_delta.drain() {
            self.delta_cache.entry(user).or_default().extend(deltas);
        }
        self.unflushed_items = 0;
        Ok(())
    }

    /// Flushes, clears the locked byte and releases the file. A delta file
    /// not closed through here is considered broken and requires recovery.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        delta::write_locked(&mut self.file, false)?;
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn open_at(path: &Path) -> DeltaStore {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .unwrap();
        DeltaStore::open(file).unwrap()
    }

    #[test]
    fn test_empty_file_creates_valid_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdelta");
        let store = open_at(&path);
        assert_eq!(store.total_items(), 0);
        store.close().unwrap();

        let mut file = File::open(&path).unwrap();
        assert!(!delta::is_locked(&mut file).unwrap());
        let mut reader = BufReader::new(file);
        delta::read_magic(&mut reader).unwrap();
        let header = delta::read_header(&mut reader).unwrap();
        assert_eq!(header.num_entries, 0);
    }

    #[test]
    fn test_add_close_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdelta");

        let mut store = open_at(&path);
        store.add(DeltaOp::LikeAdd, 7, 13);
        store.add(DeltaOp::LikeRemove, 7, 42);
        store.add(DeltaOp::LikeAdd, 5, 42);
        store.close().unwrap();

        let store = open_at(&path);
        assert_eq!(store.total_items(), 3);
        assert_eq!(store.user_count(), 2);
        assert_eq!(store.get(7, 13), Some(DeltaOp::LikeAdd));
        assert_eq!(store.get(7, 42), Some(DeltaOp::LikeRemove));
        assert_eq!(store.get(5, 42), Some(DeltaOp::LikeAdd));
        assert_eq!(store.get(5, 13), None);
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_at(&dir.path().join("test.recdelta"));
        store.add(DeltaOp::LikeAdd, 7, 13);
        store.add(DeltaOp::LikeAdd, 7, 13);
        assert_eq!(store.total_items(), 1);
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_opposing_add_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_at(&dir.path().join("test.recdelta"));
        store.add(DeltaOp::LikeAdd, 42, 13);
        store.add(DeltaOp::LikeAdd, 7, 13);
        store.add(DeltaOp::LikeRemove, 7, 13);
        assert_eq!(store.total_items(), 2);
        assert_eq!(store.get(7, 13), Some(DeltaOp::LikeRemove));
    }

    #[test]
    fn test_file_is_locked_while_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdelta");
        let store = open_at(&path);

        let mut probe = File::open(&path).unwrap();
        assert!(delta::is_locked(&mut probe).unwrap());
        store.close().unwrap();
        assert!(!delta::is_locked(&mut probe).unwrap());
    }

    #[test]
    fn test_open_rejects_locked_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdelta");
        open_at(&path); // dropped without close, stays locked

        let file = File::options().read(true).write(true).open(&path).unwrap();
        assert!(matches!(
            DeltaStore::open(file),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_open_or_recover_after_crash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdelta");
        {
            let mut store = open_at(&path);
            store.add(DeltaOp::LikeAdd, 7, 13);
            store.add(DeltaOp::DislikeAdd, 7, 14);
            store.flush().unwrap();
            // dropped without close: the file stays locked
        }

        let file = File::options().read(true).write(true).open(&path).unwrap();
        let store = DeltaStore::open_or_recover(file).unwrap();
        assert_eq!(store.total_items(), 2);
        assert_eq!(store.get(7, 13), Some(DeltaOp::LikeAdd));
        assert_eq!(store.get(7, 14), Some(DeltaOp::DislikeAdd));
    }

    #[test]
    fn test_last_write_wins_over_random_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_at(&dir.path().join("test.recdelta"));

        // Deterministic xorshift so the sequence is reproducible.
        let mut state: u64 = 0x9E3779B97F4A7C15;
        let mut rand = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        let ops = [
            DeltaOp::LikeAdd,
            DeltaOp::LikeRemove,
            DeltaOp::DislikeAdd,
            DeltaOp::DislikeRemove,
        ];

        let mut model: HashMap<(u64, u64), DeltaOp> = HashMap::new();
        for _ in 0..500 {
            let user = rand() % 5;
            let item = rand() % 10;
            let op = ops[(rand() % 4) as usize];
            store.add(op, user, item);
            model.insert((user, item), op);

            for (&(u, i), &expected) in &model {
                assert_eq!(store.get(u, i), Some(expected));
            }
        }
    }

    #[test]
    fn test_purge_user_drops_entries_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdelta");

        let mut store = open_at(&path);
        store.add(DeltaOp::LikeAdd, 7, 13);
        store.add(DeltaOp::LikeAdd, 7, 14);
        store.add(DeltaOp::LikeAdd, 5, 13);
        store.flush().unwrap();
        store.add(DeltaOp::DislikeAdd, 7, 15);
        store.purge_user(7).unwrap();

        assert_eq!(store.total_items(), 1);
        assert!(!store.has_user(7));
        assert_eq!(store.get(5, 13), Some(DeltaOp::LikeAdd));
        store.close().unwrap();

        let store = open_at(&path);
        assert_eq!(store.total_items(), 1);
        assert_eq!(store.get(7, 13), None);
        assert_eq!(store.get(5, 13), Some(DeltaOp::LikeAdd));
    }

    #[test]
    fn test_clear_truncates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.recdelta");

        let mut store = open_at(&path);
        for item in 0..20 {
            store.add(DeltaOp::LikeAdd, 1, item);
        }
        store.flush().unwrap();
        store.clear().unwrap();
        assert_eq!(store.total_items(), 0);
        store.close().unwrap();

        let size = std::fs::metadata(&path).unwrap().len();
        assert_eq!(size, (MAGIC.len() + HEADER_SIZE) as u64);
    }
}
