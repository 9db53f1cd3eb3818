//! Index Store
//!
//! A persistent `user_id → database offset` map. At runtime the mapping
//! lives entirely in memory; the file is read once at open and dumped once
//! at close. A crash therefore loses unflushed additions, which is fine
//! because the authoritative rebuild source is the database file itself: a
//! locked index is truncated and the actor re-derives it by iterating the
//! database.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};

use recengine_core::codec::index::{
    self, IndexEntry, IndexHeader, ENTRIES_OFFSET, MAGIC, VERSION,
};

use crate::error::{Error, Result};

/// A file-backed `id → offset` mapping.
pub struct IndexStore {
    file: File,
    indices: HashMap<u64, u64>,
}

impl IndexStore {
    /// Opens an index file, creating it if empty. A locked file is rejected
    /// as corrupted. The file is locked until [`IndexStore::close`].
    pub fn open(mut file: File) -> Result<Self> {
        let size = file.seek(SeekFrom::End(0))?;
        let mut indices = HashMap::new();

        if size == 0 {
            file.seek(SeekFrom::Start(0))?;
            index::write_magic(&mut file)?;
            index::write_header(
                &mut file,
                &IndexHeader {
                    version: VERSION,
                    locked: true,
                    num_entries: 0,
                },
            )?;
        } else {
            file.seek(SeekFrom::Start(0))?;
            let mut reader = BufReader::new(&mut file);
            index::read_magic(&mut reader)?;
            let header = index::read_header(&mut reader)?;
            if header.version != VERSION {
                return Err(recengine_core::Error::UnsupportedVersion(header.version).into());
            }
            if header.locked {
                return Err(Error::Corrupted("index file is locked".into()));
            }
            for _ in 0..header.num_entries {
                let entry = index::read_entry(&mut reader)?;
                indices.insert(entry.user_id, entry.offset);
            }
            index::write_locked(&mut file, true)?;
        }

        Ok(IndexStore { file, indices })
    }

    /// Opens an index file; a file left locked by a crash (or too mangled to
    /// even check) is truncated and re-created empty. Returns the store and
    /// whether it was reset; the caller rebuilds from the database then.
    pub fn open_or_reset(mut file: File) -> Result<(Self, bool)> {
        let size = file.seek(SeekFrom::End(0))?;
        let mut reset = false;
        if size > 0 {
            let locked = index::is_locked(&mut file).unwrap_or(true);
            if locked {
                tracing::warn!("index file corrupted (locked), resetting for rebuild");
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
                reset = true;
            }
        }
        Ok((Self::open(file)?, reset))
    }

    pub fn get(&self, user: u64) -> Option<u64> {
        self.indices.get(&user).copied()
    }

    pub fn put(&mut self, user: u64, offset: u64) {
        self.indices.insert(user, offset);
    }

    pub fn remove(&mut self, user: u64) {
        self.indices.remove(&user);
    }

    /// Drops every mapping (used before a rebuild).
    pub fn clear(&mut self) {
        self.indices.clear();
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dumps the map into the entries region, rewrites the header with the
    /// current count and a cleared locked byte, and releases the file.
    pub fn close(mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        index::write_header(
            &mut self.file,
            &IndexHeader {
                version: VERSION,
                locked: false,
                num_entries: self.indices.len() as u32,
            },
        )?;

        self.file.seek(SeekFrom::Start(ENTRIES_OFFSET))?;
        let mut writer = BufWriter::new(&mut self.file);
        for (&user_id, &offset) in &self.indices {
            index::write_entry(&mut writer, &IndexEntry { user_id, offset })?;
        }
        writer.flush()?;
        drop(writer);

        // Shed stale bytes from a previously larger map.
        let end = ENTRIES_OFFSET + (self.indices.len() * index::ENTRY_SIZE) as u64;
        self.file.set_len(end)?;
        self.file.sync_all()?;
        Ok(())
    }
}
