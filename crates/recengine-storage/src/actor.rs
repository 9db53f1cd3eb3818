//! Namespace Actor
//!
//! One actor per namespace owns that namespace's three files and serializes
//! every request into sequential file work.
//!
//! ## Shape
//!
//! ```text
//! request tasks ──► bounded mpsc inbox ──► worker thread (spawn_blocking)
//!      ▲                                        │
//!      └──────── oneshot reply per request ◄────┘
//! ```
//!
//! The handle ([`NamespaceActor`]) is cheap to clone and async; the worker
//! does synchronous `std::fs` I/O on a blocking thread, so no file is ever
//! touched by two threads. On receiving the first request the worker waits a
//! short batching window for more to accumulate, drains the inbox, processes
//! the batch in inbox order, then flushes the delta log once, amortizing
//! header rewrites across co-arriving operations.
//!
//! ## Initialization and shutdown
//!
//! Opening runs recovery as needed: delta (auto-recover), index (reset if
//! corrupted), database (auto-recover). If the index was reset or the
//! database rebuilt, the index is re-derived by iterating the database.
//! On `stop` (or a closed inbox) every still-queued request gets a
//! [`Error::Stopped`] reply, the stores flush, the locked bytes clear, and
//! the worker logs its exit. A worker that dequeued a request always replies
//! exactly once.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use recengine_core::codec::recdb::{self, DbEntry, EntryKind, EntryPayload};
use recengine_core::similarity::{recommend_items, Neighbor, RecItem, SimilarProfile, TopNeighbors};
use recengine_core::{DeltaOp, ItemStanding, Profile};
use recengine_metadata::{NamespaceDescriptor, NamespaceUpdate};

use crate::config::StorageConfig;
use crate::database::ProfileDb;
use crate::delta::DeltaStore;
use crate::error::{Error, Result};
use crate::index::IndexStore;

type Reply<T> = oneshot::Sender<Result<T>>;

/// A request posted into a namespace actor's inbox.
pub enum Request {
    DeleteProfile { user: u64, reply: Reply<()> },
    GetProfile { user: u64, reply: Reply<Option<Profile>> },
    Like { user: u64, item: u64, reply: Reply<()> },
    Dislike { user: u64, item: u64, reply: Reply<()> },
    DeleteItem { user: u64, item: u64, reply: Reply<()> },
    GetSimilarProfiles { user: u64, reply: Reply<Vec<SimilarProfile>> },
    RecommendItems { user: u64, limit: Option<usize>, reply: Reply<Vec<RecItem>> },
    Update { update: NamespaceUpdate, reply: Reply<()> },
    Stop { reply: Reply<()> },
}

/// The three file paths a namespace owns.
pub fn namespace_paths(data_dir: &Path, name: &str) -> (PathBuf, PathBuf, PathBuf) {
    (
        data_dir.join(format!("{name}.recdb")),
        data_dir.join(format!("{name}.recidx")),
        data_dir.join(format!("{name}.recdelta")),
    )
}

/// Async handle to a running namespace worker.
pub struct NamespaceActor {
    inbox: mpsc::Sender<Request>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NamespaceActor {
    /// Opens the namespace's files (recovering as needed) and starts its
    /// worker thread. Fails if recovery fails; the namespace is then
    /// unusable, but the process keeps serving other namespaces.
    pub async fn spawn(
        descriptor: &NamespaceDescriptor,
        data_dir: &Path,
        config: StorageConfig,
    ) -> Result<Self> {
        let (inbox, rx) = mpsc::channel(config.inbox_capacity);
        let (ready_tx, ready_rx) = oneshot::channel();

        let name = descriptor.name.clone();
        let max_similar_profiles = descriptor.max_similar_profiles;
        let dislike_factor = descriptor.dislike_factor;
        let data_dir = data_dir.to_path_buf();

        let worker = tokio::task::spawn_blocking(move || {
            let worker = match Worker::open(
                name,
                max_similar_profiles,
                dislike_factor,
                data_dir,
                config,
            ) {
                Ok(worker) => worker,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            worker.run(rx);
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(NamespaceActor {
                inbox,
                worker: Mutex::new(Some(worker)),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Stopped),
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(build(reply))
            .await
            .map_err(|_| Error::Stopped)?;
        rx.await.map_err(|_| Error::Stopped)?
    }

    pub async fn like(&self, user: u64, item: u64) -> Result<()> {
        self.request(|reply| Request::Like { user, item, reply }).await
    }

    pub async fn dislike(&self, user: u64, item: u64) -> Result<()> {
        self.request(|reply| Request::Dislike { user, item, reply }).await
    }

    pub async fn delete_item(&self, user: u64, item: u64) -> Result<()> {
        self.request(|reply| Request::DeleteItem { user, item, reply }).await
    }

    pub async fn get_profile(&self, user: u64) -> Result<Option<Profile>> {
        self.request(|reply| Request::GetProfile { user, reply }).await
    }

    pub async fn delete_profile(&self, user: u64) -> Result<()> {
        self.request(|reply| Request::DeleteProfile { user, reply }).await
    }

    pub async fn similar_profiles(&self, user: u64) -> Result<Vec<SimilarProfile>> {
        self.request(|reply| Request::GetSimilarProfiles { user, reply }).await
    }

    pub async fn recommend(&self, user: u64, limit: Option<usize>) -> Result<Vec<RecItem>> {
        self.request(|reply| Request::RecommendItems { user, limit, reply }).await
    }

    /// Forwards property changes to the worker, which renames the files on
    /// disk when the name changed.
    pub async fn update(&self, update: NamespaceUpdate) -> Result<()> {
        self.request(|reply| Request::Update { update, reply }).await
    }

    /// Stops the worker: the current batch finishes, queued requests fail
    /// with [`Error::Stopped`], the files flush, unlock and close.
    pub async fn stop(&self) -> Result<()> {
        match self.request(|reply| Request::Stop { reply }).await {
            // An already-stopped worker is not an error.
            Ok(()) | Err(Error::Stopped) => {}
            Err(e) => return Err(e),
        }
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

/// The single-writer worker owning one namespace's stores.
struct Worker {
    name: String,
    data_dir: PathBuf,
    max_similar_profiles: u32,
    dislike_factor: f32,
    config: StorageConfig,
    delta: DeltaStore,
    index: IndexStore,
    db: ProfileDb,
}

fn open_rw(path: &Path) -> Result<File> {
    Ok(File::options()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?)
}

impl Worker {
    fn open(
        name: String,
        max_similar_profiles: u32,
        dislike_factor: f32,
        data_dir: PathBuf,
        config: StorageConfig,
    ) -> Result<Self> {
        let (db_path, index_path, delta_path) = namespace_paths(&data_dir, &name);

        let delta = DeltaStore::open_or_recover(open_rw(&delta_path)?)?;
        let (mut index, index_reset) = IndexStore::open_or_reset(open_rw(&index_path)?)?;
        let (mut db, db_recovered) =
            ProfileDb::open_or_recover(open_rw(&db_path)?, EntryKind::Like)?;

        // A rebuilt database invalidates every stored offset.
        if db_recovered {
            index.clear();
        }
        if index_reset || db_recovered {
            rebuild_index(&mut db, &mut index)?;
        }

        tracing::info!(namespace = %name, profiles = index.len(), "namespace started");

        Ok(Worker {
            name,
            data_dir,
            max_similar_profiles,
            dislike_factor,
            config,
            delta,
            index,
            db,
        })
    }

    /// The actor loop: batch, process, flush, compact.
    fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        while let Some(first) = rx.blocking_recv() {
            // Let co-arriving requests pile up so one flush covers them all.
            std::thread::sleep(self.config.batch_window);
            let mut batch = vec![first];
            while let Ok(request) = rx.try_recv() {
                batch.push(request);
            }

            let mut stopping = false;
            let mut requests = batch.into_iter();
            for request in requests.by_ref() {
                if let Request::Stop { reply } = request {
                    let _ = reply.send(Ok(()));
                    stopping = true;
                    break;
                }
                self.handle(request);
            }

            if let Err(e) = self.delta.flush() {
                tracing::error!(namespace = %self.name, error = %e, "delta flush failed");
            }

            if stopping {
                for request in requests {
                    fail_stopped(request);
                }
                rx.close();
                while let Ok(request) = rx.try_recv() {
                    fail_stopped(request);
                }
                break;
            }

            if let Err(e) = self.maybe_compact() {
                tracing::error!(namespace = %self.name, error = %e, "compaction failed");
            }
        }
        self.shutdown();
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Like { user, item, reply } => {
                self.delta.add(DeltaOp::LikeAdd, user, item);
                let _ = reply.send(Ok(()));
            }
            Request::Dislike { user, item, reply } => {
                self.delta.add(DeltaOp::DislikeAdd, user, item);
                let _ = reply.send(Ok(()));
            }
            Request::DeleteItem { user, item, reply } => {
                let _ = reply.send(self.delete_item(user, item));
            }
            Request::GetProfile { user, reply } => {
                let _ = reply.send(self.load_profile(user));
            }
            Request::DeleteProfile { user, reply } => {
                let _ = reply.send(self.delete_profile(user));
            }
            Request::GetSimilarProfiles { user, reply } => {
                let _ = reply.send(self.similar_profiles(user));
            }
            Request::RecommendItems { user, limit, reply } => {
                let _ = reply.send(self.recommend(user, limit));
            }
            Request::Update { update, reply } => {
                let _ = reply.send(self.apply_update(update));
            }
            Request::Stop { reply } => {
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn shutdown(self) {
        if let Err(e) = self.delta.close() {
            tracing::error!(namespace = %self.name, error = %e, "failed to close delta store");
        }
        if let Err(e) = self.index.close() {
            tracing::error!(namespace = %self.name, error = %e, "failed to close index store");
        }
        if let Err(e) = self.db.close() {
            tracing::error!(namespace = %self.name, error = %e, "failed to close database");
        }
        tracing::info!(namespace = %self.name, "namespace stopped");
    }

    /// Reconstructs the effective profile: the database payload overlaid
    /// with every pending delta. `None` if the user has neither.
    fn load_profile(&mut self, user: u64) -> Result<Option<Profile>> {
        let base = match self.index.get(user) {
            Some(offset) => {
                let entry = self.db.read_at(offset)?;
                if entry.deleted {
                    None
                } else {
                    let EntryPayload::LikeProfile(profile) = entry.payload;
                    Some(profile)
                }
            }
            None => None,
        };

        if base.is_none() && !self.delta.has_user(user) {
            return Ok(None);
        }

        let mut profile = base.unwrap_or_else(|| Profile::new(user));
        for (item, op) in self.delta.deltas_for(user) {
            profile.apply(op, item);
        }
        Ok(Some(profile))
    }

    /// Appends the opposite of whichever side currently holds the item; a
    /// successful no-op when the item is unknown.
    fn delete_item(&mut self, user: u64, item: u64) -> Result<()> {
        let Some(profile) = self.load_profile(user)? else {
            return Ok(());
        };
        match profile.standing(item) {
            ItemStanding::Liked => self.delta.add(DeltaOp::LikeRemove, user, item),
            ItemStanding::Disliked => self.delta.add(DeltaOp::DislikeRemove, user, item),
            ItemStanding::Unknown => {}
        }
        Ok(())
    }

    /// Tombstones the database slot, drops the index entry and purges the
    /// user's deltas. A missing profile is not an error.
    fn delete_profile(&mut self, user: u64) -> Result<()> {
        if let Some(offset) = self.index.get(user) {
            self.db.tombstone_at(offset)?;
            self.index.remove(user);
        }
        self.delta.purge_user(user)?;
        Ok(())
    }

    fn similar_profiles(&mut self, user: u64) -> Result<Vec<SimilarProfile>> {
        let Some(target) = self.load_profile(user)? else {
            return Ok(Vec::new());
        };
        let neighbors = self.rank_neighbors(&target)?;
        Ok(neighbors.iter().map(SimilarProfile::from).collect())
    }

    fn recommend(&mut self, user: u64, limit: Option<usize>) -> Result<Vec<RecItem>> {
        let Some(target) = self.load_profile(user)? else {
            return Ok(Vec::new());
        };
        let neighbors = self.rank_neighbors(&target)?;
        let limit = limit.unwrap_or(self.max_similar_profiles as usize);
        Ok(recommend_items(
            &target,
            &neighbors,
            self.dislike_factor,
            limit,
        ))
    }

    /// Scans every live profile (database slots overlaid with deltas, plus
    /// users living only in the delta log) through a bounded neighbor heap.
    fn rank_neighbors(&mut self, target: &Profile) -> Result<Vec<Neighbor>> {
        let dislike_factor = self.dislike_factor;
        let mut top = TopNeighbors::new(self.max_similar_profiles as usize);

        let delta = &self.delta;
        let mut iter = self.db.iter()?;
        while iter.has_next() {
            let entry = iter.next_entry()?;
            if entry.deleted {
                continue;
            }
            let EntryPayload::LikeProfile(mut profile) = entry.payload;
            if profile.user_id == target.user_id {
                continue;
            }
            for (item, op) in delta.deltas_for(profile.user_id) {
                profile.apply(op, item);
            }
            let similarity = target.similarity(&profile, dislike_factor);
            top.push(Neighbor {
                profile,
                similarity,
            });
        }
        drop(iter);

        // Users that only exist in the delta log so far.
        let delta_only: Vec<u64> = self
            .delta
            .users()
            .filter(|u| *u != target.user_id && self.index.get(*u).is_none())
            .collect();
        for user in delta_only {
            let mut profile = Profile::new(user);
            for (item, op) in self.delta.deltas_for(user) {
                profile.apply(op, item);
            }
            if profile.is_empty() {
                continue;
            }
            let similarity = target.similarity(&profile, dislike_factor);
            top.push(Neighbor {
                profile,
                similarity,
            });
        }

        Ok(top.into_sorted())
    }

    fn apply_update(&mut self, update: NamespaceUpdate) -> Result<()> {
        if update.name != self.name {
            let (old_db, old_index, old_delta) = namespace_paths(&self.data_dir, &self.name);
            let (new_db, new_index, new_delta) = namespace_paths(&self.data_dir, &update.name);
            std::fs::rename(old_db, new_db)?;
            std::fs::rename(old_index, new_index)?;
            std::fs::rename(old_delta, new_delta)?;
            tracing::info!(namespace = %self.name, renamed_to = %update.name, "namespace renamed");
            self.name = update.name;
        }
        self.max_similar_profiles = update.max_similar_profiles;
        self.dislike_factor = update.dislike_factor;
        Ok(())
    }

    fn maybe_compact(&mut self) -> Result<()> {
        if self.delta.total_items() == 0 {
            return Ok(());
        }
        let db_size = self.db.file_size()? as f64;
        if (self.delta.file_size() as f64) <= self.config.compact_ratio * db_size {
            return Ok(());
        }
        self.compact()
    }

    /// Evacuates the delta log into the database: every slot gets its
    /// pending deltas applied (in place when they fit, tombstone-and-append
    /// when they don't), delta-only users get fresh slots, then the delta
    /// log truncates to empty. Vacuums when tombstones pile up.
    fn compact(&mut self) -> Result<()> {
        let mut appended: Vec<Profile> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();
        let mut tombstones: u32 = 0;
        {
            let delta = &self.delta;
            let mut iter = self.db.iter()?;
            while iter.has_next() {
                let entry = iter.next_entry()?;
                let capacity = entry.capacity;
                if entry.deleted {
                    tombstones += 1;
                    continue;
                }
                let EntryPayload::LikeProfile(profile) = entry.payload;
                seen.insert(profile.user_id);
                if !delta.has_user(profile.user_id) {
                    continue;
                }

                let mut updated = profile.clone();
                for (item, op) in delta.deltas_for(profile.user_id) {
                    updated.apply(op, item);
                }
                let payload = EntryPayload::LikeProfile(updated);
                if recdb::predict_entry_size(&payload) <= capacity as usize {
                    iter.set_previous(&DbEntry {
                        capacity,
                        deleted: false,
                        payload,
                    })?;
                } else {
                    // Outgrew the slot: tombstone it (old payload still
                    // fits) and append the grown profile afterwards.
                    iter.set_previous(&DbEntry {
                        capacity,
                        deleted: true,
                        payload: EntryPayload::LikeProfile(profile),
                    })?;
                    tombstones += 1;
                    let EntryPayload::LikeProfile(updated) = payload;
                    appended.push(updated);
                }
            }
        }

        for profile in appended {
            let user = profile.user_id;
            let offset = self.db.append(EntryPayload::LikeProfile(profile))?;
            self.index.put(user, offset);
        }

        // Users with deltas but no slot yet.
        let delta_only: Vec<u64> = self
            .delta
            .users()
            .filter(|user| !seen.contains(user))
            .collect();
        for user in delta_only {
            let mut profile = Profile::new(user);
            for (item, op) in self.delta.deltas_for(user) {
                profile.apply(op, item);
            }
            if profile.is_empty() {
                continue;
            }
            let offset = self.db.append(EntryPayload::LikeProfile(profile))?;
            self.index.put(user, offset);
        }

        self.delta.clear()?;

        let total = self.db.num_entries();
        if total > 0 && tombstones as f64 / total as f64 > self.config.vacuum_ratio {
            let mapping = self.db.vacuum()?;
            self.index.clear();
            for (user, offset) in mapping {
                self.index.put(user, offset);
            }
        }

        tracing::debug!(namespace = %self.name, slots = self.db.num_entries(), "compaction complete");
        Ok(())
    }
}

fn rebuild_index(db: &mut ProfileDb, index: &mut IndexStore) -> Result<()> {
    let mut iter = db.iter()?;
    while iter.has_next() {
        let entry = iter.next_entry()?;
        if entry.deleted {
            continue;
        }
        let EntryPayload::LikeProfile(profile) = entry.payload;
        let offset = iter.previous_offset().expect("entry was just read");
        index.put(profile.user_id, offset);
    }
    Ok(())
}

fn fail_stopped(request: Request) {
    match request {
        Request::DeleteProfile { reply, .. } => drop(reply.send(Err(Error::Stopped))),
        Request::GetProfile { reply, .. } => drop(reply.send(Err(Error::Stopped))),
        Request::Like { reply, .. } => drop(reply.send(Err(Error::Stopped))),
        Request::Dislike { reply, .. } => drop(reply.send(Err(Error::Stopped))),
        Request::DeleteItem { reply, .. } => drop(reply.send(Err(Error::Stopped))),
        Request::GetSimilarProfiles { reply, .. } => drop(reply.send(Err(Error::Stopped))),
        Request::RecommendItems { reply, .. } => drop(reply.send(Err(Error::Stopped))),
        Request::Update { reply, .. } => drop(reply.send(Err(Error::Stopped))),
        Request::Stop { reply } => drop(reply.send(Ok(()))),
    }
}
