//! RecEngine Storage Layer
//!
//! The per-namespace storage-and-scheduler subsystem: three coupled on-disk
//! files, the crash-recovery protocol across them, and the single-writer
//! actor loop that batches incoming operations into sequential file work.
//!
//! ## Architecture Overview
//!
//! ```text
//! HTTP handlers
//!      │ async request/reply
//!      ▼
//! ┌──────────────────┐     one per namespace
//! │ NamespaceRegistry│────────────────┐
//! └──────────────────┘                ▼
//!        │ catalog            ┌───────────────┐
//!        ▼                    │ NamespaceActor│  bounded inbox + batching
//! ┌──────────────────┐        └───────┬───────┘
//! │ namespaces.json  │                │ single-writer worker thread
//! └──────────────────┘     ┌──────────┼──────────────┐
//!                          ▼          ▼              ▼
//!                    ┌──────────┐ ┌──────────┐ ┌───────────┐
//!                    │DeltaStore│ │IndexStore│ │ ProfileDb │
//!                    │ recdelta │ │  recidx  │ │   recdb   │
//!                    └──────────┘ └──────────┘ └───────────┘
//! ```
//!
//! For any `(user, item)` pair the logical state is: the last operation in
//! the delta log wins; if absent, the database payload wins. Mutations only
//! append to the delta log (flushed once per batch); compaction folds the
//! deltas into the database and truncates the log.
//!
//! Each file carries a `locked` byte set while an actor owns it and cleared
//! on clean close. A locked file at open time means a crash: the delta log
//! and the database recover themselves, the index is rebuilt from the
//! database.

pub mod actor;
pub mod config;
pub mod database;
pub mod delta;
pub mod error;
pub mod index;
pub mod registry;

pub use actor::{namespace_paths, NamespaceActor, Request};
pub use config::StorageConfig;
pub use database::{EntryIter, ProfileDb};
pub use delta::DeltaStore;
pub use error::{Error, Result};
pub use index::IndexStore;
pub use registry::NamespaceRegistry;
