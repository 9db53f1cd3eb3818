//! RecEngine Core
//!
//! Core types for the RecEngine recommendation store: the binary codecs for
//! the three per-namespace files, the `Profile` entity, and the similarity /
//! recommendation math.
//!
//! ## The Three Files
//!
//! Each namespace persists through three coupled files:
//!
//! - **`recdb`**: the main database, a slotted file of profile entries with
//!   reserved per-slot capacity, so most mutations rewrite in place
//! - **`recidx`**: a `user_id → slot offset` index backing O(1) lookups
//! - **`recdelta`**: an append-only change log layered over the database;
//!   the authoritative source of unflushed writes
//!
//! The codecs in [`codec`] define the byte-level formats, checksums and the
//! `locked`-byte crash-detection protocol. The stores that own the files live
//! in `recengine-storage`; this crate stays free of file handles so every
//! format rule is testable against in-memory cursors.

pub mod codec;
pub mod error;
pub mod profile;
pub mod similarity;

pub use codec::delta::DeltaOp;
pub use codec::recdb::{DbEntry, EntryKind, EntryPayload};
pub use error::{Error, Result};
pub use profile::{ItemStanding, Profile};
pub use similarity::{recommend_items, Neighbor, RecItem, SimilarProfile, TopNeighbors};
