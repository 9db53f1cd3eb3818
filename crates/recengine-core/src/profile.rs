//! User Profiles
//!
//! A profile is a pair of ordered, duplicate-free sets of item ids: `likes`
//! and `dislikes`. The sets are kept disjoint (liking an item removes it
//! from the dislikes and vice versa) and sorted, so set intersections are a
//! linear merge.

use serde::{Deserialize, Serialize};

use crate::codec::delta::DeltaOp;

/// How a profile qualifies an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStanding {
    Liked,
    Disliked,
    Unknown,
}

/// All the items a user has liked or disliked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// User or compilation id.
    #[serde(rename = "user")]
    pub user_id: u64,

    /// Ids of the liked items, ascending, duplicate-free.
    pub likes: Vec<u64>,

    /// Ids of the disliked items, ascending, duplicate-free.
    pub dislikes: Vec<u64>,
}

impl Profile {
    /// Creates an empty profile for a user.
    pub fn new(user_id: u64) -> Self {
        Profile {
            user_id,
            likes: Vec::new(),
            dislikes: Vec::new(),
        }
    }

    /// Returns whether the profile likes, dislikes or doesn't know the item.
    pub fn standing(&self, item: u64) -> ItemStanding {
        if self.likes.binary_search(&item).is_ok() {
            ItemStanding::Liked
        } else if self.dislikes.binary_search(&item).is_ok() {
            ItemStanding::Disliked
        } else {
            ItemStanding::Unknown
        }
    }

    /// Adds the item to the liked set, removing it from the dislikes.
    pub fn like(&mut self, item: u64) {
        insert_sorted(&mut self.likes, item);
        remove_sorted(&mut self.dislikes, item);
    }

    /// Removes the item from the liked set.
    pub fn unlike(&mut self, item: u64) {
        remove_sorted(&mut self.likes, item);
    }

    /// Adds the item to the disliked set, removing it from the likes.
    pub fn dislike(&mut self, item: u64) {
        insert_sorted(&mut self.dislikes, item);
        remove_sorted(&mut self.likes, item);
    }

    /// Removes the item from the disliked set.
    pub fn undislike(&mut self, item: u64) {
        remove_sorted(&mut self.dislikes, item);
    }

    /// Removes the item from both sets.
    pub fn remove_item(&mut self, item: u64) {
        self.unlike(item);
        self.undislike(item);
    }

    /// Applies a pending delta operation to the profile.
    pub fn apply(&mut self, op: DeltaOp, item: u64) {
        match op {
            DeltaOp::LikeAdd => self.like(item),
            DeltaOp::LikeRemove => self.unlike(item),
            DeltaOp::DislikeAdd => self.dislike(item),
            DeltaOp::DislikeRemove => self.undislike(item),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.likes.is_empty() && self.dislikes.is_empty()
    }

    /// Computes the similarity of two profiles as a value in `[0, 100]`.
    ///
    /// The score is the weighted sum of the Jaccard similarities of the like
    /// sets and the dislike sets, each weighted by its union size;
    /// `dislike_factor` in `[0, 1]` scales how much the dislikes contribute.
    /// Two profiles with no overlapping universe score 0.
    pub fn similarity(&self, other: &Profile, dislike_factor: f32) -> f32 {
        let (likes_sim, likes_weight) = set_similarity(&self.likes, &other.likes);
        let (dislikes_sim, dislikes_weight) = set_similarity(&self.dislikes, &other.dislikes);
        let dislikes_weight = (dislikes_weight as f32 * dislike_factor) as i64;

        let total_weight = likes_weight as f32 + dislikes_weight as f32;
        if total_weight == 0.0 {
            return 0.0;
        }
        100.0 * (likes_sim * likes_weight as f32 + dislikes_sim * dislikes_weight as f32)
            / total_weight
    }
}

/// Jaccard similarity of two sorted sets, `|A ∩ B| / |A ∪ B|`, plus the union
/// size (used as the weight). Both sets are sorted, so one linear merge
/// suffices.
fn set_similarity(a: &[u64], b: &[u64]) -> (f32, i64) {
    let mut intersection = 0usize;
    let (mut i, mut j) = (0usize, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                intersection += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return (0.0, 0);
    }
    (intersection as f32 / union as f32, union as i64)
}

fn insert_sorted(items: &mut Vec<u64>, item: u64) {
    if let Err(pos) = items.binary_search(&item) {
        items.insert(pos, item);
    }
}

fn remove_sorted(items: &mut Vec<u64>, item: u64) {
    if let Ok(pos) = items.binary_search(&item) {
        items.remove(pos);
    }
}
