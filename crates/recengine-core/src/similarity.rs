//! Neighbor Search and Item Recommendation
//!
//! Collaborative filtering over profiles:
//!
//! 1. **Neighbor search**: scan all live profiles, keep the
//!    `max_similar_profiles` most similar ones in a bounded min-heap
//!    ([`TopNeighbors`]). Ties are broken by ascending user id.
//! 2. **Recommendation**: each neighbor votes for its items, weighted by its
//!    similarity: `+similarity` per liked item, `−dislike_factor × similarity`
//!    per disliked item. Items the target already knows are excluded; the
//!    top-K by score are returned.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use serde::Serialize;

use crate::profile::{ItemStanding, Profile};

/// A profile ranked against a target, with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub profile: Profile,
    pub similarity: f32,
}

/// A neighbor reduced to what the similar-profiles query reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarProfile {
    #[serde(rename = "user")]
    pub user_id: u64,
    pub similarity: f32,
}

impl From<&Neighbor> for SimilarProfile {
    fn from(n: &Neighbor) -> Self {
        SimilarProfile {
            user_id: n.profile.user_id,
            similarity: n.similarity,
        }
    }
}

/// A recommended item with its accumulated score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecItem {
    #[serde(rename = "item")]
    pub item_id: u64,
    pub score: f32,
}

/// Ranking wrapper: greater = more similar, ties prefer the smaller user id.
struct Ranked(Neighbor);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .similarity
            .total_cmp(&other.0.similarity)
            .then_with(|| other.0.profile.user_id.cmp(&self.0.profile.user_id))
    }
}

/// A bounded collection of the most similar profiles seen so far.
///
/// Backed by a min-heap of at most `limit` entries: once full, a new
/// candidate evicts the currently worst neighbor if it ranks higher.
/// Candidates with similarity ≤ 0 are never admitted.
pub struct TopNeighbors {
    limit: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl TopNeighbors {
    pub fn new(limit: usize) -> Self {
        TopNeighbors {
            limit,
            heap: BinaryHeap::with_capacity(limit.min(1024)),
        }
    }

    pub fn push(&mut self, neighbor: Neighbor) {
        if self.limit == 0 || neighbor.similarity <= 0.0 {
            return;
        }
        if self.heap.len() < self.limit {
            self.heap.push(Reverse(Ranked(neighbor)));
            return;
        }
        let candidate = Ranked(neighbor);
        if let Some(Reverse(worst)) = self.heap.peek() {
            if candidate > *worst {
                self.heap.pop();
                self.heap.push(Reverse(candidate));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drains into a vector sorted by descending similarity, ties by
    /// ascending user id.
    pub fn into_sorted(self) -> Vec<Neighbor> {
        let mut neighbors: Vec<Neighbor> =
            self.heap.into_iter().map(|Reverse(r)| r.0).collect();
        neighbors.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.profile.user_id.cmp(&b.profile.user_id))
        });
        neighbors
    }
}

/// Accumulates item scores over the neighbors and returns the `limit` best
/// items the target doesn't already know. Ties are broken by ascending item
/// id so the ranking is deterministic.
pub fn recommend_items(
    target: &Profile,
    neighbors: &[Neighbor],
    dislike_factor: f32,
    limit: usize,
) -> Vec<RecItem> {
    let mut scores: HashMap<u64, f32> = HashMap::new();
    for neighbor in neighbors {
        if neighbor.similarity <= 0.0 {
            continue;
        }
        for &item in &neighbor.profile.likes {
            if target.standing(item) == ItemStanding::Unknown {
                *scores.entry(item).or_insert(0.0) += neighbor.similarity;
            }
        }
        for &item in &neighbor.profile.dislikes {
            if target.standing(item) == ItemStanding::Unknown {
                *scores.entry(item).or_insert(0.0) -= dislike_factor * neighbor.similarity;
            }
        }
    }

    let mut items: Vec<RecItem> = scores
        .into_iter()
        .map(|(item_id, score)| RecItem { item_id, score })
        .collect();
    items.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor(user_id: u64, likes: Vec<u64>, dislikes: Vec<u64>, similarity: f32) -> Neighbor {
        Neighbor {
            profile: Profile {
                user_id,
                likes,
                dislikes,
            },
            similarity,
        }
    }

    #[test]
    fn test_top_neighbors_keeps_the_best() {
        let mut top = TopNeighbors::new(2);
        top.push(neighbor(1, vec![], vec![], 10.0));
        top.push(neighbor(2, vec![], vec![], 30.0));
        top.push(neighbor(3, vec![], vec![], 20.0));

        let sorted = top.into_sorted();
        let users: Vec<u64> = sorted.iter().map(|n| n.profile.user_id).collect();
        assert_eq!(users, vec![2, 3]);
    }

    #[test]
    fn test_top_neighbors_ties_prefer_smaller_user_id() {
        let mut top = TopNeighbors::new(2);
        top.push(neighbor(9, vec![], vec![], 50.0));
        top.push(neighbor(3, vec![], vec![], 50.0));
        top.push(neighbor(6, vec![], vec![], 50.0));

        let users: Vec<u64> = top
            .into_sorted()
            .iter()
            .map(|n| n.profile.user_id)
            .collect();
        assert_eq!(users, vec![3, 6]);
    }

    #[test]
    fn test_top_neighbors_rejects_zero_similarity() {
        let mut top = TopNeighbors::new(10);
        top.push(neighbor(1, vec![], vec![], 0.0));
        top.push(neighbor(2, vec![], vec![], -5.0));
        assert!(top.is_empty());
    }

    #[test]
    fn test_top_neighbors_sorted_descending() {
        let mut top = TopNeighbors::new(10);
        for (user, sim) in [(1, 5.0), (2, 80.0), (3, 42.0), (4, 13.0)] {
            top.push(neighbor(user, vec![], vec![], sim));
        }
        let sims: Vec<f32> = top.into_sorted().iter().map(|n| n.similarity).collect();
        assert_eq!(sims, vec![80.0, 42.0, 13.0, 5.0]);
    }

    #[test]
    fn test_recommend_excludes_known_items() {
        let target = Profile {
            user_id: 1,
            likes: vec![10],
            dislikes: vec![20],
        };
        let neighbors = [neighbor(2, vec![10, 30], vec![20, 40], 50.0)];
        let recs = recommend_items(&target, &neighbors, 1.0, 10);
        let items: Vec<u64> = recs.iter().map(|r| r.item_id).collect();
        assert!(!items.contains(&10));
        assert!(!items.contains(&20));
        assert!(items.contains(&30));
        assert!(items.contains(&40));
    }

    #[test]
    fn test_recommend_weights_by_similarity_and_dislike_factor() {
        let target = Profile::new(1);
        let neighbors = [
            neighbor(2, vec![100], vec![200], 60.0),
            neighbor(3, vec![100, 200], vec![], 40.0),
        ];
        let recs = recommend_items(&target, &neighbors, 0.5, 10);
        // item 100: 60 + 40 = 100; item 200: -0.5*60 + 40 = 10.
        assert_eq!(recs[0].item_id, 100);
        assert!((recs[0].score - 100.0).abs() < 0.001);
        assert_eq!(recs[1].item_id, 200);
        assert!((recs[1].score - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_recommend_truncates_to_limit() {
        let target = Profile::new(1);
        let neighbors = [neighbor(2, vec![1, 2, 3, 4, 5], vec![], 10.0)];
        let recs = recommend_items(&target, &neighbors, 1.0, 2);
        assert_eq!(recs.len(), 2);
        // Equal scores fall back to ascending item id.
        assert_eq!(recs[0].item_id, 1);
        assert_eq!(recs[1].item_id, 2);
    }
}
