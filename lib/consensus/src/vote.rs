//! Threshold voting for list-of-string fields
//!
//! Every element from every candidate goes into one pool. Near-duplicates
//! (token Jaccard at or above the dedup cutoff) merge into classes, and a
//! class survives when enough *distinct* candidates mention it. Counting
//! candidates rather than occurrences keeps one verbose sample from
//! outvoting the rest.

use crate::cluster::DisjointSet;
use ahash::AHashMap;
use concord_similarity::distance::jaccard_tokens;
use serde::Serialize;

/// An equivalence class of list elements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VotedClass {
    /// Most frequent exact spelling in the class (first-seen on ties)
    pub label: String,
    /// Number of distinct candidates contributing at least one member
    pub support: usize,
    /// Pool position of the class's first element
    pub first_seen: usize,
    /// Every distinct spelling in the class, in first-seen order
    pub variants: Vec<String>,
    /// Candidates contributing to the class, ascending
    pub candidates: Vec<usize>,
}

/// Pool, deduplicate and vote.
///
/// `lists[c]` holds candidate `c`'s elements. Returns the classes supported by
/// at least `threshold` distinct candidates, by descending support with ties
/// in first-seen order.
pub fn vote_lists<S: AsRef<str>>(lists: &[Vec<S>], threshold: usize, dedup_cutoff: f32) -> Vec<VotedClass> {
    // Exact spellings first; fuzzy merging then runs over distinct strings only
    let mut index_of: AHashMap<&str, usize> = AHashMap::new();
    let mut spellings: Vec<&str> = Vec::new();
    let mut first_pos: Vec<usize> = Vec::new();
    let mut frequency: Vec<usize> = Vec::new();
    let mut sources: Vec<Vec<usize>> = Vec::new();

    let mut position = 0usize;
    for (candidate, list) in lists.iter().enumerate() {
        for item in list {
            let text = item.as_ref();
            let idx = *index_of.entry(text).or_insert_with(|| {
                spellings.push(text);
                first_pos.push(position);
                frequency.push(0);
                sources.push(Vec::new());
                spellings.len() - 1
            });
            frequency[idx] += 1;
            if sources[idx].last() != Some(&candidate) {
                sources[idx].push(candidate);
            }
            position += 1;
        }
    }

    let mut sets = DisjointSet::new(spellings.len());
    for i in 0..spellings.len() {
        for j in (i + 1)..spellings.len() {
            if jaccard_tokens(spellings[i], spellings[j]) >= dedup_cutoff {
                sets.union(i, j);
            }
        }
    }

    let mut classes: Vec<VotedClass> = sets
        .groups()
        .into_iter()
        .map(|members| {
            // members ascend in first-seen order, so strict > keeps the earliest on ties
            let mut label_idx = members[0];
            for &m in &members[1..] {
                if frequency[m] > frequency[label_idx] {
                    label_idx = m;
                }
            }

            let mut candidates: Vec<usize> = members
                .iter()
                .flat_map(|&m| sources[m].iter().copied())
                .collect();
            candidates.sort_unstable();
            candidates.dedup();

            VotedClass {
                label: spellings[label_idx].to_string(),
                support: candidates.len(),
                first_seen: first_pos[members[0]],
                variants: members.iter().map(|&m| spellings[m].to_string()).collect(),
                candidates,
            }
        })
        .filter(|class| class.support >= threshold)
        .collect();

    // Groups come out in first-seen order; a stable sort keeps that for ties
    classes.sort_by(|a, b| b.support.cmp(&a.support));
    classes
}
