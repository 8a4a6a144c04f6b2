use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::models::ScoredResult;

/// Hard ceiling for k regardless of configuration
pub const MAX_K: usize = 100;

/// Rank order: score, rating, votes (all descending), then item id ascending
///
/// `Less` means `a` ranks ahead of `b`. Missing rating/votes count as 0.
pub fn compare(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| {
            let ra = a.metadata.average_rating.unwrap_or(0.0);
            let rb = b.metadata.average_rating.unwrap_or(0.0);
            rb.total_cmp(&ra)
        })
        .then_with(|| {
            let va = a.metadata.num_votes.unwrap_or(0);
            let vb = b.metadata.num_votes.unwrap_or(0);
            vb.cmp(&va)
        })
        .then_with(|| a.item_id.cmp(&b.item_id))
}

#[derive(Debug, Clone, Copy)]
pub struct ResultRanker {
    max_k: usize,
}

impl Default for ResultRanker {
    fn default() -> Self {
        Self { max_k: MAX_K }
    }
}

impl ResultRanker {
    pub fn new(max_k: usize) -> Self {
        Self {
            max_k: max_k.clamp(1, MAX_K),
        }
    }

    /// Bring a requested k into `1..=max_k`
    pub fn clamp_k(&self, k: usize) -> usize {
        k.clamp(1, self.max_k)
    }

    /// Sort and keep the first k
    pub fn rank(&self, mut scored: Vec<ScoredResult>, k: usize) -> Vec<ScoredResult> {
        scored.sort_by(compare);
        scored.truncate(self.clamp_k(k));
        scored
    }

    /// Bounded accumulator for streaming input
    pub fn top_k(&self, k: usize) -> TopK {
        TopK::new(self.clamp_k(k))
    }
}

/// Heap entry ordered so the worst-ranked result sits on top
struct Entry(ScoredResult);

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        compare(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

/// Keeps the best k results seen so far in O(k) memory
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Entry>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    pub fn push(&mut self, result: ScoredResult) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(Entry(result));
            return;
        }
        let beats_worst = self
            .heap
            .peek()
            .map_or(true, |worst| compare(&result, &worst.0) == Ordering::Less);
        if beats_worst {
            self.heap.pop();
            self.heap.push(Entry(result));
        }
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = ScoredResult>) {
        for result in results {
            self.push(result);
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Best first
    pub fn into_sorted_vec(self) -> Vec<ScoredResult> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Entry(r)| r)
            .collect()
    }
}
