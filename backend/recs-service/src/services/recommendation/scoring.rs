// ============================================
// Scoring Engine
// ============================================
//
// Pulls the filtered candidate pool page by page (keyset on item id) and
// scores each page against the preference vector. Memory is bounded by the
// page size; the caller decides what to keep.

use tracing::debug;

use super::codec::FeatureVectorCodec;
use super::filters::CandidateFilter;
use crate::db::StoreSession;
use crate::error::Result;
use crate::models::{FeatureVector, ItemId, ScoredResult};

/// Cosine similarity in [-1, 1]
///
/// A zero (or non-finite) norm on either side scores 0.0.
pub fn cosine(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    let score = a.dot(b) / denom;
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringEngine {
    codec: FeatureVectorCodec,
    batch_size: usize,
}

impl ScoringEngine {
    pub fn new(codec: FeatureVectorCodec, batch_size: usize) -> Self {
        Self {
            codec,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Lazy scored sequence over the candidates matching `filter`
    pub fn score<'a>(
        &self,
        session: &'a mut dyn StoreSession,
        preference: &'a FeatureVector,
        filter: &'a CandidateFilter,
    ) -> ScoredStream<'a> {
        ScoredStream {
            session,
            preference,
            filter,
            codec: self.codec,
            batch_size: self.batch_size,
            last_id: None,
            exhausted: false,
            scored: 0,
        }
    }
}

/// Forward-only cursor over scored candidates
pub struct ScoredStream<'a> {
    session: &'a mut dyn StoreSession,
    preference: &'a FeatureVector,
    filter: &'a CandidateFilter,
    codec: FeatureVectorCodec,
    batch_size: usize,
    last_id: Option<ItemId>,
    exhausted: bool,
    scored: u64,
}

impl<'a> ScoredStream<'a> {
    /// Fetch and score the next page; `None` once the pool is drained
    ///
    /// Results come in fetch order. A malformed candidate vector fails the
    /// whole stream.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<ScoredResult>>> {
        if self.exhausted {
            return Ok(None);
        }

        let rows = self
            .session
            .fetch_candidates(self.filter, self.last_id.as_deref(), self.batch_size)
            .await?;

        if rows.len() < self.batch_size {
            self.exhausted = true;
        }
        if rows.is_empty() {
            return Ok(None);
        }

        self.last_id = rows.last().map(|r| r.item_id.clone());

        let mut batch = Vec::with_capacity(rows.len());
        for row in rows {
            let vector = self.codec.decode(row.vector)?;
            batch.push(ScoredResult {
                score: cosine(self.preference, &vector),
                item_id: row.item_id,
                metadata: row.metadata,
            });
        }

        self.scored += batch.len() as u64;
        debug!(
            batch = batch.len(),
            scored = self.scored,
            "Scored candidate batch"
        );

        Ok(Some(batch))
    }

    /// Candidates scored so far
    pub fn scored(&self) -> u64 {
        self.scored
    }
}
