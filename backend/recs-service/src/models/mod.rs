use serde::{Deserialize, Serialize};

/// IMDb-style title key (`tt0133093`)
pub type ItemId = String;

/// Fixed-order numeric encoding of a title
///
/// Build one through [`crate::services::FeatureVectorCodec`] so the column
/// order and coalescing rules stay the same for seeds and candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(components: Vec<f64>) -> Self {
        Self(components)
    }

    pub fn zeros(dimension: usize) -> Self {
        Self(vec![0.0; dimension])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// `self += scale * other`, component-wise
    pub fn add_scaled(&mut self, other: &FeatureVector, scale: f64) {
        for (acc, x) in self.0.iter_mut().zip(other.0.iter()) {
            *acc += scale * x;
        }
    }

    pub fn dot(&self, other: &FeatureVector) -> f64 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }
}

/// Display metadata carried alongside a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub primary_title: Option<String>,
    pub english_title: Option<String>,
    pub title_type: Option<String>,
    pub start_year: Option<i32>,
    pub average_rating: Option<f64>,
    pub num_votes: Option<i64>,
}

/// A user-chosen title with its weight
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub item_id: ItemId,
    pub title: Option<String>,
    pub weight: f64,
    pub vector: FeatureVector,
}

/// Weighted centroid of a seed set plus the seeds that produced it
#[derive(Debug, Clone)]
pub struct PreferenceProfile {
    pub vector: FeatureVector,
    pub seeds: Vec<Seed>,
}

impl PreferenceProfile {
    pub fn seed_ids(&self) -> Vec<ItemId> {
        self.seeds.iter().map(|s| s.item_id.clone()).collect()
    }
}

/// A candidate that has been scored against a preference vector
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub item_id: ItemId,
    pub metadata: ItemMetadata,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_scaled() {
        let mut acc = FeatureVector::zeros(2);
        acc.add_scaled(&FeatureVector::new(vec![1.0, 0.0]), 2.0 / 3.0);
        acc.add_scaled(&FeatureVector::new(vec![0.0, 1.0]), 1.0 / 3.0);
        assert!((acc.as_slice()[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((acc.as_slice()[1] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_norm() {
        let v = FeatureVector::new(vec![3.0, 4.0]);
        assert_eq!(v.norm(), 5.0);
        assert_eq!(FeatureVector::zeros(3).norm(), 0.0);
    }
}
