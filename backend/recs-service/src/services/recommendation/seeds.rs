use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::codec::FeatureVectorCodec;
use crate::db::{SeedRow, StoreSession};
use crate::error::{AppError, Result};
use crate::models::{FeatureVector, PreferenceProfile, Seed};

/// Weight used when a seed row has none
pub const DEFAULT_SEED_WEIGHT: f64 = 1.0;

/// Reduces a user's seed set to one preference vector
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedAggregator {
    codec: FeatureVectorCodec,
}

impl SeedAggregator {
    pub fn new(codec: FeatureVectorCodec) -> Self {
        Self { codec }
    }

    /// Load the user's seeds and compute their weighted centroid
    pub async fn aggregate(
        &self,
        session: &mut dyn StoreSession,
        user_id: &str,
    ) -> Result<PreferenceProfile> {
        let rows = session.load_seeds(user_id).await?;
        if rows.is_empty() {
            return Err(AppError::NoSeeds {
                user_id: user_id.to_string(),
            });
        }

        let seeds = self.decode_seeds(rows)?;
        let vector = self.centroid(&seeds)?;

        debug!(
            user_id = %user_id,
            seeds = seeds.len(),
            "Preference vector computed"
        );

        Ok(PreferenceProfile { vector, seeds })
    }

    /// Validate weights and vectors; repeated item ids merge by summing weight
    pub fn decode_seeds(&self, rows: Vec<SeedRow>) -> Result<Vec<Seed>> {
        let mut merged: BTreeMap<String, Seed> = BTreeMap::new();

        for row in rows {
            let weight = row.weight.unwrap_or(DEFAULT_SEED_WEIGHT);
            if !weight.is_finite() || weight <= 0.0 {
                return Err(AppError::InvalidWeights(format!(
                    "seed {} has weight {}, weights must be positive",
                    row.item_id, weight
                )));
            }

            // duplicates are validated too
            let vector = self.codec.decode(row.vector)?;

            match merged.get_mut(&row.item_id) {
                Some(existing) => {
                    warn!(item_id = %row.item_id, "Duplicate seed row, merging weights");
                    existing.weight += weight;
                }
                None => {
                    merged.insert(
                        row.item_id.clone(),
                        Seed {
                            item_id: row.item_id,
                            title: row.title,
                            weight,
                            vector,
                        },
                    );
                }
            }
        }

        Ok(merged.into_values().collect())
    }

    /// Σ (w_i / Σw) · v_i, not normalized to unit length
    pub fn centroid(&self, seeds: &[Seed]) -> Result<FeatureVector> {
        if seeds.is_empty() {
            return Err(AppError::InvalidWeights("empty seed set".to_string()));
        }

        let total: f64 = seeds.iter().map(|s| s.weight).sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(AppError::InvalidWeights(format!(
                "total seed weight is {}",
                total
            )));
        }

        let dimension = seeds[0].vector.len();
        let mut centroid = FeatureVector::zeros(dimension);
        for seed in seeds {
            if seed.vector.len() != dimension {
                return Err(AppError::MalformedVector {
                    expected: dimension,
                    actual: seed.vector.len(),
                });
            }
            centroid.add_scaled(&seed.vector, seed.weight / total);
        }

        Ok(centroid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(id: &str, weight: f64, vector: Vec<f64>) -> Seed {
        Seed {
            item_id: id.to_string(),
            title: None,
            weight,
            vector: FeatureVector::new(vector),
        }
    }

    fn row(id: &str, weight: Option<f64>) -> SeedRow {
        SeedRow {
            item_id: id.to_string(),
            title: Some(format!("Title {}", id)),
            weight,
            vector: vec![0.5; 46],
        }
    }

    #[test]
    fn test_centroid_two_seeds() {
        let seeds = vec![seed("A", 2.0, vec![1.0, 0.0]), seed("B", 1.0, vec![0.0, 1.0])];
        let c = SeedAggregator::default().centroid(&seeds).unwrap();
        assert!((c.as_slice()[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.as_slice()[1] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_centroid_matches_weighted_mean() {
        let (w1, w2) = (0.7, 3.1);
        let (v1, v2) = (vec![1.5, -2.0, 0.25], vec![-0.5, 4.0, 1.0]);
        let seeds = vec![seed("A", w1, v1.clone()), seed("B", w2, v2.clone())];
        let c = SeedAggregator::default().centroid(&seeds).unwrap();
        for i in 0..3 {
            let expected = (w1 * v1[i] + w2 * v2[i]) / (w1 + w2);
            assert!((c.as_slice()[i] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_missing_weight_defaults_to_one() {
        let seeds = SeedAggregator::default()
            .decode_seeds(vec![row("tt1", None)])
            .unwrap();
        assert_eq!(seeds[0].weight, 1.0);
    }

    #[test]
    fn test_non_positive_weights_rejected() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = SeedAggregator::default()
                .decode_seeds(vec![row("tt1", Some(1.0)), row("tt2", Some(bad))])
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidWeights(_)), "{bad}");
        }
    }

    #[test]
    fn test_duplicate_seed_rows_merge() {
        let seeds = SeedAggregator::default()
            .decode_seeds(vec![row("tt1", Some(1.0)), row("tt1", Some(2.5)), row("tt0", None)])
            .unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].item_id, "tt0");
        assert_eq!(seeds[1].weight, 3.5);
    }

    #[test]
    fn test_malformed_seed_vector() {
        let mut bad = row("tt1", Some(1.0));
        bad.vector.pop();
        let err = SeedAggregator::default().decode_seeds(vec![bad]).unwrap_err();
        assert!(matches!(err, AppError::MalformedVector { .. }));
    }

    #[test]
    fn test_malformed_duplicate_seed_vector() {
        let mut duplicate = row("tt1", Some(2.0));
        duplicate.vector.truncate(12);
        let err = SeedAggregator::default()
            .decode_seeds(vec![row("tt1", Some(1.0)), duplicate])
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::MalformedVector {
                expected: 46,
                actual: 12
            }
        ));
    }
}
