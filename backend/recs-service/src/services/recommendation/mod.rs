/// Content-based recommendation pipeline
///
/// request -> SeedAggregator (preference vector)
///         -> CandidateFilterBuilder (typed predicates)
///         -> ScoringEngine (paged fetch + cosine)
///         -> ResultRanker (bounded top-k)
///
/// One store session per request carries the seed query and every candidate
/// page, and is released when `run` returns or its future is dropped.
pub mod codec;
pub mod filters;
pub mod ranking;
pub mod scoring;
pub mod seeds;

pub use codec::{FeatureVectorCodec, RawFeatureRow, FEATURE_DIMENSION, FEATURE_SCHEMA_VERSION};
pub use filters::{AppliedFilters, CandidateFilter, CandidateFilterBuilder, FilterSpec};
pub use ranking::ResultRanker;
pub use scoring::{cosine, ScoringEngine};
pub use seeds::SeedAggregator;

use resilience::with_timeout;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::FeatureStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::ScoredResult;

#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub user_id: String,
    /// Clamped into `1..=max_k`; service default when absent
    pub k: Option<usize>,
    pub filters: FilterSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsedSeed {
    pub item_id: String,
    pub title: Option<String>,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct Recommendations {
    pub user_id: String,
    pub k: usize,
    pub used_seeds: Vec<UsedSeed>,
    pub filters: AppliedFilters,
    pub results: Vec<ScoredResult>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub default_k: usize,
    pub max_k: usize,
    pub timeout: Duration,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.recs_batch_size,
            default_k: config.recs_default_k,
            max_k: config.recs_max_k,
            timeout: config.request_timeout(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 2000,
            default_k: 20,
            max_k: ranking::MAX_K,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct RecommendationService {
    store: Arc<dyn FeatureStore>,
    aggregator: SeedAggregator,
    filter_builder: CandidateFilterBuilder,
    engine: ScoringEngine,
    ranker: ResultRanker,
    default_k: usize,
    timeout: Duration,
}

impl RecommendationService {
    pub fn new(store: Arc<dyn FeatureStore>, settings: PipelineSettings) -> Self {
        let codec = FeatureVectorCodec;
        let ranker = ResultRanker::new(settings.max_k);
        Self {
            store,
            aggregator: SeedAggregator::new(codec),
            filter_builder: CandidateFilterBuilder,
            engine: ScoringEngine::new(codec, settings.batch_size),
            default_k: ranker.clamp_k(settings.default_k),
            ranker,
            timeout: settings.timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn FeatureStore> {
        &self.store
    }

    /// Run the pipeline under the request deadline
    pub async fn recommend(&self, request: RecommendationRequest) -> Result<Recommendations> {
        let start = Instant::now();

        let outcome = match with_timeout(self.timeout, self.run(&request)).await {
            Ok(result) => result,
            Err(err) => {
                warn!(user_id = %request.user_id, error = %err, "Recommendation deadline exceeded");
                Err(AppError::Timeout(self.timeout))
            }
        };

        let label = match &outcome {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::observe_recommendation(label, start.elapsed());

        outcome
    }

    async fn run(&self, request: &RecommendationRequest) -> Result<Recommendations> {
        let start = Instant::now();
        let mut session = self.store.open_session().await?;

        let profile = self
            .aggregator
            .aggregate(session.as_mut(), &request.user_id)
            .await?;

        let filter = self
            .filter_builder
            .build(&request.filters, &profile.seed_ids());
        if !filter.applied.ignored.is_empty() {
            info!(ignored = ?filter.applied.ignored, "Dropped unrecognized filter values");
        }

        let k = self.ranker.clamp_k(request.k.unwrap_or(self.default_k));
        let mut top = self.ranker.top_k(k);

        let mut stream = self.engine.score(session.as_mut(), &profile.vector, &filter);
        while let Some(batch) = stream.next_batch().await? {
            top.extend(
                batch
                    .into_iter()
                    .filter(|r| !filter.excluded().contains(&r.item_id)),
            );
        }
        let scored = stream.scored();
        metrics::add_candidates_scored(scored);

        let results = top.into_sorted_vec();

        info!(
            user_id = %request.user_id,
            seeds = profile.seeds.len(),
            candidates = scored,
            returned = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recommendations computed"
        );

        Ok(Recommendations {
            user_id: request.user_id.clone(),
            k,
            used_seeds: profile
                .seeds
                .into_iter()
                .map(|s| UsedSeed {
                    item_id: s.item_id,
                    title: s.title,
                    weight: s.weight,
                })
                .collect(),
            filters: filter.applied,
            results,
        })
    }
}
