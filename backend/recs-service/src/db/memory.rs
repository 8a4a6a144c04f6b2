//! In-process feature store
//!
//! Evaluates the same typed predicates as the Postgres store, with SQL NULL
//! semantics (`coalesce` defaults, NULL never matches a membership test).
//! Used by the HTTP tests and for running the service without a database.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{CandidateRow, FeatureStore, SeedRow, StoreSession};
use crate::error::{AppError, Result};
use crate::models::{ItemId, ItemMetadata};
use crate::services::recommendation::codec::{FeatureVectorCodec, RawFeatureRow};
use crate::services::recommendation::filters::{
    AkaField, CandidateFilter, FlagColumn, NumericColumn, Predicate, TextColumn,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AltTitle {
    pub region: Option<String>,
    pub language: Option<String>,
    pub is_original_title: bool,
}

impl AltTitle {
    pub fn original(language: &str) -> Self {
        Self {
            region: None,
            language: Some(language.to_string()),
            is_original_title: true,
        }
    }

    pub fn in_region(region: &str) -> Self {
        Self {
            region: Some(region.to_string()),
            language: None,
            is_original_title: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoredItem {
    pub item_id: ItemId,
    pub metadata: ItemMetadata,
    pub is_adult: Option<bool>,
    pub features: RawFeatureRow,
    pub akas: Vec<AltTitle>,
    /// Stored vector that bypasses the encoder, for integrity-fault cases
    pub raw_vector: Option<Vec<f64>>,
}

impl StoredItem {
    pub fn new(item_id: &str, title: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            metadata: ItemMetadata {
                primary_title: Some(title.to_string()),
                title_type: Some("movie".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn features(mut self, features: RawFeatureRow) -> Self {
        self.features = features;
        self
    }

    pub fn rating(mut self, average_rating: f64, num_votes: i64) -> Self {
        self.metadata.average_rating = Some(average_rating);
        self.metadata.num_votes = Some(num_votes);
        self
    }

    pub fn year(mut self, start_year: i32) -> Self {
        self.metadata.start_year = Some(start_year);
        self
    }

    pub fn title_type(mut self, title_type: &str) -> Self {
        self.metadata.title_type = Some(title_type.to_string());
        self
    }

    pub fn adult(mut self, is_adult: bool) -> Self {
        self.is_adult = Some(is_adult);
        self
    }

    pub fn aka(mut self, aka: AltTitle) -> Self {
        self.akas.push(aka);
        self
    }

    pub fn raw_vector(mut self, vector: Vec<f64>) -> Self {
        self.raw_vector = Some(vector);
        self
    }

    fn vector(&self, codec: &FeatureVectorCodec) -> Vec<f64> {
        match &self.raw_vector {
            Some(raw) => raw.clone(),
            None => codec.encode(&self.features).into_inner(),
        }
    }

    fn matches(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Threshold { column, min } => {
                let value = match column {
                    NumericColumn::NumVotes => self.metadata.num_votes.unwrap_or(0),
                    NumericColumn::StartYear => i64::from(self.metadata.start_year.unwrap_or(0)),
                };
                value >= *min
            }
            Predicate::FlagIs { column, value } => match column {
                FlagColumn::IsAdult => self.is_adult.unwrap_or(false) == *value,
            },
            Predicate::AnyGenre { genres } => {
                genres.iter().any(|g| self.features.is_set(g.column()))
            }
            Predicate::Membership {
                column,
                values,
                negated,
            } => {
                let field = match column {
                    TextColumn::ItemId => Some(self.item_id.as_str()),
                    TextColumn::TitleType => self.metadata.title_type.as_deref(),
                };
                match field {
                    None => false,
                    Some(v) => values.iter().any(|x| x == v) != *negated,
                }
            }
            Predicate::AltTitleExists { field, values } => self.akas.iter().any(|aka| {
                let candidate = match field {
                    AkaField::OriginalLanguage if aka.is_original_title => {
                        aka.language.as_ref().map(|l| l.to_lowercase())
                    }
                    AkaField::OriginalLanguage => None,
                    AkaField::Region => aka.region.as_ref().map(|r| r.to_uppercase()),
                };
                candidate.map_or(false, |c| values.contains(&c))
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Catalog {
    items: BTreeMap<ItemId, StoredItem>,
    seeds: HashMap<String, Vec<(ItemId, Option<f64>)>>,
}

#[derive(Clone, Default)]
pub struct InMemoryFeatureStore {
    catalog: Arc<Catalog>,
    open_sessions: Arc<AtomicUsize>,
    fail_on_fetch: Option<usize>,
    fetch_delay: Option<Duration>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: StoredItem) -> Self {
        Arc::make_mut(&mut self.catalog)
            .items
            .insert(item.item_id.clone(), item);
        self
    }

    pub fn with_seed(mut self, user_id: &str, item_id: &str, weight: Option<f64>) -> Self {
        Arc::make_mut(&mut self.catalog)
            .seeds
            .entry(user_id.to_string())
            .or_default()
            .push((item_id.to_string(), weight));
        self
    }

    /// Make the n-th candidate fetch of every session fail (1-based)
    #[cfg(any(test, feature = "test-util"))]
    pub fn failing_on_fetch(mut self, n: usize) -> Self {
        self.fail_on_fetch = Some(n);
        self
    }

    /// Delay each candidate fetch, to exercise request deadlines
    #[cfg(any(test, feature = "test-util"))]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Sessions currently held
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeatureStore for InMemoryFeatureStore {
    async fn open_session(&self) -> Result<Box<dyn StoreSession>> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            catalog: Arc::clone(&self.catalog),
            codec: FeatureVectorCodec,
            fetches: 0,
            fail_on_fetch: self.fail_on_fetch,
            fetch_delay: self.fetch_delay,
            _guard: SessionGuard(Arc::clone(&self.open_sessions)),
        }))
    }

    async fn ping(&self) -> bool {
        true
    }
}

struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MemorySession {
    catalog: Arc<Catalog>,
    codec: FeatureVectorCodec,
    fetches: usize,
    fail_on_fetch: Option<usize>,
    fetch_delay: Option<Duration>,
    _guard: SessionGuard,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn load_seeds(&mut self, user_id: &str) -> Result<Vec<SeedRow>> {
        let mut rows: Vec<SeedRow> = self
            .catalog
            .seeds
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|(item_id, weight)| {
                // inner join: seeds without a feature row are invisible
                let item = self.catalog.items.get(item_id)?;
                Some(SeedRow {
                    item_id: item_id.clone(),
                    title: item.metadata.primary_title.clone(),
                    weight: *weight,
                    vector: item.vector(&self.codec),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        Ok(rows)
    }

    async fn fetch_candidates(
        &mut self,
        filter: &CandidateFilter,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CandidateRow>> {
        self.fetches += 1;
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on_fetch == Some(self.fetches) {
            return Err(AppError::StoreUnavailable(
                "connection reset during candidate fetch".to_string(),
            ));
        }

        let lower: Bound<&str> = match after {
            Some(last) => Bound::Excluded(last),
            None => Bound::Unbounded,
        };

        let rows = self
            .catalog
            .items
            .range::<str, _>((lower, Bound::Unbounded))
            .map(|(_, item)| item)
            .filter(|item| filter.predicates.iter().all(|p| item.matches(p)))
            .take(limit)
            .map(|item| CandidateRow {
                item_id: item.item_id.clone(),
                metadata: item.metadata.clone(),
                vector: item.vector(&self.codec),
            })
            .collect();
        Ok(rows)
    }
}
