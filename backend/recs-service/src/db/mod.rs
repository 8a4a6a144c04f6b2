//! Feature-store access
//!
//! The pipeline only sees [`FeatureStore`] / [`StoreSession`]. A session is
//! scoped to one request: it holds whatever connection the backend needs and
//! gives it back when dropped, whichever way the request ends.

pub mod feature_repo;
pub mod memory;

pub use feature_repo::PgFeatureStore;
pub use memory::{AltTitle, InMemoryFeatureStore, StoredItem};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ItemId, ItemMetadata};
use crate::services::recommendation::filters::CandidateFilter;

/// Seed row as stored; the vector is not validated yet
#[derive(Debug, Clone)]
pub struct SeedRow {
    pub item_id: ItemId,
    pub title: Option<String>,
    pub weight: Option<f64>,
    pub vector: Vec<f64>,
}

/// Candidate row as stored; the vector is not validated yet
#[derive(Debug, Clone)]
pub struct CandidateRow {
    pub item_id: ItemId,
    pub metadata: ItemMetadata,
    pub vector: Vec<f64>,
}

#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Start a request-scoped session
    async fn open_session(&self) -> Result<Box<dyn StoreSession>>;

    /// Cheap liveness probe for health checks
    async fn ping(&self) -> bool;
}

#[async_trait]
pub trait StoreSession: Send {
    /// All seed rows of a user, ordered by item id
    async fn load_seeds(&mut self, user_id: &str) -> Result<Vec<SeedRow>>;

    /// Next page of candidates matching `filter`, ordered by item id,
    /// strictly after `after` when given
    async fn fetch_candidates(
        &mut self,
        filter: &CandidateFilter,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CandidateRow>>;
}
