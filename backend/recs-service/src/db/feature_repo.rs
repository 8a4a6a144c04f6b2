use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{CandidateRow, FeatureStore, SeedRow, StoreSession};
use crate::error::Result;
use crate::models::ItemMetadata;
use crate::services::recommendation::codec::FeatureVectorCodec;
use crate::services::recommendation::filters::CandidateFilter;

const SERVICE_NAME: &str = "recs-service";
const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, FromRow)]
struct SeedRecord {
    tconst: String,
    primary_title: Option<String>,
    weight: Option<f64>,
    vec: Vec<f64>,
}

#[derive(Debug, FromRow)]
struct CandidateRecord {
    tconst: String,
    primary_title: Option<String>,
    english_title: Option<String>,
    title_type: Option<String>,
    start_year: Option<i32>,
    average_rating: Option<f64>,
    num_votes: Option<i64>,
    vec: Vec<f64>,
}

impl From<SeedRecord> for SeedRow {
    fn from(r: SeedRecord) -> Self {
        SeedRow {
            item_id: r.tconst,
            title: r.primary_title,
            weight: r.weight,
            vector: r.vec,
        }
    }
}

impl From<CandidateRecord> for CandidateRow {
    fn from(r: CandidateRecord) -> Self {
        CandidateRow {
            item_id: r.tconst,
            metadata: ItemMetadata {
                primary_title: r.primary_title,
                english_title: r.english_title,
                title_type: r.title_type,
                start_year: r.start_year,
                average_rating: r.average_rating,
                num_votes: r.num_votes,
            },
            vector: r.vec,
        }
    }
}

/// Statements built once from the codec's column list
#[derive(Debug)]
struct Statements {
    seeds: String,
    candidates: String,
}

impl Statements {
    fn new(codec: &FeatureVectorCodec) -> Self {
        let vec_expr = codec.sql_projection("f");

        let seeds = format!(
            "SELECT s.tconst, f.primary_title, s.weight::float8 AS weight, {vec_expr} AS vec \
             FROM analytics.int_user_seed_preferences s \
             JOIN analytics.int_titles_features f USING (tconst) \
             WHERE s.user_id = $1 \
             ORDER BY s.tconst"
        );

        let candidates = format!(
            "SELECT f.tconst, f.primary_title, f.english_title, f.title_type, \
             f.start_year::int4 AS start_year, f.average_rating::float8 AS average_rating, \
             f.num_votes::int8 AS num_votes, {vec_expr} AS vec \
             FROM analytics.int_titles_features f \
             WHERE TRUE"
        );

        Self { seeds, candidates }
    }
}

/// Postgres-backed feature store
#[derive(Clone)]
pub struct PgFeatureStore {
    pool: PgPool,
    statements: Arc<Statements>,
}

impl PgFeatureStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statements: Arc::new(Statements::new(&FeatureVectorCodec)),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl FeatureStore for PgFeatureStore {
    async fn open_session(&self) -> Result<Box<dyn StoreSession>> {
        let conn = db_pool::acquire_with_metrics(&self.pool, SERVICE_NAME).await?;
        Ok(Box::new(PgStoreSession {
            conn,
            statements: Arc::clone(&self.statements),
        }))
    }

    async fn ping(&self) -> bool {
        db_pool::ping(&self.pool, PING_TIMEOUT).await
    }
}

/// One pooled connection for the lifetime of a request
///
/// Dropping the session returns the connection to the pool.
pub struct PgStoreSession {
    conn: PoolConnection<Postgres>,
    statements: Arc<Statements>,
}

#[async_trait]
impl StoreSession for PgStoreSession {
    async fn load_seeds(&mut self, user_id: &str) -> Result<Vec<SeedRow>> {
        let rows = sqlx::query_as::<_, SeedRecord>(&self.statements.seeds)
            .bind(user_id)
            .fetch_all(&mut *self.conn)
            .await?;

        debug!(user_id = %user_id, rows = rows.len(), "Loaded seed rows");
        Ok(rows.into_iter().map(SeedRow::from).collect())
    }

    async fn fetch_candidates(
        &mut self,
        filter: &CandidateFilter,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CandidateRow>> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(self.statements.candidates.as_str());
        filter.push_conditions(&mut qb);

        if let Some(last) = after {
            qb.push(" AND f.tconst > ").push_bind(last.to_string());
        }
        qb.push(" ORDER BY f.tconst LIMIT ").push_bind(limit as i64);

        let rows = qb
            .build_query_as::<CandidateRecord>()
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows.into_iter().map(CandidateRow::from).collect())
    }
}
