/// Recommendation handlers
use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};

use super::split_csv;
use crate::error::{AppError, Result};
use crate::models::ScoredResult;
use crate::services::recommendation::filters::{
    AppliedFilters, FilterSpec, DEFAULT_MIN_VOTES, DEFAULT_SINCE_YEAR,
};
use crate::services::recommendation::{RecommendationRequest, Recommendations, UsedSeed};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RecsQuery {
    pub user_id: String,
    pub k: Option<i64>,
    pub min_votes: Option<i64>,
    pub since_year: Option<i64>,
    pub allow_adult: Option<bool>,
    pub genre_any: Option<String>,
    #[serde(alias = "exclude_tconst")]
    pub exclude: Option<String>,
    pub title_types: Option<String>,
    pub orig_lang_any: Option<String>,
    pub aka_region_any: Option<String>,
}

impl RecsQuery {
    pub fn into_request(self) -> Result<RecommendationRequest> {
        let user_id = self.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(AppError::BadRequest("user_id must not be empty".to_string()));
        }

        let min_votes = self.min_votes.unwrap_or(DEFAULT_MIN_VOTES);
        if min_votes < 0 {
            return Err(AppError::BadRequest("min_votes must be >= 0".to_string()));
        }
        let since_year = self.since_year.unwrap_or(DEFAULT_SINCE_YEAR);
        if since_year < 0 {
            return Err(AppError::BadRequest("since_year must be >= 0".to_string()));
        }

        Ok(RecommendationRequest {
            user_id,
            // non-positive k clamps to 1 downstream
            k: self.k.map(|k| k.max(0) as usize),
            filters: FilterSpec {
                min_votes,
                since_year,
                allow_adult: self.allow_adult.unwrap_or(false),
                genre_any: split_csv(self.genre_any.as_deref()),
                title_types: split_csv(self.title_types.as_deref()),
                orig_lang_any: split_csv(self.orig_lang_any.as_deref()),
                aka_region_any: split_csv(self.aka_region_any.as_deref()),
                exclude: split_csv(self.exclude.as_deref()),
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RecommendedTitle {
    pub item_id: String,
    pub title: Option<String>,
    pub english_title: Option<String>,
    pub title_type: Option<String>,
    pub start_year: Option<i32>,
    pub average_rating: Option<f64>,
    pub num_votes: Option<i64>,
    pub score: f64,
}

impl From<ScoredResult> for RecommendedTitle {
    fn from(r: ScoredResult) -> Self {
        Self {
            item_id: r.item_id,
            title: r.metadata.primary_title,
            english_title: r.metadata.english_title,
            title_type: r.metadata.title_type,
            start_year: r.metadata.start_year,
            average_rating: r.metadata.average_rating,
            num_votes: r.metadata.num_votes,
            score: r.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecsResponse {
    pub user_id: String,
    pub k: usize,
    pub used_seeds: Vec<UsedSeed>,
    pub filters: AppliedFilters,
    pub results: Vec<RecommendedTitle>,
}

impl From<Recommendations> for RecsResponse {
    fn from(recs: Recommendations) -> Self {
        Self {
            user_id: recs.user_id,
            k: recs.k,
            used_seeds: recs.used_seeds,
            filters: recs.filters,
            results: recs.results.into_iter().map(RecommendedTitle::from).collect(),
        }
    }
}

/// Top-k titles for a user's seed set
/// GET /recs/for-me
#[get("/recs/for-me")]
pub async fn recs_for_me(
    state: web::Data<AppState>,
    query: web::Query<RecsQuery>,
) -> Result<HttpResponse> {
    let request = query.into_inner().into_request()?;
    let recs = state.recommendations.recommend(request).await?;
    Ok(HttpResponse::Ok().json(RecsResponse::from(recs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(user_id: &str) -> RecsQuery {
        RecsQuery {
            user_id: user_id.to_string(),
            k: None,
            min_votes: None,
            since_year: None,
            allow_adult: None,
            genre_any: None,
            exclude: None,
            title_types: None,
            orig_lang_any: None,
            aka_region_any: None,
        }
    }

    #[test]
    fn test_defaults() {
        let req = query("user:louise").into_request().unwrap();
        assert_eq!(req.k, None);
        assert_eq!(req.filters, FilterSpec::default());
    }

    #[test]
    fn test_negative_thresholds_rejected() {
        let mut q = query("u");
        q.min_votes = Some(-1);
        assert!(matches!(q.into_request(), Err(AppError::BadRequest(_))));

        let mut q = query("u");
        q.since_year = Some(-5);
        assert!(matches!(q.into_request(), Err(AppError::BadRequest(_))));

        assert!(matches!(query("  ").into_request(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_csv_fields_and_k() {
        let mut q = query("u");
        q.k = Some(-3);
        q.genre_any = Some("Sci-Fi, Horror".to_string());
        q.exclude = Some("tt1,,tt2".to_string());
        let req = q.into_request().unwrap();
        assert_eq!(req.k, Some(0));
        assert_eq!(req.filters.genre_any, vec!["Sci-Fi", "Horror"]);
        assert_eq!(req.filters.exclude, vec!["tt1", "tt2"]);
    }
}
