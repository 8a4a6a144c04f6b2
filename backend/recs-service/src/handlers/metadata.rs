/// Metadata-API backed routes
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::services::metadata;
use crate::AppState;

/// Verify credentials and connectivity against the genre list
/// GET /tmdb/ping
#[get("/tmdb/ping")]
pub async fn tmdb_ping(state: web::Data<AppState>) -> Result<HttpResponse> {
    let list = state.metadata.genre_movie_list().await.map_err(|e| {
        warn!(error = %e, "Metadata API ping failed");
        AppError::MetadataApi(format!("ping failed: {}", e))
    })?;

    let sample: Vec<_> = list.genres.iter().take(2).collect();
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "genres_count": list.genres.len(),
        "sample": sample,
    })))
}

#[derive(Debug, Deserialize)]
pub struct FilmCountQuery {
    pub person: String,
    pub genre: String,
}

/// GET /stats/film-count?person=&genre=
#[get("/stats/film-count")]
pub async fn film_count(
    state: web::Data<AppState>,
    query: web::Query<FilmCountQuery>,
) -> Result<HttpResponse> {
    let FilmCountQuery { person, genre } = query.into_inner();
    if person.trim().is_empty() || genre.trim().is_empty() {
        return Err(AppError::BadRequest(
            "person and genre are required".to_string(),
        ));
    }

    let stats = metadata::film_count(&state.metadata, &person, &genre).await?;
    Ok(HttpResponse::Ok().json(stats))
}
