//! Person/genre film counts backed by the metadata API

use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use super::{Genre, MetadataClient, MovieCredit, PersonMovieCredits, PersonSummary};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilmTitle {
    pub id: i64,
    pub title: String,
    pub original_title: String,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilmCount {
    pub person: String,
    pub genre: String,
    pub count: usize,
    pub titles: Vec<FilmTitle>,
}

/// Lowercase, keep only alphanumerics and whitespace, trim
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .trim()
        .to_string()
}

/// First exact (normalized) name match, otherwise the first search hit
pub fn pick_person<'a>(query: &str, results: &'a [PersonSummary]) -> Option<&'a PersonSummary> {
    let wanted = normalize_name(query);
    results
        .iter()
        .find(|p| normalize_name(&p.name) == wanted)
        .or_else(|| results.first())
}

/// Case-insensitive genre name lookup
pub fn resolve_genre_id(name: &str, genres: &[Genre]) -> Option<i64> {
    let wanted = name.trim().to_lowercase();
    genres
        .iter()
        .find(|g| g.name.to_lowercase() == wanted)
        .map(|g| g.id)
}

fn release_year(date: Option<&str>) -> Option<i32> {
    date.filter(|d| d.len() >= 4)
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok())
}

/// Cast then crew credits in `genre_id`, one entry per movie, sorted by
/// (year or 0, title)
pub fn tally_titles(credits: &PersonMovieCredits, genre_id: i64) -> Vec<FilmTitle> {
    let mut seen = HashSet::new();
    let mut titles: Vec<FilmTitle> = credits
        .cast
        .iter()
        .chain(credits.crew.iter())
        .filter(|m| in_genre(m, genre_id))
        .filter(|m| seen.insert(m.id))
        .map(|m| {
            let title = m.title.clone().or_else(|| m.original_title.clone());
            let original = m.original_title.clone().or_else(|| m.title.clone());
            FilmTitle {
                id: m.id,
                title: title.unwrap_or_default(),
                original_title: original.unwrap_or_default(),
                year: release_year(m.release_date.as_deref()),
            }
        })
        .collect();

    titles.sort_by(|a, b| {
        a.year
            .unwrap_or(0)
            .cmp(&b.year.unwrap_or(0))
            .then_with(|| a.title.cmp(&b.title))
    });
    titles
}

fn in_genre(credit: &MovieCredit, genre_id: i64) -> bool {
    credit
        .genre_ids
        .as_ref()
        .map_or(false, |ids| ids.contains(&genre_id))
}

/// How many films `person` made in `genre`
///
/// Unknown person is `NotFound`, unknown genre is `BadRequest`.
pub async fn film_count(client: &MetadataClient, person: &str, genre: &str) -> Result<FilmCount> {
    let page = client.search_person(person).await?;
    let chosen = pick_person(person, &page.results)
        .ok_or_else(|| AppError::NotFound(format!("Person not found: {}", person)))?;
    let person_id = chosen.id;

    let genres = client.genre_movie_list().await?;
    let genre_id = resolve_genre_id(genre, &genres.genres)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown genre: {}", genre)))?;

    let credits = client.person_movie_credits(person_id).await?;
    let titles = tally_titles(&credits, genre_id);

    info!(
        person = %person,
        person_id,
        genre_id,
        count = titles.len(),
        "Film count computed"
    );

    Ok(FilmCount {
        person: person.to_string(),
        genre: genre.to_string(),
        count: titles.len(),
        titles,
    })
}
