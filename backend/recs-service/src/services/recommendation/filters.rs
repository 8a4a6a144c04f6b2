// ============================================
// Candidate filters
// ============================================
//
// Request options -> typed predicates -> parameterized SQL.
//
// Every name that ends up in predicate text (columns, genre flags) comes from
// the enums below; every per-request value goes through `push_bind`. Tokens
// that do not resolve are dropped and reported back in `AppliedFilters::ignored`.

use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use std::collections::BTreeSet;

use crate::models::ItemId;

pub const DEFAULT_MIN_VOTES: i64 = 50;
pub const DEFAULT_SINCE_YEAR: i64 = 1900;

/// Filter options as the caller sent them, before whitelisting
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub min_votes: i64,
    pub since_year: i64,
    pub allow_adult: bool,
    pub genre_any: Vec<String>,
    pub title_types: Vec<String>,
    pub orig_lang_any: Vec<String>,
    pub aka_region_any: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            min_votes: DEFAULT_MIN_VOTES,
            since_year: DEFAULT_SINCE_YEAR,
            allow_adult: false,
            genre_any: Vec::new(),
            title_types: Vec::new(),
            orig_lang_any: Vec::new(),
            aka_region_any: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Genre {
    Action,
    Adventure,
    Animation,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Family,
    Fantasy,
    History,
    Horror,
    Music,
    Mystery,
    Romance,
    SciFi,
    TvMovie,
    Thriller,
    War,
    Western,
}

impl Genre {
    /// Resolve a user-supplied genre name
    ///
    /// Case-insensitive; hyphens, underscores and repeated spaces are folded,
    /// so "Sci-Fi", "sci fi", "SciFi" and "Science Fiction" all land on
    /// [`Genre::SciFi`].
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .to_lowercase()
            .replace(['-', '_'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let genre = match normalized.as_str() {
            "action" => Genre::Action,
            "adventure" => Genre::Adventure,
            "animation" => Genre::Animation,
            "comedy" => Genre::Comedy,
            "crime" => Genre::Crime,
            "documentary" => Genre::Documentary,
            "drama" => Genre::Drama,
            "family" => Genre::Family,
            "fantasy" => Genre::Fantasy,
            "history" => Genre::History,
            "horror" => Genre::Horror,
            "music" => Genre::Music,
            "mystery" => Genre::Mystery,
            "romance" => Genre::Romance,
            "sci fi" | "scifi" | "science fiction" => Genre::SciFi,
            "tv movie" | "tvmovie" => Genre::TvMovie,
            "thriller" => Genre::Thriller,
            "war" => Genre::War,
            "western" => Genre::Western,
            _ => return None,
        };
        Some(genre)
    }

    /// Flag column in the feature relation
    pub fn column(&self) -> &'static str {
        match self {
            Genre::Action => "g_action",
            Genre::Adventure => "g_adventure",
            Genre::Animation => "g_animation",
            Genre::Comedy => "g_comedy",
            Genre::Crime => "g_crime",
            Genre::Documentary => "g_documentary",
            Genre::Drama => "g_drama",
            Genre::Family => "g_family",
            Genre::Fantasy => "g_fantasy",
            Genre::History => "g_history",
            Genre::Horror => "g_horror",
            Genre::Music => "g_music",
            Genre::Mystery => "g_mystery",
            Genre::Romance => "g_romance",
            Genre::SciFi => "g_scifi",
            Genre::TvMovie => "g_tvmovie",
            Genre::Thriller => "g_thriller",
            Genre::War => "g_war",
            Genre::Western => "g_western",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TitleType {
    Movie,
    Short,
    TvSeries,
    TvMiniSeries,
    TvMovie,
    TvSpecial,
    TvShort,
    TvEpisode,
    Video,
    VideoGame,
}

impl TitleType {
    pub fn parse(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        let title_type = match folded.as_str() {
            "movie" => TitleType::Movie,
            "short" => TitleType::Short,
            "tvseries" => TitleType::TvSeries,
            "tvminiseries" => TitleType::TvMiniSeries,
            "tvmovie" => TitleType::TvMovie,
            "tvspecial" => TitleType::TvSpecial,
            "tvshort" => TitleType::TvShort,
            "tvepisode" => TitleType::TvEpisode,
            "video" => TitleType::Video,
            "videogame" => TitleType::VideoGame,
            _ => return None,
        };
        Some(title_type)
    }

    /// Value stored in `title_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleType::Movie => "movie",
            TitleType::Short => "short",
            TitleType::TvSeries => "tvSeries",
            TitleType::TvMiniSeries => "tvMiniSeries",
            TitleType::TvMovie => "tvMovie",
            TitleType::TvSpecial => "tvSpecial",
            TitleType::TvShort => "tvShort",
            TitleType::TvEpisode => "tvEpisode",
            TitleType::Video => "video",
            TitleType::VideoGame => "videoGame",
        }
    }
}

/// ISO-639 style language code: 2-3 ASCII letters, lowercased
pub fn parse_language(raw: &str) -> Option<String> {
    parse_code(raw, 2..=3).map(|c| c.to_ascii_lowercase())
}

/// Region code: 2-4 ASCII letters, uppercased (`US`, `GB`, `XWW`)
pub fn parse_region(raw: &str) -> Option<String> {
    parse_code(raw, 2..=4).map(|c| c.to_ascii_uppercase())
}

fn parse_code(raw: &str, len: std::ops::RangeInclusive<usize>) -> Option<&str> {
    let code = raw.trim();
    (len.contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic())).then_some(code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericColumn {
    NumVotes,
    StartYear,
}

impl NumericColumn {
    pub fn sql(&self) -> &'static str {
        match self {
            NumericColumn::NumVotes => "f.num_votes",
            NumericColumn::StartYear => "f.start_year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagColumn {
    IsAdult,
}

impl FlagColumn {
    pub fn sql(&self) -> &'static str {
        match self {
            FlagColumn::IsAdult => "f.f_is_adult",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColumn {
    ItemId,
    TitleType,
}

impl TextColumn {
    pub fn sql(&self) -> &'static str {
        match self {
            TextColumn::ItemId => "f.tconst",
            TextColumn::TitleType => "f.title_type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AkaField {
    /// Language of an original-title aka
    OriginalLanguage,
    /// Region of any aka
    Region,
}

/// One typed condition over the feature relation `f`
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `coalesce(col, 0) >= min`
    Threshold { column: NumericColumn, min: i64 },
    /// `coalesce(col, false) = value`
    FlagIs { column: FlagColumn, value: bool },
    /// OR over genre flags
    AnyGenre { genres: Vec<Genre> },
    /// `col = ANY(values)`, or `col <> ALL(values)` when negated
    Membership {
        column: TextColumn,
        values: Vec<String>,
        negated: bool,
    },
    /// Some alternate title of the item matches one of `values`
    AltTitleExists { field: AkaField, values: Vec<String> },
}

impl Predicate {
    /// Append this predicate as a parenthesized boolean expression
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Predicate::Threshold { column, min } => {
                qb.push("(coalesce(")
                    .push(column.sql())
                    .push(", 0) >= ")
                    .push_bind(*min)
                    .push(")");
            }
            Predicate::FlagIs { column, value } => {
                qb.push("(coalesce(")
                    .push(column.sql())
                    .push(", false) = ")
                    .push_bind(*value)
                    .push(")");
            }
            Predicate::AnyGenre { genres } => {
                qb.push("(");
                for (i, genre) in genres.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    qb.push("coalesce(f.").push(genre.column()).push(", false)");
                }
                qb.push(")");
            }
            Predicate::Membership {
                column,
                values,
                negated,
            } => {
                let op = if *negated { " <> ALL(" } else { " = ANY(" };
                qb.push("(")
                    .push(column.sql())
                    .push(op)
                    .push_bind(values.clone())
                    .push("))");
            }
            Predicate::AltTitleExists { field, values } => {
                qb.push(
                    "EXISTS (SELECT 1 FROM analytics.int_title_akas a WHERE a.tconst = f.tconst AND ",
                );
                match field {
                    AkaField::OriginalLanguage => {
                        qb.push("coalesce(a.is_original_title, false) AND lower(a.language) = ANY(")
                    }
                    AkaField::Region => qb.push("upper(a.region) = ANY("),
                };
                qb.push_bind(values.clone()).push("))");
            }
        }
    }
}

/// What the filter layer actually applied, echoed back to the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppliedFilters {
    pub min_votes: i64,
    pub since_year: i64,
    pub allow_adult: bool,
    pub genre_any: Vec<String>,
    pub title_types: Vec<String>,
    pub orig_lang_any: Vec<String>,
    pub aka_region_any: Vec<String>,
    pub exclude: Vec<String>,
    /// Tokens that did not resolve through a whitelist
    pub ignored: Vec<String>,
}

/// AND of typed predicates plus the echo of what they mean
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub predicates: Vec<Predicate>,
    pub applied: AppliedFilters,
    excluded: BTreeSet<ItemId>,
}

impl CandidateFilter {
    /// Append ` AND <predicate>` for each predicate; caller has already
    /// opened a `WHERE`
    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for predicate in &self.predicates {
            qb.push(" AND ");
            predicate.push_sql(qb);
        }
    }

    /// Seeds plus explicit exclusions
    pub fn excluded(&self) -> &BTreeSet<ItemId> {
        &self.excluded
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateFilterBuilder;

impl CandidateFilterBuilder {
    pub fn build(&self, spec: &FilterSpec, seed_ids: &[ItemId]) -> CandidateFilter {
        let mut predicates = Vec::new();
        let mut applied = AppliedFilters {
            min_votes: spec.min_votes,
            since_year: spec.since_year,
            allow_adult: spec.allow_adult,
            ..Default::default()
        };

        if !spec.allow_adult {
            predicates.push(Predicate::FlagIs {
                column: FlagColumn::IsAdult,
                value: false,
            });
        }

        if spec.min_votes > 0 {
            predicates.push(Predicate::Threshold {
                column: NumericColumn::NumVotes,
                min: spec.min_votes,
            });
        }

        if spec.since_year > 0 {
            predicates.push(Predicate::Threshold {
                column: NumericColumn::StartYear,
                min: spec.since_year,
            });
        }

        let genres: BTreeSet<Genre> =
            resolve(&spec.genre_any, Genre::parse, &mut applied.ignored);
        if !genres.is_empty() {
            applied.genre_any = genres.iter().map(|g| g.column().to_string()).collect();
            predicates.push(Predicate::AnyGenre {
                genres: genres.into_iter().collect(),
            });
        }

        let title_types: BTreeSet<TitleType> =
            resolve(&spec.title_types, TitleType::parse, &mut applied.ignored);
        if !title_types.is_empty() {
            let values: Vec<String> = title_types.iter().map(|t| t.as_str().to_string()).collect();
            applied.title_types = values.clone();
            predicates.push(Predicate::Membership {
                column: TextColumn::TitleType,
                values,
                negated: false,
            });
        }

        let languages: BTreeSet<String> =
            resolve(&spec.orig_lang_any, parse_language, &mut applied.ignored);
        if !languages.is_empty() {
            let values: Vec<String> = languages.into_iter().collect();
            applied.orig_lang_any = values.clone();
            predicates.push(Predicate::AltTitleExists {
                field: AkaField::OriginalLanguage,
                values,
            });
        }

        let regions: BTreeSet<String> =
            resolve(&spec.aka_region_any, parse_region, &mut applied.ignored);
        if !regions.is_empty() {
            let values: Vec<String> = regions.into_iter().collect();
            applied.aka_region_any = values.clone();
            predicates.push(Predicate::AltTitleExists {
                field: AkaField::Region,
                values,
            });
        }

        let explicit: BTreeSet<ItemId> = spec
            .exclude
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        applied.exclude = explicit.iter().cloned().collect();

        let mut excluded = explicit;
        excluded.extend(seed_ids.iter().cloned());
        if !excluded.is_empty() {
            predicates.push(Predicate::Membership {
                column: TextColumn::ItemId,
                values: excluded.iter().cloned().collect(),
                negated: true,
            });
        }

        CandidateFilter {
            predicates,
            applied,
            excluded,
        }
    }
}

fn resolve<T: Ord>(
    tokens: &[String],
    parse: impl Fn(&str) -> Option<T>,
    ignored: &mut Vec<String>,
) -> BTreeSet<T> {
    let mut resolved = BTreeSet::new();
    for token in tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        match parse(token) {
            Some(value) => {
                resolved.insert(value);
            }
            None => ignored.push(token.to_string()),
        }
    }
    resolved
}
