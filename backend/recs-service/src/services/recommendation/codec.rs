//! Feature vector codec
//!
//! The column list below is the single definition of a title's vector: the SQL
//! projection used by the Postgres store and the in-process encoder both walk
//! it, so seed and candidate vectors always line up. Adding or removing a
//! column changes the dimension and is a breaking change for the store schema;
//! bump [`FEATURE_SCHEMA_VERSION`] with it.

use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::FeatureVector;

pub const FEATURE_SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Real-valued column, NULL reads as 0.0
    Numeric,
    /// Boolean column, true/false read as 1.0/0.0, NULL as 0.0
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureColumn {
    pub name: &'static str,
    pub kind: FeatureKind,
}

const fn numeric(name: &'static str) -> FeatureColumn {
    FeatureColumn {
        name,
        kind: FeatureKind::Numeric,
    }
}

const fn flag(name: &'static str) -> FeatureColumn {
    FeatureColumn {
        name,
        kind: FeatureKind::Flag,
    }
}

pub const FEATURE_COLUMNS: [FeatureColumn; 46] = [
    // normalized numerics
    numeric("f_rating_norm"),
    numeric("f_votes_norm"),
    numeric("f_runtime_norm"),
    numeric("f_year_norm"),
    // log-scaled counts
    numeric("f_votes_log"),
    numeric("f_dir_log"),
    numeric("f_wri_log"),
    numeric("f_cast_log"),
    // genre flags
    flag("g_action"),
    flag("g_adventure"),
    flag("g_animation"),
    flag("g_comedy"),
    flag("g_crime"),
    flag("g_documentary"),
    flag("g_drama"),
    flag("g_family"),
    flag("g_fantasy"),
    flag("g_history"),
    flag("g_horror"),
    flag("g_music"),
    flag("g_mystery"),
    flag("g_romance"),
    flag("g_scifi"),
    flag("g_tvmovie"),
    flag("g_thriller"),
    flag("g_war"),
    flag("g_western"),
    // primary-genre one-hot
    flag("pg_action"),
    flag("pg_adventure"),
    flag("pg_animation"),
    flag("pg_comedy"),
    flag("pg_crime"),
    flag("pg_documentary"),
    flag("pg_drama"),
    flag("pg_family"),
    flag("pg_fantasy"),
    flag("pg_history"),
    flag("pg_horror"),
    flag("pg_music"),
    flag("pg_mystery"),
    flag("pg_romance"),
    flag("pg_scifi"),
    flag("pg_tvmovie"),
    flag("pg_thriller"),
    flag("pg_war"),
    flag("pg_western"),
];

/// Vector dimension shared by every title
pub const FEATURE_DIMENSION: usize = FEATURE_COLUMNS.len();

/// Raw field value as it comes out of the feature relation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Number(f64),
    Flag(bool),
}

/// Named raw fields of one title; absent fields behave like NULL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeatureRow {
    values: HashMap<String, RawValue>,
}

impl RawFeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number(mut self, column: &str, value: f64) -> Self {
        self.values.insert(column.to_string(), RawValue::Number(value));
        self
    }

    pub fn flag(mut self, column: &str, value: bool) -> Self {
        self.values.insert(column.to_string(), RawValue::Flag(value));
        self
    }

    pub fn get(&self, column: &str) -> Option<RawValue> {
        self.values.get(column).copied()
    }

    /// Truthiness of a flag column, NULL and numbers other than 1.0 are false
    pub fn is_set(&self, column: &str) -> bool {
        match self.get(column) {
            Some(RawValue::Flag(b)) => b,
            Some(RawValue::Number(n)) => n == 1.0,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureVectorCodec;

impl FeatureVectorCodec {
    pub fn dimension(&self) -> usize {
        FEATURE_DIMENSION
    }

    /// Encode a raw row in column order
    pub fn encode(&self, row: &RawFeatureRow) -> FeatureVector {
        let components = FEATURE_COLUMNS
            .iter()
            .map(|column| match (column.kind, row.get(column.name)) {
                (_, None) => 0.0,
                (FeatureKind::Numeric, Some(RawValue::Number(n))) => n,
                (FeatureKind::Numeric, Some(RawValue::Flag(b))) => bool_component(b),
                (FeatureKind::Flag, Some(RawValue::Flag(b))) => bool_component(b),
                (FeatureKind::Flag, Some(RawValue::Number(n))) => bool_component(n == 1.0),
            })
            .collect();
        FeatureVector::new(components)
    }

    /// Decode a stored or transported vector, rejecting anything that is not
    /// exactly `FEATURE_DIMENSION` finite numbers
    pub fn decode(&self, raw: Vec<f64>) -> Result<FeatureVector> {
        if raw.len() != FEATURE_DIMENSION {
            return Err(AppError::MalformedVector {
                expected: FEATURE_DIMENSION,
                actual: raw.len(),
            });
        }
        if let Some(index) = raw.iter().position(|x| !x.is_finite()) {
            return Err(AppError::NonFiniteComponent { index });
        }
        Ok(FeatureVector::new(raw))
    }

    /// SQL expression assembling the vector server-side as `float8[]`
    ///
    /// Only the static column names above are embedded; `alias` is the
    /// table alias of the feature relation in the calling query.
    pub fn sql_projection(&self, alias: &str) -> String {
        let parts: Vec<String> = FEATURE_COLUMNS
            .iter()
            .map(|column| match column.kind {
                FeatureKind::Numeric => {
                    format!("coalesce({}.{}::float8, 0)", alias, column.name)
                }
                FeatureKind::Flag => {
                    format!(
                        "(case when coalesce({}.{}, false) then 1.0 else 0.0 end)::float8",
                        alias, column.name
                    )
                }
            })
            .collect();
        format!("ARRAY[{}]", parts.join(", "))
    }
}

fn bool_component(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
