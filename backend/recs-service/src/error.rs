use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(
        "No seeds found for user_id={user_id}. Insert into analytics.int_user_seed_preferences first."
    )]
    NoSeeds { user_id: String },

    #[error("Invalid seed weights: {0}")]
    InvalidWeights(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Malformed feature vector: expected {expected} components, got {actual}")]
    MalformedVector { expected: usize, actual: usize },

    #[error("Malformed feature vector: component {index} is not a finite number")]
    NonFiniteComponent { index: usize },

    #[error("Feature store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Metadata API error: {0}")]
    MetadataApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        HttpResponse::build(code).json(ErrorResponse {
            error: self.to_string(),
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NoSeeds { .. } | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidWeights(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::MetadataApi(_) => StatusCode::BAD_GATEWAY,
            AppError::MalformedVector { .. }
            | AppError::NonFiniteComponent { .. }
            | AppError::StoreUnavailable(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl AppError {
    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NoSeeds { .. } => "no_seeds",
            AppError::InvalidWeights(_) => "invalid_weights",
            AppError::BadRequest(_) => "bad_request",
            AppError::MalformedVector { .. } | AppError::NonFiniteComponent { .. } => {
                "malformed_vector"
            }
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Timeout(_) => "timeout",
            AppError::NotFound(_) => "not_found",
            AppError::MetadataApi(_) => "metadata_api",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}
