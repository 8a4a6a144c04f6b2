/// Recs Service Library
///
/// Content-based title recommendations from a user's weighted seed set,
/// plus metadata-API backed statistics routes.
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

use services::{MetadataClient, RecommendationService};

pub const APP_NAME: &str = "CineGraph API";

/// Shared application state handed to every handler via `web::Data`
pub struct AppState {
    pub app_env: String,
    pub recommendations: RecommendationService,
    pub metadata: MetadataClient,
}
