use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::{AppState, APP_NAME};

/// GET /
#[get("/")]
pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "app": APP_NAME,
        "env": state.app_env,
        "health": "/healthz",
    }))
}

/// Always 200; reports whether the feature store answers
/// GET /healthz
#[get("/healthz")]
pub async fn healthz(state: web::Data<AppState>) -> HttpResponse {
    let database = if state.recommendations.store().ping().await {
        "ok"
    } else {
        "unreachable"
    };

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "database": database,
    }))
}
