use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use db_pool::{create_pool, DbConfig};
use recs_service::db::PgFeatureStore;
use recs_service::services::metadata::{MetadataClient, MetadataSettings};
use recs_service::services::recommendation::{PipelineSettings, RecommendationService};
use recs_service::{handlers, metrics, AppState, Config};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "recs-service";

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,actix_web=info"));

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.log_format);
    config.validate()?;

    info!(
        env = %config.app_env,
        batch_size = config.recs_batch_size,
        max_k = config.recs_max_k,
        "Starting recs-service"
    );

    // Feature store
    let db_config = DbConfig::with_url(SERVICE_NAME, config.database_url.clone());
    db_config.log_config();
    let pool = create_pool(db_config)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let store = Arc::new(PgFeatureStore::new(pool.clone()));

    let recommendations = RecommendationService::new(store, PipelineSettings::from(&config));
    let metadata = MetadataClient::new(MetadataSettings::from(&config))
        .context("Failed to build metadata API client")?;

    let state = web::Data::new(AppState {
        app_env: config.app_env.clone(),
        recommendations,
        metadata,
    });

    let origins = config.cors_origins();
    let bind_addr = (config.http_host.clone(), config.http_port);
    info!("Starting HTTP server on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);
        for origin in &origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(metrics::MetricsMiddleware)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(handlers::configure)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    // AppState (and with it the metadata client) is dropped with the server
    pool.close().await;
    info!("recs-service stopped");
    Ok(())
}
