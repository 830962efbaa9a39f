use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uniroom_backend::{
    api,
    config::Config,
    services::{geocoding::GeocodingService, mailer},
    storage::{minio::MinioClient, redis::RedisClient, PgAuthStore},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uniroom_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; a missing signing secret stops here
    let config = Config::load()?;
    tracing::info!("Starting server in {} mode", config.server.environment);

    let db = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database_url())
        .await?;
    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("Database migrations completed");

    let redis = RedisClient::new(&config.redis_url()).await?;
    tracing::info!("Connected to Redis");

    let minio = MinioClient::new(&config.minio).await?;
    minio.ensure_rooms_bucket().await?;
    tracing::info!("Connected to MinIO");

    let ws_hub = Arc::new(api::websocket::WsHub::new(redis.clone()));
    let hub_clone = ws_hub.clone();
    tokio::spawn(async move {
        hub_clone.run().await;
    });

    let mailer = mailer::from_config(&config.mail, config.is_development());
    let max_upload_bytes = config.server.max_upload_bytes;

    let state = AppState {
        auth_store: Arc::new(PgAuthStore::new(db.clone())),
        geocoder: Arc::new(GeocodingService::new(config.geocoding.clone())),
        db,
        redis,
        minio,
        config: Arc::new(config.clone()),
        ws_hub,
        mailer,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api::router::create_router(state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
