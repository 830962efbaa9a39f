use std::sync::Arc;

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

use config::Config;
use services::{geocoding::GeocodingService, mailer::Mailer};
use storage::{minio::MinioClient, redis::RedisClient, AuthStore};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub redis: RedisClient,
    pub minio: MinioClient,
    pub config: Arc<Config>,
    pub ws_hub: Arc<api::websocket::WsHub>,
    pub auth_store: Arc<dyn AuthStore>,
    pub mailer: Arc<dyn Mailer>,
    pub geocoder: Arc<GeocodingService>,
}
