pub mod auth_store;
#[cfg(test)]
pub mod memory;
pub mod minio;
pub mod redis;

pub use auth_store::{AuthStore, PgAuthStore};
