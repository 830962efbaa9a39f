use std::env;
use std::time::Duration;

use anyhow::{bail, Context};

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub minio: MinioConfig,
    pub jwt: JwtConfig,
    pub tokens: TokenConfig,
    pub mail: MailConfig,
    pub geocoding: GeocodingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub public_url: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

#[derive(Debug, Clone)]
pub struct MinioConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub rooms_bucket: String,
    pub public_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub session_ttl: Duration,
    pub issuer: String,
}

/// Lifetimes of the one-time tokens issued by the sign-in flow.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub verification_ttl: Duration,
    pub two_factor_ttl: Duration,
    pub two_factor_length: usize,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Only optional in development, where mail is written to the log.
    pub service_url: Option<String>,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct GeocodingConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. The signing
    /// secret has no default: a missing or short `JWT_SECRET` is an error.
    /// Outside development a mail service is required too.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let parsed = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());

        let secret = lookup("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.len() < MIN_SECRET_LEN {
            bail!("JWT_SECRET must be at least {} bytes long", MIN_SECRET_LEN);
        }

        let port_of = |key: &str, default: u16| -> anyhow::Result<u16> {
            Ok(lookup(key)
                .map(|p| p.parse::<u16>())
                .transpose()
                .with_context(|| format!("{} is not a valid port", key))?
                .unwrap_or(default))
        };
        let port = port_of("SERVER_PORT", 8080)?;
        let db_port = port_of("DB_PORT", 5432)?;
        let redis_port = port_of("REDIS_PORT", 6379)?;

        let environment = var("ENVIRONMENT", "development");
        let mail_service_url = lookup("MAIL_SERVICE_URL").filter(|u| !u.trim().is_empty());
        if environment != "development" && mail_service_url.is_none() {
            bail!("MAIL_SERVICE_URL must be set outside development");
        }

        Ok(Config {
            server: ServerConfig {
                host: var("SERVER_HOST", "0.0.0.0"),
                port,
                environment,
                public_url: var("PUBLIC_URL", "http://localhost:3000"),
                max_upload_bytes: parsed("MAX_UPLOAD_BYTES").unwrap_or(20 * 1024 * 1024) as usize,
            },
            database: DatabaseConfig {
                host: var("DB_HOST", "localhost"),
                port: db_port,
                user: var("DB_USER", "postgres"),
                password: var("DB_PASSWORD", "postgres"),
                database: var("DB_NAME", "uniroom"),
                ssl_mode: var("DB_SSL_MODE", "disable"),
                max_connections: parsed("DB_MAX_CONNS").unwrap_or(25) as u32,
            },
            redis: RedisConfig {
                host: var("REDIS_HOST", "localhost"),
                port: redis_port,
                password: lookup("REDIS_PASSWORD"),
                db: parsed("REDIS_DB").unwrap_or(0) as i64,
            },
            minio: MinioConfig {
                endpoint: var("MINIO_ENDPOINT", "http://localhost:9000"),
                access_key: var("MINIO_ACCESS_KEY", "minioadmin"),
                secret_key: var("MINIO_SECRET_KEY", "minioadmin"),
                region: var("MINIO_REGION", "us-east-1"),
                rooms_bucket: var("MINIO_ROOMS_BUCKET", "rooms"),
                public_url: lookup("MINIO_PUBLIC_URL"),
            },
            jwt: JwtConfig {
                secret,
                session_ttl: Duration::from_secs(
                    parsed("JWT_SESSION_TTL").unwrap_or(30 * 24 * 60 * 60), // 30 days
                ),
                issuer: var("JWT_ISSUER", "uniroom"),
            },
            tokens: TokenConfig {
                verification_ttl: Duration::from_secs(
                    parsed("VERIFICATION_TOKEN_TTL").unwrap_or(60 * 60), // 1 hour
                ),
                two_factor_ttl: Duration::from_secs(
                    parsed("TWO_FACTOR_TOKEN_TTL").unwrap_or(5 * 60), // 5 minutes
                ),
                two_factor_length: 6,
            },
            mail: MailConfig {
                service_url: mail_service_url,
                sender: var("MAIL_SENDER", "no-reply@uniroom.app"),
            },
            geocoding: GeocodingConfig {
                endpoint: var(
                    "GEOCODING_ENDPOINT",
                    "https://maps.googleapis.com/maps/api/geocode/json",
                ),
                api_key: lookup("GOOGLE_MAPS_API_KEY"),
                timeout: Duration::from_secs(parsed("GEOCODING_TIMEOUT").unwrap_or(5)),
            },
        })
    }

    pub fn is_development(&self) -> bool {
        self.server.environment == "development"
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.database.user,
            self.database.password,
            self.database.host,
            self.database.port,
            self.database.database,
            self.database.ssl_mode
        )
    }

    pub fn redis_url(&self) -> String {
        match &self.redis.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.redis.host, self.redis.port, self.redis.db
            ),
            None => format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.db
            ),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| match key {
            "JWT_SECRET" => Some("test-secret-that-is-long-enough-for-hs256".to_string()),
            _ => None,
        })
        .expect("test config")
    }
}
