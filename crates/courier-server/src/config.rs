use std::path::PathBuf;

use anyhow::Context;

pub const DEV_SECRET: &str = "dev-secret-change-me";

/// Process-wide configuration, read from the environment once at startup
/// and immutable afterwards. Everything downstream receives its piece by
/// injection, never by re-reading the environment.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub hash_work_factor: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("COURIER_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("COURIER_PORT must be a port number")?;
        let db_path =
            PathBuf::from(std::env::var("COURIER_DB_PATH").unwrap_or_else(|_| "courier.db".into()));
        let jwt_secret = std::env::var("COURIER_JWT_SECRET").unwrap_or_else(|_| DEV_SECRET.into());
        let token_ttl_days = std::env::var("COURIER_TOKEN_TTL_DAYS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .context("COURIER_TOKEN_TTL_DAYS must be a number of days")?;
        let hash_work_factor = match std::env::var("COURIER_HASH_WORK_FACTOR") {
            Ok(v) => v
                .parse()
                .context("COURIER_HASH_WORK_FACTOR must be a positive number")?,
            Err(_) => courier_auth::password::DEFAULT_WORK_FACTOR,
        };

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            token_ttl_days,
            hash_work_factor,
        })
    }
}
