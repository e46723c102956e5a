use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use worker_domain::{DbConfig, ObjectStoreConfig, RuntimeConfig};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_idle_timeout_seconds: u64,
    pub db_acquire_timeout_seconds: u64,
    pub object_store_endpoint: String,
    pub object_store_region: String,
    pub object_store_access_key: String,
    pub object_store_secret_key: String,
    pub object_store_bucket: String,
    pub public_base_url: String,
    pub batch_size: i64,
    pub poll_interval_ms: u64,
    pub max_attempts: i32,
    pub lease_ttl_minutes: i64,
    pub request_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8090".to_string(),
            database_url: String::new(),
            db_max_connections: 20,
            db_idle_timeout_seconds: 30,
            db_acquire_timeout_seconds: 10,
            object_store_endpoint: "http://127.0.0.1:9000".to_string(),
            object_store_region: "us-east-1".to_string(),
            object_store_access_key: String::new(),
            object_store_secret_key: String::new(),
            object_store_bucket: "badges".to_string(),
            public_base_url: String::new(),
            batch_size: 50,
            poll_interval_ms: 1000,
            max_attempts: 10,
            lease_ttl_minutes: 15,
            request_timeout_seconds: 15,
        }
    }
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var("ACHV_CONFIG").unwrap_or_else(|_| "./config.toml".to_string());
        let file_path = Path::new(&path);
        if !file_path.exists() {
            warn!("config.toml not found, using defaults and environment");
            let mut config = AppConfig::default();
            config.apply_env_overrides();
            config.normalize();
            config.validate()?;
            return Ok(config);
        }
        let content = fs::read_to_string(file_path).await?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn normalize(&mut self) {
        self.database_url = self.database_url.trim().to_string();
        self.public_base_url = self
            .public_base_url
            .trim()
            .trim_end_matches('/')
            .to_string();
        self.object_store_endpoint = self
            .object_store_endpoint
            .trim()
            .trim_end_matches('/')
            .to_string();
        self.object_store_bucket = self.object_store_bucket.trim().to_string();
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|err| anyhow!("invalid bind_addr: {}", err))?;
        if self.database_url.is_empty() {
            return Err(anyhow!("database_url must be set"));
        }
        if self.object_store_access_key.is_empty() || self.object_store_secret_key.is_empty() {
            return Err(anyhow!("object store credentials must be set"));
        }
        if self.object_store_bucket.is_empty() {
            return Err(anyhow!("object_store_bucket must not be empty"));
        }
        if self.public_base_url.is_empty() {
            return Err(anyhow!("public_base_url must not be empty"));
        }
        if self.batch_size <= 0 {
            return Err(anyhow!("batch_size must be greater than 0"));
        }
        if self.max_attempts <= 0 {
            return Err(anyhow!("max_attempts must be greater than 0"));
        }
        if self.lease_ttl_minutes <= 0 {
            return Err(anyhow!("lease_ttl_minutes must be greater than 0"));
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            bind_addr: self.bind_addr.clone(),
            public_base_url: self.public_base_url.clone(),
            batch_size: self.batch_size,
            poll_interval_ms: self.poll_interval_ms,
            max_attempts: self.max_attempts,
            lease_ttl_minutes: self.lease_ttl_minutes,
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }

    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            database_url: self.database_url.clone(),
            max_connections: self.db_max_connections,
            idle_timeout_seconds: self.db_idle_timeout_seconds,
            acquire_timeout_seconds: self.db_acquire_timeout_seconds,
        }
    }

    pub fn to_object_store_config(&self) -> ObjectStoreConfig {
        ObjectStoreConfig {
            endpoint: self.object_store_endpoint.clone(),
            region: self.object_store_region.clone(),
            access_key: self.object_store_access_key.clone(),
            secret_key: self.object_store_secret_key.clone(),
            bucket: self.object_store_bucket.clone(),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("ACHV_BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Ok(value) = env::var("ACHV_DATABASE_URL") {
            self.database_url = value;
        }
        if let Ok(value) = env::var("ACHV_DB_MAX_CONNECTIONS") {
            self.db_max_connections = value.parse().unwrap_or(self.db_max_connections);
        }
        if let Ok(value) = env::var("ACHV_DB_IDLE_TIMEOUT_SECONDS") {
            self.db_idle_timeout_seconds = value.parse().unwrap_or(self.db_idle_timeout_seconds);
        }
        if let Ok(value) = env::var("ACHV_DB_ACQUIRE_TIMEOUT_SECONDS") {
            self.db_acquire_timeout_seconds =
                value.parse().unwrap_or(self.db_acquire_timeout_seconds);
        }
        if let Ok(value) = env::var("ACHV_OBJECT_STORE_ENDPOINT") {
            self.object_store_endpoint = value;
        }
        if let Ok(value) = env::var("ACHV_OBJECT_STORE_REGION") {
            self.object_store_region = value;
        }
        if let Ok(value) = env::var("ACHV_OBJECT_STORE_ACCESS_KEY") {
            self.object_store_access_key = value;
        }
        if let Ok(value) = env::var("ACHV_OBJECT_STORE_SECRET_KEY") {
            self.object_store_secret_key = value;
        }
        if let Ok(value) = env::var("ACHV_OBJECT_STORE_BUCKET") {
            self.object_store_bucket = value;
        }
        if let Ok(value) = env::var("ACHV_PUBLIC_BASE_URL") {
            self.public_base_url = value;
        }
        if let Ok(value) = env::var("ACHV_BATCH_SIZE") {
            self.batch_size = value.parse().unwrap_or(self.batch_size);
        }
        if let Ok(value) = env::var("ACHV_POLL_INTERVAL_MS") {
            self.poll_interval_ms = value.parse().unwrap_or(self.poll_interval_ms);
        }
        if let Ok(value) = env::var("ACHV_MAX_ATTEMPTS") {
            self.max_attempts = value.parse().unwrap_or(self.max_attempts);
        }
        if let Ok(value) = env::var("ACHV_LEASE_TTL_MINUTES") {
            self.lease_ttl_minutes = value.parse().unwrap_or(self.lease_ttl_minutes);
        }
        if let Ok(value) = env::var("ACHV_REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = value.parse().unwrap_or(self.request_timeout_seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/achievements".to_string(),
            object_store_access_key: "minio".to_string(),
            object_store_secret_key: "minio123".to_string(),
            public_base_url: "https://cdn.example.com".to_string(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn complete_config_validates() {
        assert!(complete_config().validate().is_ok());
    }

    #[test]
    fn missing_required_fields_fail_validation() {
        let mut config = complete_config();
        config.database_url = String::new();
        assert!(config.validate().is_err());

        let mut config = complete_config();
        config.object_store_secret_key = String::new();
        assert!(config.validate().is_err());

        let mut config = complete_config();
        config.public_base_url = String::new();
        assert!(config.validate().is_err());

        let mut config = complete_config();
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn normalize_strips_trailing_slashes() {
        let mut config = complete_config();
        config.public_base_url = "https://cdn.example.com/ ".to_string();
        config.object_store_endpoint = "http://127.0.0.1:9000/".to_string();
        config.normalize();
        assert_eq!(config.public_base_url, "https://cdn.example.com");
        assert_eq!(config.object_store_endpoint, "http://127.0.0.1:9000");
    }
}
