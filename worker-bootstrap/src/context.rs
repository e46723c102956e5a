use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use worker_application::{AppState, Metrics};
use worker_infrastructure::{
    ensure_schema, AppConfig, BadgeService, PgAwardRepository, PgCounterRepository,
    PgEventRepository, PgQueueRepository, PgRuleRepository,
};

/// Owns the process-scoped clients (one pool, one bucket) and hands the
/// assembled services bundle to the loop and the HTTP layer.
pub struct AppContext {
    pub state: AppState,
    pub pool: PgPool,
}

impl AppContext {
    pub async fn new() -> Result<Self> {
        let config = AppConfig::load().await?;
        let runtime_config = config.to_runtime_config();
        let db_config = config.to_db_config();
        let object_store_config = config.to_object_store_config();

        let pool = PgPoolOptions::new()
            .max_connections(db_config.max_connections)
            .idle_timeout(Duration::from_secs(db_config.idle_timeout_seconds))
            .acquire_timeout(Duration::from_secs(db_config.acquire_timeout_seconds))
            .connect(&db_config.database_url)
            .await?;
        ensure_schema(&pool).await?;

        let badge_service = BadgeService::new(&object_store_config, &runtime_config.public_base_url)?;

        let state = AppState {
            queue_repo: Arc::new(PgQueueRepository::new(
                pool.clone(),
                runtime_config.max_attempts,
                runtime_config.lease_ttl_minutes,
            )),
            event_repo: Arc::new(PgEventRepository::new(pool.clone())),
            counter_repo: Arc::new(PgCounterRepository::new(pool.clone())),
            rule_repo: Arc::new(PgRuleRepository::new(pool.clone())),
            award_repo: Arc::new(PgAwardRepository::new(pool.clone())),
            badge_publisher: Arc::new(badge_service),
            metrics: Arc::new(Metrics::default()),
            config: runtime_config,
        };

        Ok(Self { state, pool })
    }
}
