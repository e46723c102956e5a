use std::sync::Arc;

use worker_domain::ports::{
    AwardRepository, BadgePublisher, CounterRepository, EventRepository, QueueRepository,
    RuleRepository,
};
use worker_domain::RuntimeConfig;

use crate::Metrics;

/// The injected services bundle. Every component receives this instead of
/// reaching for process-wide singletons; lifetime is bounded by the
/// bootstrap context.
#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub queue_repo: Arc<dyn QueueRepository>,
    pub event_repo: Arc<dyn EventRepository>,
    pub counter_repo: Arc<dyn CounterRepository>,
    pub rule_repo: Arc<dyn RuleRepository>,
    pub award_repo: Arc<dyn AwardRepository>,
    pub badge_publisher: Arc<dyn BadgePublisher>,
    pub metrics: Arc<Metrics>,
}
