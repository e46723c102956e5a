// In-memory port implementations for pipeline and supervisor tests.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use worker_domain::ports::{
    AwardRepository, BadgePublisher, CounterRepository, EventRepository, QueueRepository,
    RuleRepository,
};
use worker_domain::{
    retry_backoff_minutes, AwardRecord, CounterScope, CounterSnapshot, NewAward, PerGameStats,
    PlayerCounters, QueueEvent, QueueItem, QueueStatus, Rule, RuleScope, RuntimeConfig,
    EVENT_TYPE_PLAYER_STAT,
};

use crate::{AppState, Metrics};

#[derive(Debug, Clone)]
pub struct QueueRow {
    pub queue_id: i64,
    pub event_id: String,
    pub status: QueueStatus,
    pub attempts: i32,
    pub visible_at: chrono::DateTime<Utc>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredAward {
    pub award_id: Uuid,
    pub award: NewAward,
    pub asset_svg_url: Option<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    queue: Mutex<Vec<QueueRow>>,
    events: Mutex<Vec<QueueEvent>>,
    counters: Mutex<Vec<PlayerCounters>>,
    rules: Mutex<Vec<Rule>>,
    awards: Mutex<Vec<StoredAward>>,
    next_queue_id: AtomicI64,
    pub max_attempts: i32,
}

impl MemoryStore {
    pub fn with_max_attempts(max_attempts: i32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    fn effective_max_attempts(&self) -> i32 {
        if self.max_attempts > 0 {
            self.max_attempts
        } else {
            10
        }
    }

    pub fn push_queue_item(&self, event_id: &str) -> i64 {
        let queue_id = self.next_queue_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.queue.lock().unwrap().push(QueueRow {
            queue_id,
            event_id: event_id.to_string(),
            status: QueueStatus::Queued,
            attempts: 0,
            visible_at: Utc::now(),
            last_error: None,
        });
        queue_id
    }

    pub fn push_event(&self, event: QueueEvent) -> i64 {
        let queue_id = self.push_queue_item(&event.event_id);
        self.events.lock().unwrap().push(event);
        queue_id
    }

    pub fn push_stat_event(&self, event_id: &str, player_id: &str, payload: serde_json::Value) {
        self.push_event(QueueEvent {
            event_id: event_id.to_string(),
            event_type: EVENT_TYPE_PLAYER_STAT.to_string(),
            payload,
            player_id: Some(player_id.to_string()),
            match_id: Some(format!("m-{event_id}")),
            season_id: Some("s1".to_string()),
            league_id: None,
            game_year: None,
            occurred_at: Utc::now(),
        });
    }

    pub fn push_rule(&self, rule: Rule) {
        self.rules.lock().unwrap().push(rule);
    }

    pub fn fifty_point_rule() -> Rule {
        Rule {
            rule_id: 1,
            title: "50 Bomb".to_string(),
            tier: "Gold".to_string(),
            scope: RuleScope::PerGame,
            predicate: json!({">=": ["per_game.points", 50]}),
            is_active: true,
            game_year: None,
            league_id: None,
            season_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn queue_rows(&self) -> Vec<QueueRow> {
        self.queue.lock().unwrap().clone()
    }

    pub fn awards(&self) -> Vec<StoredAward> {
        self.awards.lock().unwrap().clone()
    }

    pub fn counters_for(&self, player_id: &str, scope: CounterScope) -> Option<PlayerCounters> {
        self.counters
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.player_id == player_id && row.scope == scope)
            .cloned()
    }

    fn upsert_counters(
        &self,
        player_id: &str,
        scope: CounterScope,
        season_id: Option<&str>,
        stats: &PerGameStats,
    ) {
        let mut rows = self.counters.lock().unwrap();
        match rows.iter_mut().find(|row| {
            row.player_id == player_id
                && row.scope == scope
                && row.season_id.as_deref() == season_id
        }) {
            Some(row) => row.absorb_game(stats),
            None => rows.push(PlayerCounters::from_game(player_id, scope, season_id, stats)),
        }
    }
}

#[async_trait]
impl QueueRepository for MemoryStore {
    async fn claim_batch(&self, limit: i64) -> anyhow::Result<Vec<QueueItem>> {
        let now = Utc::now();
        let mut rows = self.queue.lock().unwrap();
        let mut claimed = Vec::new();
        for row in rows
            .iter_mut()
            .filter(|row| row.status == QueueStatus::Queued && row.visible_at <= now)
            .take(limit.max(0) as usize)
        {
            row.status = QueueStatus::Processing;
            claimed.push(QueueItem {
                queue_id: row.queue_id,
                event_id: row.event_id.clone(),
            });
        }
        claimed.sort_by_key(|item| item.queue_id);
        Ok(claimed)
    }

    async fn mark_done(&self, queue_ids: &[i64]) -> anyhow::Result<()> {
        let mut rows = self.queue.lock().unwrap();
        for row in rows.iter_mut() {
            if queue_ids.contains(&row.queue_id) && row.status == QueueStatus::Processing {
                row.status = QueueStatus::Done;
            }
        }
        Ok(())
    }

    async fn mark_retry(&self, queue_id: i64, error_message: &str) -> anyhow::Result<()> {
        let max_attempts = self.effective_max_attempts();
        let mut rows = self.queue.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|row| row.queue_id == queue_id) else {
            bail!("queue item {queue_id} not found");
        };
        row.attempts += 1;
        row.last_error = Some(error_message.to_string());
        if row.attempts >= max_attempts {
            row.status = QueueStatus::Error;
        } else {
            row.status = QueueStatus::Queued;
            row.visible_at = Utc::now() + Duration::minutes(retry_backoff_minutes(row.attempts));
        }
        Ok(())
    }

    async fn queue_lag(&self) -> anyhow::Result<i64> {
        let now = Utc::now();
        Ok(self
            .queue
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.status == QueueStatus::Queued && row.visible_at <= now)
            .count() as i64)
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn load_events(&self, event_ids: &[String]) -> anyhow::Result<Vec<QueueEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event_ids.contains(&event.event_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CounterRepository for MemoryStore {
    async fn update_career(&self, player_id: &str, stats: &PerGameStats) -> anyhow::Result<()> {
        self.upsert_counters(player_id, CounterScope::Career, None, stats);
        Ok(())
    }

    async fn update_season(
        &self,
        player_id: &str,
        season_id: &str,
        stats: &PerGameStats,
    ) -> anyhow::Result<()> {
        self.upsert_counters(player_id, CounterScope::Season, Some(season_id), stats);
        Ok(())
    }

    async fn fetch(
        &self,
        player_id: &str,
        season_id: Option<&str>,
    ) -> anyhow::Result<CounterSnapshot> {
        let rows = self.counters.lock().unwrap();
        Ok(CounterSnapshot {
            career: rows
                .iter()
                .find(|row| row.player_id == player_id && row.scope == CounterScope::Career)
                .cloned(),
            season: season_id.and_then(|season_id| {
                rows.iter()
                    .find(|row| {
                        row.player_id == player_id
                            && row.scope == CounterScope::Season
                            && row.season_id.as_deref() == Some(season_id)
                    })
                    .cloned()
            }),
        })
    }
}

#[async_trait]
impl RuleRepository for MemoryStore {
    async fn fetch_candidate_rules(
        &self,
        game_year: Option<&str>,
        league_id: Option<&str>,
        season_id: Option<&str>,
    ) -> anyhow::Result<Vec<Rule>> {
        let mut rules: Vec<Rule> = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|rule| rule.applies_to(game_year, league_id, season_id))
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.rule_id);
        Ok(rules)
    }
}

#[async_trait]
impl AwardRepository for MemoryStore {
    async fn insert_award(&self, award: &NewAward) -> anyhow::Result<Option<Uuid>> {
        let mut awards = self.awards.lock().unwrap();
        let exists = awards.iter().any(|stored| {
            stored.award.player_id == award.player_id
                && stored.award.rule_id == award.rule_id
                && stored.award.scope_key == award.scope_key
                && stored.award.level == award.level
        });
        if exists {
            return Ok(None);
        }
        let award_id = Uuid::new_v4();
        awards.push(StoredAward {
            award_id,
            award: award.clone(),
            asset_svg_url: None,
        });
        Ok(Some(award_id))
    }

    async fn find_award(
        &self,
        player_id: &str,
        rule_id: i64,
        scope_key: Option<&str>,
        level: i32,
    ) -> anyhow::Result<Option<AwardRecord>> {
        Ok(self
            .awards
            .lock()
            .unwrap()
            .iter()
            .find(|stored| {
                stored.award.player_id == player_id
                    && stored.award.rule_id == rule_id
                    && stored.award.scope_key.as_deref() == scope_key
                    && stored.award.level == level
            })
            .map(|stored| AwardRecord {
                award_id: stored.award_id,
                asset_svg_url: stored.asset_svg_url.clone(),
            }))
    }

    async fn attach_asset_url(&self, award_id: Uuid, url: &str) -> anyhow::Result<()> {
        let mut awards = self.awards.lock().unwrap();
        let Some(stored) = awards.iter_mut().find(|stored| stored.award_id == award_id) else {
            bail!("award {award_id} not found");
        };
        stored.asset_svg_url = Some(url.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPublisher {
    pub uploads: Mutex<Vec<String>>,
    failures_left: AtomicUsize,
}

impl MemoryPublisher {
    pub fn failing(times: usize) -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(times),
        }
    }
}

#[async_trait]
impl BadgePublisher for MemoryPublisher {
    async fn generate_and_upload(
        &self,
        award_id: Uuid,
        award: &NewAward,
    ) -> anyhow::Result<String> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            bail!("object store unavailable");
        }
        let key = format!("badges/{}/{}.svg", award.player_id, award_id);
        self.uploads.lock().unwrap().push(key.clone());
        Ok(format!("https://cdn.test/{key}"))
    }
}

mod tests {
    use super::*;

    #[tokio::test]
    async fn retry_walks_the_backoff_schedule_then_exhausts() {
        let store = MemoryStore::with_max_attempts(3);
        let queue_id = store.push_queue_item("e1");
        store.claim_batch(10).await.unwrap();

        let before = Utc::now();
        store.mark_retry(queue_id, "boom").await.unwrap();
        let row = store.queue_rows().remove(0);
        assert_eq!(row.status, QueueStatus::Queued);
        assert_eq!(row.attempts, 1);
        assert!(row.visible_at >= before + Duration::minutes(2));
        assert!(row.visible_at <= Utc::now() + Duration::minutes(2));

        store.mark_retry(queue_id, "boom").await.unwrap();
        let row = store.queue_rows().remove(0);
        assert_eq!(row.attempts, 2);
        assert!(row.visible_at >= before + Duration::minutes(4));

        store.mark_retry(queue_id, "boom again").await.unwrap();
        let row = store.queue_rows().remove(0);
        assert_eq!(row.status, QueueStatus::Error);
        assert_eq!(row.attempts, 3);
        assert_eq!(row.last_error.as_deref(), Some("boom again"));
    }

    #[tokio::test]
    async fn backed_off_items_are_invisible_to_claim_and_lag() {
        let store = MemoryStore::default();
        let queue_id = store.push_queue_item("e1");
        store.claim_batch(10).await.unwrap();
        store.mark_retry(queue_id, "boom").await.unwrap();

        assert!(store.claim_batch(10).await.unwrap().is_empty());
        assert_eq!(store.queue_lag().await.unwrap(), 0);
    }
}

pub fn test_state(store: Arc<MemoryStore>, publisher: Arc<MemoryPublisher>) -> AppState {
    AppState {
        config: RuntimeConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            public_base_url: "https://cdn.test".to_string(),
            batch_size: 50,
            poll_interval_ms: 10,
            max_attempts: 10,
            lease_ttl_minutes: 15,
            request_timeout_seconds: 5,
        },
        queue_repo: store.clone(),
        event_repo: store.clone(),
        counter_repo: store.clone(),
        rule_repo: store.clone(),
        award_repo: store,
        badge_publisher: publisher,
        metrics: Arc::new(Metrics::default()),
    }
}
