use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{
    AwardRecord, CounterSnapshot, NewAward, PerGameStats, QueueEvent, QueueItem, Rule,
};

/// Lease-based access to the event queue. All four operations may fail
/// with a transient store error; the supervisor treats that as a
/// loop-level failure and sleeps before the next claim.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Claims up to `limit` visible items, oldest first. Concurrent
    /// callers never receive overlapping rows.
    async fn claim_batch(&self, limit: i64) -> anyhow::Result<Vec<QueueItem>>;
    /// Bulk processing -> done. Ids no longer in processing are skipped.
    async fn mark_done(&self, queue_ids: &[i64]) -> anyhow::Result<()>;
    /// Reschedules one item with backoff, or parks it in `error` once
    /// attempts are exhausted.
    async fn mark_retry(&self, queue_id: i64, error_message: &str) -> anyhow::Result<()>;
    /// Visible backlog size. Health reporting only, never control flow.
    async fn queue_lag(&self) -> anyhow::Result<i64>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn load_events(&self, event_ids: &[String]) -> anyhow::Result<Vec<QueueEvent>>;
}

#[async_trait]
pub trait CounterRepository: Send + Sync {
    async fn update_career(&self, player_id: &str, stats: &PerGameStats) -> anyhow::Result<()>;
    async fn update_season(
        &self,
        player_id: &str,
        season_id: &str,
        stats: &PerGameStats,
    ) -> anyhow::Result<()>;
    async fn fetch(
        &self,
        player_id: &str,
        season_id: Option<&str>,
    ) -> anyhow::Result<CounterSnapshot>;
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Active rules whose filters accept the arguments, rule_id ascending.
    async fn fetch_candidate_rules(
        &self,
        game_year: Option<&str>,
        league_id: Option<&str>,
        season_id: Option<&str>,
    ) -> anyhow::Result<Vec<Rule>>;
}

#[async_trait]
pub trait AwardRepository: Send + Sync {
    /// Inserts a new ledger row. `None` means the idempotency tuple
    /// already exists and is the normal already-awarded signal.
    async fn insert_award(&self, award: &NewAward) -> anyhow::Result<Option<Uuid>>;
    /// Looks up the existing row for a tuple, so a retried item can
    /// finish badge attachment for an award inserted on an earlier pass.
    async fn find_award(
        &self,
        player_id: &str,
        rule_id: i64,
        scope_key: Option<&str>,
        level: i32,
    ) -> anyhow::Result<Option<AwardRecord>>;
    /// Last writer wins; concurrent re-renders of one award produce the
    /// same URL by construction.
    async fn attach_asset_url(&self, award_id: Uuid, url: &str) -> anyhow::Result<()>;
}
