// Event and queue item entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runs the full stat pipeline.
pub const EVENT_TYPE_PLAYER_STAT: &str = "player_stat_event";
/// Accepted and drained without side effects.
pub const EVENT_TYPE_MATCH: &str = "match_event";

/// An immutable record produced by the upstream feed. The worker never
/// writes to the events table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub player_id: Option<String>,
    pub match_id: Option<String>,
    pub season_id: Option<String>,
    pub league_id: Option<String>,
    pub game_year: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// A claimed lease over one event. Only the claim columns travel with the
/// worker; lifecycle bookkeeping stays in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub queue_id: i64,
    pub event_id: String,
}
