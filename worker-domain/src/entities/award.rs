// Award entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::entities::event::QueueEvent;
use crate::value_objects::RuleScope;

pub const AWARD_ISSUER: &str = "achievements-worker";
pub const AWARD_VERSION: i32 = 1;
pub const DEFAULT_AWARD_LEVEL: i32 = 1;

/// A row the worker wants to insert into the ledger. Logical identity is
/// (player_id, rule_id, scope_key, level); the store enforces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAward {
    pub player_id: String,
    pub rule_id: i64,
    pub scope_key: Option<String>,
    pub level: i32,
    pub title: String,
    pub tier: String,
    pub match_id: Option<String>,
    pub season_id: Option<String>,
    pub league_id: Option<String>,
    pub game_year: Option<String>,
    pub awarded_at: DateTime<Utc>,
    pub stats: Value,
    pub issuer: String,
    pub version: i32,
}

/// The slice of an existing ledger row the pipeline needs when an insert
/// hits the idempotency tuple: whether a badge is still owed.
#[derive(Debug, Clone)]
pub struct AwardRecord {
    pub award_id: Uuid,
    pub asset_svg_url: Option<String>,
}

impl RuleScope {
    /// Which event id distinguishes awardable contexts in this scope.
    /// Career rules award once per player and carry no key.
    pub fn scope_key(&self, event: &QueueEvent) -> Option<String> {
        match self {
            RuleScope::PerGame => event.match_id.clone(),
            RuleScope::Season => event.season_id.clone(),
            RuleScope::Career => None,
        }
    }
}

/// The stats snapshot stored with an award: the full evaluation context at
/// the moment of firing plus the predicate that fired.
pub fn build_stats_snapshot(
    per_game: &Map<String, Value>,
    season: &Map<String, Value>,
    career: &Map<String, Value>,
    predicate: &Value,
) -> Value {
    let mut snapshot = Map::new();
    snapshot.insert("per_game".to_string(), Value::Object(per_game.clone()));
    snapshot.insert("season".to_string(), Value::Object(season.clone()));
    snapshot.insert("career".to_string(), Value::Object(career.clone()));
    snapshot.insert("rule_predicate".to_string(), predicate.clone());
    Value::Object(snapshot)
}
