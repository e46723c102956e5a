// Scope value objects

use serde::{Deserialize, Serialize};

/// Aggregation scope of a counters row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterScope {
    Career,
    Season,
}

impl CounterScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterScope::Career => "career",
            CounterScope::Season => "season",
        }
    }
}

/// Scope a rule fires over; decides which id becomes the award's scope key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    PerGame,
    Season,
    Career,
}

impl RuleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleScope::PerGame => "per_game",
            RuleScope::Season => "season",
            RuleScope::Career => "career",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "per_game" => Some(RuleScope::PerGame),
            "season" => Some(RuleScope::Season),
            "career" => Some(RuleScope::Career),
            _ => None,
        }
    }
}
