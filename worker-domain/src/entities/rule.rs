// Achievement rule entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value_objects::RuleScope;

/// A declarative achievement rule. The predicate is an expression tree
/// authored outside the worker; the optional filter fields narrow which
/// events the rule applies to (unset means everywhere).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: i64,
    pub title: String,
    pub tier: String,
    pub scope: RuleScope,
    pub predicate: Value,
    pub is_active: bool,
    pub game_year: Option<String>,
    pub league_id: Option<String>,
    pub season_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// An inactive or filter-mismatched rule never fires. The registry
    /// query already applies this; kept here for in-process filtering.
    pub fn applies_to(
        &self,
        game_year: Option<&str>,
        league_id: Option<&str>,
        season_id: Option<&str>,
    ) -> bool {
        self.is_active
            && filter_matches(self.game_year.as_deref(), game_year)
            && filter_matches(self.league_id.as_deref(), league_id)
            && filter_matches(self.season_id.as_deref(), season_id)
    }
}

fn filter_matches(rule_filter: Option<&str>, argument: Option<&str>) -> bool {
    match rule_filter {
        None => true,
        Some(wanted) => argument == Some(wanted),
    }
}
