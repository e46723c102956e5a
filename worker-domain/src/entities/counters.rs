// Player counters entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::stats::{json_number, PerGameStats};
use crate::value_objects::CounterScope;

/// Achievement flags derivable from a single stat line. Once a flag is set
/// on a counters row it never clears.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFlags {
    pub has_50pt_game: bool,
    pub has_double_double: bool,
    pub has_triple_double: bool,
}

impl GameFlags {
    pub fn derive(stats: &PerGameStats) -> Self {
        let doubles = [stats.points, stats.ast, stats.reb, stats.stl, stats.blk]
            .iter()
            .filter(|v| **v >= 10.0)
            .count();
        Self {
            has_50pt_game: stats.points >= 50.0,
            has_double_double: doubles >= 2,
            has_triple_double: doubles >= 3,
        }
    }
}

/// One aggregate row, career or season. Uniquely keyed by
/// (player_id, scope, season_id); season_id is null exactly for career.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerCounters {
    pub player_id: String,
    pub scope: CounterScope,
    pub season_id: Option<String>,
    pub games_played: i64,
    pub pts_total: f64,
    pub ast_total: f64,
    pub reb_total: f64,
    pub stl_total: f64,
    pub blk_total: f64,
    pub tov_total: f64,
    pub minutes_total: f64,
    pub fgm_total: f64,
    pub fga_total: f64,
    pub tpm_total: f64,
    pub tpa_total: f64,
    pub ftm_total: f64,
    pub fta_total: f64,
    pub has_50pt_game: bool,
    pub has_double_double: bool,
    pub has_triple_double: bool,
    pub max_pts_game: f64,
    pub max_ast_game: f64,
    pub max_reb_game: f64,
    pub max_stl_game: f64,
    pub max_blk_game: f64,
}

impl PlayerCounters {
    /// The row produced by a player's first recorded game in a scope.
    pub fn from_game(
        player_id: &str,
        scope: CounterScope,
        season_id: Option<&str>,
        stats: &PerGameStats,
    ) -> Self {
        let flags = GameFlags::derive(stats);
        Self {
            player_id: player_id.to_string(),
            scope,
            season_id: season_id.map(ToString::to_string),
            games_played: 1,
            pts_total: stats.points,
            ast_total: stats.ast,
            reb_total: stats.reb,
            stl_total: stats.stl,
            blk_total: stats.blk,
            tov_total: stats.tov,
            minutes_total: stats.minutes,
            fgm_total: stats.fgm,
            fga_total: stats.fga,
            tpm_total: stats.tpm,
            tpa_total: stats.tpa,
            ftm_total: stats.ftm,
            fta_total: stats.fta,
            has_50pt_game: flags.has_50pt_game,
            has_double_double: flags.has_double_double,
            has_triple_double: flags.has_triple_double,
            max_pts_game: stats.points,
            max_ast_game: stats.ast,
            max_reb_game: stats.reb,
            max_stl_game: stats.stl,
            max_blk_game: stats.blk,
        }
    }

    /// Folds one more game into the row: totals add, maxima take the
    /// greater value, flags only ever turn on.
    pub fn absorb_game(&mut self, stats: &PerGameStats) {
        let flags = GameFlags::derive(stats);
        self.games_played += 1;
        self.pts_total += stats.points;
        self.ast_total += stats.ast;
        self.reb_total += stats.reb;
        self.stl_total += stats.stl;
        self.blk_total += stats.blk;
        self.tov_total += stats.tov;
        self.minutes_total += stats.minutes;
        self.fgm_total += stats.fgm;
        self.fga_total += stats.fga;
        self.tpm_total += stats.tpm;
        self.tpa_total += stats.tpa;
        self.ftm_total += stats.ftm;
        self.fta_total += stats.fta;
        self.has_50pt_game |= flags.has_50pt_game;
        self.has_double_double |= flags.has_double_double;
        self.has_triple_double |= flags.has_triple_double;
        self.max_pts_game = self.max_pts_game.max(stats.points);
        self.max_ast_game = self.max_ast_game.max(stats.ast);
        self.max_reb_game = self.max_reb_game.max(stats.reb);
        self.max_stl_game = self.max_stl_game.max(stats.stl);
        self.max_blk_game = self.max_blk_game.max(stats.blk);
    }

    /// Flat map under the `season` or `career` evaluation scope.
    pub fn to_context(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("games_played".to_string(), Value::from(self.games_played));
        for (key, value) in [
            ("pts_total", self.pts_total),
            ("ast_total", self.ast_total),
            ("reb_total", self.reb_total),
            ("stl_total", self.stl_total),
            ("blk_total", self.blk_total),
            ("tov_total", self.tov_total),
            ("minutes_total", self.minutes_total),
            ("fgm_total", self.fgm_total),
            ("fga_total", self.fga_total),
            ("tpm_total", self.tpm_total),
            ("tpa_total", self.tpa_total),
            ("ftm_total", self.ftm_total),
            ("fta_total", self.fta_total),
            ("max_pts_game", self.max_pts_game),
            ("max_ast_game", self.max_ast_game),
            ("max_reb_game", self.max_reb_game),
            ("max_stl_game", self.max_stl_game),
            ("max_blk_game", self.max_blk_game),
        ] {
            map.insert(key.to_string(), json_number(value));
        }
        map.insert("has_50pt_game".to_string(), Value::Bool(self.has_50pt_game));
        map.insert(
            "has_double_double".to_string(),
            Value::Bool(self.has_double_double),
        );
        map.insert(
            "has_triple_double".to_string(),
            Value::Bool(self.has_triple_double),
        );
        map
    }
}

/// Both aggregate rows for one player, as returned by a single fetch.
/// Either side is absent until the player has accumulated in that scope.
#[derive(Debug, Clone, Default)]
pub struct CounterSnapshot {
    pub career: Option<PlayerCounters>,
    pub season: Option<PlayerCounters>,
}
