// Per-game stat line entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The fixed per-game stat line. Keys absent from the payload, and keys
/// whose value is not a number, read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerGameStats {
    pub points: f64,
    pub ast: f64,
    pub reb: f64,
    pub stl: f64,
    pub blk: f64,
    pub tov: f64,
    pub minutes: f64,
    pub fgm: f64,
    pub fga: f64,
    pub tpm: f64,
    pub tpa: f64,
    pub ftm: f64,
    pub fta: f64,
}

impl PerGameStats {
    pub fn from_payload(payload: &Value) -> Self {
        let read = |key: &str| -> f64 {
            payload
                .get(key)
                .and_then(Value::as_f64)
                .filter(|n| n.is_finite())
                .unwrap_or(0.0)
        };
        Self {
            points: read("points"),
            ast: read("ast"),
            reb: read("reb"),
            stl: read("stl"),
            blk: read("blk"),
            tov: read("tov"),
            minutes: read("minutes"),
            fgm: read("fgm"),
            fga: read("fga"),
            tpm: read("tpm"),
            tpa: read("tpa"),
            ftm: read("ftm"),
            fta: read("fta"),
        }
    }

    /// Flat map under the `per_game` evaluation scope.
    pub fn to_context(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, value) in [
            ("points", self.points),
            ("ast", self.ast),
            ("reb", self.reb),
            ("stl", self.stl),
            ("blk", self.blk),
            ("tov", self.tov),
            ("minutes", self.minutes),
            ("fgm", self.fgm),
            ("fga", self.fga),
            ("tpm", self.tpm),
            ("tpa", self.tpa),
            ("ftm", self.ftm),
            ("fta", self.fta),
        ] {
            map.insert(key.to_string(), json_number(value));
        }
        map
    }
}

pub(crate) fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
