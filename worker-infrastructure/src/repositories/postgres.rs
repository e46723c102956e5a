//! Postgres implementations of the worker's port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) so builds do not need a live database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use worker_domain::ports::{
    AwardRepository, CounterRepository, EventRepository, QueueRepository, RuleRepository,
};
use worker_domain::{
    retry_backoff_minutes, AwardRecord, CounterScope, CounterSnapshot, GameFlags, NewAward,
    PerGameStats, PlayerCounters, QueueEvent, QueueItem, Rule, RuleScope,
};

/// Bootstraps the tables the worker owns plus the queue/events tables it
/// leases from, so a fresh environment comes up without hand-run DDL.
/// The unique indexes are the idempotency anchors: NULLS NOT DISTINCT so
/// the career row (null season) and keyless career awards still conflict.
pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    let statements = [
        r#"
CREATE TABLE IF NOT EXISTS events (
    event_id TEXT PRIMARY KEY,
    event_type TEXT NOT NULL,
    payload JSONB NOT NULL DEFAULT '{}'::jsonb,
    player_id TEXT,
    match_id TEXT,
    season_id TEXT,
    league_id TEXT,
    game_year TEXT,
    occurred_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#,
        r#"
CREATE TABLE IF NOT EXISTS event_queue (
    queue_id BIGSERIAL PRIMARY KEY,
    event_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued',
    attempts INT NOT NULL DEFAULT 0,
    visible_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    last_error TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#,
        r#"
CREATE INDEX IF NOT EXISTS idx_event_queue_claim
    ON event_queue (status, visible_at, queue_id)
"#,
        r#"
CREATE TABLE IF NOT EXISTS player_counters (
    player_id TEXT NOT NULL,
    scope TEXT NOT NULL,
    season_id TEXT,
    games_played BIGINT NOT NULL DEFAULT 0,
    pts_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    ast_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    reb_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    stl_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    blk_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    tov_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    minutes_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    fgm_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    fga_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    tpm_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    tpa_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    ftm_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    fta_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    has_50pt_game BOOLEAN NOT NULL DEFAULT FALSE,
    has_double_double BOOLEAN NOT NULL DEFAULT FALSE,
    has_triple_double BOOLEAN NOT NULL DEFAULT FALSE,
    max_pts_game DOUBLE PRECISION NOT NULL DEFAULT 0,
    max_ast_game DOUBLE PRECISION NOT NULL DEFAULT 0,
    max_reb_game DOUBLE PRECISION NOT NULL DEFAULT 0,
    max_stl_game DOUBLE PRECISION NOT NULL DEFAULT 0,
    max_blk_game DOUBLE PRECISION NOT NULL DEFAULT 0
)
"#,
        r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_player_counters_key
    ON player_counters (player_id, scope, season_id) NULLS NOT DISTINCT
"#,
        r#"
CREATE TABLE IF NOT EXISTS achievement_rules (
    rule_id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    tier TEXT NOT NULL DEFAULT 'Bronze',
    scope TEXT NOT NULL,
    predicate JSONB NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    game_year TEXT,
    league_id TEXT,
    season_id TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#,
        r#"
CREATE TABLE IF NOT EXISTS player_awards (
    award_id UUID PRIMARY KEY,
    player_id TEXT NOT NULL,
    rule_id BIGINT NOT NULL,
    scope_key TEXT,
    level INT NOT NULL DEFAULT 1,
    title TEXT NOT NULL,
    tier TEXT NOT NULL,
    match_id TEXT,
    season_id TEXT,
    league_id TEXT,
    game_year TEXT,
    awarded_at TIMESTAMPTZ NOT NULL,
    stats JSONB NOT NULL,
    issuer TEXT NOT NULL,
    version INT NOT NULL,
    asset_svg_url TEXT
)
"#,
        r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_player_awards_identity
    ON player_awards (player_id, rule_id, scope_key, level) NULLS NOT DISTINCT
"#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

// ── Queue driver ─────────────────────────────────────────────

pub struct PgQueueRepository {
    pool: PgPool,
    max_attempts: i32,
    lease_ttl_minutes: i64,
}

impl PgQueueRepository {
    pub fn new(pool: PgPool, max_attempts: i32, lease_ttl_minutes: i64) -> Self {
        Self {
            pool,
            max_attempts,
            lease_ttl_minutes,
        }
    }
}

#[async_trait]
impl QueueRepository for PgQueueRepository {
    async fn claim_batch(&self, limit: i64) -> anyhow::Result<Vec<QueueItem>> {
        // Atomic claim via CTE + FOR UPDATE SKIP LOCKED: concurrent
        // workers never see overlapping rows. The second WHERE arm
        // reclaims leases orphaned by a crashed worker.
        let rows = sqlx::query_as::<_, (i64, String)>(
            r#"
            WITH claimable AS (
                SELECT queue_id
                FROM event_queue
                WHERE (status = 'queued' AND visible_at <= now())
                   OR (status = 'processing' AND updated_at < now() - ($2 * interval '1 minute'))
                ORDER BY queue_id
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE event_queue AS q
            SET status = 'processing', updated_at = now()
            FROM claimable AS c
            WHERE q.queue_id = c.queue_id
            RETURNING q.queue_id, q.event_id
            "#,
        )
        .bind(limit)
        .bind(self.lease_ttl_minutes)
        .fetch_all(&self.pool)
        .await?;

        let mut items: Vec<QueueItem> = rows
            .into_iter()
            .map(|(queue_id, event_id)| QueueItem { queue_id, event_id })
            .collect();
        // UPDATE ... RETURNING has no row-order guarantee
        items.sort_by_key(|item| item.queue_id);
        Ok(items)
    }

    async fn mark_done(&self, queue_ids: &[i64]) -> anyhow::Result<()> {
        if queue_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE event_queue
            SET status = 'done', updated_at = now()
            WHERE queue_id = ANY($1) AND status = 'processing'
            "#,
        )
        .bind(queue_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_retry(&self, queue_id: i64, error_message: &str) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        let attempts: i32 =
            sqlx::query_scalar("SELECT attempts FROM event_queue WHERE queue_id = $1 FOR UPDATE")
                .bind(queue_id)
                .fetch_one(&mut *tx)
                .await?;
        let attempts = attempts + 1;

        if attempts >= self.max_attempts {
            sqlx::query(
                r#"
                UPDATE event_queue
                SET status = 'error', attempts = $2, last_error = $3, updated_at = now()
                WHERE queue_id = $1
                "#,
            )
            .bind(queue_id)
            .bind(attempts)
            .bind(error_message)
            .execute(&mut *tx)
            .await?;
        } else {
            let visible_at: DateTime<Utc> =
                Utc::now() + Duration::minutes(retry_backoff_minutes(attempts));
            sqlx::query(
                r#"
                UPDATE event_queue
                SET status = 'queued', attempts = $2, last_error = $3, visible_at = $4,
                    updated_at = now()
                WHERE queue_id = $1
                "#,
            )
            .bind(queue_id)
            .bind(attempts)
            .bind(error_message)
            .bind(visible_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn queue_lag(&self) -> anyhow::Result<i64> {
        let lag: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM event_queue WHERE status = 'queued' AND visible_at <= now()",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(lag)
    }
}

// ── Events ───────────────────────────────────────────────────

pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: String,
    event_type: String,
    payload: serde_json::Value,
    player_id: Option<String>,
    match_id: Option<String>,
    season_id: Option<String>,
    league_id: Option<String>,
    game_year: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl From<EventRow> for QueueEvent {
    fn from(row: EventRow) -> Self {
        QueueEvent {
            event_id: row.event_id,
            event_type: row.event_type,
            payload: row.payload,
            player_id: row.player_id,
            match_id: row.match_id,
            season_id: row.season_id,
            league_id: row.league_id,
            game_year: row.game_year,
            occurred_at: row.occurred_at,
        }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn load_events(&self, event_ids: &[String]) -> anyhow::Result<Vec<QueueEvent>> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT event_id, event_type, payload, player_id, match_id, season_id,
                   league_id, game_year, occurred_at
            FROM events
            WHERE event_id = ANY($1)
            "#,
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(QueueEvent::from).collect())
    }
}

// ── Counter store ────────────────────────────────────────────

pub struct PgCounterRepository {
    pool: PgPool,
}

impl PgCounterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One conflict-upsert per call; concurrent upserts for the same key
    /// serialize inside the store and both land (addition commutes).
    async fn upsert(
        &self,
        player_id: &str,
        scope: CounterScope,
        season_id: Option<&str>,
        stats: &PerGameStats,
    ) -> anyhow::Result<()> {
        let flags = GameFlags::derive(stats);
        sqlx::query(
            r#"
            INSERT INTO player_counters (
                player_id, scope, season_id, games_played,
                pts_total, ast_total, reb_total, stl_total, blk_total, tov_total,
                minutes_total, fgm_total, fga_total, tpm_total, tpa_total,
                ftm_total, fta_total,
                has_50pt_game, has_double_double, has_triple_double,
                max_pts_game, max_ast_game, max_reb_game, max_stl_game, max_blk_game
            ) VALUES (
                $1, $2, $3, 1,
                $4, $5, $6, $7, $8, $9,
                $10, $11, $12, $13, $14,
                $15, $16,
                $17, $18, $19,
                $20, $21, $22, $23, $24
            )
            ON CONFLICT (player_id, scope, season_id) DO UPDATE SET
                games_played = player_counters.games_played + 1,
                pts_total = player_counters.pts_total + EXCLUDED.pts_total,
                ast_total = player_counters.ast_total + EXCLUDED.ast_total,
                reb_total = player_counters.reb_total + EXCLUDED.reb_total,
                stl_total = player_counters.stl_total + EXCLUDED.stl_total,
                blk_total = player_counters.blk_total + EXCLUDED.blk_total,
                tov_total = player_counters.tov_total + EXCLUDED.tov_total,
                minutes_total = player_counters.minutes_total + EXCLUDED.minutes_total,
                fgm_total = player_counters.fgm_total + EXCLUDED.fgm_total,
                fga_total = player_counters.fga_total + EXCLUDED.fga_total,
                tpm_total = player_counters.tpm_total + EXCLUDED.tpm_total,
                tpa_total = player_counters.tpa_total + EXCLUDED.tpa_total,
                ftm_total = player_counters.ftm_total + EXCLUDED.ftm_total,
                fta_total = player_counters.fta_total + EXCLUDED.fta_total,
                has_50pt_game = player_counters.has_50pt_game OR EXCLUDED.has_50pt_game,
                has_double_double = player_counters.has_double_double OR EXCLUDED.has_double_double,
                has_triple_double = player_counters.has_triple_double OR EXCLUDED.has_triple_double,
                max_pts_game = GREATEST(player_counters.max_pts_game, EXCLUDED.max_pts_game),
                max_ast_game = GREATEST(player_counters.max_ast_game, EXCLUDED.max_ast_game),
                max_reb_game = GREATEST(player_counters.max_reb_game, EXCLUDED.max_reb_game),
                max_stl_game = GREATEST(player_counters.max_stl_game, EXCLUDED.max_stl_game),
                max_blk_game = GREATEST(player_counters.max_blk_game, EXCLUDED.max_blk_game)
            "#,
        )
        .bind(player_id)
        .bind(scope.as_str())
        .bind(season_id)
        .bind(stats.points)
        .bind(stats.ast)
        .bind(stats.reb)
        .bind(stats.stl)
        .bind(stats.blk)
        .bind(stats.tov)
        .bind(stats.minutes)
        .bind(stats.fgm)
        .bind(stats.fga)
        .bind(stats.tpm)
        .bind(stats.tpa)
        .bind(stats.ftm)
        .bind(stats.fta)
        .bind(flags.has_50pt_game)
        .bind(flags.has_double_double)
        .bind(flags.has_triple_double)
        .bind(stats.points)
        .bind(stats.ast)
        .bind(stats.reb)
        .bind(stats.stl)
        .bind(stats.blk)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CounterRow {
    player_id: String,
    scope: String,
    season_id: Option<String>,
    games_played: i64,
    pts_total: f64,
    ast_total: f64,
    reb_total: f64,
    stl_total: f64,
    blk_total: f64,
    tov_total: f64,
    minutes_total: f64,
    fgm_total: f64,
    fga_total: f64,
    tpm_total: f64,
    tpa_total: f64,
    ftm_total: f64,
    fta_total: f64,
    has_50pt_game: bool,
    has_double_double: bool,
    has_triple_double: bool,
    max_pts_game: f64,
    max_ast_game: f64,
    max_reb_game: f64,
    max_stl_game: f64,
    max_blk_game: f64,
}

impl CounterRow {
    fn into_counters(self) -> PlayerCounters {
        let scope = match self.scope.as_str() {
            "season" => CounterScope::Season,
            _ => CounterScope::Career,
        };
        PlayerCounters {
            player_id: self.player_id,
            scope,
            season_id: self.season_id,
            games_played: self.games_played,
            pts_total: self.pts_total,
            ast_total: self.ast_total,
            reb_total: self.reb_total,
            stl_total: self.stl_total,
            blk_total: self.blk_total,
            tov_total: self.tov_total,
            minutes_total: self.minutes_total,
            fgm_total: self.fgm_total,
            fga_total: self.fga_total,
            tpm_total: self.tpm_total,
            tpa_total: self.tpa_total,
            ftm_total: self.ftm_total,
            fta_total: self.fta_total,
            has_50pt_game: self.has_50pt_game,
            has_double_double: self.has_double_double,
            has_triple_double: self.has_triple_double,
            max_pts_game: self.max_pts_game,
            max_ast_game: self.max_ast_game,
            max_reb_game: self.max_reb_game,
            max_stl_game: self.max_stl_game,
            max_blk_game: self.max_blk_game,
        }
    }
}

#[async_trait]
impl CounterRepository for PgCounterRepository {
    async fn update_career(&self, player_id: &str, stats: &PerGameStats) -> anyhow::Result<()> {
        self.upsert(player_id, CounterScope::Career, None, stats).await
    }

    async fn update_season(
        &self,
        player_id: &str,
        season_id: &str,
        stats: &PerGameStats,
    ) -> anyhow::Result<()> {
        self.upsert(player_id, CounterScope::Season, Some(season_id), stats)
            .await
    }

    async fn fetch(
        &self,
        player_id: &str,
        season_id: Option<&str>,
    ) -> anyhow::Result<CounterSnapshot> {
        let rows = sqlx::query_as::<_, CounterRow>(
            r#"
            SELECT player_id, scope, season_id, games_played,
                   pts_total, ast_total, reb_total, stl_total, blk_total, tov_total,
                   minutes_total, fgm_total, fga_total, tpm_total, tpa_total,
                   ftm_total, fta_total,
                   has_50pt_game, has_double_double, has_triple_double,
                   max_pts_game, max_ast_game, max_reb_game, max_stl_game, max_blk_game
            FROM player_counters
            WHERE player_id = $1
              AND ((scope = 'career' AND season_id IS NULL)
                OR (scope = 'season' AND season_id IS NOT DISTINCT FROM $2))
            "#,
        )
        .bind(player_id)
        .bind(season_id)
        .fetch_all(&self.pool)
        .await?;

        let mut snapshot = CounterSnapshot::default();
        for row in rows {
            let counters = row.into_counters();
            match counters.scope {
                CounterScope::Career => snapshot.career = Some(counters),
                CounterScope::Season => snapshot.season = Some(counters),
            }
        }
        Ok(snapshot)
    }
}

// ── Rule registry ────────────────────────────────────────────

pub struct PgRuleRepository {
    pool: PgPool,
}

impl PgRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_id: i64,
    title: String,
    tier: String,
    scope: String,
    predicate: serde_json::Value,
    is_active: bool,
    game_year: Option<String>,
    league_id: Option<String>,
    season_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl RuleRepository for PgRuleRepository {
    async fn fetch_candidate_rules(
        &self,
        game_year: Option<&str>,
        league_id: Option<&str>,
        season_id: Option<&str>,
    ) -> anyhow::Result<Vec<Rule>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT rule_id, title, tier, scope, predicate, is_active,
                   game_year, league_id, season_id, created_at, updated_at
            FROM achievement_rules
            WHERE is_active = TRUE
              AND scope IN ('per_game', 'season', 'career')
              AND (game_year IS NULL OR game_year = $1)
              AND (league_id IS NULL OR league_id = $2)
              AND (season_id IS NULL OR season_id = $3)
            ORDER BY rule_id
            "#,
        )
        .bind(game_year)
        .bind(league_id)
        .bind(season_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let Some(scope) = RuleScope::parse(&row.scope) else {
                    warn!(rule_id = row.rule_id, scope = %row.scope, "skipping rule with unknown scope");
                    return None;
                };
                Some(Rule {
                    rule_id: row.rule_id,
                    title: row.title,
                    tier: row.tier,
                    scope,
                    predicate: row.predicate,
                    is_active: row.is_active,
                    game_year: row.game_year,
                    league_id: row.league_id,
                    season_id: row.season_id,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                })
            })
            .collect())
    }
}

// ── Award ledger ─────────────────────────────────────────────

pub struct PgAwardRepository {
    pool: PgPool,
}

impl PgAwardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AwardRepository for PgAwardRepository {
    async fn insert_award(&self, award: &NewAward) -> anyhow::Result<Option<Uuid>> {
        // DO NOTHING on the idempotency tuple: None is the normal
        // already-awarded signal, not a failure
        let award_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO player_awards (
                award_id, player_id, rule_id, scope_key, level, title, tier,
                match_id, season_id, league_id, game_year,
                awarded_at, stats, issuer, version
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                $8, $9, $10, $11,
                $12, $13, $14, $15
            )
            ON CONFLICT (player_id, rule_id, scope_key, level) DO NOTHING
            RETURNING award_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&award.player_id)
        .bind(award.rule_id)
        .bind(award.scope_key.as_deref())
        .bind(award.level)
        .bind(&award.title)
        .bind(&award.tier)
        .bind(award.match_id.as_deref())
        .bind(award.season_id.as_deref())
        .bind(award.league_id.as_deref())
        .bind(award.game_year.as_deref())
        .bind(award.awarded_at)
        .bind(&award.stats)
        .bind(&award.issuer)
        .bind(award.version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(award_id)
    }

    async fn find_award(
        &self,
        player_id: &str,
        rule_id: i64,
        scope_key: Option<&str>,
        level: i32,
    ) -> anyhow::Result<Option<AwardRecord>> {
        let row = sqlx::query_as::<_, (Uuid, Option<String>)>(
            r#"
            SELECT award_id, asset_svg_url
            FROM player_awards
            WHERE player_id = $1
              AND rule_id = $2
              AND scope_key IS NOT DISTINCT FROM $3
              AND level = $4
            "#,
        )
        .bind(player_id)
        .bind(rule_id)
        .bind(scope_key)
        .bind(level)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(award_id, asset_svg_url)| AwardRecord {
            award_id,
            asset_svg_url,
        }))
    }

    async fn attach_asset_url(&self, award_id: Uuid, url: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE player_awards SET asset_svg_url = $2 WHERE award_id = $1")
            .bind(award_id)
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
