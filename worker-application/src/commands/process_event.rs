use chrono::Utc;
use tracing::{debug, info, warn};

use worker_domain::{
    build_stats_snapshot, evaluate, EvalContext, NewAward, PerGameStats, QueueEvent, Rule,
    AWARD_ISSUER, AWARD_VERSION, DEFAULT_AWARD_LEVEL, EVENT_TYPE_MATCH, EVENT_TYPE_PLAYER_STAT,
};

use crate::error::PipelineError;
use crate::state::AppState;

/// Runs one event through the pipeline. Ok means the queue item may be
/// marked done; any Err reschedules it.
pub async fn process_event(state: &AppState, event: &QueueEvent) -> Result<(), PipelineError> {
    match event.event_type.as_str() {
        EVENT_TYPE_PLAYER_STAT => process_stat_event(state, event).await,
        EVENT_TYPE_MATCH => Ok(()),
        other => {
            info!(event_id = %event.event_id, event_type = other, "ignoring unknown event type");
            Ok(())
        }
    }
}

async fn process_stat_event(state: &AppState, event: &QueueEvent) -> Result<(), PipelineError> {
    let Some(player_id) = event.player_id.as_deref() else {
        return Err(PipelineError::MissingPlayer);
    };

    let stats = PerGameStats::from_payload(&event.payload);

    state.counter_repo.update_career(player_id, &stats).await?;
    if let Some(season_id) = event.season_id.as_deref() {
        state
            .counter_repo
            .update_season(player_id, season_id, &stats)
            .await?;
    }

    let counters = state
        .counter_repo
        .fetch(player_id, event.season_id.as_deref())
        .await?;

    let ctx = EvalContext::new(
        stats.to_context(),
        counters
            .season
            .as_ref()
            .map(|row| row.to_context())
            .unwrap_or_default(),
        counters
            .career
            .as_ref()
            .map(|row| row.to_context())
            .unwrap_or_default(),
    );

    let rules = state
        .rule_repo
        .fetch_candidate_rules(
            event.game_year.as_deref(),
            event.league_id.as_deref(),
            event.season_id.as_deref(),
        )
        .await?;

    let mut fired = 0_usize;
    let mut failed = 0_usize;
    for rule in &rules {
        if !evaluate(&rule.predicate, &ctx) {
            continue;
        }
        fired += 1;
        if let Err(err) = issue_award(state, event, rule, player_id, &ctx).await {
            // do not short-circuit the remaining rules; the item as a
            // whole is retried so the badge is eventually attached
            warn!(
                error = %err,
                event_id = %event.event_id,
                rule_id = rule.rule_id,
                "rule processing failed"
            );
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(PipelineError::RuleProcessing { failed, fired });
    }
    Ok(())
}

async fn issue_award(
    state: &AppState,
    event: &QueueEvent,
    rule: &Rule,
    player_id: &str,
    ctx: &EvalContext,
) -> anyhow::Result<()> {
    let award = NewAward {
        player_id: player_id.to_string(),
        rule_id: rule.rule_id,
        scope_key: rule.scope.scope_key(event),
        level: DEFAULT_AWARD_LEVEL,
        title: rule.title.clone(),
        tier: rule.tier.clone(),
        match_id: event.match_id.clone(),
        season_id: event.season_id.clone(),
        league_id: event.league_id.clone(),
        game_year: event.game_year.clone(),
        awarded_at: Utc::now(),
        stats: build_stats_snapshot(&ctx.per_game, &ctx.season, &ctx.career, &rule.predicate),
        issuer: AWARD_ISSUER.to_string(),
        version: AWARD_VERSION,
    };

    let award_id = match state.award_repo.insert_award(&award).await? {
        Some(award_id) => {
            state.metrics.record_award();
            info!(
                player_id,
                rule_id = rule.rule_id,
                %award_id,
                title = %rule.title,
                "award issued"
            );
            award_id
        }
        None => {
            // already awarded; a badge may still be owed from an earlier
            // pass that failed between insert and attach
            let existing = state
                .award_repo
                .find_award(player_id, rule.rule_id, award.scope_key.as_deref(), award.level)
                .await?;
            match existing {
                Some(record) if record.asset_svg_url.is_none() => record.award_id,
                _ => {
                    debug!(player_id, rule_id = rule.rule_id, "already awarded");
                    return Ok(());
                }
            }
        }
    };

    let url = state
        .badge_publisher
        .generate_and_upload(award_id, &award)
        .await?;
    state.award_repo.attach_asset_url(award_id, &url).await?;
    state.metrics.record_badge();
    Ok(())
}
