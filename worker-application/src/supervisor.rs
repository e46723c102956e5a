use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use worker_domain::QueueEvent;

use crate::commands::process_event;
use crate::state::AppState;

const MAX_FAILURE_SLEEP: Duration = Duration::from_millis(30_000);

/// The single cooperative worker loop: claim a batch, process it in
/// queue_id order, acknowledge, sleep when idle. Exits when the shutdown
/// flag flips; the flag is checked between events, never mid-event.
pub async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) {
    info!("supervisor loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        match run_batch(&state, &shutdown).await {
            Ok(0) => {
                idle_sleep(
                    &mut shutdown,
                    Duration::from_millis(state.config.poll_interval_ms),
                )
                .await;
            }
            Ok(_) => {}
            Err(err) => {
                error!(error = %err, "queue loop iteration failed");
                state.metrics.record_loop_error();
                idle_sleep(&mut shutdown, failure_sleep(state.config.poll_interval_ms)).await;
            }
        }
    }
    info!("supervisor loop stopped");
}

/// Claims and drains one batch, returning how many items were claimed.
/// Store errors from claim/ack escape to the caller; per-item pipeline
/// failures are absorbed into `mark_retry`.
async fn run_batch(
    state: &AppState,
    shutdown: &watch::Receiver<bool>,
) -> anyhow::Result<usize> {
    let batch = state.queue_repo.claim_batch(state.config.batch_size).await?;
    if batch.is_empty() {
        return Ok(0);
    }
    state.metrics.record_claimed(batch.len());

    let mut event_ids: Vec<String> = batch.iter().map(|item| item.event_id.clone()).collect();
    event_ids.sort();
    event_ids.dedup();
    let events = state.event_repo.load_events(&event_ids).await?;
    let by_id: HashMap<&str, &QueueEvent> = events
        .iter()
        .map(|event| (event.event_id.as_str(), event))
        .collect();

    let mut done_ids = Vec::with_capacity(batch.len());
    for item in &batch {
        if *shutdown.borrow() {
            break;
        }
        match by_id.get(item.event_id.as_str()) {
            None => {
                state
                    .queue_repo
                    .mark_retry(item.queue_id, "event missing")
                    .await?;
                state.metrics.record_retried();
            }
            Some(event) => match process_event(state, event).await {
                Ok(()) => done_ids.push(item.queue_id),
                Err(err) => {
                    error!(
                        error = %err,
                        queue_id = item.queue_id,
                        event_id = %item.event_id,
                        "event processing failed"
                    );
                    state
                        .queue_repo
                        .mark_retry(item.queue_id, &err.to_string())
                        .await?;
                    state.metrics.record_retried();
                }
            },
        }
    }

    state.queue_repo.mark_done(&done_ids).await?;
    state.metrics.record_done(done_ids.len());
    Ok(batch.len())
}

fn failure_sleep(poll_interval_ms: u64) -> Duration {
    Duration::from_millis(poll_interval_ms.saturating_mul(5)).min(MAX_FAILURE_SLEEP)
}

async fn idle_sleep(shutdown: &mut watch::Receiver<bool>, duration: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
}
