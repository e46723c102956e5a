use thiserror::Error;

/// Failure of one queue item. The supervisor turns any of these into a
/// `mark_retry`; the Display text becomes the row's `last_error`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("player_stat_event has no player_id")]
    MissingPlayer,
    #[error("{failed} of {fired} fired rules failed award processing")]
    RuleProcessing { failed: usize, fired: usize },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
