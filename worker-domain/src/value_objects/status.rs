// Queue status value object

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Queued => "queued",
            QueueStatus::Processing => "processing",
            QueueStatus::Done => "done",
            QueueStatus::Error => "error",
        }
    }
}

/// Retry delay in minutes after the given (already incremented) attempt
/// count: 2^min(attempts, 7), so 2m, 4m, 8m ... capped at 128m.
pub fn retry_backoff_minutes(attempts: i32) -> i64 {
    1_i64 << attempts.clamp(0, 7)
}
