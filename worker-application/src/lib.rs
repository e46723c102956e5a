// Worker Application Layer

pub mod commands;
pub mod error;
pub mod metrics;
pub mod state;
pub mod supervisor;

pub use error::PipelineError;
pub use metrics::Metrics;
pub use state::AppState;

#[cfg(test)]
pub(crate) mod testing;
