mod context;
mod lifecycle;
pub mod telemetry;

pub use context::AppContext;
pub use lifecycle::run_standalone;
