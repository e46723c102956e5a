use anyhow::Result;
use clap::Parser;

use worker_bootstrap::telemetry;

/// Also names the rolled log files and the clap command.
const SERVICE_NAME: &str = "achievements-worker";

#[derive(Parser, Debug)]
#[command(name = SERVICE_NAME)]
#[command(about = "Durable achievements worker", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = telemetry::init(SERVICE_NAME);

    let args = Args::parse();
    if let Some(config) = args.config {
        std::env::set_var("ACHV_CONFIG", config);
    }

    worker_bootstrap::run_standalone().await
}
