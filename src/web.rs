#![cfg(not(tarpaulin_include))]

use shopfloor::app;
use shopfloor::config::Config;

/// Main entry point for the web application
///
/// Logging verbosity follows `RUST_LOG`; storage locations and the listen
/// address come from the `SHOPFLOOR_*` environment variables.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load();
    app::run(config).await
}
