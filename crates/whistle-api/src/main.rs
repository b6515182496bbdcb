//! Binary entrypoint for the Whistle API server.
//!
//! Runs against the in-process sandbox ledger and gateway.
use anyhow::Context;
use std::sync::Arc;
use whistle_api::{logging, run, ApiConfig, AppState};
use whistle_orchestrator::Orchestrator;
use whistle_sandbox::Sandbox;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env();
    logging::init(&config.log_level, config.log_json)?;

    let orchestrator_config = config
        .orchestrator_config()
        .context("loading orchestrator config")?;
    let sandbox = Sandbox::new();
    let orchestrator = Orchestrator::new(
        sandbox.ledger.clone(),
        sandbox.gateway.clone(),
        orchestrator_config,
    );

    let state = AppState::new(Arc::new(orchestrator)).context("registering metrics")?;
    run(&config.addr, state).await
}
