//! Collateral Monitor
//!
//! Watches a fleet of collateralized financial contracts and reports:
//! - positions that can be liquidated at the current price
//! - pending liquidations that can be disputed at the historical price
//!
//! Contract and price snapshots are read from a JSON state file that is
//! re-read on every trigger.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use monitor_chain::{StateFile, StateFileFactory};
use monitor_core::{Coordinator, MonitorConfig, Trigger};

/// Environment variable names.
mod env {
    pub const MONITOR_STATE: &str = "MONITOR_STATE";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

const DEFAULT_STATE_PATH: &str = "state.json";

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();
    init_tracing();

    // MONITOR_CONFIG names a TOML file, otherwise MONITOR_PROFILE picks a profile
    let config = MonitorConfig::from_env().context("failed to load monitor config")?;
    config.log_config();

    let state_path =
        std::env::var(env::MONITOR_STATE).unwrap_or_else(|_| DEFAULT_STATE_PATH.to_string());
    let factory = StateFileFactory::new(StateFile::new(&state_path));
    info!(path = %state_path, "Using state file");

    let coordinator = Coordinator::initialize(&config, &factory, &factory).await;
    if coordinator.active_count() == 0 {
        warn!("No active contracts, triggers will produce no findings");
    }

    run(&coordinator, &config).await;

    info!("Shutting down");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,monitor_core=debug,monitor_chain=debug"));

    let json = std::env::var(env::LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

/// Fire a trigger every poll interval until Ctrl-C.
async fn run(coordinator: &Coordinator, config: &MonitorConfig) {
    let mut ticker = tokio::time::interval(config.trigger.poll_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut block_number = 0u64;

    info!(
        poll_interval_ms = config.trigger.poll_interval_ms,
        contracts = coordinator.active_count(),
        "Starting trigger loop"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                block_number += 1;
                let trigger = Trigger {
                    block_number,
                    timestamp: unix_now(),
                };
                let findings = coordinator.handle_trigger(trigger).await;
                for finding in &findings {
                    match serde_json::to_string(finding) {
                        Ok(line) => info!(target: "findings", "{}", line),
                        Err(e) => warn!(error = %e, "Failed to serialize finding"),
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn print_banner() {
    println!(r#"
    ╔═╗┌─┐┬  ┬  ┌─┐┌┬┐┌─┐┬─┐┌─┐┬    ╔╦╗┌─┐┌┐┌┬┌┬┐┌─┐┬─┐
    ║  │ ││  │  ├─┤ │ ├┤ ├┬┘├─┤│    ║║║│ │││││ │ │ │├┬┘
    ╚═╝└─┘┴─┘┴─┘┴ ┴ ┴ └─┘┴└─┴ ┴┴─┘  ╩ ╩└─┘┘└┘┴ ┴ └─┘┴└─
    Collateral Monitor v0.1.0
    "#);
}
