//! `meshbridge` – mesh-network controller to MQTT bridge.
//!
//! This binary wires the stack together:
//!
//! 1. Resolves [`Settings`] from flags, `MESHBRIDGE_*` variables and
//!    `~/.meshbridge/config.toml`.
//! 2. Initialises tracing (optionally exporting spans over OTLP).
//! 3. Connects the MQTT bus and the controller, both feeding one event lane.
//! 4. Runs the [`BridgeCoordinator`] until Ctrl-C.
//!
//! The controller is the simulated one; `--topology` selects the network it
//! replays.  Without a topology it reports an empty network.

mod cli;
mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use meshbridge_core::{EventProjector, Topics};
use meshbridge_middleware::lane::{self, forward_controller_events};
use meshbridge_middleware::{BusClient, Controller, MqttBus, SimController, SimTopology};
use meshbridge_runtime::BridgeCoordinator;
use meshbridge_types::BridgeError;
use tracing::{error, info, warn};

use crate::config::Settings;

/// How long startup waits for the broker before opening the controller.
const BROKER_WAIT: Duration = Duration::from_secs(5);
const BROKER_POLL: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    let args = cli::Args::parse();
    let settings = match config::load(args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red().bold());
            return ExitCode::FAILURE;
        }
    };

    // Tracing comes up before the runtime; see telemetry::build_provider.
    let _guard = meshbridge_runtime::init_tracing("meshbridge", settings.verbosity.as_filter());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "bridge stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<(), BridgeError> {
    let topology = match &settings.topology {
        Some(path) => SimTopology::load(path)?,
        None => SimTopology::default(),
    };
    let topics = Topics::new(settings.name.clone());
    let projector = EventProjector::new(topics.clone(), settings.nodes.clone())
        .clear_removed_values(settings.clear_removed_values);

    // ── Event lane ────────────────────────────────────────────────────────
    let (lane_tx, lane_rx) = lane::channel(lane::DEFAULT_CAPACITY);

    let controller = Arc::new(SimController::new(topology));
    let forwarder = forward_controller_events(controller.event_stream().await, lane_tx.clone());

    let (bus, mqtt_task) = MqttBus::connect(&settings.url, &settings.name, &topics, lane_tx)?;
    wait_for_broker(&bus).await;

    let mut coordinator = BridgeCoordinator::new(projector, controller.clone(), Arc::new(bus));

    info!(
        name = %settings.name,
        url = %settings.url,
        device = %settings.device,
        overrides = settings.nodes.len(),
        "starting bridge"
    );
    controller.connect(&settings.device).await?;

    // ── Run until Ctrl-C ──────────────────────────────────────────────────
    tokio::select! {
        _ = coordinator.run(lane_rx) => warn!("event lane closed unexpectedly"),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Ctrl-C received; shutting down"),
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C; shutting down"),
        },
    }

    if let Err(e) = controller.disconnect().await {
        warn!(error = %e, "controller disconnect failed");
    }
    forwarder.abort();
    mqtt_task.abort();
    Ok(())
}

/// Give the broker session a moment to come up so the controller's startup
/// burst is not dropped by the publish guard.
async fn wait_for_broker(bus: &MqttBus) {
    let deadline = tokio::time::Instant::now() + BROKER_WAIT;
    while !bus.is_connected() {
        if tokio::time::Instant::now() >= deadline {
            warn!(
                wait_secs = BROKER_WAIT.as_secs(),
                "broker not reachable yet; continuing without it"
            );
            return;
        }
        tokio::time::sleep(BROKER_POLL).await;
    }
}
