// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sprinklerd
//!
//! Irrigation controller daemon: loads the config document, starts the
//! section runner and program supervisors, and exposes them over MQTT.

use std::sync::Arc;

use rumqttc::AsyncClient;
use sprinkler_core::config::ConfigDocument;
use sprinkler_daemon::lifecycle;
use sprinkler_daemon::mqtt::{self, BrokerConfig, MqttHandle};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let config_path = ConfigDocument::default_path();
    info!(path = %config_path.display(), "starting sprinklerd");
    let app = Arc::new(lifecycle::startup(config_path)?);

    // Attach the bus observers before anything can publish updates.
    let section_events = app.registry.bus().attach()?;
    let program_events = app.program_bus.attach()?;
    let runner_state = app.runner.subscribe();

    let broker = BrokerConfig::from_env()?;
    info!(host = %broker.host, port = broker.port, prefix = %broker.prefix, "using mqtt broker");
    let (client, eventloop) = AsyncClient::new(broker.to_options(), 16);
    let handle = MqttHandle::new(client, broker.prefix.clone());

    tokio::spawn(mqtt::updater::run_updater(
        Arc::clone(&app),
        handle.clone(),
        section_events,
        program_events,
        runner_state,
    ));
    tokio::spawn(mqtt::run_connection(
        Arc::clone(&app),
        handle.clone(),
        eventloop,
    ));

    // Run until asked to stop.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    handle.update_connected(false).await;
    app.shutdown();
    info!("daemon stopped");
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
