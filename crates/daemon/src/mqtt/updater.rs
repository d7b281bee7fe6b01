// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus-to-topic updater
//!
//! Consumes the section bus, the program bus, and the runner's state watch,
//! republishing the affected retained topics. Data changes additionally
//! write the config document back to disk, so an edit that was acknowledged
//! is never lost on restart.

use std::sync::Arc;

use sprinkler_core::program::ProgramEvent;
use sprinkler_core::runner::RunnerSnapshot;
use sprinkler_core::section::SectionEvent;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use super::MqttHandle;
use crate::lifecycle::App;

/// Run the updater until every source has closed
pub async fn run_updater(
    app: Arc<App>,
    handle: MqttHandle,
    mut section_events: mpsc::Receiver<SectionEvent>,
    mut program_events: mpsc::Receiver<ProgramEvent>,
    mut runner_state: watch::Receiver<RunnerSnapshot>,
) {
    loop {
        tokio::select! {
            Some(event) = section_events.recv() => {
                handle_section_event(&app, &handle, event).await;
            }
            Some(event) = program_events.recv() => {
                handle_program_event(&app, &handle, event).await;
            }
            changed = runner_state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = runner_state.borrow_and_update().clone();
                debug!(
                    queued = snapshot.queue.len(),
                    paused = snapshot.paused,
                    "section runner update"
                );
                handle.publish_runner_state(&snapshot).await;
            }
            else => break,
        }
    }
    debug!("updater stopping");
}

async fn handle_section_event(app: &App, handle: &MqttHandle, event: SectionEvent) {
    match event {
        SectionEvent::Data { section } => {
            match app.registry.get(section) {
                Ok(data) => handle.publish_section_data(&data).await,
                Err(error) => {
                    error!(%error, section, "section update for unknown section");
                    return;
                }
            }
            write_config(app);
        }
        SectionEvent::State { section, on } => {
            handle.publish_section_state(section, on).await;
        }
    }
}

async fn handle_program_event(app: &App, handle: &MqttHandle, event: ProgramEvent) {
    match event {
        ProgramEvent::Data { program } => {
            match app.programs.get(program) {
                Some(data) => handle.publish_program_data(data).await,
                None => {
                    error!(program, "program update for unknown program");
                    return;
                }
            }
            write_config(app);
        }
        ProgramEvent::Running { program, running } => {
            handle.publish_program_running(program, running).await;
        }
    }
}

fn write_config(app: &App) {
    if let Err(error) = app.write_config() {
        warn!(%error, "failed to write config after data change");
    }
}
