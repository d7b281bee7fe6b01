// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: config load, component wiring, shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use sprinkler_core::bus::UpdateBus;
use sprinkler_core::config::{ConfigDocument, ConfigError};
use sprinkler_core::hardware::{ChannelId, MockSectionInterface, SectionInterface};
use sprinkler_core::program::{Program, ProgramEvent};
use sprinkler_core::{SectionRegistry, SectionRunner, SystemClock};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The wired-up application: registry, runner, and program supervisors
pub struct App {
    pub config_path: PathBuf,
    pub pins: Vec<ChannelId>,
    pub interface: Arc<dyn SectionInterface>,
    pub registry: Arc<SectionRegistry>,
    pub runner: SectionRunner,
    pub programs: Vec<Arc<Program>>,
    pub program_bus: Arc<UpdateBus<ProgramEvent>>,
}

/// Load the config document and start every long-lived task
pub fn startup(config_path: PathBuf) -> Result<App, LifecycleError> {
    let document = ConfigDocument::load(&config_path)?;
    let pins = document.section_interface.pins.clone();

    // The pin driver is swappable behind the SectionInterface trait; the
    // in-memory interface drives no hardware but keeps full state.
    let interface: Arc<dyn SectionInterface> = Arc::new(MockSectionInterface::new(pins.len()));

    let registry = Arc::new(SectionRegistry::new(document.sections.clone()));
    let runner = SectionRunner::spawn(Arc::clone(&registry), Arc::clone(&interface), SystemClock);

    let program_bus = Arc::new(UpdateBus::new());
    let programs: Vec<Arc<Program>> = document
        .programs
        .into_iter()
        .map(|config| {
            Program::spawn(
                config.id,
                config.into_data(),
                runner.clone(),
                Arc::clone(&program_bus),
                SystemClock,
            )
        })
        .collect();

    info!(
        sections = registry.len(),
        programs = programs.len(),
        "initialized sections and programs"
    );

    Ok(App {
        config_path,
        pins,
        interface,
        registry,
        runner,
        programs,
        program_bus,
    })
}

impl App {
    /// Persist the live state back to the config file
    pub fn write_config(&self) -> Result<(), ConfigError> {
        ConfigDocument::capture(&self.pins, &self.registry, &self.programs)
            .save(&self.config_path)
    }

    /// Stop programs and the runner, leaving every channel off
    pub fn shutdown(&self) {
        info!("cleaning up");
        for program in &self.programs {
            program.quit();
        }
        self.runner.cancel_all();
        self.runner.quit();
    }
}
