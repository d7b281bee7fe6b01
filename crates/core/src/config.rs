// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted configuration document
//!
//! One JSON file describes the hardware pins, the sections, and the
//! programs. Section and program ids are positional: they are assigned by
//! index on load and are not trusted from the file. Writes go through a
//! temp file and a rename so a crash never leaves a torn document.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::hardware::ChannelId;
use crate::program::{ProgSequence, Program, ProgramData, ProgramId};
use crate::sched::Schedule;
use crate::section::{Section, SectionId, SectionRegistry};

/// Environment variable naming the config file path
pub const CONFIG_ENV: &str = "SPRINKLERD_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Hardware description: one output pin per channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionInterfaceConfig {
    pub pins: Vec<ChannelId>,
}

/// A program as stored on disk and published on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramConfig {
    #[serde(default)]
    pub id: ProgramId,
    pub name: String,
    #[serde(default)]
    pub sequence: ProgSequence,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub enabled: bool,
}

impl ProgramConfig {
    pub fn into_data(self) -> ProgramData {
        ProgramData {
            name: self.name,
            sequence: self.sequence,
            schedule: self.schedule,
            enabled: self.enabled,
        }
    }

    pub fn from_program(program: &Program) -> Self {
        let data = program.data();
        Self {
            id: program.id(),
            name: data.name,
            sequence: data.sequence,
            schedule: data.schedule,
            enabled: data.enabled,
        }
    }
}

/// The whole configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub section_interface: SectionInterfaceConfig,
    pub sections: Vec<Section>,
    pub programs: Vec<ProgramConfig>,
}

impl ConfigDocument {
    /// Resolve the config file path from the environment
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./config.json"))
    }

    /// Load and validate a document, assigning positional ids
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "loading config");
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document: ConfigDocument =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        for (id, section) in document.sections.iter_mut().enumerate() {
            section.id = id as SectionId;
        }
        for (id, program) in document.programs.iter_mut().enumerate() {
            program.id = id;
        }

        document.validate()?;
        Ok(document)
    }

    /// Write the document atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        debug!(path = %path.display(), "writing config");
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let write = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        fs::write(&tmp, json).map_err(write)?;
        fs::rename(&tmp, path).map_err(write)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let channels = self.section_interface.pins.len();
        for section in &self.sections {
            if section.interface_id as usize >= channels {
                return Err(ConfigError::Invalid(format!(
                    "section '{}' uses interface id {} but only {} pins are configured",
                    section.name, section.interface_id, channels
                )));
            }
        }
        for program in &self.programs {
            for item in &program.sequence {
                if item.section >= self.sections.len() {
                    return Err(ConfigError::Invalid(format!(
                        "program '{}' references unknown section id {}",
                        program.name, item.section
                    )));
                }
            }
        }
        Ok(())
    }

    /// Snapshot the live registry and programs back into a document for
    /// persistence
    pub fn capture(
        pins: &[ChannelId],
        registry: &SectionRegistry,
        programs: &[Arc<Program>],
    ) -> Self {
        Self {
            section_interface: SectionInterfaceConfig {
                pins: pins.to_vec(),
            },
            sections: registry.snapshot(),
            programs: programs
                .iter()
                .map(|program| ProgramConfig::from_program(program))
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
