// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Section registry and section state bus
//!
//! A section binds a stable logical id to a hardware channel and a display
//! name. The set of sections is fixed for the lifetime of the process; only
//! names may be edited, and edits are serialized with readers through a
//! short lock so a running program never observes a torn name.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::{BusError, UpdateBus};
use crate::hardware::{ChannelId, HardwareError, SectionInterface};

/// Logical section id, dense `0..N`, assigned by config position
pub type SectionId = usize;

/// One valve section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    pub interface_id: ChannelId,
}

/// Updates published on the section bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionEvent {
    /// Section data changed (name edit)
    Data { section: SectionId },
    /// Section toggled on or off
    State { section: SectionId, on: bool },
}

#[derive(Debug, Error)]
pub enum SectionError {
    #[error("unknown section id {0}")]
    UnknownSection(SectionId),
    #[error(transparent)]
    Hardware(#[from] HardwareError),
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// The immutable set of sections plus their update bus
pub struct SectionRegistry {
    sections: Vec<RwLock<Section>>,
    bus: UpdateBus<SectionEvent>,
}

impl SectionRegistry {
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            sections: sections.into_iter().map(RwLock::new).collect(),
            bus: UpdateBus::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Snapshot of one section's data
    pub fn get(&self, id: SectionId) -> Result<Section, SectionError> {
        let section = self
            .sections
            .get(id)
            .ok_or(SectionError::UnknownSection(id))?;
        Ok(section.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    /// Snapshot of all sections, in id order
    pub fn snapshot(&self) -> Vec<Section> {
        self.sections
            .iter()
            .map(|s| s.read().unwrap_or_else(|e| e.into_inner()).clone())
            .collect()
    }

    pub fn name(&self, id: SectionId) -> Result<String, SectionError> {
        Ok(self.get(id)?.name)
    }

    /// Edit a section's display name and publish the data change
    pub async fn rename(&self, id: SectionId, name: impl Into<String>) -> Result<(), SectionError> {
        {
            let section = self
                .sections
                .get(id)
                .ok_or(SectionError::UnknownSection(id))?;
            let mut section = section.write().unwrap_or_else(|e| e.into_inner());
            section.name = name.into();
        }
        self.bus.data(SectionEvent::Data { section: id }).await?;
        Ok(())
    }

    /// Drive a section's channel and publish the transition
    ///
    /// Only the section runner calls this.
    pub fn set_state(
        &self,
        interface: &dyn SectionInterface,
        id: SectionId,
        on: bool,
    ) -> Result<(), SectionError> {
        let interface_id = self.get(id)?.interface_id;
        interface.set(interface_id, on)?;
        self.bus.transition(SectionEvent::State { section: id, on });
        Ok(())
    }

    /// Read a section's channel state
    pub fn state(&self, interface: &dyn SectionInterface, id: SectionId) -> Result<bool, SectionError> {
        Ok(interface.get(self.get(id)?.interface_id))
    }

    pub fn bus(&self) -> &UpdateBus<SectionEvent> {
        &self.bus
    }
}

#[cfg(test)]
#[path = "section_tests.rs"]
mod tests;
