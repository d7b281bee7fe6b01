// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hardware seam for valve channels
//!
//! The section runner is the only caller of [`SectionInterface::set`]; the
//! rest of the system reads channel state through [`SectionInterface::get`].
//! The mock implementation records every actuation so tests can assert on
//! the exact on/off sequence a scenario produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use thiserror::Error;

/// Hardware channel index, as listed in the `pins` config table
pub type ChannelId = u16;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("channel {0} out of range (interface has {1} channels)")]
    ChannelOutOfRange(ChannelId, ChannelId),
    #[error("channel {0} failed: {1}")]
    Channel(ChannelId, String),
}

/// An addressable bank of output channels
///
/// Not necessarily backed by real pins (see [`MockSectionInterface`]).
pub trait SectionInterface: Send + Sync {
    fn name(&self) -> &'static str;

    fn count(&self) -> ChannelId;

    fn set(&self, channel: ChannelId, on: bool) -> Result<(), HardwareError>;

    fn get(&self, channel: ChannelId) -> bool;
}

/// In-memory interface used by tests and non-hardware deployments
pub struct MockSectionInterface {
    states: Vec<AtomicBool>,
    operations: Mutex<Vec<(ChannelId, bool)>>,
}

impl MockSectionInterface {
    pub fn new(channels: usize) -> Self {
        Self {
            states: (0..channels).map(|_| AtomicBool::new(false)).collect(),
            operations: Mutex::new(Vec::new()),
        }
    }

    /// Every `set` call observed, in order
    pub fn operations(&self) -> Vec<(ChannelId, bool)> {
        self.operations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of channels currently on
    pub fn on_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| s.load(Ordering::SeqCst))
            .count()
    }
}

impl SectionInterface for MockSectionInterface {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn count(&self) -> ChannelId {
        self.states.len() as ChannelId
    }

    fn set(&self, channel: ChannelId, on: bool) -> Result<(), HardwareError> {
        let state = self.states.get(channel as usize).ok_or(
            HardwareError::ChannelOutOfRange(channel, self.states.len() as ChannelId),
        )?;
        state.store(on, Ordering::SeqCst);
        self.operations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((channel, on));
        Ok(())
    }

    fn get(&self, channel: ChannelId) -> bool {
        self.states
            .get(channel as usize)
            .map(|s| s.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}
