// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Update buses for pushing state changes to an external observer
//!
//! Each bus carries two classes of events with different delivery
//! contracts. Data changes (name/sequence/schedule edits) are delivered
//! reliably: the publisher waits for buffer space and a closed bus rejects
//! the write. Transition changes (on/off, running/idle) are best-effort:
//! a slow observer loses intermediate transitions and re-syncs from the
//! current state.

use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::mpsc;

/// Default buffer depth for an attached observer
pub const BUS_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("an observer is already attached")]
    AlreadyAttached,
    #[error("observer is gone; update not delivered")]
    Closed,
}

/// A single-observer update bus
pub struct UpdateBus<E> {
    tx: Mutex<Option<mpsc::Sender<E>>>,
}

impl<E: Send + 'static> UpdateBus<E> {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    /// Attach the observer. At most one observer per bus.
    pub fn attach(&self) -> Result<mpsc::Receiver<E>, BusError> {
        let mut tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        if tx.is_some() {
            return Err(BusError::AlreadyAttached);
        }
        let (sender, receiver) = mpsc::channel(BUS_CAPACITY);
        *tx = Some(sender);
        Ok(receiver)
    }

    fn sender(&self) -> Option<mpsc::Sender<E>> {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Publish a data change. Waits for buffer space; fails if the
    /// observer is gone. With no observer attached this is a no-op.
    pub async fn data(&self, event: E) -> Result<(), BusError> {
        let Some(sender) = self.sender() else {
            return Ok(());
        };
        sender.send(event).await.map_err(|_| BusError::Closed)
    }

    /// Publish a transition. Never blocks; dropped if the observer's
    /// buffer is full.
    pub fn transition(&self, event: E) {
        let Some(sender) = self.sender() else {
            return;
        };
        if let Err(mpsc::error::TrySendError::Full(_)) = sender.try_send(event) {
            tracing::trace!("observer slow; transition event dropped");
        }
    }
}

impl<E: Send + 'static> Default for UpdateBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
