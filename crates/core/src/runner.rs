// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Section runner: the serialized run queue over all sections
//!
//! One long-lived task owns the queue, the current run, and the paused
//! flag, and is the only caller of the hardware interface. Callers submit
//! commands over a channel and never touch the state directly; every
//! command transforms the state atomically and publishes a fresh snapshot
//! on the watch channel.
//!
//! Pause arithmetic is monotonic: `remaining` is only reduced on a pause
//! edge, by the interval measured since the last actuate-on edge. While
//! paused, no time is deducted.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, Instant, Sleep};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::hardware::SectionInterface;
use crate::section::{SectionId, SectionRegistry};

/// Process-unique run identifier, strictly increasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunId(pub u32);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One queued or active run of a section
struct SectionRun {
    id: RunId,
    section: SectionId,
    total: Duration,
    remaining: Duration,
    done: Option<oneshot::Sender<bool>>,
    start_time: Option<DateTime<Local>>,
    pause_time: Option<DateTime<Local>>,
    unpause_time: Option<DateTime<Local>>,
    /// Monotonic mark of the last actuate-on edge; None while not running
    mark: Option<Instant>,
}

impl SectionRun {
    fn new(id: RunId, section: SectionId, duration: Duration, done: Option<oneshot::Sender<bool>>) -> Self {
        Self {
            id,
            section,
            total: duration,
            remaining: duration,
            done,
            start_time: None,
            pause_time: None,
            unpause_time: None,
            mark: None,
        }
    }

    fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            id: self.id,
            section: self.section,
            total_duration: self.total.as_secs_f64(),
            duration: self.remaining.as_secs_f64(),
            start_time: self.start_time,
            pause_time: self.pause_time,
            unpause_time: self.unpause_time,
        }
    }
}

/// Serializable view of one run, published in the runner snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub id: RunId,
    pub section: SectionId,
    pub total_duration: f64,
    /// Remaining duration in seconds
    pub duration: f64,
    pub start_time: Option<DateTime<Local>>,
    pub pause_time: Option<DateTime<Local>>,
    pub unpause_time: Option<DateTime<Local>>,
}

/// Full runner state, published after every command
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunnerSnapshot {
    pub queue: Vec<RunSnapshot>,
    pub current: Option<RunSnapshot>,
    pub paused: bool,
}

enum Command {
    Run(SectionRun),
    CancelRun(RunId),
    CancelSection(SectionId),
    CancelAll,
    SetPaused(bool),
    Quit,
}

/// Cloneable handle to the section runner task
///
/// All operations are non-blocking: they enqueue a command and return.
/// Completion is observable through the signal returned by
/// [`SectionRunner::run_async`] or through state snapshots.
#[derive(Clone)]
pub struct SectionRunner {
    tx: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU32>,
    state: watch::Receiver<RunnerSnapshot>,
}

impl SectionRunner {
    /// Spawn the runner task for the given registry and hardware interface
    pub fn spawn<C: Clock + 'static>(
        registry: Arc<SectionRegistry>,
        interface: Arc<dyn SectionInterface>,
        clock: C,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(RunnerSnapshot::default());
        let task = RunnerTask {
            registry,
            interface,
            clock,
            current: None,
            queue: VecDeque::new(),
            paused: false,
            rx,
            state_tx,
            expiry: None,
        };
        tokio::spawn(task.run());
        Self {
            tx,
            next_id: Arc::new(AtomicU32::new(0)),
            state,
        }
    }

    fn allocate_id(&self) -> RunId {
        RunId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            warn!("section runner task is gone; command dropped");
        }
    }

    /// Queue a run without a completion signal. Returns its run id.
    pub fn queue(&self, section: SectionId, duration: Duration) -> RunId {
        let id = self.allocate_id();
        self.send(Command::Run(SectionRun::new(id, section, duration, None)));
        id
    }

    /// Queue a run and receive a one-shot signal when it ends. The signal
    /// value is `true` iff the run was cancelled.
    pub fn run_async(&self, section: SectionId, duration: Duration) -> (RunId, oneshot::Receiver<bool>) {
        let id = self.allocate_id();
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Command::Run(SectionRun::new(id, section, duration, Some(done_tx))));
        (id, done_rx)
    }

    /// Queue a run and wait for it to end. Returns `true` iff cancelled.
    pub async fn run(&self, section: SectionId, duration: Duration) -> bool {
        let (_, done) = self.run_async(section, duration);
        done.await.unwrap_or(true)
    }

    /// Cancel one run by id; no-op for unknown ids
    pub fn cancel_run(&self, id: RunId) {
        self.send(Command::CancelRun(id));
    }

    /// Cancel every run (queued or current) targeting a section
    pub fn cancel_section(&self, section: SectionId) {
        self.send(Command::CancelSection(section));
    }

    /// Cancel the current run and drain the queue. Paused state is kept.
    pub fn cancel_all(&self) {
        self.send(Command::CancelAll);
    }

    /// Stop actuation and stop consuming the queue. Idempotent.
    pub fn pause(&self) {
        self.send(Command::SetPaused(true));
    }

    /// Resume the held run, or promote the queue head. Idempotent.
    pub fn unpause(&self) {
        self.send(Command::SetPaused(false));
    }

    /// Stop the runner task
    pub fn quit(&self) {
        self.send(Command::Quit);
    }

    /// Subscribe to state snapshots
    pub fn subscribe(&self) -> watch::Receiver<RunnerSnapshot> {
        self.state.clone()
    }

    /// The latest published state snapshot
    pub fn state(&self) -> RunnerSnapshot {
        self.state.borrow().clone()
    }
}

struct RunnerTask<C: Clock> {
    registry: Arc<SectionRegistry>,
    interface: Arc<dyn SectionInterface>,
    clock: C,
    current: Option<SectionRun>,
    queue: VecDeque<SectionRun>,
    paused: bool,
    rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<RunnerSnapshot>,
    expiry: Option<Pin<Box<Sleep>>>,
}

/// Resolves when the expiry timer fires; pends forever with no timer armed
async fn expired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

impl<C: Clock> RunnerTask<C> {
    async fn run(mut self) {
        self.publish();
        loop {
            tokio::select! {
                command = self.rx.recv() => {
                    match command {
                        Some(Command::Run(run)) => self.handle_run(run),
                        Some(Command::CancelRun(id)) => self.handle_cancel_run(id),
                        Some(Command::CancelSection(section)) => self.handle_cancel_section(section),
                        Some(Command::CancelAll) => self.handle_cancel_all(),
                        Some(Command::SetPaused(paused)) => self.handle_set_paused(paused),
                        Some(Command::Quit) | None => {
                            debug!("section runner stopping");
                            break;
                        }
                    }
                    self.publish();
                }
                () = expired(&mut self.expiry) => {
                    self.finish_current(false);
                    self.start_current();
                    self.publish();
                }
            }
        }
    }

    fn handle_run(&mut self, run: SectionRun) {
        debug_assert!(self.queue.iter().all(|queued| queued.id != run.id));
        if self.current.is_none() && !self.paused {
            self.current = Some(run);
            self.start_current();
        } else {
            debug!(run = %run.id, section = run.section, "queued section run");
            self.queue.push_back(run);
        }
    }

    fn handle_cancel_run(&mut self, id: RunId) {
        if let Some(index) = self.queue.iter().position(|run| run.id == id) {
            if let Some(mut run) = self.queue.remove(index) {
                deliver(&mut run, true);
                debug!(run = %id, "cancelled queued section run");
            }
        } else if self.current.as_ref().map_or(false, |run| run.id == id) {
            self.finish_current(true);
            self.start_current();
            debug!(run = %id, "cancelled current section run");
        }
    }

    fn handle_cancel_section(&mut self, section: SectionId) {
        self.queue.retain_mut(|run| {
            if run.section == section {
                deliver(run, true);
                false
            } else {
                true
            }
        });
        if self.current.as_ref().map_or(false, |run| run.section == section) {
            self.finish_current(true);
            self.start_current();
        }
        debug!(section, "cancelled section runs for section");
    }

    fn handle_cancel_all(&mut self) {
        for mut run in self.queue.drain(..) {
            deliver(&mut run, true);
        }
        if self.current.is_some() {
            self.finish_current(true);
            self.start_current();
        }
        debug!(paused = self.paused, "cancelled all section runs");
    }

    fn handle_set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        let now = self.clock.now();
        if paused {
            self.paused = true;
            if let Some(run) = self.current.as_mut() {
                // Deduct only what has elapsed since the last on edge.
                let elapsed = run.mark.take().map(|mark| mark.elapsed()).unwrap_or_default();
                run.remaining = run.remaining.saturating_sub(elapsed);
                run.pause_time = Some(now);
                if let Err(error) = self.registry.set_state(&*self.interface, run.section, false) {
                    warn!(%error, section = run.section, "failed to actuate section off");
                }
                self.expiry = None;
                debug!(run = %run.id, ran_for = ?elapsed, remaining = ?run.remaining, "paused section runner");
            }
        } else {
            self.paused = false;
            if let Some(run) = self.current.as_mut() {
                debug!(run = %run.id, remaining = ?run.remaining, "resuming paused section");
                if let Err(error) = self.registry.set_state(&*self.interface, run.section, true) {
                    warn!(%error, section = run.section, "failed to actuate section on");
                }
                run.pause_time = None;
                run.unpause_time = Some(now);
                run.mark = Some(Instant::now());
                self.expiry = Some(Box::pin(sleep(run.remaining)));
            } else {
                self.current = self.queue.pop_front();
                self.start_current();
                debug!("unpaused section runner");
            }
        }
    }

    /// Begin the current run: actuate on and arm the expiry timer, or mark
    /// it held if the runner is paused
    fn start_current(&mut self) {
        let Some(run) = self.current.as_mut() else {
            return;
        };
        let now = self.clock.now();
        run.start_time = Some(now);
        if self.paused {
            run.pause_time = Some(now);
            self.expiry = None;
        } else {
            info!(run = %run.id, section = run.section, duration = ?run.remaining, "running section");
            if let Err(error) = self.registry.set_state(&*self.interface, run.section, true) {
                warn!(%error, section = run.section, "failed to actuate section on");
            }
            run.mark = Some(Instant::now());
            self.expiry = Some(Box::pin(sleep(run.remaining)));
        }
    }

    /// End the current run, deliver its signal, and promote the queue head
    /// into `current` (without starting it)
    fn finish_current(&mut self, cancelled: bool) {
        let Some(mut run) = self.current.take() else {
            return;
        };
        if let Err(error) = self.registry.set_state(&*self.interface, run.section, false) {
            warn!(%error, section = run.section, "failed to actuate section off");
        }
        self.expiry = None;
        deliver(&mut run, cancelled);
        info!(
            run = %run.id,
            section = run.section,
            outcome = if cancelled { "cancelled" } else { "finished" },
            "section run ended"
        );
        self.current = self.queue.pop_front();
    }

    fn publish(&self) {
        if let Some(current) = &self.current {
            debug_assert!(self.queue.iter().all(|queued| queued.id != current.id));
        }
        let snapshot = RunnerSnapshot {
            queue: self.queue.iter().map(SectionRun::snapshot).collect(),
            current: self.current.as_ref().map(SectionRun::snapshot),
            paused: self.paused,
        };
        self.state_tx.send_replace(snapshot);
    }
}

/// Deliver a run's completion signal, at most once
fn deliver(run: &mut SectionRun, cancelled: bool) {
    if let Some(done) = run.done.take() {
        let _ = done.send(cancelled);
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
