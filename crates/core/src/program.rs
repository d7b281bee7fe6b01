// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Programs and their per-program supervisor tasks
//!
//! A program is a named sequence of (section, duration) steps plus a
//! schedule. Each program owns one supervisor task that waits on whichever
//! comes first: the schedule's next fire time or an external command. A
//! program run enqueues every step through the section runner up front and
//! waits on the completion signals in order, so cancellation can withdraw
//! the not-yet-started steps by run id.
//!
//! Program runs are single-instance: a fire or `Run` command while a run is
//! in flight is ignored, and a missed schedule fire is skipped rather than
//! queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::bus::UpdateBus;
use crate::clock::Clock;
use crate::error::RequestError;
use crate::runner::{RunId, SectionRunner};
use crate::sched::Schedule;
use crate::section::SectionId;

/// Logical program id, dense `0..N`, assigned by config position
pub type ProgramId = usize;

/// Serde helper: durations as floating-point seconds on the wire
pub mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "duration out of range: {secs}"
            )));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

/// One step of a program: run a section for a duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgItem {
    pub section: SectionId,
    #[serde(with = "seconds")]
    pub duration: Duration,
}

/// Steps executed in order. May be empty; an empty run ends immediately.
pub type ProgSequence = Vec<ProgItem>;

/// The editable data of a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramData {
    pub name: String,
    pub sequence: ProgSequence,
    pub schedule: Schedule,
    pub enabled: bool,
}

/// A partial edit arriving over the control surface
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramUpdate {
    pub name: Option<String>,
    pub sequence: Option<ProgSequence>,
    pub schedule: Option<Schedule>,
    pub enabled: Option<bool>,
}

/// Updates published on the program bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramEvent {
    /// Program data changed (edit)
    Data { program: ProgramId },
    /// Program started or stopped running
    Running { program: ProgramId, running: bool },
}

enum ProgramCommand {
    Run,
    Cancel,
    Refresh,
    Quit,
}

/// A program plus the handle to its supervisor task
pub struct Program {
    id: ProgramId,
    data: RwLock<ProgramData>,
    running: AtomicBool,
    commands: mpsc::UnboundedSender<ProgramCommand>,
    bus: Arc<UpdateBus<ProgramEvent>>,
}

impl Program {
    /// Spawn the supervisor task for a program
    pub fn spawn<C: Clock + 'static>(
        id: ProgramId,
        data: ProgramData,
        runner: SectionRunner,
        bus: Arc<UpdateBus<ProgramEvent>>,
        clock: C,
    ) -> Arc<Program> {
        let (commands, rx) = mpsc::unbounded_channel();
        let program = Arc::new(Program {
            id,
            data: RwLock::new(data),
            running: AtomicBool::new(false),
            commands,
            bus,
        });
        let supervisor = Supervisor {
            program: Arc::clone(&program),
            runner,
            clock,
            rx,
            cancel: None,
            last_fire: None,
        };
        tokio::spawn(supervisor.run());
        program
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn name(&self) -> String {
        self.data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .name
            .clone()
    }

    /// Snapshot of the program's editable data
    pub fn data(&self) -> ProgramData {
        self.data.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether a program run is currently in flight
    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Begin a run now, regardless of schedule
    pub fn run_now(&self) {
        self.send(ProgramCommand::Run);
    }

    /// Cancel the in-flight run, if any
    pub fn cancel(&self) {
        self.send(ProgramCommand::Cancel);
    }

    /// Re-evaluate the schedule (after an edit)
    pub fn refresh(&self) {
        self.send(ProgramCommand::Refresh);
    }

    /// Stop the supervisor, cancelling the in-flight run first
    pub fn quit(&self) {
        self.send(ProgramCommand::Quit);
    }

    fn send(&self, command: ProgramCommand) {
        if self.commands.send(command).is_err() {
            warn!(program = self.id, "program supervisor is gone; command dropped");
        }
    }

    /// Apply a partial edit, publish the data change, and re-arm the
    /// schedule. `sections` is the registry size, used to validate the
    /// sequence.
    pub async fn update(
        &self,
        update: ProgramUpdate,
        sections: usize,
    ) -> Result<ProgramData, RequestError> {
        if let Some(sequence) = &update.sequence {
            for item in sequence {
                if item.section >= sections {
                    return Err(RequestError::invalid_data(
                        "program update",
                        format!("unknown section id {}", item.section),
                    ));
                }
            }
        }

        let snapshot = {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            if let Some(name) = update.name {
                data.name = name;
            }
            if let Some(sequence) = update.sequence {
                data.sequence = sequence;
            }
            if let Some(schedule) = update.schedule {
                data.schedule = schedule;
            }
            if let Some(enabled) = update.enabled {
                data.enabled = enabled;
            }
            data.clone()
        };

        self.bus
            .data(ProgramEvent::Data { program: self.id })
            .await
            .map_err(RequestError::internal)?;
        self.refresh();
        Ok(snapshot)
    }
}

struct Supervisor<C: Clock> {
    program: Arc<Program>,
    runner: SectionRunner,
    clock: C,
    rx: mpsc::UnboundedReceiver<ProgramCommand>,
    /// Cancel signal for the in-flight run, if one was started
    cancel: Option<oneshot::Sender<()>>,
    /// Last schedule fire, so one fire never triggers twice
    last_fire: Option<NaiveDateTime>,
}

/// Sleeps for the given delay; pends forever when there is none
async fn fire_timer(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

impl<C: Clock + 'static> Supervisor<C> {
    async fn run(mut self) {
        loop {
            let next = self.next_fire();
            let delay = next.map(|at| {
                (at - self.clock.now().naive_local())
                    .to_std()
                    .unwrap_or_default()
            });
            match &next {
                Some(at) => debug!(program = self.program.id, next_run = %at, "program scheduled"),
                None => debug!(program = self.program.id, "program not scheduled"),
            }

            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(ProgramCommand::Run) => self.start_run(),
                    Some(ProgramCommand::Cancel) => self.cancel_run(),
                    Some(ProgramCommand::Refresh) => continue,
                    Some(ProgramCommand::Quit) | None => {
                        self.cancel_run();
                        debug!(program = self.program.id, "quitting program runner");
                        break;
                    }
                },
                () = fire_timer(delay) => {
                    self.last_fire = next;
                    self.start_run();
                }
            }
        }
    }

    /// The next scheduled fire strictly after the last one
    fn next_fire(&self) -> Option<NaiveDateTime> {
        let data = self.program.data.read().unwrap_or_else(|e| e.into_inner());
        if !data.enabled {
            return None;
        }
        let mut reference = self.clock.now().naive_local();
        if let Some(last) = self.last_fire {
            if reference <= last {
                reference = last + chrono::Duration::milliseconds(1);
            }
        }
        data.schedule.next_run_after(reference)
    }

    fn start_run(&mut self) {
        if self
            .program
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!(
                program = self.program.id,
                "program was started when already running"
            );
            return;
        }
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.cancel = Some(cancel_tx);
        tokio::spawn(run_sequence(
            Arc::clone(&self.program),
            self.runner.clone(),
            cancel_rx,
        ));
    }

    fn cancel_run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // Fails harmlessly if the run already completed.
            let _ = cancel.send(());
        }
    }
}

/// One program run: all steps enqueued up front, awaited in order
async fn run_sequence(program: Arc<Program>, runner: SectionRunner, mut cancel: oneshot::Receiver<()>) {
    info!(program = program.id, name = %program.name(), "running program");
    program.bus.transition(ProgramEvent::Running {
        program: program.id,
        running: true,
    });

    let sequence = program.data().sequence;
    let mut ids: Vec<RunId> = Vec::with_capacity(sequence.len());
    let mut signals = Vec::with_capacity(sequence.len());
    for item in &sequence {
        let (id, signal) = runner.run_async(item.section, item.duration);
        ids.push(id);
        signals.push(signal);
    }

    let mut cancelled = false;
    for (index, signal) in signals.into_iter().enumerate() {
        tokio::select! {
            _ = signal => {}
            _ = &mut cancel => {
                // Withdraw the not-yet-finished steps, last first.
                for id in ids[index..].iter().rev() {
                    runner.cancel_run(*id);
                }
                cancelled = true;
                break;
            }
        }
    }

    program.running.store(false, Ordering::SeqCst);
    program.bus.transition(ProgramEvent::Running {
        program: program.id,
        running: false,
    });
    if cancelled {
        info!(program = program.id, "program run cancelled");
    } else {
        info!(program = program.id, "finished running program");
    }
}

#[cfg(test)]
#[path = "program_tests.rs"]
mod tests;
