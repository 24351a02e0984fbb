//! Execution host: runs an [`Attack`] on a dedicated worker thread.
//!
//! The caller talks to the host with [`HostCommand`]s and receives [`HostEvent`]s. Everything a
//! run needs is moved into the worker with the start request; the only state shared with the
//! worker is its cancellation flag.
//!
//! Guarantees:
//! - each run delivers zero or more `Progress` events followed by exactly one terminal event;
//! - once `Cancel` has been sent, no further `Progress`/`Found`/`NotFound` is delivered for that
//!   run and the terminal event is `Cancelled`;
//! - the worker thread is joined as soon as the terminal event has been handed to the caller.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::attack::{Attack, AttackOptions, CancelToken, RunOutcome};
use crate::candidates::CandidatePlan;
use crate::error::HostError;
use crate::progress::ProgressSnapshot;
use crate::EncryptionParams;

const DEFAULT_THREAD_NAME: &str = "pwrecover-worker";

/// Everything a run needs, moved into the worker.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub plan: CandidatePlan,
    pub params: EncryptionParams,
}

/// Caller → host.
#[derive(Debug, Clone)]
pub enum HostCommand {
    Start(StartRequest),
    Cancel,
}

/// Host → caller.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Progress(ProgressSnapshot),
    Found { password: String },
    NotFound,
    Cancelled,
    Error { reason: String },
}

impl HostEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HostEvent::Progress(_))
    }

    /// The run outcome carried by a terminal event.
    pub fn into_outcome(self) -> Option<RunOutcome> {
        match self {
            HostEvent::Progress(_) => None,
            HostEvent::Found { password } => Some(RunOutcome::Found(password)),
            HostEvent::NotFound => Some(RunOutcome::NotFound),
            HostEvent::Cancelled => Some(RunOutcome::Cancelled),
            HostEvent::Error { reason } => Some(RunOutcome::Failed(reason)),
        }
    }
}

impl From<RunOutcome> for HostEvent {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Found(password) => HostEvent::Found { password },
            RunOutcome::NotFound => HostEvent::NotFound,
            RunOutcome::Cancelled => HostEvent::Cancelled,
            RunOutcome::Failed(reason) => HostEvent::Error { reason },
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub attack: AttackOptions,
    pub thread_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            attack: AttackOptions::default(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

struct ActiveRun {
    cancel: CancelToken,
    cancel_requested: bool,
    events: Receiver<HostEvent>,
    worker: Option<JoinHandle<()>>,
}

impl ActiveRun {
    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("recovery worker panicked outside the attack loop");
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Wait {
    Block,
    Timeout(Duration),
    Poll,
}

/// Owns at most one in-flight run.
pub struct RecoveryHost {
    config: HostConfig,
    run: Option<ActiveRun>,
}

impl RecoveryHost {
    pub fn new(config: HostConfig) -> Self {
        Self { config, run: None }
    }

    pub fn send(&mut self, command: HostCommand) -> Result<(), HostError> {
        match command {
            HostCommand::Start(request) => self.start(request),
            HostCommand::Cancel => {
                self.cancel();
                Ok(())
            }
        }
    }

    /// Start a run. An active run is cancelled and joined first; its pending events are lost.
    pub fn start(&mut self, request: StartRequest) -> Result<(), HostError> {
        self.teardown();

        let cancel = CancelToken::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        let options = self.config.attack;
        let worker_cancel = cancel.clone();
        let worker = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || run_worker(request, options, worker_cancel, tx))
            .map_err(HostError::Spawn)?;

        self.run = Some(ActiveRun {
            cancel,
            cancel_requested: false,
            events: rx,
            worker: Some(worker),
        });
        Ok(())
    }

    /// Request cancellation of the active run. Does nothing when idle.
    pub fn cancel(&mut self) {
        if let Some(run) = self.run.as_mut() {
            if !run.cancel_requested {
                log::debug!("cancellation requested");
            }
            run.cancel.cancel();
            run.cancel_requested = true;
        }
    }

    /// Whether a run has been started and its terminal event not yet received.
    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Block until the next event. `None` when no run is active.
    pub fn recv(&mut self) -> Option<HostEvent> {
        self.next_event(Wait::Block)
    }

    /// Wait up to `timeout` for the next event. `None` on timeout or when no run is active.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<HostEvent> {
        self.next_event(Wait::Timeout(timeout))
    }

    /// Next event if one is ready.
    pub fn try_recv(&mut self) -> Option<HostEvent> {
        self.next_event(Wait::Poll)
    }

    /// Drain the active run, forwarding progress, and return its outcome.
    pub fn wait<F>(&mut self, mut on_progress: F) -> Option<RunOutcome>
    where
        F: FnMut(&ProgressSnapshot),
    {
        while let Some(event) = self.recv() {
            match event {
                HostEvent::Progress(snapshot) => on_progress(&snapshot),
                terminal => return terminal.into_outcome(),
            }
        }
        None
    }

    fn next_event(&mut self, wait: Wait) -> Option<HostEvent> {
        loop {
            let run = self.run.as_mut()?;
            let received = match wait {
                Wait::Block => run
                    .events
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
                Wait::Timeout(timeout) => run.events.recv_timeout(timeout),
                Wait::Poll => run.events.try_recv().map_err(|err| match err {
                    TryRecvError::Empty => RecvTimeoutError::Timeout,
                    TryRecvError::Disconnected => RecvTimeoutError::Disconnected,
                }),
            };

            let event = match received {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => HostEvent::Error {
                    reason: "recovery worker exited without reporting an outcome".to_string(),
                },
            };

            let event = if run.cancel_requested {
                match event {
                    HostEvent::Progress(_) => continue,
                    HostEvent::Found { .. } | HostEvent::NotFound => HostEvent::Cancelled,
                    other => other,
                }
            } else {
                event
            };

            if event.is_terminal() {
                self.finish_run();
            }
            return Some(event);
        }
    }

    fn finish_run(&mut self) {
        if let Some(mut run) = self.run.take() {
            run.join();
        }
    }

    fn teardown(&mut self) {
        if let Some(mut run) = self.run.take() {
            run.cancel.cancel();
            run.join();
        }
    }
}

impl Default for RecoveryHost {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

impl Drop for RecoveryHost {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn run_worker(
    request: StartRequest,
    options: AttackOptions,
    cancel: CancelToken,
    events: Sender<HostEvent>,
) {
    let progress_events = events.clone();
    let result = panic::catch_unwind(AssertUnwindSafe(move || {
        let mut attack = Attack::new(request.plan, request.params, options);
        attack.run(&cancel, |snapshot| {
            // The receiver is gone once the caller tears the run down; keep going until the
            // cancellation flag is observed.
            let _ = progress_events.send(HostEvent::Progress(snapshot));
        })
    }));

    let terminal = match result {
        Ok(outcome) => HostEvent::from(outcome),
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            log::error!("recovery worker panicked: {reason}");
            HostEvent::Error { reason }
        }
    };
    let _ = events.send(terminal);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("internal error: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("internal error: {message}")
    } else {
        "internal error".to_string()
    }
}
