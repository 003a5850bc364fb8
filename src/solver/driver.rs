//! Cooperative single-threaded run driver
//!
//! Executes a session in fixed-size step batches. Pause, cancel, timeout,
//! and status emission are all checked at batch boundaries, so control
//! latency is bounded by one batch of steps and the session itself never
//! blocks or sleeps.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use crate::io::events::{EventSink, RunSummary, StopReason};
use crate::io::settings::PAUSE_HEARTBEAT;
use crate::solver::search::{SearchSession, StepOutcome};

/// Shared pause and cancel flags for a running driver
///
/// Clones share the same underlying flags, so a handle kept by a UI thread
/// controls a driver running elsewhere. Cancellation is sticky; pause is
/// reversible.
#[derive(Clone, Debug, Default)]
pub struct ControlHandle {
    pause: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl ControlHandle {
    /// Create a fresh handle with both flags clear
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle whose cancel flag is shared with other handles
    ///
    /// Pool workers get independent pause flags but one shared cancel flag,
    /// so the first finisher can stop all peers.
    pub fn with_cancel(cancel: Arc<AtomicBool>) -> Self {
        Self {
            pause: Arc::new(AtomicBool::new(false)),
            cancel,
        }
    }

    /// Request suspension at the next batch boundary
    pub fn pause(&self) {
        self.pause.store(true, Ordering::Release);
    }

    /// Clear a pause request
    pub fn resume(&self) {
        self.pause.store(false, Ordering::Release);
    }

    /// Request termination at the next batch boundary
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Whether a pause is currently requested
    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::Acquire)
    }

    /// Whether cancellation was requested
    pub fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// Batch executor for one search session
pub struct Driver {
    session: SearchSession,
    control: ControlHandle,
    worker: Option<usize>,
}

impl Driver {
    /// Wrap a session with a private control handle
    pub fn new(session: SearchSession) -> Self {
        Self {
            session,
            control: ControlHandle::new(),
            worker: None,
        }
    }

    /// Replace the control handle, keeping a clone usable by the caller
    #[must_use]
    pub fn with_control(mut self, control: ControlHandle) -> Self {
        self.control = control;
        self
    }

    /// Tag status reports with a worker index
    #[must_use]
    pub const fn with_worker(mut self, worker: usize) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Control handle driving this run
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    /// The wrapped session
    pub const fn session(&self) -> &SearchSession {
        &self.session
    }

    /// Mutable access to the wrapped session, e.g. for snapshotting
    pub const fn session_mut(&mut self) -> &mut SearchSession {
        &mut self.session
    }

    /// Unwrap the session after a run
    pub fn into_session(self) -> SearchSession {
        self.session
    }

    /// Run the session to a terminal state, reporting through `sink`
    ///
    /// Emits zero or more `status` and `solution` events followed by
    /// exactly one `done` event, and returns the same summary.
    pub fn run(&mut self, sink: &mut dyn EventSink) -> RunSummary {
        let started = Instant::now();
        let mut last_status = Instant::now();
        let batch_size = self.session.settings().batch_size;
        let status_interval = self.session.settings().status_interval;
        let timeout = self.session.settings().timeout;
        let pause_on_solution = self.session.settings().pause_on_solution;

        let reason = loop {
            if self.control.is_canceled() {
                self.session.finish_with(StopReason::Canceled);
                break StopReason::Canceled;
            }

            if self.control.is_paused() {
                if last_status.elapsed() >= status_interval {
                    sink.on_status(&self.session.status(started.elapsed(), self.worker));
                    last_status = Instant::now();
                }
                if timeout.is_some_and(|limit| started.elapsed() >= limit) {
                    self.session.finish_with(StopReason::TimedOut);
                    break StopReason::TimedOut;
                }
                thread::sleep(PAUSE_HEARTBEAT);
                continue;
            }

            let mut terminal = None;
            for _ in 0..batch_size {
                match self.session.step() {
                    StepOutcome::Progress => {}
                    StepOutcome::Solution(solution) => {
                        sink.on_solution(&solution);
                        if pause_on_solution && !self.session.is_finished() {
                            self.control.pause();
                            break;
                        }
                    }
                    StepOutcome::Finished(reason) => {
                        terminal = Some(reason);
                        break;
                    }
                }
            }
            if let Some(reason) = terminal {
                break reason;
            }

            if last_status.elapsed() >= status_interval {
                sink.on_status(&self.session.status(started.elapsed(), self.worker));
                last_status = Instant::now();
            }
            if timeout.is_some_and(|limit| started.elapsed() >= limit) {
                self.session.finish_with(StopReason::TimedOut);
                break StopReason::TimedOut;
            }
        };

        let summary = RunSummary {
            reason,
            nodes: self.session.counters.nodes,
            solutions: self.session.counters.solutions,
            elapsed: started.elapsed(),
            best_depth: self.session.counters.best_depth,
            restarts: self.session.restarts(),
            prunes: self.session.prunes,
            worker_failures: Vec::new(),
        };
        sink.on_done(&summary);
        summary
    }
}
