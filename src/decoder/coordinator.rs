//! Asynchronous decode coordinator
//!
//! A single-slot mailbox between the calling thread and one worker thread.
//! The caller submits frame indices and later polls for the result; both
//! are non-blocking. While a request is pending (including while the worker
//! is executing it) any further submission is dropped, so the effective
//! queue depth is one with drop-on-full.
//!
//! Shutdown drains the mailbox before stopping the worker: [`AsyncDecoder::stop`]
//! does not return while the worker may still start or be executing a job.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;

use crate::utils::error::{PlayerError, Result};

/// Default interval after which a slow drain is reported.
pub const DEFAULT_DRAIN_WARN: Duration = Duration::from_millis(250);

/// Lifecycle of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No worker thread
    Idle,
    /// Worker alive, waiting for requests
    Running,
    /// Abort requested, waiting for the worker to exit
    Draining,
}

/// Outcome of [`AsyncDecoder::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Stored in the request slot
    Accepted,
    /// A request was already pending; this one was discarded
    Dropped,
}

/// Outcome of [`AsyncDecoder::poll`].
#[derive(Debug, PartialEq)]
pub enum DecodePoll<R> {
    /// A result was waiting and has been taken out of the slot
    Ready { frame: i32, output: R },
    /// No result yet; ask again on a later tick
    Pending,
    /// The worker is not running
    NotRunning,
}

/// Mailbox counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Submissions stored in the request slot
    pub accepted: u64,

    /// Submissions discarded because a request was pending
    pub dropped: u64,

    /// Jobs the worker has finished
    pub completed: u64,

    /// Results overwritten before anyone polled them
    pub overwritten: u64,
}

struct Mailbox<R> {
    request: Option<i32>,
    result: Option<(i32, R)>,
    abort: bool,
    stats: CoordinatorStats,
}

struct Shared<R> {
    mailbox: Mutex<Mailbox<R>>,
    /// Signalled after a request is stored or abort is raised
    wake: Condvar,
    /// Signalled whenever the worker clears the request slot
    drained: Condvar,
}

/// Single-slot decode mailbox with one worker thread.
///
/// `R` is whatever the job produces for a frame, typically a status plus
/// the fetched pixels.
pub struct AsyncDecoder<R: Send + 'static> {
    shared: Arc<Shared<R>>,
    worker: Option<JoinHandle<()>>,
    state: CoordinatorState,
    drain_warn: Duration,
}

impl<R: Send + 'static> AsyncDecoder<R> {
    pub fn new() -> Self {
        Self::with_drain_warning(DEFAULT_DRAIN_WARN)
    }

    /// Create a coordinator that logs a warning each time a drain has been
    /// waiting for `drain_warn`.
    pub fn with_drain_warning(drain_warn: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                mailbox: Mutex::new(Mailbox {
                    request: None,
                    result: None,
                    abort: false,
                    stats: CoordinatorStats::default(),
                }),
                wake: Condvar::new(),
                drained: Condvar::new(),
            }),
            worker: None,
            state: CoordinatorState::Idle,
            drain_warn: drain_warn.max(Duration::from_millis(1)),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Whether the worker thread is up and serving requests.
    ///
    /// False once the worker has exited on its own (a panicking job), even
    /// though [`state`](Self::state) stays `Running` until [`stop`](Self::stop).
    pub fn is_running(&self) -> bool {
        self.state == CoordinatorState::Running && self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }

    /// Spawn the worker running `job` for every accepted request.
    ///
    /// No-op if the worker is already running; `job` is dropped in that case.
    /// A worker that died must be cleared with [`stop`](Self::stop) first,
    /// until then this returns `InvalidState`.
    pub fn start<F>(&mut self, job: F) -> Result<()>
    where
        F: FnMut(i32) -> R + Send + 'static,
    {
        if self.is_running() {
            return Ok(());
        }
        if self.state != CoordinatorState::Idle {
            warn!("Decode worker exited unexpectedly; stop it before starting again");
            return Err(PlayerError::InvalidState);
        }

        let shared = Arc::clone(&self.shared);
        let worker = thread::Builder::new()
            .name("h2md-decode".to_string())
            .spawn(move || worker_loop(&shared, job))
            .map_err(|e| {
                error!("Failed to spawn decode worker: {}", e);
                PlayerError::OutOfMemory
            })?;

        info!("Decode worker started");
        self.worker = Some(worker);
        self.state = CoordinatorState::Running;
        Ok(())
    }

    /// Offer a frame to the worker.
    ///
    /// Returns [`Submission::Dropped`] when a request is already pending;
    /// the caller is expected to try again on a later tick.
    pub fn submit(&self, frame: i32) -> Result<Submission> {
        if !self.is_running() {
            return Err(PlayerError::InvalidState);
        }
        if frame < 0 {
            return Err(PlayerError::InvalidArgument);
        }

        let mut mailbox = self.shared.mailbox.lock();
        if let Some(pending) = mailbox.request {
            mailbox.stats.dropped += 1;
            trace!("Dropped frame {} submission, frame {} still pending", frame, pending);
            return Ok(Submission::Dropped);
        }

        mailbox.request = Some(frame);
        mailbox.stats.accepted += 1;
        drop(mailbox);

        self.shared.wake.notify_one();
        Ok(Submission::Accepted)
    }

    /// Take the result if one is waiting. Never blocks on the worker's job.
    pub fn poll(&self) -> DecodePoll<R> {
        if !self.is_running() {
            return DecodePoll::NotRunning;
        }

        match self.shared.mailbox.lock().result.take() {
            Some((frame, output)) => DecodePoll::Ready { frame, output },
            None => DecodePoll::Pending,
        }
    }

    /// Whether a result is waiting to be polled.
    pub fn has_result(&self) -> bool {
        self.is_running() && self.shared.mailbox.lock().result.is_some()
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.shared.mailbox.lock().stats
    }

    /// Drain the mailbox and join the worker.
    ///
    /// Waits until the worker has finished any pending request, then raises
    /// abort, wakes and joins the worker and returns to [`CoordinatorState::Idle`].
    /// Unclaimed results are discarded. No-op when idle.
    pub fn stop(&mut self) {
        if self.state == CoordinatorState::Idle {
            return;
        }
        self.state = CoordinatorState::Draining;

        {
            let mut mailbox = self.shared.mailbox.lock();
            while let Some(frame) = mailbox.request {
                if self.worker.as_ref().map_or(true, JoinHandle::is_finished) {
                    // only reachable if the job panicked
                    warn!("Decode worker exited with frame {} pending", frame);
                    break;
                }
                if self.shared.drained.wait_for(&mut mailbox, self.drain_warn).timed_out() {
                    warn!("Still waiting for frame {} to finish decoding before shutdown", frame);
                }
            }
            mailbox.abort = true;
        }
        self.shared.wake.notify_all();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Decode worker panicked");
            }
        }

        let mut mailbox = self.shared.mailbox.lock();
        mailbox.abort = false;
        mailbox.request = None;
        mailbox.result = None;
        drop(mailbox);

        self.state = CoordinatorState::Idle;
        info!("Decode worker stopped");
    }
}

impl<R: Send + 'static> Default for AsyncDecoder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + 'static> Drop for AsyncDecoder<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop<R, F>(shared: &Shared<R>, mut job: F)
where
    F: FnMut(i32) -> R,
{
    let mut mailbox = shared.mailbox.lock();
    loop {
        if mailbox.abort {
            debug!("Decode worker received abort");
            break;
        }

        if let Some(frame) = mailbox.request {
            // The request stays in the slot while the job runs so that
            // submissions arriving meanwhile are dropped.
            let output = MutexGuard::unlocked(&mut mailbox, || job(frame));
            publish(&mut mailbox, frame, output);
            shared.drained.notify_all();
            continue;
        }

        shared.wake.wait(&mut mailbox);
    }
}

fn publish<R>(mailbox: &mut Mailbox<R>, frame: i32, output: R) {
    if let Some((stale, _)) = mailbox.result.replace((frame, output)) {
        mailbox.stats.overwritten += 1;
        trace!("Result for frame {} replaced before it was polled", stale);
    }
    mailbox.request = None;
    mailbox.stats.completed += 1;
}
