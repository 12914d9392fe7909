/*!
 * Process Handle
 * Lifecycle state machine for one supervised OS process
 */

use super::result::FutureResult;
use super::spawn::spawn;
use super::types::{CommandSpec, ProcessStatus, SpawnOptions};
use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::types::{Descriptor, ExitCode, HandleId, Pid};
use crate::future::FutureValue;
use crate::pipes::PipeSet;
use bytes::Bytes;
use log::{debug, info, warn};
use nix::sys::signal::{kill, Signal};
use parking_lot::Mutex;
use std::process::Child;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handle onto one supervised OS process
///
/// Cloning yields another handle onto the same process. Created by
/// [`Shell::start_process`](crate::shell::Shell::start_process); the shell
/// either spawns it immediately or binds it to a queue slot.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: HandleId,
    command: CommandSpec,
    options: SpawnOptions,
    state: Mutex<HandleState>,
    /// Realized once the OS process starts (or never starts: queued abort,
    /// spawn failure)
    started: FutureValue<()>,
    /// Realized on every terminal transition
    exit_code: FutureValue<ExitCode>,
    /// Present iff the handle was created under an admission constraint
    queue_slot: Option<FutureValue<()>>,
}

struct HandleState {
    status: ProcessStatus,
    pid: Option<Pid>,
    child: Option<Child>,
    pipes: PipeSet,
    started_at: Option<Instant>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ProcessHandle")
            .field("id", &self.inner.id)
            .field("command", &self.inner.command.to_string())
            .field("status", &state.status)
            .field("pid", &state.pid)
            .finish()
    }
}

impl ProcessHandle {
    pub(crate) fn new(
        id: HandleId,
        command: CommandSpec,
        options: SpawnOptions,
        started: FutureValue<()>,
        exit_code: FutureValue<ExitCode>,
        queue_slot: Option<FutureValue<()>>,
    ) -> Self {
        let pipes = PipeSet::new(&options.descriptors);
        Self {
            inner: Arc::new(HandleInner {
                id,
                command,
                options,
                state: Mutex::new(HandleState {
                    status: ProcessStatus::Queued,
                    pid: None,
                    child: None,
                    pipes,
                    started_at: None,
                }),
                started,
                exit_code,
                queue_slot,
            }),
        }
    }

    pub(crate) fn id(&self) -> HandleId {
        self.inner.id
    }

    /// The command this handle supervises
    pub fn command(&self) -> &CommandSpec {
        &self.inner.command
    }

    /// The OS pid, once Running; `None` while Queued or after a queued abort
    pub fn pid(&self) -> Option<Pid> {
        self.inner.state.lock().pid
    }

    /// Current lifecycle state, optionally refreshing it from the OS first
    pub fn status(&self, refresh: bool) -> ProcessStatus {
        if refresh {
            self.refresh();
        }
        self.inner.state.lock().status
    }

    /// The start future: realized once the process is actually Running
    ///
    /// Rejected when the handle is aborted with an error before starting, or
    /// when a deferred spawn fails; resolved by a quiet abort.
    pub fn started(&self) -> FutureValue<()> {
        self.inner.started.clone()
    }

    /// Register a continuation fired once the process has started
    pub fn on_started<F>(&self, f: F)
    where
        F: FnOnce(ProcessHandle) + Send + 'static,
    {
        let handle = self.clone();
        self.inner.started.on_realized(move |outcome| {
            if outcome.is_ok() {
                f(handle);
            }
        });
    }

    /// Block until the process has started (not until it has finished)
    ///
    /// Re-raises the start future's stored error; its own deadline elapsing
    /// yields `ProcessError::WaitTimeout` and changes nothing.
    pub fn wait(&self, timeout: Option<Duration>) -> ProcessResult<()> {
        self.inner.started.value(timeout)
    }

    /// The derived view of this process's outcome
    pub fn result(&self) -> FutureResult {
        FutureResult::new(self.clone(), self.inner.exit_code.clone())
    }

    /// Append to a write buffer; flushed opportunistically and on every drain
    ///
    /// Legal while Queued: the data is delivered once the process spawns.
    pub fn write_to_buffer(&self, descriptor: Descriptor, data: &[u8]) -> ProcessResult<()> {
        let mut state = self.inner.state.lock();
        state.pipes.write_to_buffer(descriptor, data)?;
        Ok(())
    }

    /// Drain and return everything buffered for a readable descriptor
    pub fn read_from_buffer(&self, descriptor: Descriptor) -> ProcessResult<Bytes> {
        let mut state = self.inner.state.lock();
        Ok(state.pipes.read_from_buffer(descriptor)?)
    }

    /// Flush then close one descriptor (EOF for a child reading stdin)
    pub fn close_descriptor(&self, descriptor: Descriptor) -> ProcessResult<()> {
        let mut state = self.inner.state.lock();
        state.pipes.close_descriptor(descriptor)?;
        Ok(())
    }

    /// Spawn the OS process now; called by the shell either synchronously or
    /// when this handle's queue slot resolves
    ///
    /// A handle aborted while Queued never spawns.
    pub(crate) fn spawn_now(&self) -> ProcessResult<()> {
        let spawn_result = {
            let mut state = self.inner.state.lock();
            if state.status != ProcessStatus::Queued {
                debug!(
                    "skipping spawn of handle {}: status is {}",
                    self.inner.id, state.status
                );
                return Ok(());
            }
            match spawn(&self.inner.command, &self.inner.options) {
                Ok(record) => {
                    let mut child = record.child;
                    match state.pipes.attach(record.pipes) {
                        Ok(()) => {
                            state.pid = Some(record.pid);
                            state.child = Some(child);
                            state.started_at = Some(Instant::now());
                            state.status = ProcessStatus::Running;
                            Ok(record.pid)
                        }
                        Err(e) => {
                            state.status = ProcessStatus::Error;
                            state.pipes.close();
                            let _ = child.kill();
                            reap_in_background(child);
                            Err(ProcessError::from(e))
                        }
                    }
                }
                Err(e) => {
                    state.status = ProcessStatus::Error;
                    state.pipes.close();
                    Err(e)
                }
            }
        };

        match spawn_result {
            Ok(pid) => {
                info!("spawned '{}' (pid {})", self.inner.command, pid);
                self.inner.started.resolve(());
                Ok(())
            }
            Err(e) => {
                warn!("failed to spawn '{}': {}", self.inner.command, e);
                self.inner.started.reject(e.clone());
                self.inner.exit_code.reject(e.clone());
                Err(e)
            }
        }
    }

    /// Refresh from the OS: detect exit, surface poll failures, drain pipes,
    /// enforce the configured timeout
    ///
    /// One iteration of the shared pump; a handle nobody refreshes never
    /// times out.
    pub(crate) fn refresh(&self) {
        let mut settle: Option<ProcessResult<ExitCode>> = None;
        let mut timed_out = false;
        {
            let mut state = self.inner.state.lock();
            if state.status != ProcessStatus::Running {
                return;
            }
            let Some(child) = state.child.as_mut() else {
                return;
            };
            match child.try_wait() {
                Err(e) => {
                    let error = ProcessError::PollFailed(e.to_string());
                    warn!("handle {}: {}", self.inner.id, error);
                    state.status = ProcessStatus::Error;
                    state.child = None;
                    state.pipes.close();
                    settle = Some(Err(error));
                }
                Ok(Some(exit_status)) => {
                    // `code()` is None for a signaled child: the "-1" sentinel
                    // normalizes to an absent exit code
                    let code = exit_status.code();
                    debug!(
                        "handle {} (pid {:?}) exited with code {:?}",
                        self.inner.id, state.pid, code
                    );
                    state.status = ProcessStatus::Exited;
                    state.child = None;
                    state.pipes.close();
                    settle = Some(Ok(code));
                }
                Ok(None) => {
                    // Still alive: keep its pipes moving so a full pipe never
                    // blocks the child
                    if let Err(e) = state.pipes.drain() {
                        warn!("handle {}: pipe drain failed: {}", self.inner.id, e);
                    }
                    if let (Some(limit), Some(started_at)) =
                        (self.inner.options.timeout, state.started_at)
                    {
                        timed_out = started_at.elapsed() > limit;
                    }
                }
            }
        }

        if let Some(outcome) = settle {
            self.inner.exit_code.settle(outcome);
        } else if timed_out {
            info!("handle {} exceeded its time limit, aborting", self.inner.id);
            self.abort(
                Some(self.inner.options.timeout_error.clone()),
                self.inner.options.timeout_signal,
            );
        }
    }

    /// Cancel the process
    ///
    /// From Queued: settles the queue slot and terminates Aborted without
    /// ever spawning. From Running: sends `signal` if given, then forces
    /// Aborted. No-op from any terminal state; the first abort wins.
    ///
    /// Without an error the start and result futures resolve (quiet abort);
    /// with an error they are rejected with it.
    pub fn abort(&self, error: Option<ProcessError>, signal: Option<Signal>) {
        let was_queued = {
            let mut state = self.inner.state.lock();
            match state.status {
                ProcessStatus::Queued => {
                    state.status = ProcessStatus::Aborted;
                    state.pipes.close();
                    true
                }
                ProcessStatus::Running => {
                    if let (Some(signal), Some(pid)) = (signal, state.pid) {
                        match kill(nix::unistd::Pid::from_raw(pid as i32), signal) {
                            Ok(()) => info!("sent {} to pid {}", signal, pid),
                            Err(e) => debug!("signal {} to pid {} failed: {}", signal, pid, e),
                        }
                    }
                    state.status = ProcessStatus::Aborted;
                    state.pipes.close();
                    if let Some(child) = state.child.take() {
                        reap_in_background(child);
                    }
                    false
                }
                // Terminal: repeat aborts are no-ops
                _ => return,
            }
        };

        let outcome: ProcessResult<()> = match &error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        };
        if was_queued {
            if let Some(slot) = &self.inner.queue_slot {
                slot.settle(outcome.clone());
            }
            self.inner.started.settle(outcome);
        }
        match error {
            Some(e) => self.inner.exit_code.reject(e),
            None => self.inner.exit_code.resolve(None),
        }
    }

    /// Release the OS process from supervision without stopping it
    ///
    /// The exit-code future resolves with no value; the pipe fds are handed
    /// over unclosed. Only valid while Running.
    pub fn detach(&self) -> ProcessResult<()> {
        {
            let mut state = self.inner.state.lock();
            if state.status != ProcessStatus::Running {
                return Err(ProcessError::InvalidState(format!(
                    "cannot detach a {} process",
                    state.status
                )));
            }
            state.status = ProcessStatus::Detached;
            state.pipes.release();
            // Dropping the Child neither kills nor reaps; the process keeps
            // running unsupervised
            let _ = state.child.take();
        }
        info!("handle {} detached", self.inner.id);
        self.inner.exit_code.resolve(None);
        Ok(())
    }
}

/// Reap the killed child off the supervision path so it does not linger as a
/// zombie; blocks only its own thread
fn reap_in_background(mut child: Child) {
    std::thread::spawn(move || {
        let _ = child.wait();
    });
}
