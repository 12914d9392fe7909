/*!
 * Shell
 * Admission-controlled process launcher with a shared status pump
 */

use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::limits::{DEFAULT_PROCESS_LIMIT, POLL_INTERVAL};
use crate::core::types::HandleId;
use crate::future::{FutureValue, Pump};
use crate::process::{CommandSpec, ProcessHandle, SpawnOptions};
use dashmap::DashMap;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Launches and supervises child processes
///
/// At most `process_limit` children run at once; further starts queue in
/// FIFO order and spawn as capacity frees up. All futures handed out by a
/// shell are pumped by the shell's own refresh loop, so blocking on any one
/// of them keeps every supervised process moving.
#[derive(Clone)]
pub struct Shell {
    inner: Arc<ShellInner>,
}

struct ShellInner {
    /// `None` means unlimited
    limit: Mutex<Option<usize>>,
    active: DashMap<HandleId, ProcessHandle>,
    queue: Mutex<VecDeque<(ProcessHandle, FutureValue<()>)>>,
    next_id: AtomicU64,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("limit", &*self.inner.limit.lock())
            .field("active", &self.inner.active.len())
            .field("queued", &self.inner.queue.lock().len())
            .finish()
    }
}

impl Shell {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShellInner {
                limit: Mutex::new(Some(DEFAULT_PROCESS_LIMIT)),
                active: DashMap::new(),
                queue: Mutex::new(VecDeque::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Cap on concurrently running children; `None` is unlimited
    pub fn process_limit(&self) -> Option<usize> {
        *self.inner.limit.lock()
    }

    /// Change the concurrency cap; `None` or `Some(0)` lifts it entirely
    ///
    /// Raising the cap admits queued processes immediately. Lowering it never
    /// stops anything already running.
    pub fn set_process_limit(&self, limit: Option<usize>) {
        let normalized = limit.filter(|&n| n > 0);
        *self.inner.limit.lock() = normalized;
        debug!("process limit set to {:?}", normalized);
        self.inner.service_queue();
    }

    /// Number of children currently running
    pub fn active_count(&self) -> usize {
        self.inner.active.len()
    }

    /// Number of starts waiting for capacity
    pub fn queued_count(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Launch a command, spawning now or queueing behind the limit
    ///
    /// Never blocks. An immediate spawn failure is returned here; a deferred
    /// spawn's failure surfaces through the handle's futures instead.
    pub fn start_process(
        &self,
        command: impl Into<CommandSpec>,
        options: SpawnOptions,
    ) -> ProcessResult<ProcessHandle> {
        // service the queue before deciding admission
        self.inner.service_queue();

        let command = command.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let pump = self.inner.pump();
        let started = FutureValue::with_pump(pump.clone());
        let exit_code = FutureValue::with_pump(pump.clone());

        let (handle, spawn_now) = {
            let mut queue = self.inner.queue.lock();
            let limit = *self.inner.limit.lock();
            let must_queue = match limit {
                Some(n) => !queue.is_empty() || self.inner.active.len() >= n,
                None => false,
            };
            if must_queue {
                let slot = FutureValue::with_pump(pump);
                let handle = ProcessHandle::new(
                    id,
                    command,
                    options,
                    started,
                    exit_code.clone(),
                    Some(slot.clone()),
                );
                let admitted = handle.clone();
                slot.on_realized(move |outcome| {
                    if outcome.is_ok() {
                        let _ = admitted.spawn_now();
                    }
                });
                queue.push_back((handle.clone(), slot));
                debug!("queued handle {} ({} ahead)", id, queue.len() - 1);
                (handle, false)
            } else {
                let handle =
                    ProcessHandle::new(id, command, options, started, exit_code.clone(), None);
                self.inner.active.insert(id, handle.clone());
                (handle, true)
            }
        };

        // every terminal transition frees a slot
        let shell = Arc::downgrade(&self.inner);
        exit_code.on_realized(move |_| {
            if let Some(inner) = shell.upgrade() {
                inner.active.remove(&id);
                inner.service_queue();
            }
        });

        if spawn_now {
            handle.spawn_now()?;
        }
        Ok(handle)
    }

    /// One pump iteration over everything the shell supervises
    pub fn refresh_all(&self) {
        self.inner.service_queue();
        self.inner.refresh_all();
    }

    /// Block until every supervised process has terminated and the queue is
    /// drained
    pub fn wait(&self, timeout: Option<Duration>) -> ProcessResult<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            self.inner.service_queue();
            self.inner.refresh_all();
            if self.inner.active.is_empty() && self.inner.queue.lock().is_empty() {
                return Ok(());
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(ProcessError::WaitTimeout(timeout.unwrap_or_default()));
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl ShellInner {
    /// Shared pump handed to every future this shell creates
    ///
    /// Holds the shell weakly: a future outliving its shell pumps nothing
    /// instead of keeping the supervision state alive.
    fn pump(self: &Arc<Self>) -> Pump {
        let weak: Weak<ShellInner> = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.service_queue();
                inner.refresh_all();
            }
        })
    }

    /// Admit queued starts while capacity allows
    ///
    /// Entries whose slot already settled (aborted while queued) are dropped
    /// without consuming capacity. Slots resolve outside the queue lock.
    fn service_queue(&self) {
        loop {
            let admitted = {
                let mut queue = self.queue.lock();
                while queue
                    .front()
                    .is_some_and(|(_, slot)| slot.is_realized())
                {
                    queue.pop_front();
                }
                let limit = *self.limit.lock();
                let has_capacity = match limit {
                    Some(n) => self.active.len() < n,
                    None => true,
                };
                if has_capacity {
                    queue.pop_front()
                } else {
                    None
                }
            };
            let Some((handle, slot)) = admitted else {
                return;
            };
            info!("admitting queued handle {}", handle.id());
            self.active.insert(handle.id(), handle.clone());
            slot.resolve(());
            // an abort can settle the slot between the pop and the insert;
            // that handle is already terminal and its removal hook has fired
            if handle.status(false).is_terminal() {
                self.active.remove(&handle.id());
            }
        }
    }

    /// Refresh every running child: reap exits, drain pipes, enforce timeouts
    fn refresh_all(&self) {
        // snapshot first: a terminal transition removes the entry from under
        // the iterator
        let handles: Vec<ProcessHandle> =
            self.active.iter().map(|entry| entry.value().clone()).collect();
        for handle in handles {
            handle.refresh();
        }
    }
}
