/*!
 * Future Value
 * Single-assignment value/error container with blocking wait and
 * asynchronous continuations
 */

use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::limits::POLL_INTERVAL;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pump invoked between wait iterations to drive external progress
///
/// Shell-created futures refresh every active process once per invocation,
/// which is what lets blocking on one process make progress on all others.
pub type Pump = Arc<dyn Fn() + Send + Sync>;

type Callback<T> = Box<dyn FnOnce(&ProcessResult<T>) + Send>;

enum State<T> {
    Pending(Vec<Callback<T>>),
    Settled(ProcessResult<T>),
}

/// A value or error that will be assigned at most once
///
/// Cloning yields another handle onto the same eventual outcome. A future may
/// be waited on repeatedly and by multiple independent callers; continuations
/// registered after settlement fire immediately.
pub struct FutureValue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    pump: Pump,
}

impl<T> Clone for FutureValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for FutureValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.inner.state.lock() {
            State::Pending(callbacks) => format!("pending ({} callbacks)", callbacks.len()),
            State::Settled(Ok(_)) => "resolved".to_string(),
            State::Settled(Err(e)) => format!("rejected: {}", e),
        };
        f.debug_struct("FutureValue").field("state", &state).finish()
    }
}

impl<T> Default for FutureValue<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FutureValue<T>
where
    T: Clone + Send + 'static,
{
    /// Create a future with a no-op pump (pure sleep-loop wait)
    pub fn new() -> Self {
        Self::with_pump(Arc::new(|| {}))
    }

    /// Create a future whose blocking waits drive `pump` between checks
    pub fn with_pump(pump: Pump) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending(Vec::new())),
                pump,
            }),
        }
    }

    /// Whether the future has been resolved or rejected
    pub fn is_realized(&self) -> bool {
        matches!(&*self.inner.state.lock(), State::Settled(_))
    }

    /// The pump driving this future's blocking waits
    pub(crate) fn pump(&self) -> Pump {
        Arc::clone(&self.inner.pump)
    }

    /// Assign the value; a no-op if already realized
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Assign the error; a no-op if already realized
    pub fn reject(&self, error: ProcessError) {
        self.settle(Err(error));
    }

    /// First call wins; callbacks run outside the state lock, exactly once
    pub(crate) fn settle(&self, outcome: ProcessResult<T>) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending(callbacks) => {
                    let callbacks = std::mem::take(callbacks);
                    *state = State::Settled(outcome.clone());
                    callbacks
                }
                State::Settled(_) => return,
            }
        };
        for callback in callbacks {
            callback(&outcome);
        }
    }

    /// Block until realized, pumping between checks
    ///
    /// Returns `ProcessError::WaitTimeout` if `timeout` elapses first; the
    /// future itself stays pending and may still settle later. A realized
    /// future returns `Ok` immediately, even when it was rejected; use
    /// [`FutureValue::value`] to surface the stored error.
    pub fn wait(&self, timeout: Option<Duration>) -> ProcessResult<()> {
        if self.is_realized() {
            return Ok(());
        }

        let deadline = timeout.map(|t| (Instant::now() + t, t));
        loop {
            (self.inner.pump)();
            if self.is_realized() {
                return Ok(());
            }
            if let Some((deadline, limit)) = deadline {
                if Instant::now() >= deadline {
                    return Err(ProcessError::WaitTimeout(limit));
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Wait, then return the value or re-raise the stored error
    pub fn value(&self, timeout: Option<Duration>) -> ProcessResult<T> {
        self.wait(timeout)?;
        match &*self.inner.state.lock() {
            State::Settled(outcome) => outcome.clone(),
            // wait() only returns Ok once settled
            State::Pending(_) => unreachable!("wait returned on a pending future"),
        }
    }

    /// The settled outcome, if any; never blocks
    pub fn outcome(&self) -> Option<ProcessResult<T>> {
        match &*self.inner.state.lock() {
            State::Settled(outcome) => Some(outcome.clone()),
            State::Pending(_) => None,
        }
    }

    /// Register a raw subscription invoked exactly once with the outcome
    ///
    /// Fires immediately when the future is already realized.
    pub fn on_realized<F>(&self, callback: F)
    where
        F: FnOnce(&ProcessResult<T>) + Send + 'static,
    {
        let mut slot = Some(Box::new(callback) as Callback<T>);
        let settled = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending(callbacks) => {
                    if let Some(callback) = slot.take() {
                        callbacks.push(callback);
                    }
                    None
                }
                State::Settled(outcome) => Some(outcome.clone()),
            }
        };
        if let (Some(outcome), Some(callback)) = (settled, slot) {
            callback(&outcome);
        }
    }

    /// Chain a continuation onto the resolved value
    ///
    /// The returned future settles with the continuation's result; a
    /// rejection of this future propagates to the next link unhandled.
    pub fn then<U, F>(&self, on_fulfilled: F) -> FutureValue<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> ProcessResult<U> + Send + 'static,
    {
        let next = FutureValue::<U>::with_pump(self.inner.pump.clone());
        let link = next.clone();
        self.on_realized(move |outcome| match outcome {
            Ok(value) => link.settle(on_fulfilled(value.clone())),
            Err(error) => link.reject(error.clone()),
        });
        next
    }

    /// Chain continuations onto both outcomes
    ///
    /// `on_rejected` may recover (return `Ok`) or re-raise; either way the
    /// error stops propagating past this link unless re-raised.
    pub fn then_or<U, F, G>(&self, on_fulfilled: F, on_rejected: G) -> FutureValue<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> ProcessResult<U> + Send + 'static,
        G: FnOnce(ProcessError) -> ProcessResult<U> + Send + 'static,
    {
        let next = FutureValue::<U>::with_pump(self.inner.pump.clone());
        let link = next.clone();
        self.on_realized(move |outcome| match outcome {
            Ok(value) => link.settle(on_fulfilled(value.clone())),
            Err(error) => link.settle(on_rejected(error.clone())),
        });
        next
    }
}
