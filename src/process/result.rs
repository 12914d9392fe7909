/*!
 * Process Result Views
 * Futures over a finished process's exit code and buffered output
 */

use super::handle::ProcessHandle;
use crate::core::errors::ProcessResult;
use crate::core::types::{Descriptor, ExitCode};
use crate::future::FutureValue;
use bytes::Bytes;
use std::time::Duration;

/// Future view of a process's outcome
///
/// Obtained from [`ProcessHandle::result`]. Realized on every terminal
/// transition: naturally with the exit code, by abort with the abort error
/// (or no code for a quiet abort), with no code on detach.
#[derive(Clone, Debug)]
pub struct FutureResult {
    handle: ProcessHandle,
    exit_code: FutureValue<ExitCode>,
}

impl FutureResult {
    pub(crate) fn new(handle: ProcessHandle, exit_code: FutureValue<ExitCode>) -> Self {
        Self { handle, exit_code }
    }

    /// The handle this result belongs to
    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    /// The underlying exit-code future
    pub fn future(&self) -> FutureValue<ExitCode> {
        self.exit_code.clone()
    }

    /// Whether the process has reached a terminal state
    pub fn is_realized(&self) -> bool {
        self.exit_code.is_realized()
    }

    /// Block until the process terminates, re-raising any stored error
    pub fn wait(&self, timeout: Option<Duration>) -> ProcessResult<()> {
        self.exit_code.value(timeout)?;
        Ok(())
    }

    /// Block for the exit code: `None` when the process was signaled,
    /// detached, or quietly aborted
    pub fn exit_code(&self, timeout: Option<Duration>) -> ProcessResult<ExitCode> {
        self.exit_code.value(timeout)
    }

    /// Drain the named buffer without waiting for termination
    pub fn read_from_buffer(&self, descriptor: Descriptor) -> ProcessResult<Bytes> {
        self.handle.read_from_buffer(descriptor)
    }

    /// Future view of one output stream
    pub fn stream(&self, descriptor: Descriptor) -> FutureStream {
        FutureStream {
            descriptor,
            handle: self.handle.clone(),
            exit_code: self.exit_code.clone(),
        }
    }

    /// Chain a continuation over the realized result
    ///
    /// Fires on every terminal outcome, abort and poll failure included; the
    /// continuation inspects the view for the exit code or the stored error.
    pub fn then<U, F>(&self, on_realized: F) -> FutureValue<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(FutureResult) -> U + Send + 'static,
    {
        let next = FutureValue::with_pump(self.exit_code.pump());
        let link = next.clone();
        let result = self.clone();
        self.exit_code.on_realized(move |_| link.resolve(on_realized(result)));
        next
    }
}

/// Future view of one buffered output stream
///
/// Realized together with the result future; the stream of a failed or
/// aborted process stays readable.
#[derive(Clone, Debug)]
pub struct FutureStream {
    descriptor: Descriptor,
    handle: ProcessHandle,
    exit_code: FutureValue<ExitCode>,
}

impl FutureStream {
    /// Which descriptor this stream reads
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    /// Whether the process has reached a terminal state
    pub fn is_realized(&self) -> bool {
        self.exit_code.is_realized()
    }

    /// Block until the process terminates, then drain everything buffered
    ///
    /// Waits on realization rather than success: output written before a
    /// failure is still returned. The read is destructive.
    pub fn contents(&self, timeout: Option<Duration>) -> ProcessResult<Bytes> {
        self.exit_code.wait(timeout)?;
        self.handle.read_from_buffer(self.descriptor)
    }

    /// Chain a continuation over the realized stream
    ///
    /// Fires on every terminal outcome, so output written before a failure
    /// still reaches the continuation.
    pub fn then<U, F>(&self, on_realized: F) -> FutureValue<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(FutureStream) -> U + Send + 'static,
    {
        let next = FutureValue::with_pump(self.exit_code.pump());
        let link = next.clone();
        let stream = self.clone();
        self.exit_code.on_realized(move |_| link.resolve(on_realized(stream)));
        next
    }
}
