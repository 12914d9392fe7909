/*!
 * Process Types
 * Status machine states, command specifications and spawn options
 */

use crate::core::errors::ProcessError;
use crate::environment::Environment;
use crate::pipes::DescriptorSpec;
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Lifecycle state of a supervised process
///
/// Transitions are monotonic and one-directional:
/// Queued → Running → {Exited, Error}; Queued → Aborted;
/// Running → {Aborted, Detached}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Waiting for the shell to grant a start slot
    Queued,
    /// The OS process is alive and supervised
    Running,
    /// The OS process ended on its own
    Exited,
    /// Cancelled, before or after spawning
    Aborted,
    /// A status poll failed; supervision gave up on this handle
    Error,
    /// Supervision released; the OS process keeps running unobserved
    Detached,
}

impl ProcessStatus {
    /// Whether the handle can never change state again
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessStatus::Exited
                | ProcessStatus::Aborted
                | ProcessStatus::Error
                | ProcessStatus::Detached
        )
    }

    #[inline]
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }

    #[inline]
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, ProcessStatus::Queued)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessStatus::Queued => "queued",
            ProcessStatus::Running => "running",
            ProcessStatus::Exited => "exited",
            ProcessStatus::Aborted => "aborted",
            ProcessStatus::Error => "error",
            ProcessStatus::Detached => "detached",
        };
        write!(f, "{}", name)
    }
}

/// What to execute: a full command line or an explicit argv vector
///
/// A command line runs through `sh -c`, so shell syntax works; an argv vector
/// is executed directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSpec {
    Line(String),
    Argv(Vec<String>),
}

impl CommandSpec {
    pub fn is_empty(&self) -> bool {
        match self {
            CommandSpec::Line(line) => line.trim().is_empty(),
            CommandSpec::Argv(argv) => {
                argv.is_empty() || argv[0].trim().is_empty()
            }
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Line(line) => write!(f, "{}", line),
            CommandSpec::Argv(argv) => write!(f, "{}", argv.join(" ")),
        }
    }
}

impl From<&str> for CommandSpec {
    fn from(line: &str) -> Self {
        CommandSpec::Line(line.to_string())
    }
}

impl From<String> for CommandSpec {
    fn from(line: String) -> Self {
        CommandSpec::Line(line)
    }
}

impl From<Vec<String>> for CommandSpec {
    fn from(argv: Vec<String>) -> Self {
        CommandSpec::Argv(argv)
    }
}

impl From<&[&str]> for CommandSpec {
    fn from(argv: &[&str]) -> Self {
        CommandSpec::Argv(argv.iter().map(|s| s.to_string()).collect())
    }
}

/// Configuration for spawning a supervised process
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    /// Descriptor wiring; defaults to piped stdin/stdout/stderr
    pub descriptors: DescriptorSpec,
    /// Working directory; `None` inherits the caller's
    pub working_dir: Option<PathBuf>,
    /// Environment; `None` inherits the caller's
    pub env: Option<Environment>,
    /// Wall-clock limit before auto-abort; checked during status refresh
    pub timeout: Option<Duration>,
    /// Signal sent on a timeout-triggered abort; `None` sends nothing
    pub timeout_signal: Option<Signal>,
    /// Error the result future is rejected with on timeout
    pub timeout_error: ProcessError,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            descriptors: DescriptorSpec::default(),
            working_dir: None,
            env: None,
            timeout: None,
            timeout_signal: Some(Signal::SIGTERM),
            timeout_error: ProcessError::TimeLimitExceeded,
        }
    }
}

impl SpawnOptions {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_descriptors(mut self, descriptors: DescriptorSpec) -> Self {
        self.descriptors = descriptors;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout_signal(mut self, signal: Option<Signal>) -> Self {
        self.timeout_signal = signal;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout_error(mut self, error: ProcessError) -> Self {
        self.timeout_error = error;
        self
    }
}
