/*!
 * future-process
 * Non-blocking child-process supervision built on single-assignment futures
 *
 * A [`Shell`] launches commands and hands back [`ProcessHandle`]s whose
 * lifecycle events (start, output, exit) are exposed as [`FutureValue`]s.
 * Nothing blocks unless asked to: pipes are drained with zero-timeout polls
 * and waiting on any future pumps every process the shell supervises.
 *
 * ```no_run
 * use future_process::{Shell, SpawnOptions};
 *
 * let shell = Shell::new();
 * let handle = shell.start_process("echo hello", SpawnOptions::new()).unwrap();
 * let output = handle.result().stream(1).contents(None).unwrap();
 * assert_eq!(output.as_ref(), b"hello\n");
 * ```
 */

pub mod core;
pub mod environment;
pub mod future;
pub mod pipes;
pub mod process;
pub mod shell;

pub use crate::core::errors::{PipeError, PipeResult, ProcessError, ProcessResult};
pub use environment::Environment;
pub use future::{FutureValue, Pump};
pub use pipes::{DescriptorSpec, PipeMode};
pub use process::{
    CommandSpec, FutureResult, FutureStream, ProcessHandle, ProcessStatus, SpawnOptions,
};
pub use shell::Shell;

pub use nix::sys::signal::Signal;
