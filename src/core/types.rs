/*!
 * Core Types
 * Common aliases used across the crate
 */

/// OS process id
pub type Pid = u32;

/// I/O channel number (0 = stdin, 1 = stdout, 2 = stderr by convention)
pub type Descriptor = u32;

/// Exit code of a finished process; `None` when the OS reported none
/// (signaled child, or the native "-1" sentinel)
pub type ExitCode = Option<i32>;

/// Opaque identifier the shell assigns to each handle it owns
pub type HandleId = u64;
