/*!
 * Core Module
 * Shared types, errors, and constants
 */

pub mod errors;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use errors::{PipeError, PipeResult, ProcessError, ProcessResult};
pub use types::{Descriptor, ExitCode, HandleId, Pid};
