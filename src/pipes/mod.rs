/*!
 * Pipes Module
 * Non-blocking multiplexed pipe buffering for supervised processes
 */

mod set;
pub mod types;

// Re-export public API
pub(crate) use set::PipeSet;
pub use types::{DescriptorSpec, PipeMode};
