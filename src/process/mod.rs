/*!
 * Process Module
 * Supervised process handles and their derived result views
 */

pub mod handle;
pub mod result;
pub mod types;

mod spawn;

pub use handle::ProcessHandle;
pub use result::{FutureResult, FutureStream};
pub use types::{CommandSpec, ProcessStatus, SpawnOptions};
