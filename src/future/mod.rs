/*!
 * Future Module
 * Single-assignment future/promise primitive shared by every blocking wait
 */

pub mod value;

// Re-export public API
pub use value::{FutureValue, Pump};
