/*!
 * Limits and Constants
 *
 * Centralized location for tunable constants.
 */

use std::time::Duration;

// =============================================================================
// POLL LOOP
// =============================================================================

/// Sleep between iterations of every blocking wait
/// Short enough to keep latency low, long enough not to burn a core
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

// =============================================================================
// PIPE I/O
// =============================================================================

/// Bytes read per attempt from a ready descriptor (8 KiB)
/// Reads loop at this chunk size until no more data is immediately available
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Upper bound on a single non-blocking write attempt (512 KiB)
/// Unaccepted bytes stay buffered and are retried on the next drain
pub const WRITE_CHUNK_SIZE: usize = 512 * 1024;

// =============================================================================
// ADMISSION CONTROL
// =============================================================================

/// Concurrently running processes a fresh shell allows
pub const DEFAULT_PROCESS_LIMIT: usize = 10;
