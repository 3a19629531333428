//! Stability checking module for verifying files are not being written to.
//!
//! The external ripper gives no completion signal, so before consuming a
//! rip output file the watcher verifies it's stable (not being written to)
//! by checking if its size remains unchanged over a settle window. This is
//! the only coordination between the two loops.

use std::path::Path;
use std::thread;
use std::time::Duration;

/// Result of a stability check on a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StabilityResult {
    /// File size remained unchanged during the settle window.
    Stable,
    /// File size changed during the settle window.
    Unstable {
        /// Size when first checked.
        initial_size: u64,
        /// Size after waiting.
        current_size: u64,
    },
}

/// Check if a file is stable by comparing its size before and after the
/// settle duration.
///
/// # Arguments
/// * `path` - Path to the file to check
/// * `initial_size` - The file size when first sampled
/// * `settle` - How long to wait before re-sampling
///
/// # Returns
/// * `Ok(StabilityResult::Stable)` if the file size is unchanged
/// * `Ok(StabilityResult::Unstable { .. })` if the file size changed
/// * `Err` if the file cannot be read
pub fn check_stability(
    path: &Path,
    initial_size: u64,
    settle: Duration,
) -> Result<StabilityResult, std::io::Error> {
    thread::sleep(settle);

    let current_size = std::fs::metadata(path)?.len();

    Ok(compare_sizes(initial_size, current_size))
}

/// Compare two file sizes and return the appropriate StabilityResult.
///
/// This is a pure function extracted for property testing.
#[inline]
pub fn compare_sizes(initial_size: u64, current_size: u64) -> StabilityResult {
    if initial_size == current_size {
        StabilityResult::Stable
    } else {
        StabilityResult::Unstable {
            initial_size,
            current_size,
        }
    }
}
