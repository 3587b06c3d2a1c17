//! Constants for the channel player.
//!
//! Timing values are expressed in milliseconds, the unit used by the
//! `pollMs` query parameter, with `Duration` helpers for the scheduler.

use std::time::Duration;

// ============================================================================
// Polling
// ============================================================================

/// Default interval between two successful poll cycles (milliseconds)
pub const DEFAULT_POLL_MS: u64 = 15_000;

/// Lowest accepted poll interval (milliseconds)
///
/// Smaller `pollMs` values are clamped up to this one.
pub const MIN_POLL_MS: u64 = 3_000;

/// Width of the random window added to the poll interval (milliseconds)
pub const POLL_JITTER_MS: u64 = 3_000;

/// Shortest wait between two successful cycles (milliseconds)
///
/// Applies when a cycle took longer than the poll interval itself.
pub const MIN_POLL_WAIT_MS: u64 = 500;

// ============================================================================
// Retry backoff
// ============================================================================

/// Retry delay after the first failure (milliseconds)
pub const RETRY_BASE_MS: u64 = 3_000;

/// Upper bound of the retry delay (milliseconds)
pub const RETRY_MAX_MS: u64 = 20_000;

/// Growth factor applied to the retry delay after each failure
pub const RETRY_MULTIPLIER: f64 = 1.7;

/// Width of the random window added to a retry wait (milliseconds)
pub const RETRY_JITTER_MS: u64 = 500;

// ============================================================================
// Playback
// ============================================================================

/// MIME type a playback element must declare to play HLS natively
pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// Forward buffer requested from the streaming engine (seconds)
pub const MAX_BUFFER_LENGTH_SECS: u64 = 30;

/// Channel used when none is requested
pub const DEFAULT_CHANNEL: &str = "latest";

/// Identifier of the container hosting the playback element
pub const DEFAULT_CONTAINER_ID: &str = "player";

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "PMOChannel/0.1.0 (pmochannel)";

/// Helper to get the default poll interval as Duration
pub fn default_poll_interval() -> Duration {
    Duration::from_millis(DEFAULT_POLL_MS)
}

/// Helper to get the poll jitter window as Duration
pub fn poll_jitter_window() -> Duration {
    Duration::from_millis(POLL_JITTER_MS)
}

/// Helper to get the retry jitter window as Duration
pub fn retry_jitter_window() -> Duration {
    Duration::from_millis(RETRY_JITTER_MS)
}
