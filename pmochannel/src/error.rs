//! Error types for the channel player

use tracing::Level;

/// Result type alias for channel player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a poll cycle
///
/// Every variant feeds the poller's backoff path; none of them stops the loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Descriptor request answered with a non-success status
    #[error("HTTP {status} on {url}")]
    Fetch { status: u16, url: String },

    /// Descriptor body unusable (invalid JSON, missing or empty stream URL)
    #[error("Malformed descriptor: {0}")]
    MalformedDescriptor(String),

    /// Neither a streaming engine nor native HLS support is available
    #[error("HLS playback not supported: no streaming engine and no native support")]
    UnsupportedPlayback,

    /// HTTP request failed before a status was received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Streaming engine could not be constructed or driven
    #[error("Streaming engine error: {0}")]
    Engine(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error (from pmoconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a malformed descriptor error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDescriptor(msg.into())
    }

    /// Create a streaming engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}

/// Failures absorbed where they happen
///
/// They are logged at [`NonFatal::level`] and published on the player's
/// event bus, but never abort a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum NonFatal {
    /// `play()` refused by the environment (autoplay policy, spawn failure...)
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    /// Detaching the streaming engine from its previous media failed
    #[error("Detach failed: {0}")]
    DetachFailed(String),

    /// Asynchronous error event raised by the streaming engine
    #[error("Streaming engine error: {kind} ({details})")]
    StreamingEngineError { kind: String, details: String },
}

impl NonFatal {
    /// Severity used when logging this outcome
    pub fn level(&self) -> Level {
        match self {
            NonFatal::PlaybackRejected(_) | NonFatal::DetachFailed(_) => Level::DEBUG,
            NonFatal::StreamingEngineError { .. } => Level::WARN,
        }
    }

    /// Log this outcome at its severity, keyed by channel
    pub(crate) fn log(&self, channel: &str) {
        match self.level() {
            Level::WARN => tracing::warn!(channel = channel, "{self}"),
            _ => tracing::debug!(channel = channel, "{self}"),
        }
    }
}
