//! Channel identifiers and player options
//!
//! The player is configured the way the host page is: a `channel` name and a
//! `pollMs` interval, both read from a query string.
//!
//! ```
//! use pmochannel::PlayerOptions;
//! use std::time::Duration;
//!
//! let options = PlayerOptions::from_query("?channel=News&pollMs=1000");
//! assert_eq!(options.channel.descriptor_path(), "data/news.json");
//! assert_eq!(options.poll_interval, Duration::from_millis(3000));
//! ```

use crate::constants::*;
use std::fmt;
use std::time::Duration;

/// Normalized channel name (trimmed, lower-cased)
///
/// Immutable once built; an empty name falls back to [`DEFAULT_CHANNEL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            Self(DEFAULT_CHANNEL.to_string())
        } else {
            Self(normalized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the channel descriptor, relative to the descriptor base URL
    pub fn descriptor_path(&self) -> String {
        format!("data/{}.json", self.0)
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self(DEFAULT_CHANNEL.to_string())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options accepted by the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerOptions {
    pub channel: ChannelId,
    /// Base interval between successful cycles, never below [`MIN_POLL_MS`]
    pub poll_interval: Duration,
    /// Random window added to the poll interval
    pub jitter_window: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            channel: ChannelId::default(),
            poll_interval: default_poll_interval(),
            jitter_window: poll_jitter_window(),
        }
    }
}

impl PlayerOptions {
    pub fn new(channel: &str, poll_ms: u64) -> Self {
        Self {
            channel: ChannelId::new(channel),
            poll_interval: Self::clamp_poll_ms(poll_ms),
            jitter_window: poll_jitter_window(),
        }
    }

    /// Clamp a poll interval to the accepted minimum
    pub fn clamp_poll_ms(poll_ms: u64) -> Duration {
        Duration::from_millis(poll_ms.max(MIN_POLL_MS))
    }

    /// Build options from a query string
    ///
    /// Accepts a bare query (`channel=news`), a query with its leading `?`,
    /// or a full URL. Missing parameters take their defaults.
    pub fn from_query(query: &str) -> Self {
        Self::default().with_query(query)
    }

    /// Override these options with the parameters present in `query`
    ///
    /// `channel` is normalized; an empty value selects [`DEFAULT_CHANNEL`].
    /// `pollMs` is clamped to [`MIN_POLL_MS`]; an empty value selects
    /// [`DEFAULT_POLL_MS`] and a non-numeric one is ignored with a warning.
    pub fn with_query(mut self, query: &str) -> Self {
        for (key, value) in url::form_urlencoded::parse(extract_query(query).as_bytes()) {
            match key.as_ref() {
                "channel" => self.channel = ChannelId::new(&value),
                "pollMs" => match parse_poll_ms(&value) {
                    Some(ms) => self.poll_interval = Self::clamp_poll_ms(ms),
                    None => {
                        tracing::warn!(
                            value = %value,
                            "Invalid pollMs, keeping {} ms",
                            self.poll_interval.as_millis()
                        );
                    }
                },
                _ => {}
            }
        }
        self
    }

    pub fn with_jitter_window(mut self, window: Duration) -> Self {
        self.jitter_window = window;
        self
    }
}

fn extract_query(input: &str) -> &str {
    let input = input.trim();
    let without_fragment = input.split('#').next().unwrap_or_default();
    match without_fragment.split_once('?') {
        Some((_, query)) => query,
        None => without_fragment,
    }
}

fn parse_poll_ms(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return Some(DEFAULT_POLL_MS);
    }
    match value.parse::<f64>() {
        Ok(ms) if ms.is_finite() => Some(ms.max(0.0) as u64),
        _ => None,
    }
}
