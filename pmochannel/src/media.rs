//! Playback element and host contract
//!
//! These traits describe the small slice of a page the player needs: a
//! container looked up by identifier, and the video element inside it.
//! The player owns its element exclusively once mounted.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// One-shot callback fired on the element's next "metadata loaded" event
pub type MetadataHandler = Box<dyn FnOnce() + Send + 'static>;

/// A playback element (video tag, external player process, test double...)
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Whether the element declares native support for `mime`
    fn can_play_type(&self, mime: &str) -> bool;

    /// Replace the element's source
    fn set_source(&self, url: &str);

    /// Replace the source with a stream a streaming engine already loads
    ///
    /// Elements that inspect their sources may skip that work here.
    fn attach_engine_source(&self, url: &str) {
        self.set_source(url);
    }

    /// Current source, if any
    fn source(&self) -> Option<String>;

    /// Register a handler removed after its first invocation
    fn once_loaded_metadata(&self, handler: MetadataHandler);

    /// Start playback of the current source
    ///
    /// An error means the environment refused to play (autoplay policy,
    /// missing player...). Callers treat it as a non-fatal outcome.
    async fn play(&self) -> Result<()>;
}

/// Attributes given to an injected playback element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAttributes {
    pub controls: bool,
    pub plays_inline: bool,
    pub autoplay: bool,
    pub width: String,
    pub height: String,
}

impl Default for VideoAttributes {
    /// Controls, inline playback and autoplay enabled; fills its container
    fn default() -> Self {
        Self {
            controls: true,
            plays_inline: true,
            autoplay: true,
            width: "100%".to_string(),
            height: "100%".to_string(),
        }
    }
}

/// Element hosting the player
pub trait Container: Send + Sync {
    /// Existing playback element, if the container already has one
    fn video(&self) -> Option<Arc<dyn MediaElement>>;

    /// Create a playback element inside the container
    fn inject_video(&self, attributes: &VideoAttributes) -> Arc<dyn MediaElement>;

    /// Existing element, or a freshly injected one with default attributes
    fn video_or_inject(&self) -> Arc<dyn MediaElement> {
        match self.video() {
            Some(video) => video,
            None => self.inject_video(&VideoAttributes::default()),
        }
    }
}

/// Environment the player is mounted into
pub trait Host: Send + Sync {
    fn container(&self, id: &str) -> Option<Arc<dyn Container>>;
}
