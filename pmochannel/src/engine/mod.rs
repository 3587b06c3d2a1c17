//! Adaptive-streaming engine capability
//!
//! An engine takes a stream URL, loads it, and feeds a playback element
//! that cannot play HLS by itself. The reconciler only sees the narrow
//! capability set below, so alternate backends (the HTTP manifest engine,
//! test doubles) plug in without touching the poller.
//!
//! Engine lifecycle, per player:
//!
//! ```text
//! Uninitialized --create--> Attached(url) --detach/load/attach--> Attached(url')
//! ```

pub mod manifest;

use crate::constants::MAX_BUFFER_LENGTH_SECS;
use crate::error::Result;
use crate::media::MediaElement;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub use manifest::{ManifestEngine, ManifestEngineCapability};

/// Buffering configuration handed to a new engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_buffer_length: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_buffer_length: Duration::from_secs(MAX_BUFFER_LENGTH_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineEventKind {
    ManifestParsed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The loaded manifest is ready; playback may start
    ManifestParsed { url: String },
    /// Asynchronous engine failure
    Error { kind: String, details: String },
}

impl EngineEvent {
    pub fn kind(&self) -> EngineEventKind {
        match self {
            EngineEvent::ManifestParsed { .. } => EngineEventKind::ManifestParsed,
            EngineEvent::Error { .. } => EngineEventKind::Error,
        }
    }
}

pub type EngineHandler = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Support detection and construction of engines
pub trait EngineCapability: Send + Sync {
    /// Whether the engine can run in the current environment
    fn is_supported(&self) -> bool;

    fn create(&self, config: EngineConfig) -> Result<Box<dyn StreamingEngine>>;
}

/// A streaming session bound to at most one playback element
pub trait StreamingEngine: Send {
    /// Unbind the current element; a no-op when nothing is attached
    fn detach_media(&mut self) -> Result<()>;

    fn load_source(&mut self, url: &str);

    fn attach_media(&mut self, element: Arc<dyn MediaElement>);

    /// Subscribe to events of `kind`; handlers live as long as the engine
    fn on(&mut self, kind: EngineEventKind, handler: EngineHandler);
}

/// Handler registry shared between an engine and its background tasks
#[derive(Clone, Default)]
pub struct EngineHandlers {
    inner: Arc<Mutex<Vec<(EngineEventKind, EngineHandler)>>>,
}

impl EngineHandlers {
    pub fn register(&self, kind: EngineEventKind, handler: EngineHandler) {
        self.inner.lock().push((kind, handler));
    }

    /// Invoke every handler subscribed to the event's kind
    pub fn emit(&self, event: &EngineEvent) {
        let kind = event.kind();
        // Handlers run outside the lock so they may register further handlers.
        let handlers: Vec<EngineHandler> = self
            .inner
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_dispatches_by_kind() {
        let handlers = EngineHandlers::default();
        let parsed = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let p = parsed.clone();
        handlers.register(
            EngineEventKind::ManifestParsed,
            Arc::new(move |_: &EngineEvent| {
                p.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let e = errors.clone();
        handlers.register(
            EngineEventKind::Error,
            Arc::new(move |_: &EngineEvent| {
                e.fetch_add(1, Ordering::SeqCst);
            }),
        );

        handlers.emit(&EngineEvent::ManifestParsed {
            url: "https://cdn.example.org/a.m3u8".into(),
        });
        handlers.emit(&EngineEvent::Error {
            kind: "networkError".into(),
            details: "manifestLoadError".into(),
        });
        handlers.emit(&EngineEvent::Error {
            kind: "mediaError".into(),
            details: "manifestParsingError".into(),
        });

        assert_eq!(parsed.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 2);
        assert_eq!(handlers.len(), 2);
    }

    #[test]
    fn test_default_config() {
        assert_eq!(
            EngineConfig::default().max_buffer_length,
            Duration::from_secs(30)
        );
    }
}
