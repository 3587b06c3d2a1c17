//! Source reconciliation: switching the playback element to a new stream URL.
//!
//! The reconciler picks a strategy on every switch:
//!
//! 1. **Engine**: an engine capability is present and supported. One engine is
//!    created lazily and reused; each switch detaches it, loads the new URL
//!    and attaches it to the element again.
//! 2. **Native**: the element itself declares HLS support. The URL becomes
//!    its source and playback starts on the next metadata-loaded event.
//! 3. Otherwise the switch fails with [`Error::UnsupportedPlayback`].
//!
//! Playback attempts are best-effort: a refused `play()` is reported as
//! [`NonFatal::PlaybackRejected`] and never fails the switch.

use crate::channel::ChannelId;
use crate::constants::HLS_MIME_TYPE;
use crate::engine::{EngineCapability, EngineConfig, EngineEvent, EngineEventKind, StreamingEngine};
use crate::error::{Error, NonFatal, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::media::MediaElement;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// How a source is delivered to the playback element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Engine,
    Native,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Engine => f.write_str("engine"),
            Strategy::Native => f.write_str("native"),
        }
    }
}

/// Reconciler state; never half-attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Uninitialized,
    Attached { strategy: Strategy, url: String },
}

/// Receiver of stream URL changes, driven by the poller
#[async_trait]
pub trait SourceSink: Send {
    /// Switch to `url`; an error counts as a failed poll cycle
    async fn set_source(&mut self, url: &str) -> Result<()>;
}

pub struct SourceReconciler {
    channel: ChannelId,
    element: Arc<dyn MediaElement>,
    capability: Option<Arc<dyn EngineCapability>>,
    engine_config: EngineConfig,
    engine: Option<Box<dyn StreamingEngine>>,
    state: SourceState,
    events: EventBus,
}

impl SourceReconciler {
    pub fn new(channel: ChannelId, element: Arc<dyn MediaElement>, events: EventBus) -> Self {
        Self {
            channel,
            element,
            capability: None,
            engine_config: EngineConfig::default(),
            engine: None,
            state: SourceState::Uninitialized,
            events,
        }
    }

    /// Offer a streaming engine capability
    pub fn with_engine(mut self, capability: Arc<dyn EngineCapability>) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn state(&self) -> &SourceState {
        &self.state
    }

    pub fn element(&self) -> &Arc<dyn MediaElement> {
        &self.element
    }

    /// Whether the engine has been constructed
    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Switch the element to `url` and return the strategy used
    pub fn apply(&mut self, url: &str) -> Result<Strategy> {
        let strategy = if self.engine_supported() {
            self.attach_with_engine(url)?;
            Strategy::Engine
        } else if self.element.can_play_type(HLS_MIME_TYPE) {
            self.attach_natively(url);
            Strategy::Native
        } else {
            return Err(Error::UnsupportedPlayback);
        };

        info!(channel = %self.channel, url = %url, %strategy, "Stream source applied");
        self.state = SourceState::Attached {
            strategy,
            url: url.to_string(),
        };
        self.events.publish(PlayerEvent::SourceApplied {
            channel: self.channel.to_string(),
            url: url.to_string(),
            strategy,
        });
        Ok(strategy)
    }

    fn engine_supported(&self) -> bool {
        self.capability
            .as_ref()
            .is_some_and(|capability| capability.is_supported())
    }

    fn attach_with_engine(&mut self, url: &str) -> Result<()> {
        let channel = self.channel.to_string();
        let element = self.element.clone();
        let events = self.events.clone();
        let engine = self.engine_mut()?;

        // Detach failures are reported but never stop the transition.
        if let Err(err) = engine.detach_media() {
            events.non_fatal(&channel, NonFatal::DetachFailed(err.to_string()));
        }
        engine.load_source(url);
        engine.attach_media(element);
        Ok(())
    }

    /// The engine, constructed and subscribed on first use
    fn engine_mut(&mut self) -> Result<&mut Box<dyn StreamingEngine>> {
        if self.engine.is_none() {
            let capability = self
                .capability
                .as_ref()
                .ok_or_else(|| Error::engine("no engine capability"))?;
            let mut engine = capability.create(self.engine_config)?;
            debug!(
                channel = %self.channel,
                max_buffer_secs = self.engine_config.max_buffer_length.as_secs(),
                "Streaming engine created"
            );
            self.subscribe(engine.as_mut());
            self.engine = Some(engine);
        }

        self.engine
            .as_mut()
            .ok_or_else(|| Error::engine("engine unavailable"))
    }

    fn subscribe(&self, engine: &mut dyn StreamingEngine) {
        let channel = self.channel.to_string();
        let element = self.element.clone();
        let events = self.events.clone();
        let runtime = Handle::try_current().ok();
        engine.on(
            EngineEventKind::ManifestParsed,
            Arc::new(move |_: &EngineEvent| {
                spawn_play(runtime.as_ref(), &channel, element.clone(), events.clone());
            }),
        );

        let channel = self.channel.to_string();
        let events = self.events.clone();
        engine.on(
            EngineEventKind::Error,
            Arc::new(move |event: &EngineEvent| {
                if let EngineEvent::Error { kind, details } = event {
                    events.non_fatal(
                        &channel,
                        NonFatal::StreamingEngineError {
                            kind: kind.clone(),
                            details: details.clone(),
                        },
                    );
                }
            }),
        );
    }

    fn attach_natively(&mut self, url: &str) {
        self.element.set_source(url);

        let channel = self.channel.to_string();
        let element = self.element.clone();
        let events = self.events.clone();
        let runtime = Handle::try_current().ok();
        self.element.once_loaded_metadata(Box::new(move || {
            spawn_play(runtime.as_ref(), &channel, element, events);
        }));
    }
}

#[async_trait]
impl SourceSink for SourceReconciler {
    async fn set_source(&mut self, url: &str) -> Result<()> {
        self.apply(url).map(|_| ())
    }
}

/// Try to start playback, reporting a refusal as a non-fatal outcome
pub async fn safe_play(channel: &str, element: &dyn MediaElement, events: &EventBus) {
    if let Err(err) = element.play().await {
        events.non_fatal(channel, NonFatal::PlaybackRejected(err.to_string()));
    }
}

fn spawn_play(
    runtime: Option<&Handle>,
    channel: &str,
    element: Arc<dyn MediaElement>,
    events: EventBus,
) {
    let channel = channel.to_string();
    match runtime {
        Some(runtime) => {
            runtime.spawn(async move {
                safe_play(&channel, element.as_ref(), &events).await;
            });
        }
        None => warn!(channel = %channel, "No async runtime available to start playback"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineHandler;
    use crate::media::MetadataHandler;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeElement {
        native_hls: bool,
        reject_play: bool,
        source: Mutex<Option<String>>,
        pending: Mutex<Vec<MetadataHandler>>,
        plays: AtomicUsize,
    }

    impl FakeElement {
        fn fire_loaded_metadata(&self) {
            let handlers: Vec<MetadataHandler> = self.pending.lock().drain(..).collect();
            for handler in handlers {
                handler();
            }
        }
    }

    #[async_trait]
    impl MediaElement for FakeElement {
        fn can_play_type(&self, mime: &str) -> bool {
            self.native_hls && mime == HLS_MIME_TYPE
        }

        fn set_source(&self, url: &str) {
            *self.source.lock() = Some(url.to_string());
        }

        fn source(&self) -> Option<String> {
            self.source.lock().clone()
        }

        fn once_loaded_metadata(&self, handler: MetadataHandler) {
            self.pending.lock().push(handler);
        }

        async fn play(&self) -> Result<()> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            if self.reject_play {
                Err(Error::other("autoplay blocked"))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct EngineLog {
        calls: Mutex<Vec<String>>,
        handlers: Mutex<Vec<(EngineEventKind, EngineHandler)>>,
        created: AtomicUsize,
    }

    impl EngineLog {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn emit(&self, event: EngineEvent) {
            let handlers: Vec<EngineHandler> = self
                .handlers
                .lock()
                .iter()
                .filter(|(k, _)| *k == event.kind())
                .map(|(_, h)| h.clone())
                .collect();
            for handler in handlers {
                handler(&event);
            }
        }
    }

    struct FakeEngine {
        log: Arc<EngineLog>,
        fail_detach: bool,
    }

    impl StreamingEngine for FakeEngine {
        fn detach_media(&mut self) -> Result<()> {
            self.log.calls.lock().push("detach".into());
            if self.fail_detach {
                Err(Error::engine("media already gone"))
            } else {
                Ok(())
            }
        }

        fn load_source(&mut self, url: &str) {
            self.log.calls.lock().push(format!("load {url}"));
        }

        fn attach_media(&mut self, element: Arc<dyn MediaElement>) {
            self.log.calls.lock().push("attach".into());
            if let Some(url) = self
                .log
                .calls
                .lock()
                .iter()
                .rev()
                .find_map(|c| c.strip_prefix("load ").map(str::to_string))
            {
                element.set_source(&url);
            }
        }

        fn on(&mut self, kind: EngineEventKind, handler: EngineHandler) {
            self.log.handlers.lock().push((kind, handler));
        }
    }

    struct FakeCapability {
        supported: AtomicBool,
        fail_detach: bool,
        log: Arc<EngineLog>,
    }

    impl FakeCapability {
        fn new(supported: bool) -> Self {
            Self {
                supported: AtomicBool::new(supported),
                fail_detach: false,
                log: Arc::new(EngineLog::default()),
            }
        }
    }

    impl EngineCapability for FakeCapability {
        fn is_supported(&self) -> bool {
            self.supported.load(Ordering::SeqCst)
        }

        fn create(&self, _config: EngineConfig) -> Result<Box<dyn StreamingEngine>> {
            self.log.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeEngine {
                log: self.log.clone(),
                fail_detach: self.fail_detach,
            }))
        }
    }

    fn reconciler(element: Arc<FakeElement>) -> (SourceReconciler, EventBus) {
        let events = EventBus::default();
        let reconciler = SourceReconciler::new(ChannelId::new("news"), element, events.clone());
        (reconciler, events)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn test_engine_strategy_detaches_loads_then_attaches() {
        let element = Arc::new(FakeElement::default());
        let capability = Arc::new(FakeCapability::new(true));
        let (reconciler, _events) = reconciler(element.clone());
        let mut reconciler = reconciler.with_engine(capability.clone());

        assert_eq!(reconciler.state(), &SourceState::Uninitialized);
        assert!(!reconciler.has_engine());

        let strategy = reconciler.apply("https://cdn.example.org/a.m3u8").unwrap();
        assert_eq!(strategy, Strategy::Engine);
        reconciler.apply("https://cdn.example.org/b.m3u8").unwrap();

        assert_eq!(capability.log.created.load(Ordering::SeqCst), 1);
        assert_eq!(
            capability.log.calls(),
            vec![
                "detach",
                "load https://cdn.example.org/a.m3u8",
                "attach",
                "detach",
                "load https://cdn.example.org/b.m3u8",
                "attach",
            ]
        );
        assert_eq!(
            reconciler.state(),
            &SourceState::Attached {
                strategy: Strategy::Engine,
                url: "https://cdn.example.org/b.m3u8".into(),
            }
        );
        assert_eq!(
            element.source().as_deref(),
            Some("https://cdn.example.org/b.m3u8")
        );
        // One subscription per event kind, registered once.
        assert_eq!(capability.log.handlers.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_detach_failure_is_non_fatal() {
        let element = Arc::new(FakeElement::default());
        let capability = Arc::new(FakeCapability {
            fail_detach: true,
            ..FakeCapability::new(true)
        });
        let (reconciler, events) = reconciler(element);
        let mut reconciler = reconciler.with_engine(capability.clone());
        let mut rx = events.subscribe();

        reconciler.apply("https://cdn.example.org/a.m3u8").unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::NonFatal {
                channel: "news".into(),
                outcome: NonFatal::DetachFailed(
                    "Streaming engine error: media already gone".into()
                ),
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            PlayerEvent::SourceApplied {
                strategy: Strategy::Engine,
                ..
            }
        ));
        assert_eq!(capability.log.calls().last().map(String::as_str), Some("attach"));
    }

    #[tokio::test]
    async fn test_manifest_parsed_triggers_play_and_errors_are_reported() {
        let element = Arc::new(FakeElement {
            reject_play: true,
            ..FakeElement::default()
        });
        let capability = Arc::new(FakeCapability::new(true));
        let (reconciler, events) = reconciler(element.clone());
        let mut reconciler = reconciler.with_engine(capability.clone());
        reconciler.apply("https://cdn.example.org/a.m3u8").unwrap();
        let mut rx = events.subscribe();

        capability.log.emit(EngineEvent::ManifestParsed {
            url: "https://cdn.example.org/a.m3u8".into(),
        });
        settle().await;
        assert_eq!(element.plays.load(Ordering::SeqCst), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::NonFatal {
                channel: "news".into(),
                outcome: NonFatal::PlaybackRejected("autoplay blocked".into()),
            }
        );

        capability.log.emit(EngineEvent::Error {
            kind: "networkError".into(),
            details: "fragLoadError".into(),
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::NonFatal {
                channel: "news".into(),
                outcome: NonFatal::StreamingEngineError {
                    kind: "networkError".into(),
                    details: "fragLoadError".into(),
                },
            }
        );
    }

    #[tokio::test]
    async fn test_native_strategy_plays_on_loaded_metadata_once() {
        let element = Arc::new(FakeElement {
            native_hls: true,
            ..FakeElement::default()
        });
        let (mut reconciler, _events) = reconciler(element.clone());

        let strategy = reconciler.apply("https://cdn.example.org/a.m3u8").unwrap();
        assert_eq!(strategy, Strategy::Native);
        assert_eq!(
            element.source().as_deref(),
            Some("https://cdn.example.org/a.m3u8")
        );
        assert_eq!(element.plays.load(Ordering::SeqCst), 0);

        element.fire_loaded_metadata();
        element.fire_loaded_metadata();
        settle().await;
        assert_eq!(element.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_engine_falls_back_to_native() {
        let element = Arc::new(FakeElement {
            native_hls: true,
            ..FakeElement::default()
        });
        let capability = Arc::new(FakeCapability::new(false));
        let (reconciler, _events) = reconciler(element);
        let mut reconciler = reconciler.with_engine(capability.clone());

        assert_eq!(
            reconciler.apply("https://cdn.example.org/a.m3u8").unwrap(),
            Strategy::Native
        );
        assert_eq!(capability.log.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_engine_and_no_native_support_is_unsupported() {
        let element = Arc::new(FakeElement::default());
        let (mut reconciler, _events) = reconciler(element.clone());

        let result = reconciler.set_source("https://cdn.example.org/a.m3u8").await;
        assert!(matches!(result, Err(Error::UnsupportedPlayback)));
        assert_eq!(reconciler.state(), &SourceState::Uninitialized);
        assert_eq!(element.source(), None);
    }
}
