//! Descriptor poll loop
//!
//! One cycle fetches the channel descriptor, compares its stream URL with the
//! last applied one and hands changes to a [`SourceSink`]. Successful cycles
//! are spaced by the poll interval plus jitter, minus the time the cycle took;
//! failed cycles wait the current retry delay plus a short jitter, then the
//! retry delay grows.
//!
//! ```text
//!            ┌──── success: max(500ms, interval + jitter − elapsed) ────┐
//!            v                                                         │
//! [stopped?] ──> fetch ──> changed? ──> sink.set_source ──> memo ─────┘
//!                  │                         │
//!                  └──── failure ────────────┴──> retry + jitter, grow backoff
//! ```

use crate::backoff::Backoff;
use crate::channel::{ChannelId, PlayerOptions};
use crate::clock::{Clock, Jitter, RandomJitter, TokioClock};
use crate::constants::{retry_jitter_window, MIN_POLL_WAIT_MS};
use crate::descriptor::DescriptorSource;
use crate::error::Result;
use crate::events::{EventBus, PlayerEvent};
use crate::reconciler::SourceSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared, one-way stop flag
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to stop; there is no way back
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutable state of one player session
#[derive(Debug, Default)]
pub struct SessionState {
    /// Last stream URL successfully handed to the sink
    pub current_url: Option<String>,
    pub backoff: Backoff,
    stop: StopHandle,
}

impl SessionState {
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The sink switched to this URL
    Changed(String),
    Unchanged,
    /// The cycle failed for this reason
    Failed(String),
}

/// Result of one cycle and the wait before the next one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub next_delay: Duration,
}

pub struct Poller<S, K> {
    channel: ChannelId,
    options: PlayerOptions,
    source: S,
    sink: K,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn Jitter>,
    events: EventBus,
    state: SessionState,
}

impl<S, K> Poller<S, K>
where
    S: DescriptorSource,
    K: SourceSink,
{
    pub fn new(options: PlayerOptions, source: S, sink: K) -> Self {
        Self {
            channel: options.channel.clone(),
            options,
            source,
            sink,
            clock: Arc::new(TokioClock),
            jitter: Arc::new(RandomJitter),
            events: EventBus::default(),
            state: SessionState::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.state.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.state.stop.clone()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run cycles until the stop flag is set
    pub async fn run(&mut self) {
        info!(
            channel = %self.channel,
            descriptor = %self.source.location(),
            poll_ms = self.options.poll_interval.as_millis() as u64,
            "Channel poller started"
        );

        while !self.state.is_stopped() {
            let report = self.poll_once().await;
            if self.state.is_stopped() {
                break;
            }
            self.clock.sleep(report.next_delay).await;
        }

        info!(channel = %self.channel, "Channel poller stopped");
        self.events.publish(PlayerEvent::Stopped {
            channel: self.channel.to_string(),
        });
    }

    /// Execute one cycle and compute the wait before the next one
    pub async fn poll_once(&mut self) -> CycleReport {
        let started = self.clock.now();

        match self.cycle().await {
            Ok(changed) => {
                self.state.backoff.reset();

                let jitter = self.jitter.sample(self.options.jitter_window);
                let elapsed = self.clock.now().saturating_duration_since(started);
                let next_delay = (self.options.poll_interval + jitter)
                    .saturating_sub(elapsed)
                    .max(Duration::from_millis(MIN_POLL_WAIT_MS));

                debug!(
                    channel = %self.channel,
                    changed = changed.is_some(),
                    next_poll_ms = next_delay.as_millis() as u64,
                    "Poll cycle done"
                );
                self.events.publish(PlayerEvent::CycleSucceeded {
                    channel: self.channel.to_string(),
                    changed: changed.is_some(),
                    next_poll_in: next_delay,
                });

                CycleReport {
                    outcome: changed.map_or(CycleOutcome::Unchanged, CycleOutcome::Changed),
                    next_delay,
                }
            }
            Err(err) => {
                let reason = err.to_string();
                let next_delay =
                    self.state.backoff.current() + self.jitter.sample(retry_jitter_window());
                self.state.backoff.grow();

                warn!(
                    channel = %self.channel,
                    retry_ms = next_delay.as_millis() as u64,
                    "[poll] {reason}"
                );
                self.events.publish(PlayerEvent::CycleFailed {
                    channel: self.channel.to_string(),
                    reason: reason.clone(),
                    retry_in: next_delay,
                });

                CycleReport {
                    outcome: CycleOutcome::Failed(reason),
                    next_delay,
                }
            }
        }
    }

    /// Fetch, compare, reconcile; returns the new URL when it changed
    async fn cycle(&mut self) -> Result<Option<String>> {
        let descriptor = self.source.fetch().await?;
        let url = descriptor.stream_url;

        if self.state.current_url.as_deref() == Some(url.as_str()) {
            return Ok(None);
        }

        self.sink.set_source(&url).await?;
        self.state.current_url = Some(url.clone());
        Ok(Some(url))
    }
}
