//! The reply loop implementation.

use std::sync::Arc;
use std::time::Duration;

use feedreply_config::AppConfig;
use feedreply_core::error::{AdapterError, Error, GenerationError};
use feedreply_core::feed::{FeedEntry, FeedSurface, MessageKey, SenderHint};
use feedreply_core::reply::ReplyResult;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use crate::classifier::{Classifier, Decision, IgnoreReason};
use crate::delivery::DeliveryGuard;
use crate::generator::{ReplyGenerator, ReplyInput};
use crate::prompts::ScenarioContext;
use crate::segmenter;
use crate::state::LoopState;
use crate::stream_event::LoopEvent;

/// Where the controller is inside one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Polling,
    Classifying,
    Generating,
    Segmenting,
    Delivering,
    Recording,
}

/// Wait and timeout settings.
#[derive(Debug, Clone)]
pub struct LoopTimings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub adapter_timeout: Duration,
    pub generation_timeout: Duration,
}

impl Default for LoopTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            error_backoff: Duration::from_secs(3),
            adapter_timeout: Duration::from_secs(15),
            generation_timeout: Duration::from_secs(60),
        }
    }
}

/// Counters over the lifetime of one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub iterations: u64,
    pub replies: u64,
    pub ignored: u64,
    pub segments_sent: u64,
    pub read_failures: u64,
    pub generation_failures: u64,
    pub delivery_failures: u64,
}

/// What one iteration did.
#[derive(Debug)]
pub enum IterationOutcome {
    Ignored(IgnoreReason),
    Replied {
        key: MessageKey,
        reply: ReplyResult,
        sent: Vec<String>,
    },
    /// The entry was accepted but handling it failed; it is still recorded
    /// as processed.
    Failed { key: MessageKey, error: Error },
}

impl IterationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Drives one feed: poll, classify, generate, segment, deliver, record.
pub struct LoopController {
    feed: Arc<dyn FeedSurface>,
    generator: ReplyGenerator,
    classifier: Classifier,
    delivery: DeliveryGuard,
    state: LoopState,
    timings: LoopTimings,
    scenario: ScenarioContext,
    sender_split_x: f64,
    phase: Phase,
    stats: LoopStats,
    events: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl LoopController {
    pub fn new(
        feed: Arc<dyn FeedSurface>,
        generator: ReplyGenerator,
        classifier: Classifier,
        delivery: DeliveryGuard,
        state: LoopState,
    ) -> Self {
        Self {
            feed,
            generator,
            classifier,
            delivery,
            state,
            timings: LoopTimings::default(),
            scenario: ScenarioContext::default(),
            sender_split_x: 500.0,
            phase: Phase::Idle,
            stats: LoopStats::default(),
            events: None,
        }
    }

    /// Controller with classifier, delivery, state and timings taken from
    /// the config.
    pub fn from_config(
        feed: Arc<dyn FeedSurface>,
        generator: ReplyGenerator,
        config: &AppConfig,
    ) -> Self {
        let monitor = &config.monitor;
        let delivery = DeliveryGuard::new(
            Duration::from_millis(config.feed.segment_delay_ms),
            Duration::from_secs(monitor.delivery_timeout_secs),
        );
        let state = LoopState::new(monitor.processed_capacity, monitor.own_output_capacity);

        Self::new(feed, generator, Classifier::from_config(monitor), delivery, state)
            .with_timings(LoopTimings {
                poll_interval: Duration::from_millis(monitor.poll_interval_ms),
                error_backoff: Duration::from_millis(monitor.error_backoff_ms),
                adapter_timeout: Duration::from_secs(monitor.adapter_timeout_secs),
                generation_timeout: Duration::from_secs(monitor.generation_timeout_secs),
            })
            .with_scenario(ScenarioContext::from_config(&config.reply))
            .with_sender_split_x(monitor.sender_split_x)
    }

    pub fn with_timings(mut self, timings: LoopTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_scenario(mut self, scenario: ScenarioContext) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn with_sender_split_x(mut self, split_x: f64) -> Self {
        self.sender_split_x = split_x;
        self
    }

    /// Report iteration results as [`LoopEvent`]s.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<LoopEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Run until `stop` flips to `true`, its sender is dropped, or the feed
    /// closes.
    ///
    /// A read failure on the very first iteration is returned as an error;
    /// later failures are logged and retried after the backoff.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> Result<LoopStats, Error> {
        info!(
            feed = self.feed.name(),
            provider = self.generator.provider_name(),
            model = self.generator.model(),
            test_mode = self.classifier.test_mode(),
            "Reply loop started"
        );

        let mut first = true;
        loop {
            if *stop.borrow() {
                break;
            }

            let wait = match self.run_once().await {
                Ok(outcome) if outcome.is_failure() => self.timings.error_backoff,
                Ok(_) => self.timings.poll_interval,
                Err(AdapterError::Closed) => {
                    info!(feed = self.feed.name(), "Feed closed");
                    break;
                }
                Err(e) if first => {
                    error!(feed = self.feed.name(), error = %e, "Feed unavailable on startup");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(feed = self.feed.name(), error = %e, "Feed read failed, backing off");
                    self.timings.error_backoff
                }
            };
            first = false;

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            iterations = self.stats.iterations,
            replies = self.stats.replies,
            "Reply loop stopped"
        );
        Ok(self.stats.clone())
    }

    /// One full iteration.
    ///
    /// Only feed read failures are returned as `Err`. Generation and
    /// delivery failures are recorded and reported as
    /// [`IterationOutcome::Failed`].
    pub async fn run_once(&mut self) -> Result<IterationOutcome, AdapterError> {
        self.stats.iterations += 1;

        self.enter(Phase::Polling);
        let entries = match self.read().await {
            Ok(entries) => entries,
            Err(e) => {
                self.stats.read_failures += 1;
                self.enter(Phase::Idle);
                return Err(e);
            }
        };

        self.enter(Phase::Classifying);
        let outcome = match self.classifier.classify(&entries, &self.state) {
            Decision::Ignore(reason) => self.ignore(reason, entries.last()),
            Decision::AcceptText(entry) => {
                self.log_sender(&entry).await;
                let input = ReplyInput::Text {
                    content: entry.text.clone(),
                    scenario: self.scenario.clone(),
                };
                self.answer(entry.key(), input).await
            }
            Decision::AcceptImage(entry) => {
                self.log_sender(&entry).await;
                let key = entry.key();
                match self.load_image(&entry).await {
                    Ok(bytes) => {
                        let input = ReplyInput::Image {
                            bytes,
                            caption: entry.text.clone(),
                        };
                        self.answer(key, input).await
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Image could not be loaded");
                        self.enter(Phase::Recording);
                        self.state.record_seen(key.clone());
                        self.fail(key, "image", e.into())
                    }
                }
            }
        };

        self.enter(Phase::Idle);
        Ok(outcome)
    }

    async fn answer(&mut self, key: MessageKey, input: ReplyInput) -> IterationOutcome {
        info!(key = %key, "Replying");

        self.enter(Phase::Generating);
        let reply = match self.generate(input).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(key = %key, error = %e, transient = e.is_transient(), "Generation failed");
                self.stats.generation_failures += 1;
                self.enter(Phase::Recording);
                self.state.record_seen(key.clone());
                return self.fail(key, "generate", e.into());
            }
        };

        self.enter(Phase::Segmenting);
        let segments = segmenter::segment(&reply.text, reply.language);
        debug!(key = %key, count = segments.len(), language = %reply.language, "Reply segmented");

        self.enter(Phase::Delivering);
        let delivered = self.delivery.deliver(self.feed.as_ref(), &segments).await;

        self.enter(Phase::Recording);
        match delivered {
            Ok(outcome) => {
                self.state.record_reply(key.clone(), &reply.text, &outcome.sent);
                self.stats.replies += 1;
                self.stats.segments_sent += outcome.sent.len() as u64;
                info!(key = %key, reply = %reply.text, segments = outcome.sent.len(), "Reply sent");
                self.emit(LoopEvent::Replied {
                    key: key.to_string(),
                    reply: reply.text.clone(),
                    language: reply.language.code().to_string(),
                    segments: outcome.sent.clone(),
                });
                IterationOutcome::Replied {
                    key,
                    reply,
                    sent: outcome.sent,
                }
            }
            Err(e) => {
                warn!(
                    key = %key,
                    failed_index = e.failed_index,
                    sent = e.sent.len(),
                    error = %e.source,
                    "Delivery aborted"
                );
                self.stats.delivery_failures += 1;
                self.stats.segments_sent += e.sent.len() as u64;
                self.state.record_partial(key.clone(), &e.sent);
                self.emit(LoopEvent::Failed {
                    key: key.to_string(),
                    stage: "deliver".into(),
                    message: e.to_string(),
                    sent: e.sent.clone(),
                });
                IterationOutcome::Failed {
                    key,
                    error: e.into(),
                }
            }
        }
    }

    fn ignore(&mut self, reason: IgnoreReason, last: Option<&FeedEntry>) -> IterationOutcome {
        let key = last.map(FeedEntry::key);
        match reason {
            IgnoreReason::Unchanged | IgnoreReason::Empty => {
                trace!(reason = %reason, "Nothing new");
            }
            IgnoreReason::SelfEcho => {
                self.enter(Phase::Recording);
                if let Some(key) = &key {
                    debug!(key = %key, "Skipping own message");
                    self.state.record_seen(key.clone());
                }
            }
            _ => {
                debug!(key = ?key.as_ref().map(MessageKey::as_str), reason = %reason, "Entry ignored");
            }
        }

        self.stats.ignored += 1;
        if reason != IgnoreReason::Unchanged {
            self.emit(LoopEvent::Ignored {
                key: key.map(|k| k.to_string()),
                reason: reason.to_string(),
            });
        }
        IterationOutcome::Ignored(reason)
    }

    fn fail(&mut self, key: MessageKey, stage: &str, error: Error) -> IterationOutcome {
        self.emit(LoopEvent::failed(key.to_string(), stage, &error));
        IterationOutcome::Failed { key, error }
    }

    async fn read(&self) -> Result<Vec<FeedEntry>, AdapterError> {
        match tokio::time::timeout(self.timings.adapter_timeout, self.feed.read()).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout(format!(
                "read took longer than {}s",
                self.timings.adapter_timeout.as_secs()
            ))),
        }
    }

    async fn load_image(&self, entry: &FeedEntry) -> Result<Vec<u8>, AdapterError> {
        match tokio::time::timeout(self.timings.adapter_timeout, self.feed.load_image(entry)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout(format!(
                "image load took longer than {}s",
                self.timings.adapter_timeout.as_secs()
            ))),
        }
    }

    async fn generate(&self, input: ReplyInput) -> Result<ReplyResult, GenerationError> {
        match tokio::time::timeout(self.timings.generation_timeout, self.generator.generate(input))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(format!(
                "no reply within {}s",
                self.timings.generation_timeout.as_secs()
            ))),
        }
    }

    /// Position is only a hint; it is logged and never decides anything.
    async fn log_sender(&self, entry: &FeedEntry) {
        let hint = SenderHint::from_geometry(self.feed.bounds(entry).await, self.sender_split_x);
        debug!(key = %entry.key(), sender = ?hint, "Accepted entry");
    }

    fn enter(&mut self, phase: Phase) {
        trace!(from = ?self.phase, to = ?phase, "Phase");
        self.phase = phase;
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
