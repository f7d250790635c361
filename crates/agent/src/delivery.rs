//! Delivery guard: posts reply segments into the feed one at a time.

use std::future::Future;
use std::time::Duration;

use feedreply_core::error::{AdapterError, DeliveryError};
use feedreply_core::feed::FeedSurface;
use tracing::debug;

/// Segments that reached the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub sent: Vec<String>,
}

/// Clear, type and submit each segment under a per-step timeout, pausing
/// between segments. The first failure aborts; nothing is retried.
#[derive(Debug, Clone)]
pub struct DeliveryGuard {
    segment_delay: Duration,
    step_timeout: Duration,
}

impl DeliveryGuard {
    pub fn new(segment_delay: Duration, step_timeout: Duration) -> Self {
        Self {
            segment_delay,
            step_timeout,
        }
    }

    pub fn segment_delay(&self) -> Duration {
        self.segment_delay
    }

    pub async fn deliver(
        &self,
        feed: &dyn FeedSurface,
        segments: &[String],
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let mut sent = Vec::with_capacity(segments.len());

        for (index, segment) in segments.iter().enumerate() {
            let step = async {
                self.step("clear", feed.clear_input()).await?;
                self.step("type", feed.type_input(segment)).await?;
                self.step("submit", feed.submit_input()).await
            };

            if let Err(source) = step.await {
                return Err(DeliveryError {
                    failed_index: index,
                    sent,
                    source,
                });
            }

            debug!(index, segment = %segment, "Segment sent");
            sent.push(segment.clone());

            if index + 1 < segments.len() && !self.segment_delay.is_zero() {
                tokio::time::sleep(self.segment_delay).await;
            }
        }

        Ok(DeliveryOutcome { sent })
    }

    async fn step(
        &self,
        name: &str,
        op: impl Future<Output = Result<(), AdapterError>>,
    ) -> Result<(), AdapterError> {
        match tokio::time::timeout(self.step_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout(format!(
                "{name} took longer than {}s",
                self.step_timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedreply_feed::MemoryFeed;

    fn segments(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn guard() -> DeliveryGuard {
        DeliveryGuard::new(Duration::ZERO, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn delivers_every_segment_in_order() {
        let feed = MemoryFeed::new();
        let outcome = guard()
            .deliver(&feed, &segments(&["你好！", "最近怎么样？"]))
            .await
            .unwrap();

        assert_eq!(outcome.sent, segments(&["你好！", "最近怎么样？"]));
        assert_eq!(feed.submitted().await, segments(&["你好！", "最近怎么样？"]));
    }

    #[tokio::test]
    async fn failure_reports_what_was_sent() {
        let feed = MemoryFeed::new();
        feed.fail_submit_at(1).await;

        let err = guard()
            .deliver(&feed, &segments(&["Sounds good,", "see you there", "tomorrow!"]))
            .await
            .unwrap_err();

        assert_eq!(err.failed_index, 1);
        assert_eq!(err.sent, segments(&["Sounds good,"]));
        assert_eq!(feed.submitted().await, segments(&["Sounds good,"]));
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_segments() {
        let feed = MemoryFeed::new();
        let guard = DeliveryGuard::new(Duration::from_millis(500), Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        guard.deliver(&feed, &segments(&["a", "b", "c"])).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1500), "paused after the last segment");
    }

    #[tokio::test(start_paused = true)]
    async fn single_segment_returns_without_pausing() {
        let feed = MemoryFeed::new();
        let guard = DeliveryGuard::new(Duration::from_secs(30), Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        guard.deliver(&feed, &segments(&["ok"])).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(30));
        assert_eq!(feed.submitted().await, segments(&["ok"]));
    }

    #[tokio::test]
    async fn nothing_to_deliver() {
        let feed = MemoryFeed::new();
        let outcome = guard().deliver(&feed, &[]).await.unwrap();
        assert!(outcome.sent.is_empty());
        assert!(feed.submitted().await.is_empty());
    }
}
