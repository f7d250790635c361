//! In-memory feed: a scripted feed for tests and demos.
//!
//! Behaves like a real chat surface: submitted input shows up as a new entry
//! at the bottom of the feed (unless echo is disabled), and every
//! submission is recorded so callers can assert on what was sent.

use std::collections::HashMap;

use async_trait::async_trait;
use feedreply_core::error::AdapterError;
use feedreply_core::feed::{FeedEntry, FeedSurface};
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    entries: Vec<FeedEntry>,
    input: String,
    submitted: Vec<String>,
    failing_reads: usize,
    fail_submit_at: Option<usize>,
    images: HashMap<String, Vec<u8>>,
    reads: usize,
}

/// Scripted, in-process feed.
pub struct MemoryFeed {
    state: Mutex<State>,
    echo_submissions: bool,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            echo_submissions: true,
        }
    }

    /// Start from existing entries.
    pub fn with_entries(entries: Vec<FeedEntry>) -> Self {
        Self {
            state: Mutex::new(State {
                entries,
                ..State::default()
            }),
            echo_submissions: true,
        }
    }

    /// Keep submissions out of the visible feed.
    pub fn without_echo(mut self) -> Self {
        self.echo_submissions = false;
        self
    }

    /// Append an entry as if the peer had posted it.
    pub async fn push(&self, entry: FeedEntry) {
        self.state.lock().await.entries.push(entry);
    }

    pub async fn push_text(&self, text: &str) {
        self.push(FeedEntry::text(text)).await;
    }

    /// Register bytes returned by `load_image` for `image_ref`.
    pub async fn add_image(&self, image_ref: &str, bytes: Vec<u8>) {
        self.state
            .lock()
            .await
            .images
            .insert(image_ref.to_string(), bytes);
    }

    /// Make the next `n` reads fail as unreachable.
    pub async fn fail_next_reads(&self, n: usize) {
        self.state.lock().await.failing_reads = n;
    }

    /// Fail the submission that would become the `index`-th (0-based).
    pub async fn fail_submit_at(&self, index: usize) {
        self.state.lock().await.fail_submit_at = Some(index);
    }

    /// Everything submitted so far, in order.
    pub async fn submitted(&self) -> Vec<String> {
        self.state.lock().await.submitted.clone()
    }

    pub async fn entries(&self) -> Vec<FeedEntry> {
        self.state.lock().await.entries.clone()
    }

    /// Number of successful and failed `read()` calls.
    pub async fn read_count(&self) -> usize {
        self.state.lock().await.reads
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedSurface for MemoryFeed {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self) -> Result<Vec<FeedEntry>, AdapterError> {
        let mut state = self.state.lock().await;
        state.reads += 1;
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(AdapterError::Unreachable("scripted read failure".into()));
        }
        Ok(state.entries.clone())
    }

    async fn clear_input(&self) -> Result<(), AdapterError> {
        self.state.lock().await.input.clear();
        Ok(())
    }

    async fn type_input(&self, text: &str) -> Result<(), AdapterError> {
        self.state.lock().await.input.push_str(text);
        Ok(())
    }

    async fn submit_input(&self) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        if state.fail_submit_at == Some(state.submitted.len()) {
            state.fail_submit_at = None;
            return Err(AdapterError::InputMissing("scripted submit failure".into()));
        }

        let text = std::mem::take(&mut state.input);
        if self.echo_submissions {
            state.entries.push(FeedEntry::text(text.clone()));
        }
        state.submitted.push(text);
        Ok(())
    }

    async fn load_image(&self, entry: &FeedEntry) -> Result<Vec<u8>, AdapterError> {
        let Some(image_ref) = entry.image_ref.as_deref() else {
            return Err(AdapterError::ImageUnavailable("entry has no image".into()));
        };
        if let Some(bytes) = self.state.lock().await.images.get(image_ref) {
            return Ok(bytes.clone());
        }
        feedreply_core::feed::decode_data_url(image_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submission_is_echoed_into_the_feed() {
        let feed = MemoryFeed::with_entries(vec![FeedEntry::text("hi")]);
        feed.type_input("hello").await.unwrap();
        feed.submit_input().await.unwrap();

        let entries = feed.read().await.unwrap();
        assert_eq!(entries.last().unwrap().text, "hello");
        assert_eq!(feed.submitted().await, vec!["hello"]);
    }

    #[tokio::test]
    async fn clear_discards_pending_input() {
        let feed = MemoryFeed::new().without_echo();
        feed.type_input("draft").await.unwrap();
        feed.clear_input().await.unwrap();
        feed.type_input("final").await.unwrap();
        feed.submit_input().await.unwrap();
        assert_eq!(feed.submitted().await, vec!["final"]);
        assert!(feed.entries().await.is_empty());
    }

    #[tokio::test]
    async fn scripted_failures() {
        let feed = MemoryFeed::new();
        feed.fail_next_reads(1).await;
        assert!(feed.read().await.is_err());
        assert!(feed.read().await.is_ok());

        feed.fail_submit_at(1).await;
        feed.type_input("a").await.unwrap();
        feed.submit_input().await.unwrap();
        feed.type_input("b").await.unwrap();
        assert!(matches!(
            feed.submit_input().await,
            Err(AdapterError::InputMissing(_))
        ));
        assert_eq!(feed.read_count().await, 2);
    }

    #[tokio::test]
    async fn registered_image_bytes() {
        let feed = MemoryFeed::new();
        feed.add_image("https://cdn/x.png", vec![9, 9]).await;
        let entry = FeedEntry::image("https://cdn/x.png", "");
        assert_eq!(feed.load_image(&entry).await.unwrap(), vec![9, 9]);
    }
}
