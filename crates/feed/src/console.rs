//! Console feed: a terminal stands in for the chat client.
//!
//! Lines typed on stdin appear as peer entries. `/image <ref> [caption]`
//! posts an image entry (`ref` may be a local path or a `data:` URL).
//! Submitted replies are printed and appended to the feed like a real chat
//! client would, so the self-echo guard is exercised live.

use std::sync::Arc;

use async_trait::async_trait;
use feedreply_core::error::AdapterError;
use feedreply_core::feed::{FeedEntry, FeedSurface};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

/// What one stdin line means.
#[derive(Debug, PartialEq)]
pub enum ConsoleInput {
    Entry(FeedEntry),
    Exit,
    Skip,
}

/// Interpret one line of terminal input.
pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Skip;
    }

    if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
        return ConsoleInput::Exit;
    }

    if let Some(rest) = line.strip_prefix("/image") {
        let rest = rest.trim();
        if rest.is_empty() {
            return ConsoleInput::Skip;
        }
        let (image_ref, caption) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        return ConsoleInput::Entry(FeedEntry::image(image_ref, caption));
    }

    ConsoleInput::Entry(FeedEntry::text(line))
}

#[derive(Default)]
struct Shared {
    entries: Vec<FeedEntry>,
    input: String,
    closed: bool,
    /// A snapshot taken after `closed` was set has been handed out
    drained: bool,
}

/// Interactive terminal feed.
pub struct ConsoleFeed {
    shared: Arc<Mutex<Shared>>,
}

impl ConsoleFeed {
    /// Create the feed and start reading stdin in the background.
    pub fn start() -> Self {
        Self::from_reader(BufReader::new(io::stdin()))
    }

    /// Feed whose peer lines come from `reader` instead of stdin.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let reader_state = shared.clone();

        tokio::spawn(async move {
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_line(&line) {
                        ConsoleInput::Entry(entry) => {
                            debug!(key = %entry.key(), "Console entry");
                            reader_state.lock().await.entries.push(entry);
                        }
                        ConsoleInput::Exit => break,
                        ConsoleInput::Skip => continue,
                    },
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        debug!(error = %e, "stdin closed");
                        break;
                    }
                }
            }

            reader_state.lock().await.closed = true;
        });

        Self { shared }
    }
}

#[async_trait]
impl FeedSurface for ConsoleFeed {
    fn name(&self) -> &str {
        "console"
    }

    async fn read(&self) -> Result<Vec<FeedEntry>, AdapterError> {
        let mut shared = self.shared.lock().await;
        if shared.closed {
            // Lines that arrived just before EOF still get one pass
            if shared.drained {
                return Err(AdapterError::Closed);
            }
            shared.drained = true;
        }
        Ok(shared.entries.clone())
    }

    async fn clear_input(&self) -> Result<(), AdapterError> {
        self.shared.lock().await.input.clear();
        Ok(())
    }

    async fn type_input(&self, text: &str) -> Result<(), AdapterError> {
        self.shared.lock().await.input.push_str(text);
        Ok(())
    }

    async fn submit_input(&self) -> Result<(), AdapterError> {
        let mut shared = self.shared.lock().await;
        let text = std::mem::take(&mut shared.input);
        println!("🤖 {text}");
        shared.entries.push(FeedEntry::text(text));
        Ok(())
    }
}
