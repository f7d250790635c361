//! Loop-level events.
//!
//! `LoopEvent` reports what each iteration did, plus the raw reply
//! fragments while a streamed generation is in progress. Front-ends (the CLI
//! echo, tests) subscribe through an unbounded mpsc channel; the loop never
//! waits on a subscriber.

use serde::{Deserialize, Serialize};

/// Events emitted by the loop controller and reply generator.
///
/// - `fragment`: partial reply text from a streamed generation
/// - `ignored`: the newest entry was filtered out
/// - `replied`: a reply was delivered in full
/// - `failed`: generation or delivery failed for an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// Partial reply text; sending has not started yet.
    Fragment { content: String },

    /// The newest entry was not answered.
    Ignored { key: Option<String>, reason: String },

    /// A reply went out.
    Replied {
        key: String,
        reply: String,
        language: String,
        segments: Vec<String>,
    },

    /// Handling an entry failed; the entry is still marked processed.
    Failed {
        key: String,
        stage: String,
        message: String,
        #[serde(default)]
        sent: Vec<String>,
    },
}

impl LoopEvent {
    pub fn fragment(content: impl Into<String>) -> Self {
        Self::Fragment {
            content: content.into(),
        }
    }

    pub fn failed(key: impl Into<String>, stage: &str, message: impl ToString) -> Self {
        Self::Failed {
            key: key.into(),
            stage: stage.to_string(),
            message: message.to_string(),
            sent: Vec::new(),
        }
    }
}
