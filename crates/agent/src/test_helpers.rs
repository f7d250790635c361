//! Shared test helpers for generator and loop tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use feedreply_core::error::GenerationError;
use feedreply_core::message::Message;
use feedreply_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
use tokio::sync::mpsc;

#[derive(Clone)]
enum Script {
    Reply(String),
    Stream(Vec<String>),
    /// Fragments, then the sender drops without a final chunk
    Truncated(Vec<String>),
    Fail(GenerationError),
}

/// A mock provider that plays back scripted answers.
///
/// Each call takes the next script entry; the last entry repeats once the
/// queue is down to one. Every request is recorded for inspection.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
    vision: bool,
}

impl ScriptedProvider {
    fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
            vision: false,
        }
    }

    /// Buffered replies, one per call.
    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Script::Reply(t.to_string())).collect())
    }

    /// A single streamed reply split into the given fragments.
    pub fn streamed(fragments: &[&str]) -> Self {
        Self::new(vec![Script::Stream(
            fragments.iter().map(|f| f.to_string()).collect(),
        )])
    }

    /// A stream that closes before its final chunk.
    pub fn truncated(fragments: &[&str]) -> Self {
        Self::new(vec![Script::Truncated(
            fragments.iter().map(|f| f.to_string()).collect(),
        )])
    }

    /// Every call fails with `error`.
    pub fn failing(error: GenerationError) -> Self {
        Self::new(vec![Script::Fail(error)])
    }

    /// Fail once with `error`, then answer `text`.
    pub fn fail_then(error: GenerationError, text: &str) -> Self {
        Self::new(vec![Script::Fail(error), Script::Reply(text.to_string())])
    }

    pub fn with_vision(mut self) -> Self {
        self.vision = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn next(&self, request: ProviderRequest) -> Script {
        self.requests.lock().unwrap().push(request);
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.len() > 1 {
            scripts.pop_front().unwrap()
        } else {
            scripts
                .front()
                .cloned()
                .expect("ScriptedProvider: no scripts configured")
        }
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, GenerationError> {
        match self.next(request) {
            Script::Reply(text) => Ok(make_text_response(&text)),
            Script::Stream(fragments) | Script::Truncated(fragments) => {
                Ok(make_text_response(&fragments.concat()))
            }
            Script::Fail(e) => Err(e),
        }
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, GenerationError>>, GenerationError> {
        let (fragments, finish) = match self.next(request) {
            Script::Reply(text) => (vec![text], true),
            Script::Stream(fragments) => (fragments, true),
            Script::Truncated(fragments) => (fragments, false),
            Script::Fail(e) => return Err(e),
        };

        let (tx, rx) = mpsc::channel(fragments.len() + 1);
        for fragment in fragments {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(fragment),
                    done: false,
                    usage: None,
                }))
                .await;
        }
        if finish {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: None,
                    done: true,
                    usage: None,
                }))
                .await;
        }
        Ok(rx)
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}
