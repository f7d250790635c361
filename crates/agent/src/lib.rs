//! The reply loop at the heart of feedreply.
//!
//! Each iteration follows a **detect → classify → generate → segment →
//! deliver → record** cycle:
//!
//! 1. **Read** a snapshot of the feed
//! 2. **Classify** the newest entry (content filters, then dedup and
//!    self-echo checks against [`LoopState`])
//! 3. **Generate** a short reply in the sender's language
//! 4. **Segment** the reply into small pieces
//! 5. **Deliver** the pieces one by one through the feed's input box
//! 6. **Record** the entry and everything we posted, so our own messages are
//!    never answered
//!
//! The loop runs until it is told to stop or the feed closes; other errors
//! are logged and the next iteration runs after a backoff.

pub mod classifier;
pub mod delivery;
pub mod generator;
pub mod loop_runner;
pub mod prompts;
pub mod segmenter;
pub mod state;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use classifier::{Classifier, Decision, IgnoreReason};
pub use delivery::{DeliveryGuard, DeliveryOutcome};
pub use generator::{ReplyGenerator, ReplyInput};
pub use loop_runner::{IterationOutcome, LoopController, LoopStats, LoopTimings, Phase};
pub use prompts::{Scenario, ScenarioContext};
pub use segmenter::segment;
pub use state::{BoundedSet, LoopState};
pub use stream_event::LoopEvent;
