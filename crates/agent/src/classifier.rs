//! Message classification: decides whether the newest feed entry deserves a
//! reply.
//!
//! Content filters run first so invalid content never touches the dedup
//! state; identity filters (unchanged, duplicate, self-echo) follow.

use std::fmt;

use feedreply_config::MonitorConfig;
use feedreply_core::feed::FeedEntry;
use serde::Serialize;

use crate::state::LoopState;

/// Why an entry was not answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// No entries, or neither text nor image
    Empty,
    TooLong,
    /// Platform notice such as "Alice added Bob"
    System,
    /// Same key as the previous cycle
    Unchanged,
    /// Already handled earlier
    Duplicate,
    /// Text we posted ourselves
    SelfEcho,
}

impl IgnoreReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLong => "too_long",
            Self::System => "system",
            Self::Unchanged => "unchanged",
            Self::Duplicate => "duplicate",
            Self::SelfEcho => "self_echo",
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification outcome for the newest entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Ignore(IgnoreReason),
    AcceptText(FeedEntry),
    AcceptImage(FeedEntry),
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        !matches!(self, Self::Ignore(_))
    }
}

/// Stateless rules; state is passed in on every call.
#[derive(Debug, Clone)]
pub struct Classifier {
    max_text_len: usize,
    system_keywords: Vec<String>,
    test_mode: bool,
}

impl Classifier {
    pub fn new(max_text_len: usize, system_keywords: Vec<String>, test_mode: bool) -> Self {
        Self {
            max_text_len,
            system_keywords: system_keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            test_mode,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.max_text_len,
            config.system_keywords.clone(),
            config.test_mode,
        )
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// Classify the last entry of a snapshot.
    pub fn classify(&self, entries: &[FeedEntry], state: &LoopState) -> Decision {
        let Some(entry) = entries.last() else {
            return Decision::Ignore(IgnoreReason::Empty);
        };

        if entry.is_empty() {
            return Decision::Ignore(IgnoreReason::Empty);
        }

        if entry.text.chars().count() > self.max_text_len {
            return Decision::Ignore(IgnoreReason::TooLong);
        }

        let lowered = entry.text.to_lowercase();
        if self.system_keywords.iter().any(|k| lowered.contains(k)) {
            return Decision::Ignore(IgnoreReason::System);
        }

        let key = entry.key();
        if state.is_last(&key) {
            return Decision::Ignore(IgnoreReason::Unchanged);
        }
        if state.is_processed(&key) {
            return Decision::Ignore(IgnoreReason::Duplicate);
        }

        if !self.test_mode && !entry.text.is_empty() && state.is_own_output(&entry.text) {
            return Decision::Ignore(IgnoreReason::SelfEcho);
        }

        if entry.has_image() {
            Decision::AcceptImage(entry.clone())
        } else {
            Decision::AcceptText(entry.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(test_mode: bool) -> Classifier {
        Classifier::from_config(&MonitorConfig {
            test_mode,
            ..MonitorConfig::default()
        })
    }

    fn state() -> LoopState {
        LoopState::new(50, 100)
    }

    #[test]
    fn empty_feed_and_empty_entry() {
        let c = classifier(false);
        assert_eq!(c.classify(&[], &state()), Decision::Ignore(IgnoreReason::Empty));
        assert_eq!(
            c.classify(&[FeedEntry::text("  ")], &state()),
            Decision::Ignore(IgnoreReason::Empty)
        );
    }

    #[test]
    fn only_the_last_entry_counts() {
        let c = classifier(false);
        let entries = vec![FeedEntry::text("hello"), FeedEntry::text("Alice left the group")];
        assert_eq!(c.classify(&entries, &state()), Decision::Ignore(IgnoreReason::System));
    }

    #[test]
    fn too_long_counts_characters() {
        let c = classifier(false);
        let long = "a".repeat(600);
        assert_eq!(
            c.classify(&[FeedEntry::text(long)], &state()),
            Decision::Ignore(IgnoreReason::TooLong)
        );
        // 500 CJK characters are 1500 bytes but still within the ceiling
        let cjk = "好".repeat(500);
        assert!(c.classify(&[FeedEntry::text(cjk)], &state()).is_accept());
    }

    #[test]
    fn system_keywords_are_case_insensitive() {
        let c = classifier(false);
        for text in ["Alice added Bob", "Bob JOINED the chat", "Carol renamed the group"] {
            assert_eq!(
                c.classify(&[FeedEntry::text(text)], &state()),
                Decision::Ignore(IgnoreReason::System),
                "{text}"
            );
        }
    }

    #[test]
    fn unchanged_before_duplicate() {
        let c = classifier(false);
        let mut st = state();
        let entry = FeedEntry::text("你好");
        st.record_seen(entry.key());
        assert_eq!(
            c.classify(std::slice::from_ref(&entry), &st),
            Decision::Ignore(IgnoreReason::Unchanged)
        );

        st.record_seen(FeedEntry::text("other").key());
        assert_eq!(
            c.classify(&[entry], &st),
            Decision::Ignore(IgnoreReason::Duplicate)
        );
    }

    #[test]
    fn self_echo_unless_test_mode() {
        let mut st = state();
        st.record_reply(
            FeedEntry::text("你好").key(),
            "你好！最近怎么样？",
            &["你好！".into(), "最近怎么样？".into()],
        );
        let echo = [FeedEntry::text("最近怎么样？")];

        assert_eq!(
            classifier(false).classify(&echo, &st),
            Decision::Ignore(IgnoreReason::SelfEcho)
        );
        assert!(matches!(
            classifier(true).classify(&echo, &st),
            Decision::AcceptText(_)
        ));
    }

    #[test]
    fn image_entries_are_accepted_as_images() {
        let c = classifier(false);
        let entry = FeedEntry::image("https://cdn.example.com/q1.png", "");
        assert_eq!(
            c.classify(std::slice::from_ref(&entry), &state()),
            Decision::AcceptImage(entry)
        );
    }

    #[test]
    fn invalid_content_leaves_state_untouched() {
        let c = classifier(false);
        let st = state();
        let _ = c.classify(&[FeedEntry::text("x".repeat(700))], &st);
        assert!(st.last_key().is_none());
        assert!(st.processed().is_empty());
    }
}
