//! Cross-cycle loop state: the last seen key and two bounded membership
//! sets. Owned by the loop controller and mutated only between cycles.

use std::borrow::Borrow;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use feedreply_core::feed::MessageKey;

/// A set that keeps at most `capacity` items, evicting the oldest first.
///
/// Re-inserting an existing item refreshes it to most recent.
#[derive(Debug, Clone)]
pub struct BoundedSet<T> {
    members: HashSet<T>,
    order: VecDeque<T>,
    capacity: usize,
}

impl<T: Eq + Hash + Clone> BoundedSet<T> {
    /// Capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            members: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn insert(&mut self, item: T) {
        if self.members.contains(&item) {
            if let Some(pos) = self.order.iter().position(|x| *x == item) {
                self.order.remove(pos);
            }
        } else {
            self.members.insert(item.clone());
        }
        self.order.push_back(item);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.members.contains(item)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Members from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }
}

/// Dedup and self-echo memory of one feed.
#[derive(Debug, Clone)]
pub struct LoopState {
    last_key: Option<MessageKey>,
    processed: BoundedSet<MessageKey>,
    own_outputs: BoundedSet<String>,
}

impl LoopState {
    pub fn new(processed_capacity: usize, own_output_capacity: usize) -> Self {
        Self {
            last_key: None,
            processed: BoundedSet::new(processed_capacity),
            own_outputs: BoundedSet::new(own_output_capacity),
        }
    }

    pub fn last_key(&self) -> Option<&MessageKey> {
        self.last_key.as_ref()
    }

    pub fn is_last(&self, key: &MessageKey) -> bool {
        self.last_key.as_ref() == Some(key)
    }

    pub fn is_processed(&self, key: &MessageKey) -> bool {
        self.processed.contains(key)
    }

    pub fn is_own_output(&self, text: &str) -> bool {
        self.own_outputs.contains(text)
    }

    pub fn processed(&self) -> &BoundedSet<MessageKey> {
        &self.processed
    }

    pub fn own_outputs(&self) -> &BoundedSet<String> {
        &self.own_outputs
    }

    /// Mark an entry as handled without having posted anything.
    pub fn record_seen(&mut self, key: MessageKey) {
        self.processed.insert(key.clone());
        self.last_key = Some(key);
    }

    /// A reply went out in full: remember the whole text and every segment
    /// as our own, and the entry as handled.
    pub fn record_reply(&mut self, key: MessageKey, reply: &str, sent: &[String]) {
        self.remember_own(reply);
        for segment in sent {
            self.remember_own(segment);
        }
        self.record_seen(key);
    }

    /// Delivery broke off: the segments that did reach the feed are still
    /// ours, and the entry is not retried.
    pub fn record_partial(&mut self, key: MessageKey, sent: &[String]) {
        for segment in sent {
            self.remember_own(segment);
        }
        self.record_seen(key);
    }

    fn remember_own(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.own_outputs.insert(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> MessageKey {
        MessageKey(s.to_string())
    }

    #[test]
    fn bounded_set_keeps_newest() {
        let mut set = BoundedSet::new(3);
        for i in 0..5 {
            set.insert(i);
        }
        assert_eq!(set.len(), 3);
        assert!(!set.contains(&0));
        assert!(!set.contains(&1));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn reinsert_refreshes_recency() {
        let mut set = BoundedSet::new(3);
        set.insert("a");
        set.insert("b");
        set.insert("c");
        set.insert("a");
        set.insert("d");
        assert!(set.contains(&"a"));
        assert!(!set.contains(&"b"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut set = BoundedSet::new(0);
        set.insert(1);
        assert_eq!(set.capacity(), 1);
        assert!(set.contains(&1));
    }

    #[test]
    fn record_reply_is_one_mutation() {
        let mut state = LoopState::new(50, 100);
        let segments = vec!["你好！".to_string(), "最近怎么样？".to_string()];
        state.record_reply(key("你好"), "你好！最近怎么样？", &segments);

        assert!(state.is_last(&key("你好")));
        assert!(state.is_processed(&key("你好")));
        assert!(state.is_own_output("你好！最近怎么样？"));
        assert!(state.is_own_output("你好！"));
        assert!(state.is_own_output("最近怎么样？"));
    }

    #[test]
    fn partial_delivery_records_only_sent() {
        let mut state = LoopState::new(50, 100);
        state.record_partial(key("hi"), &["Hey there,".to_string()]);
        assert!(state.is_own_output("Hey there,"));
        assert!(!state.is_own_output("Hey there, how are you?"));
        assert!(state.is_processed(&key("hi")));
    }

    #[test]
    fn sets_stay_bounded() {
        let mut state = LoopState::new(5, 8);
        for i in 0..40 {
            let seg = vec![format!("seg-{i}-a"), format!("seg-{i}-b")];
            state.record_reply(key(&format!("m{i}")), &format!("reply {i}"), &seg);
            assert!(state.processed().len() <= 5);
            assert!(state.own_outputs().len() <= 8);
        }
        assert!(state.is_processed(&key("m39")));
        assert!(!state.is_processed(&key("m0")));
    }
}
