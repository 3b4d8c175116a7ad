use std::collections::VecDeque;

use super::Message;

/// Bounded conversation buffer. Oldest messages are evicted first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: VecDeque<Message>,
    cap: usize,
}

impl ConversationHistory {
    /// Three user/assistant exchanges.
    pub const DEFAULT_CAP: usize = 6;

    pub fn new(cap: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(cap + 1),
            cap,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Append `message`, then [`truncate`](Self::truncate).
    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        self.truncate();
    }

    /// Keep only the last `cap` messages.
    pub fn truncate(&mut self) {
        while self.messages.len() > self.cap {
            self.messages.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAP)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn never_exceeds_cap() {
        let mut history = ConversationHistory::default();
        for i in 0..25 {
            history.push(Message::user(format!("m{i}")));
            assert!(history.len() <= 6);
        }
        assert_eq!(history.len(), 6);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut history = ConversationHistory::new(3);
        for i in 0..5 {
            history.push(Message::user(format!("m{i}")));
        }
        let contents: Vec<_> = history.snapshot().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, ["m2", "m3", "m4"]);
    }

    #[test]
    fn clear_empties_and_is_repeatable() {
        let mut history = ConversationHistory::default();
        history.push(Message::user("a"));
        history.push(Message::assistant("b"));
        history.clear();
        assert!(history.snapshot().is_empty());
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn zero_cap_keeps_nothing() {
        let mut history = ConversationHistory::new(0);
        history.push(Message::user("dropped"));
        assert!(history.is_empty());
    }
}
