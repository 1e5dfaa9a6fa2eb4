//! Append-only log of recent dialogue turns.

use super::compact::{compact_messages, Summarizer, Summary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single dialogue turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Free-form label such as "user", "assistant" or "system"
    pub role: String,
    pub content: String,
    #[serde(with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The active window of turns plus the compaction trigger.
#[derive(Debug, Clone)]
pub struct MessageLog {
    messages: Vec<Message>,
    threshold: usize,
}

impl MessageLog {
    pub fn new(threshold: usize) -> Self {
        Self::from_messages(Vec::new(), threshold)
    }

    pub fn from_messages(messages: Vec<Message>, threshold: usize) -> Self {
        Self {
            messages,
            threshold,
        }
    }

    /// Append a turn. Compaction runs before this returns if the log reached
    /// the threshold, and the resulting summary is handed back.
    pub fn append(
        &mut self,
        role: &str,
        content: &str,
        summarizer: &dyn Summarizer,
    ) -> Option<Summary> {
        self.messages.push(Message::new(role, content));
        if self.messages.len() >= self.threshold {
            self.compact(summarizer)
        } else {
            None
        }
    }

    /// Run compaction now. No-op below the threshold.
    pub fn compact(&mut self, summarizer: &dyn Summarizer) -> Option<Summary> {
        compact_messages(&mut self.messages, self.threshold, summarizer)
    }

    /// The last `n` messages, oldest first
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::TruncatingSummarizer;

    #[test]
    fn test_append_preserves_order() {
        let summarizer = TruncatingSummarizer::default();
        let mut log = MessageLog::new(15);
        log.append("user", "first", &summarizer);
        log.append("assistant", "second", &summarizer);

        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0].content, "first");
        assert_eq!(log.messages()[1].role, "assistant");
    }

    #[test]
    fn test_append_triggers_compaction() {
        let summarizer = TruncatingSummarizer::default();
        let mut log = MessageLog::new(4);
        assert!(log.append("user", "a", &summarizer).is_none());
        assert!(log.append("user", "b", &summarizer).is_none());
        assert!(log.append("user", "c", &summarizer).is_none());

        let summary = log.append("user", "d", &summarizer).unwrap();
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.summary, "user: a | user: b");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_length_stays_below_threshold() {
        let summarizer = TruncatingSummarizer::default();
        let mut log = MessageLog::new(15);
        for i in 0..200 {
            log.append("user", &format!("m{i}"), &summarizer);
            assert!(log.len() < 15);
        }
    }

    #[test]
    fn test_empty_content_allowed() {
        let summarizer = TruncatingSummarizer::default();
        let mut log = MessageLog::new(15);
        log.append("user", "", &summarizer);
        assert_eq!(log.messages()[0].content, "");
    }

    #[test]
    fn test_recent_window() {
        let summarizer = TruncatingSummarizer::default();
        let mut log = MessageLog::new(100);
        for i in 0..10 {
            log.append("user", &i.to_string(), &summarizer);
        }
        let recent: Vec<&str> = log.recent(3).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(recent, vec!["7", "8", "9"]);
        assert_eq!(log.recent(50).len(), 10);
    }
}
