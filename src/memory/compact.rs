//! Mechanical compaction of the message log.
//!
//! When the log reaches the threshold, the oldest half is folded into a single
//! `Summary` and only the newer half stays in the log. The summary text comes
//! from a [`Summarizer`]; the default one truncates and joins, it does not
//! interpret content.

use super::message_log::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Characters kept from each message when building a summary
pub const SUMMARY_CONTENT_CHARS: usize = 100;

/// Delimiter between folded messages in a summary
pub const SUMMARY_DELIMITER: &str = " | ";

/// A compacted, lossy record of a contiguous run of old messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    /// How many messages were folded into this summary
    pub message_count: usize,
    #[serde(with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Produces summary text from a batch of messages.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, batch: &[Message]) -> String;
}

/// Default summarizer: `"<role>: <first N chars>"` per message, joined.
#[derive(Debug, Clone)]
pub struct TruncatingSummarizer {
    pub max_chars: usize,
    pub delimiter: String,
}

impl Default for TruncatingSummarizer {
    fn default() -> Self {
        Self {
            max_chars: SUMMARY_CONTENT_CHARS,
            delimiter: SUMMARY_DELIMITER.to_string(),
        }
    }
}

impl Summarizer for TruncatingSummarizer {
    fn summarize(&self, batch: &[Message]) -> String {
        batch
            .iter()
            .map(|m| format!("{}: {}", m.role, truncate_chars(&m.content, self.max_chars)))
            .collect::<Vec<_>>()
            .join(&self.delimiter)
    }
}

/// Fold the oldest half of `messages` into a summary if the log has reached
/// `threshold`.
///
/// Returns `None` without touching the log when below the threshold or when
/// there is nothing to fold (fewer than two messages).
pub fn compact_messages(
    messages: &mut Vec<Message>,
    threshold: usize,
    summarizer: &dyn Summarizer,
) -> Option<Summary> {
    let n = messages.len();
    if n < threshold {
        return None;
    }

    let half = n / 2;
    if half == 0 {
        return None;
    }

    let old: Vec<Message> = messages.drain(..half).collect();
    let summary = Summary {
        summary: summarizer.summarize(&old),
        message_count: half,
        timestamp: Utc::now(),
    };

    info!("Summarized {} messages ({} retained)", half, messages.len());
    Some(summary)
}

/// Prefix of `text` holding at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    let end = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}
