//! A thread-safe, append-only log of per-query status and error messages.
//!
//! Grounded on `MessageStore`: one instance lives for the lifetime of a
//! single user query, collecting progress and error events from both the
//! dispatcher and the result merger so that a failed query can still report
//! a complete, time-ordered picture to the user.

use metric::U64Counter;
use parking_lot::Mutex;

/// How serious a [`Message`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
    Unknown,
}

/// One event recorded against a chunk (or `-1` for query-wide events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub chunk_id: i32,
    pub code: i32,
    pub description: String,
    /// Monotonically increasing sequence number, standing in for a
    /// wall-clock timestamp: what matters to callers is relative order,
    /// not absolute time.
    pub sequence: u64,
    pub severity: Severity,
}

/// Append-only, query-scoped message log. Writes are serialized by an
/// internal mutex; reads snapshot indices without holding it across the
/// call.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Mutex<Vec<Message>>,
    errors_recorded: U64Counter,
}

impl MessageStore {
    /// An empty store.
    pub fn new() -> MessageStore {
        MessageStore::default()
    }

    /// Append a message. Returns the message's index.
    pub fn add_message(
        &self,
        chunk_id: i32,
        code: i32,
        description: impl Into<String>,
        severity: Severity,
    ) -> usize {
        if severity == Severity::Error {
            self.errors_recorded.inc(1);
        }
        let mut messages = self.messages.lock();
        let sequence = messages.len() as u64;
        messages.push(Message {
            chunk_id,
            code,
            description: description.into(),
            sequence,
            severity,
        });
        messages.len() - 1
    }

    /// Total number of `Error`-severity messages ever recorded, for
    /// dashboards that track per-query error rates independent of message
    /// retention.
    pub fn errors_recorded(&self) -> u64 {
        self.errors_recorded.fetch()
    }

    /// Total number of messages recorded.
    pub fn message_count(&self) -> usize {
        self.messages.lock().len()
    }

    /// Number of messages recorded with the given `code`.
    pub fn message_count_for_code(&self, code: i32) -> usize {
        self.messages.lock().iter().filter(|m| m.code == code).count()
    }

    /// The message at `index`, if any.
    pub fn get_message(&self, index: usize) -> Option<Message> {
        self.messages.lock().get(index).cloned()
    }

    /// Whether any `Error`-severity message has been recorded.
    pub fn has_errors(&self) -> bool {
        self.messages.lock().iter().any(|m| m.severity == Severity::Error)
    }

    /// A snapshot of every message recorded so far, in insertion order.
    pub fn all(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_and_counts() {
        let store = MessageStore::new();
        store.add_message(1, 62, "provision nack", Severity::Info);
        store.add_message(1, 0, "provision ok", Severity::Info);
        store.add_message(2, 500, "mysql exec failed", Severity::Error);
        assert_eq!(store.message_count(), 3);
        assert_eq!(store.message_count_for_code(62), 1);
        assert!(store.has_errors());
        assert_eq!(store.errors_recorded(), 1);
    }

    #[test]
    fn messages_are_time_ordered_by_sequence() {
        let store = MessageStore::new();
        store.add_message(1, 1, "first", Severity::Info);
        store.add_message(1, 2, "second", Severity::Info);
        let all = store.all();
        assert!(all[0].sequence < all[1].sequence);
    }

    #[test]
    fn get_message_out_of_range_is_none() {
        let store = MessageStore::new();
        assert!(store.get_message(0).is_none());
    }

    #[test]
    fn provision_retry_records_one_info_message_per_attempt() {
        let store = MessageStore::new();
        store.add_message(7, 62, "PROVISION_NACK", Severity::Info);
        store.add_message(7, 0, "PROVISION_OK", Severity::Info);
        assert_eq!(store.message_count(), 2);
        assert!(!store.has_errors());
    }
}
