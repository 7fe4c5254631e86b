//! User-facing notification sink.

use std::sync::{Mutex, PoisonError};

/// Where write actions report their success or failure.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn success(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Logs notices through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(target: "client::notify", message, "success");
    }

    fn error(&self, message: &str) {
        tracing::warn!(target: "client::notify", message, "error");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Keeps notices in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages(NoticeKind::Error)
    }

    pub fn successes(&self) -> Vec<String> {
        self.messages(NoticeKind::Success)
    }

    fn messages(&self, kind: NoticeKind) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter(|n| n.kind == kind)
            .map(|n| n.message)
            .collect()
    }

    fn push(&self, kind: NoticeKind, message: &str) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notice {
                kind,
                message: message.to_string(),
            });
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.push(NoticeKind::Success, message);
    }

    fn error(&self, message: &str) {
        self.push(NoticeKind::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_keeps_order_and_kind() {
        let notifier = RecordingNotifier::new();
        notifier.success("created");
        notifier.error("declined");
        notifier.success("paid");

        assert_eq!(notifier.notices().len(), 3);
        assert_eq!(notifier.successes(), vec!["created", "paid"]);
        assert_eq!(notifier.errors(), vec!["declined"]);
    }
}
