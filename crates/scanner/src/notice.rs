//! Transient user-facing messages (toasts).
//!
//! The scanner never blocks on the user; it publishes a [`Notice`] and the
//! front end shows it for [`NOTICE_DURATION`]. Notices are broadcast via a
//! [`tokio::sync::broadcast`] channel; call [`Notifier::subscribe`] to
//! receive them.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

/// How long a notice stays on screen.
pub const NOTICE_DURATION: Duration = Duration::from_millis(3_000);

/// Broadcast channel capacity for notices.
const NOTICE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    /// Input the user can correct (duplicate scan, missing reason).
    Warning,
    /// A remote call or local persistence failed.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub duration: Duration,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            duration: NOTICE_DURATION,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

/// Sending half of the notice channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Publish a notice. Having no subscriber is fine.
    pub fn publish(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }
}

/// Take every notice already queued on `rx` without waiting.
///
/// When the receiver fell behind, the oldest notices are gone; the rest
/// are still returned.
pub fn drain_notices(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(notice) => notices.push(notice),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Notice receiver lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    notices
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
