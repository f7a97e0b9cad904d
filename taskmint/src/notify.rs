//! User-facing notices.
//!
//! Components report outcomes the user should see (a failed poll, a
//! network switch, a reverted toggle) as [`Notice`] values on a bounded
//! channel. Delivery is best-effort: if the UI is not draining the
//! channel, notices are dropped rather than blocking the sender.

use std::fmt;

use tokio::sync::mpsc;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something succeeded.
    Success,
    /// Recoverable problem or required user action.
    Warn,
    /// An operation failed.
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "ok"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to display.
    pub message: String,
}

/// Sending half of the notice channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Notice>>,
}

impl Notifier {
    /// Creates a notifier and the receiver the UI should drain.
    ///
    /// The channel holds at least one notice.
    #[must_use]
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Notice>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier that discards everything.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emits a notice, dropping it if the channel is full or closed.
    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(Notice {
                level,
                message: message.into(),
            });
        }
    }

    /// Shorthand for [`NoticeLevel::Info`].
    pub fn info(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Info, message);
    }

    /// Shorthand for [`NoticeLevel::Success`].
    pub fn success(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Success, message);
    }

    /// Shorthand for [`NoticeLevel::Warn`].
    pub fn warn(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Warn, message);
    }

    /// Shorthand for [`NoticeLevel::Error`].
    pub fn error(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Error, message);
    }
}
