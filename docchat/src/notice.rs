//! Transient user-visible notices (toasts).

use tokio::sync::mpsc;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

impl NoticeLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Cloneable handle stores use to raise notices.
///
/// Sending never blocks and never fails the caller: a notice nobody listens
/// for is dropped.
#[derive(Debug, Clone)]
pub struct Notices {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notices {
    /// A handle plus the receiver the UI drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A handle that discards everything.
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Notice {
                level,
                text: text.into(),
            });
        }
    }

    pub fn success(&self, text: impl Into<String>) {
        self.notify(NoticeLevel::Success, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.notify(NoticeLevel::Error, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.notify(NoticeLevel::Info, text);
    }
}
