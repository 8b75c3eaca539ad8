//! Surfacing failures to the user.
//!
//! Components never swallow persistence or viewer failures; they hand an
//! [`ErrorNotice`] to whatever [`ErrorReporter`] the host installed.

use std::fmt;

use tokio::sync::mpsc;

/// A failure worth showing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub message: String,
    pub cause: String,
}

impl ErrorNotice {
    #[must_use]
    pub fn new(message: impl Into<String>, cause: &dyn fmt::Display) -> Self {
        Self {
            message: message.into(),
            cause: cause.to_string(),
        }
    }
}

impl fmt::Display for ErrorNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.cause)
    }
}

pub trait ErrorReporter: Send + Sync {
    fn report(&self, notice: ErrorNotice);
}

/// Writes notices to the `log` facade at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, notice: ErrorNotice) {
        log::error!("{notice}");
    }
}

/// Forwards notices to a receiver owned by the host (e.g. a UI toast queue).
///
/// Notices sent after the receiver is dropped are logged instead.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<ErrorNotice>,
}

impl ChannelReporter {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ErrorNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ErrorReporter for ChannelReporter {
    fn report(&self, notice: ErrorNotice) {
        if let Err(mpsc::error::SendError(notice)) = self.tx.send(notice) {
            log::error!("{notice}");
        }
    }
}
