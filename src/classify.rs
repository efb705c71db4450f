use tracing::warn;

use crate::client::FailureReason;

pub const RATE_LIMITED: &str = "Rate limit exceeded. Please try again later.";
pub const NOT_CONFIGURED: &str = "Backend URL is not configured.";
pub const FALLBACK: &str = "Something went wrong, please retry";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Error,
}

/// A transient, user-facing message about a failed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Notification {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    /// Emit `FALLBACK` instead of staying silent on failures without a message.
    pub report_unclassified: bool,
}

impl Classifier {
    pub fn new(report_unclassified: bool) -> Self {
        Classifier { report_unclassified }
    }

    /// At most one notification per failure. 429 wins over any body.
    pub fn classify(&self, failure: &FailureReason) -> Option<Notification> {
        match failure {
            FailureReason::Status { status: 429, .. } => Some(Notification::error(RATE_LIMITED)),
            FailureReason::Status {
                detail: Some(detail),
                ..
            } => Some(Notification::error(detail.clone())),
            FailureReason::NotConfigured => Some(Notification::error(NOT_CONFIGURED)),
            other => {
                warn!(failure = %other, status = ?other.status(), "unclassified submission failure");
                self.report_unclassified
                    .then(|| Notification::error(FALLBACK))
            }
        }
    }
}
