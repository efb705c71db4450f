use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::warn;

use crate::classify::{Notification, NotificationKind};
use crate::config::NotificationConfig;

const APP_NAME: &str = "ChAI";

#[derive(Debug, Clone)]
pub struct Toast {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    expires_at: Instant,
}

/// Transient notifications shown at the bottom of the window.
#[derive(Debug)]
pub struct Toasts {
    items: Vec<Toast>,
    next_id: u64,
    duration: Duration,
    desktop: bool,
}

impl Toasts {
    pub fn new(config: &NotificationConfig) -> Self {
        Toasts {
            items: Vec::new(),
            next_id: 0,
            duration: Duration::from_millis(config.duration_ms),
            desktop: config.desktop,
        }
    }

    pub fn push(&mut self, notification: Notification, now: Instant) -> u64 {
        if self.desktop {
            let copy = notification.clone();
            let timeout = self.duration;
            std::thread::spawn(move || {
                if let Err(e) = show_desktop(&copy, timeout) {
                    warn!("Failed to show desktop notification: {}", e);
                }
            });
        }

        self.next_id += 1;
        self.items.push(Toast {
            id: self.next_id,
            kind: notification.kind,
            message: notification.message,
            expires_at: now + self.duration,
        });
        self.next_id
    }

    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|toast| toast.id != id);
    }

    pub fn expire(&mut self, now: Instant) {
        self.items.retain(|toast| toast.expires_at > now);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }
}

fn show_desktop(notification: &Notification, timeout: Duration) -> Result<()> {
    notify_rust::Notification::new()
        .appname(APP_NAME)
        .summary(APP_NAME)
        .body(&notification.message)
        .timeout(notify_rust::Timeout::Milliseconds(
            u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX),
        ))
        .show()?;
    Ok(())
}
