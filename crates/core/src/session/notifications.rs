use std::time::{Duration, Instant};

use crate::shared::constants::TOAST_DURATION;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

/// A transient message shown to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub shown_at: Instant,
}

/// Holds at most one toast. Showing a new one replaces the current toast
/// and restarts the lifetime.
#[derive(Debug)]
pub struct Notifications {
    current: Option<Toast>,
    lifetime: Duration,
}

impl Notifications {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            current: None,
            lifetime,
        }
    }

    pub fn show(&mut self, message: impl Into<String>, kind: ToastKind, now: Instant) -> &Toast {
        self.current.insert(Toast {
            message: message.into(),
            kind,
            shown_at: now,
        })
    }

    pub fn current(&self) -> Option<&Toast> {
        self.current.as_ref()
    }

    /// Clears the toast once `now >= shown_at + lifetime`. Returns whether
    /// a toast was cleared.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.time_until_expiry(now) {
            Some(remaining) if remaining.is_zero() => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    /// Time left before the current toast expires; zero when overdue.
    pub fn time_until_expiry(&self, now: Instant) -> Option<Duration> {
        let toast = self.current.as_ref()?;
        Some((toast.shown_at + self.lifetime).saturating_duration_since(now))
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(TOAST_DURATION)
    }
}
