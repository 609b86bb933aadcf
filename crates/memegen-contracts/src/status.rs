use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a status message stays visible.
pub const STATUS_VISIBLE: Duration = Duration::from_millis(3000);
/// Grace period after hiding before the text is cleared, for the fade-out.
pub const STATUS_FADE: Duration = Duration::from_millis(300);

/// Sink for one-shot user-facing status messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub visible: bool,
    pub text: String,
}

#[derive(Debug, Clone)]
struct ShownMessage {
    text: String,
    shown_at: Instant,
}

/// The single status line shared by every component.
///
/// Visibility is derived from the instant of the last `show`, so a newer
/// message restarts both the hide and the clear timer.
#[derive(Debug, Default)]
pub struct StatusChannel {
    current: Mutex<Option<ShownMessage>>,
}

impl StatusChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, message: &str) {
        self.show_at(message, Instant::now());
    }

    pub fn show_at(&self, message: &str, now: Instant) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(ShownMessage {
                text: message.to_string(),
                shown_at: now,
            });
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> StatusSnapshot {
        let Ok(current) = self.current.lock() else {
            return StatusSnapshot::default();
        };
        let Some(shown) = current.as_ref() else {
            return StatusSnapshot::default();
        };
        let elapsed = now.saturating_duration_since(shown.shown_at);
        if elapsed < STATUS_VISIBLE {
            return StatusSnapshot {
                visible: true,
                text: shown.text.clone(),
            };
        }
        if elapsed < STATUS_VISIBLE + STATUS_FADE {
            return StatusSnapshot {
                visible: false,
                text: shown.text.clone(),
            };
        }
        StatusSnapshot::default()
    }

    /// Last message shown, regardless of whether it is still visible.
    pub fn last_message(&self) -> Option<String> {
        self.current
            .lock()
            .ok()
            .and_then(|current| current.as_ref().map(|shown| shown.text.clone()))
    }
}

impl Notifier for StatusChannel {
    fn notify(&self, message: &str) {
        self.show(message);
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{Notifier, StatusChannel, StatusSnapshot};

    fn at(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn message_hides_after_three_seconds_then_clears() {
        let channel = StatusChannel::new();
        let start = Instant::now();
        channel.show_at("x", start);

        assert_eq!(
            channel.snapshot_at(at(start, 2999)),
            StatusSnapshot {
                visible: true,
                text: "x".to_string()
            }
        );
        assert_eq!(
            channel.snapshot_at(at(start, 3001)),
            StatusSnapshot {
                visible: false,
                text: "x".to_string()
            }
        );
        assert_eq!(channel.snapshot_at(at(start, 3301)), StatusSnapshot::default());
    }

    #[test]
    fn newer_message_restarts_timers() {
        let channel = StatusChannel::new();
        let start = Instant::now();
        channel.show_at("first", start);
        channel.show_at("second", at(start, 2000));

        let snapshot = channel.snapshot_at(at(start, 4000));
        assert!(snapshot.visible);
        assert_eq!(snapshot.text, "second");
    }

    #[test]
    fn empty_channel_is_hidden() {
        let channel = StatusChannel::new();
        assert_eq!(channel.snapshot(), StatusSnapshot::default());
        assert_eq!(channel.last_message(), None);
    }

    #[test]
    fn notifier_shows_immediately() {
        let channel = StatusChannel::new();
        channel.notify("Saved to album!");
        assert!(channel.snapshot().visible);
        assert_eq!(channel.last_message().as_deref(), Some("Saved to album!"));
    }
}
