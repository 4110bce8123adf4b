// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! User-facing sync notifications.
//!
//! The engine reports progress through a [`Notifier`] and never waits on or
//! inspects the result. Hosts typically bridge a [`BroadcastNotifier`] into
//! their toast system.

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotification {
    /// Connectivity lost. Sent once per offline period.
    WentOffline,
    /// Connectivity regained.
    BackOnline,
    /// A drain is starting with `count` queued results.
    SyncStarted { count: usize },
    /// A drain finished.
    SyncFinished { succeeded: usize, failed: usize },
}

impl std::fmt::Display for SyncNotification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WentOffline => write!(f, "You're offline. Results will be saved and synced later."),
            Self::BackOnline => write!(f, "Back online."),
            Self::SyncStarted { count } => write!(f, "Syncing {} saved result(s)...", count),
            Self::SyncFinished { succeeded, failed: 0 } => {
                write!(f, "Synced {} result(s).", succeeded)
            }
            Self::SyncFinished { succeeded, failed } => {
                write!(f, "Synced {} result(s), {} will retry later.", succeeded, failed)
            }
        }
    }
}

/// Fire-and-forget sink for [`SyncNotification`]s.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: SyncNotification);
}

/// Logs notifications. Default when the host provides none.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: SyncNotification) {
        info!(event = ?event, "{}", event);
    }
}

/// Fans notifications out to any number of UI subscribers.
///
/// Sending with no subscribers is not an error; the event is dropped.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<SyncNotification>,
}

impl BroadcastNotifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: SyncNotification) {
        let _ = self.tx.send(event);
    }
}

/// Keeps every notification in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<SyncNotification>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<SyncNotification> {
        self.events.lock().clone()
    }

    /// Number of recorded events equal to `event`.
    #[must_use]
    pub fn count(&self, event: &SyncNotification) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: SyncNotification) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            SyncNotification::SyncStarted { count: 3 }.to_string(),
            "Syncing 3 saved result(s)..."
        );
        assert_eq!(
            SyncNotification::SyncFinished { succeeded: 2, failed: 0 }.to_string(),
            "Synced 2 result(s)."
        );
        assert_eq!(
            SyncNotification::SyncFinished { succeeded: 2, failed: 1 }.to_string(),
            "Synced 2 result(s), 1 will retry later."
        );
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscriber() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();

        notifier.notify(SyncNotification::WentOffline);

        assert_eq!(rx.recv().await.unwrap(), SyncNotification::WentOffline);
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::new(8);
        notifier.notify(SyncNotification::BackOnline);
    }

    #[test]
    fn test_recording_notifier_counts() {
        let notifier = RecordingNotifier::new();
        notifier.notify(SyncNotification::WentOffline);
        notifier.notify(SyncNotification::BackOnline);
        notifier.notify(SyncNotification::WentOffline);

        assert_eq!(notifier.count(&SyncNotification::WentOffline), 2);
        assert_eq!(notifier.events().len(), 3);

        notifier.clear();
        assert!(notifier.events().is_empty());
    }
}
