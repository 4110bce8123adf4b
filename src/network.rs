// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Connectivity observer.
//!
//! [`NetworkStatusMonitor`] turns the platform's online/offline signal into a
//! debounced [`NetworkState`] that the coordinator watches. It does no I/O of
//! its own: the host feeds it with [`NetworkStatusMonitor::handle_connectivity`]
//! whenever the platform reports a change (or on every poll; repeats are
//! harmless).
//!
//! ```text
//!            offline signal (notify once per period)
//!   Online ─────────────────────────────────────────▶ Offline
//!     ▲                                                  │
//!     └──────────────────────────────────────────────────┘
//!      online signal: recently_recovered = true for 5 s
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notify::{Notifier, SyncNotification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkState {
    pub is_online: bool,
    /// True for the recovery window right after coming back online.
    pub recently_recovered: bool,
}

/// What a connectivity signal did to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOnline,
    WentOffline,
    Unchanged,
}

pub struct NetworkStatusMonitor {
    state: Arc<watch::Sender<NetworkState>>,
    /// Set once "went offline" has been sent for the current offline period.
    offline_notified: AtomicBool,
    /// Bumped on every transition so a stale recovery timer cannot clear a
    /// newer recovery.
    recovery_epoch: Arc<AtomicU64>,
    recovery_timer: Mutex<Option<JoinHandle<()>>>,
    recovery_window: Duration,
    notifier: Arc<dyn Notifier>,
}

impl NetworkStatusMonitor {
    /// Create a monitor from the platform's connectivity at startup.
    ///
    /// Starting offline counts as entering the offline state and sends the
    /// offline notification.
    pub fn new(initially_online: bool, recovery_window: Duration, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(NetworkState {
            is_online: initially_online,
            recently_recovered: false,
        });

        let monitor = Self {
            state: Arc::new(state),
            offline_notified: AtomicBool::new(false),
            recovery_epoch: Arc::new(AtomicU64::new(0)),
            recovery_timer: Mutex::new(None),
            recovery_window,
            notifier,
        };

        crate::metrics::set_online(initially_online);
        if !initially_online {
            monitor.notify_offline_once();
        }
        monitor
    }

    /// Feed a platform connectivity reading.
    ///
    /// Must be called from within a tokio runtime: coming back online arms
    /// the recovery timer.
    pub fn handle_connectivity(&self, online: bool) -> Transition {
        // Decide and publish under the watch lock so racing readings see
        // exactly one transition
        let mut transition = Transition::Unchanged;
        let mut epoch = 0;
        self.state.send_if_modified(|s| {
            if s.is_online == online {
                return false;
            }
            epoch = self.recovery_epoch.fetch_add(1, Ordering::AcqRel) + 1;
            if online {
                self.offline_notified.store(false, Ordering::Release);
                transition = Transition::WentOnline;
            } else {
                transition = Transition::WentOffline;
            }
            *s = NetworkState {
                is_online: online,
                recently_recovered: online,
            };
            true
        });

        match transition {
            Transition::WentOnline => {
                self.arm_recovery_timer(epoch);

                info!("Connectivity restored");
                crate::metrics::set_online(true);
                crate::metrics::record_connectivity_transition("online");
                self.notifier.notify(SyncNotification::BackOnline);
            }
            Transition::WentOffline => {
                self.cancel_recovery_timer();

                warn!("Connectivity lost");
                crate::metrics::set_online(false);
                crate::metrics::record_connectivity_transition("offline");
                self.notify_offline_once();
            }
            Transition::Unchanged if !online => {
                // Still offline: the latch keeps this from re-notifying
                self.notify_offline_once();
            }
            Transition::Unchanged => {}
        }
        transition
    }

    #[must_use]
    pub fn state(&self) -> NetworkState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.state.borrow().is_online
    }

    #[must_use]
    pub fn recently_recovered(&self) -> bool {
        self.state.borrow().recently_recovered
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state.subscribe()
    }

    /// Stop the pending recovery timer, if any.
    pub fn shutdown(&self) {
        self.cancel_recovery_timer();
    }

    fn notify_offline_once(&self) {
        if !self.offline_notified.swap(true, Ordering::AcqRel) {
            self.notifier.notify(SyncNotification::WentOffline);
        } else {
            debug!("Still offline, notification already sent");
        }
    }

    /// Clear `recently_recovered` after the window unless another
    /// transition moved the epoch past `epoch`.
    fn arm_recovery_timer(&self, epoch: u64) {
        let epoch_now = self.recovery_epoch.clone();
        let state = self.state.clone();
        let window = self.recovery_window;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            state.send_if_modified(|s| {
                if epoch_now.load(Ordering::Acquire) == epoch && s.recently_recovered {
                    s.recently_recovered = false;
                    true
                } else {
                    false
                }
            });
        });

        if let Some(previous) = self.recovery_timer.lock().replace(handle) {
            previous.abort();
        }
    }

    fn cancel_recovery_timer(&self) {
        if let Some(handle) = self.recovery_timer.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for NetworkStatusMonitor {
    fn drop(&mut self) {
        self.cancel_recovery_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;

    fn monitor(online: bool) -> (Arc<RecordingNotifier>, NetworkStatusMonitor) {
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = NetworkStatusMonitor::new(online, Duration::from_secs(5), notifier.clone());
        (notifier, monitor)
    }

    #[tokio::test]
    async fn test_initial_state_online() {
        let (notifier, monitor) = monitor(true);
        assert!(monitor.is_online());
        assert!(!monitor.recently_recovered());
        assert!(notifier.events().is_empty());
    }

    #[tokio::test]
    async fn test_starting_offline_notifies_once() {
        let (notifier, monitor) = monitor(false);
        monitor.handle_connectivity(false);
        monitor.handle_connectivity(false);

        assert_eq!(notifier.count(&SyncNotification::WentOffline), 1);
    }

    #[tokio::test]
    async fn test_offline_latch_resets_after_recovery() {
        let (notifier, monitor) = monitor(true);

        assert_eq!(monitor.handle_connectivity(false), Transition::WentOffline);
        assert_eq!(monitor.handle_connectivity(false), Transition::Unchanged);
        assert_eq!(monitor.handle_connectivity(true), Transition::WentOnline);
        assert_eq!(monitor.handle_connectivity(false), Transition::WentOffline);

        assert_eq!(notifier.count(&SyncNotification::WentOffline), 2);
        assert_eq!(notifier.count(&SyncNotification::BackOnline), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recently_recovered_clears_after_window() {
        let (_notifier, monitor) = monitor(false);

        monitor.handle_connectivity(true);
        assert!(monitor.recently_recovered());

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(monitor.recently_recovered());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!monitor.recently_recovered());
        assert!(monitor.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flap_rearms_recovery_window() {
        let (_notifier, monitor) = monitor(false);

        monitor.handle_connectivity(true);
        tokio::time::sleep(Duration::from_secs(3)).await;
        monitor.handle_connectivity(false);
        assert!(!monitor.recently_recovered());
        monitor.handle_connectivity(true);

        // First timer would have fired at t=5s; the re-armed one fires at t=8s
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(monitor.recently_recovered());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!monitor.recently_recovered());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let (_notifier, monitor) = monitor(true);
        let mut rx = monitor.subscribe();

        monitor.handle_connectivity(false);
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_online);
    }

    #[tokio::test]
    async fn test_repeated_online_is_unchanged() {
        let (notifier, monitor) = monitor(true);
        assert_eq!(monitor.handle_connectivity(true), Transition::Unchanged);
        assert!(notifier.events().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readings_transition_once() {
        let (notifier, monitor) = monitor(false);
        let monitor = Arc::new(monitor);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let monitor = monitor.clone();
                tokio::spawn(async move { monitor.handle_connectivity(true) })
            })
            .collect();

        let mut went_online = 0;
        for task in tasks {
            if task.await.unwrap() == Transition::WentOnline {
                went_online += 1;
            }
        }

        assert_eq!(went_online, 1);
        assert_eq!(notifier.count(&SyncNotification::BackOnline), 1);
        assert!(monitor.is_online());
        assert!(monitor.recently_recovered());
    }
}
