// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Coordinator lifecycle: start, run loop, shutdown.
//!
//! The run loop owns every drain trigger:
//! - a catch-up drain at startup when online with a non-empty queue
//! - the offline to online transition published by the monitor
//! - the periodic reconciliation tick (online and non-empty only)
//! - manual requests through [`CoordinatorHandle::request_sync`]
//!
//! A drain runs inline in the loop. Shutdown during a drain lets the entry
//! in flight finish (remote call and local removal), cuts any inter-item
//! pause short, and leaves the rest queued for the next start.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::SyncCoordinator;

impl SyncCoordinator {
    /// Spawn the run loop on the current tokio runtime.
    ///
    /// Dropping the returned handle stops the loop as well; keep it for the
    /// lifetime of the session.
    pub fn start(self: &Arc<Self>) -> CoordinatorHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move {
            coordinator.run(trigger_rx, shutdown_rx).await;
        });

        CoordinatorHandle {
            trigger_tx,
            shutdown_tx: Some(shutdown_tx),
            task,
            coordinator: Arc::clone(self),
        }
    }

    #[tracing::instrument(skip_all)]
    async fn run(self: Arc<Self>, mut trigger_rx: mpsc::Receiver<()>, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut network_rx = self.monitor.subscribe();
        let mut was_online = network_rx.borrow_and_update().is_online;
        let mut ticker = self.config.periodic_interval().map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        info!(
            online = was_online,
            periodic_secs = self.config.periodic_interval_secs,
            "Sync coordinator running"
        );

        'run: {
            if was_online
                && !self.queue.is_empty().await
                && self.drain_until_shutdown("startup", &mut shutdown_rx).await
            {
                break 'run;
            }

            loop {
                let reason = tokio::select! {
                    biased;

                    _ = &mut shutdown_rx => break 'run,

                    Some(()) = trigger_rx.recv() => "manual",

                    changed = network_rx.changed() => {
                        if changed.is_err() {
                            warn!("Network monitor dropped, stopping");
                            break 'run;
                        }
                        let online = network_rx.borrow_and_update().is_online;
                        let reconnected = online && !was_online;
                        was_online = online;
                        if !reconnected {
                            continue;
                        }
                        "reconnected"
                    }

                    _ = next_tick(&mut ticker) => {
                        if !self.monitor.is_online() || self.queue.is_empty().await {
                            continue;
                        }
                        "periodic"
                    }
                };

                if self.drain_until_shutdown(reason, &mut shutdown_rx).await {
                    break 'run;
                }
            }
        }

        self.monitor.shutdown();
        info!("Sync coordinator stopped");
    }

    /// Run one drain, stopping it between entries if shutdown arrives.
    /// Returns `true` on shutdown.
    async fn drain_until_shutdown(&self, reason: &'static str, shutdown_rx: &mut oneshot::Receiver<()>) -> bool {
        if !matches!(shutdown_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
            return true;
        }

        debug!(reason, "Drain triggered");
        let drain = self.sync_now();
        tokio::pin!(drain);

        tokio::select! {
            outcome = &mut drain => {
                debug!(reason, ?outcome, "Drain returned");
                false
            }
            _ = shutdown_rx => {
                info!(reason, "Shutdown during drain, finishing the result in flight");
                self.stopping.send_replace(true);
                let outcome = drain.await;
                self.stopping.send_replace(false);
                debug!(reason, ?outcome, "Drain stopped for shutdown");
                true
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Handle to a running coordinator loop.
pub struct CoordinatorHandle {
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    coordinator: Arc<SyncCoordinator>,
}

impl CoordinatorHandle {
    /// Ask the loop for a drain.
    ///
    /// Returns `false` when a request is already pending (the two coalesce)
    /// or the loop has stopped.
    pub fn request_sync(&self) -> bool {
        self.trigger_tx.try_send(()).is_ok()
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "Sync coordinator task ended abnormally");
        }
    }
}
