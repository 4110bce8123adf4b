// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic mission-sync usage example.
//!
//! Demonstrates:
//! 1. Starting a coordinator with a SQLite-backed queue while offline
//! 2. Finishing missions offline (persisted, not sent)
//! 3. Reconnecting, which drains the queue automatically
//! 4. Inspecting the remote records, the last report and metrics
//! 5. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=mission_sync=debug cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use mission_sync::{
    BroadcastNotifier, InMemoryMissionStore, Notifier, SyncConfig, SyncCoordinator, SyncNotification,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Prints notifications the way a UI toast would show them.
struct ToastNotifier {
    fanout: BroadcastNotifier,
}

impl Notifier for ToastNotifier {
    fn notify(&self, event: SyncNotification) {
        println!("   🔔 {}", event);
        self.fanout.notify(event);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mission_sync=info")))
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           mission-sync: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and start offline
    // ─────────────────────────────────────────────────────────────────────────
    let dir = std::env::temp_dir().join("mission_sync_demo");
    std::fs::create_dir_all(&dir)?;
    let config = SyncConfig {
        db_path: Some(dir.join("queue.db").to_string_lossy().into_owned()),
        inter_item_delay_ms: 200,
        ..Default::default()
    };

    let remote = Arc::new(InMemoryMissionStore::new());
    let notifier = Arc::new(ToastNotifier {
        fanout: BroadcastNotifier::new(16),
    });
    let mut toasts = notifier.fanout.subscribe();

    println!("📦 Starting coordinator (offline)...");
    let coordinator = SyncCoordinator::init(config, remote.clone(), notifier, false).await?;
    let handle = coordinator.start();

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Finish missions while offline
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Completing missions offline...");
    coordinator
        .enqueue_pending_result("fractions-1", 28, 30, 420, Some(json!([{"q": 1, "correct": true}])))
        .await?;
    coordinator.enqueue_pending_result("fractions-2", 17, 20, 900, None).await?;
    coordinator.enqueue_pending_result("decimals-1", 5, 10, 300, None).await?;
    println!("   Queued: {}", coordinator.queue().len().await);

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Connectivity comes back
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📶 Connectivity restored...");
    coordinator.handle_connectivity(true);

    while let Ok(event) = tokio::time::timeout(Duration::from_secs(5), toasts.recv()).await {
        if matches!(event, Ok(SyncNotification::SyncFinished { .. })) {
            break;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Inspect results
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n☁️  Remote records:");
    for id in ["fractions-1", "fractions-2", "decimals-1"] {
        if let Some(record) = remote.get(id) {
            println!(
                "   {:<12} {}/{} correct, {}⭐ at {}",
                id, record.correct_answers, record.completed_questions, record.stars_earned, record.completed_at
            );
        }
    }

    if let Some(report) = coordinator.last_report() {
        println!(
            "\n📊 Last drain: {} total, {} synced, {} failed, {} expired in {:?}",
            report.total, report.succeeded, report.failed, report.expired, report.duration
        );
    }

    println!("\n📈 Metrics:");
    let mut lines: Vec<_> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let (_, key) = composite_key.into_parts();
            let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
            let rendered = match value {
                DebugValue::Counter(v) => v.to_string(),
                DebugValue::Gauge(v) => format!("{:.0}", v.into_inner()),
                DebugValue::Histogram(samples) => format!("{} samples", samples.len()),
            };
            (format!("{}{{{}}}", key.name(), labels.join(",")), rendered)
        })
        .collect();
    lines.sort();
    for (name, value) in lines {
        println!("   {:<60} {}", name, value);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Shutting down...");
    handle.shutdown().await;
    println!("   Done.\n");

    Ok(())
}
