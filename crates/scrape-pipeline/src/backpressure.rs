use std::sync::Arc;
use std::time::Duration;

use scrape_headless::BrowserPool;
use scrape_queue::{PauseReason, Queue};
use sysinfo::System;
use tracing::warn;

const CPU_TICK: Duration = Duration::from_secs(5);
const MEMORY_TICK: Duration = Duration::from_secs(30);
const CPU_PAUSE_THRESHOLD: f32 = 70.0;
const CPU_RESUME_THRESHOLD: f32 = 40.0;
const MEMORY_WARN_THRESHOLD_MB: u64 = 500;
/// Once a CPU-driven pause fires it holds for at least this long before
/// the resume check is allowed to clear it, avoiding rapid pause/resume
/// flapping around the threshold.
const CPU_PAUSE_MIN_HOLD: Duration = Duration::from_secs(15);

/// Samples global CPU load every 5s; pauses the queue past 70% and
/// resumes it below 40%. Branches on `Queue::pause_reason` — the actual
/// value stored in Redis — rather than this loop's own `paused_since`, so
/// a manual pause set from elsewhere is never cleared or overwritten by a
/// CPU reading on either side of the threshold. `sysinfo` needs two
/// refreshes apart in time to produce a meaningful delta, so the first
/// tick's reading is treated as zero load.
pub async fn run_cpu_loop(queue: Arc<Queue>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut system = System::new();
    let mut first_tick = true;
    let mut paused_since: Option<tokio::time::Instant> = None;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(CPU_TICK) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        system.refresh_cpu_usage();
        let load = if first_tick {
            first_tick = false;
            0.0
        } else {
            system.global_cpu_usage()
        };

        let reason = match queue.pause_reason().await {
            Ok(reason) => reason,
            Err(err) => {
                warn!(error = %err, "failed to read pause state");
                continue;
            }
        };

        match reason {
            // A manual pause is never ours to touch, regardless of load.
            Some(PauseReason::Manual) => {}
            Some(PauseReason::Cpu) => {
                if load < CPU_RESUME_THRESHOLD {
                    let held_long_enough = paused_since
                        .map(|since| since.elapsed() >= CPU_PAUSE_MIN_HOLD)
                        .unwrap_or(true);
                    if held_long_enough {
                        if let Err(err) = queue.resume(PauseReason::Cpu).await {
                            warn!(error = %err, "failed to resume queue after cpu load dropped");
                        } else {
                            paused_since = None;
                        }
                    }
                }
            }
            None => {
                if load > CPU_PAUSE_THRESHOLD {
                    if let Err(err) = queue.pause(PauseReason::Cpu).await {
                        warn!(error = %err, "failed to pause queue for cpu load");
                    } else {
                        warn!(load, "pausing queue due to cpu load");
                        paused_since = Some(tokio::time::Instant::now());
                    }
                }
            }
        }
    }
}

/// Warns and issues a GC hint when resident memory exceeds 500MB. Runs
/// independently of the queue's pause state. The GC hint itself is
/// delegated to the browser pool's idle workers — this process has no
/// heap of its own to collect beyond what the headless browsers hold.
pub async fn run_memory_loop(
    browsers: Arc<BrowserPool>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut system = System::new();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(MEMORY_TICK) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        system.refresh_memory();
        let used_mb = system.used_memory() / 1024 / 1024;
        if used_mb > MEMORY_WARN_THRESHOLD_MB {
            warn!(used_mb, threshold_mb = MEMORY_WARN_THRESHOLD_MB, "pipeline memory above threshold");
            browsers.issue_gc_hint_to_idle_workers().await;
        }
    }
}
