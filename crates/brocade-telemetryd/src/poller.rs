//! Fixed-interval poll loop
//!
//! One cycle: fetch a snapshot, run the collector, refresh the gauges. The
//! loop sleeps out whatever is left of the interval. An overrun is logged and
//! the next cycle starts immediately; missed cycles are never caught up.

use crate::client::TelemetrySource;
use crate::collector::{Collector, CycleReport};
use crate::error::Result;
use crate::gauges::Gauges;
use crate::systemd::SystemdNotifier;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Drives a [`Collector`] from a [`TelemetrySource`]
pub struct Poller<S> {
    source: S,
    collector: Collector,
    gauges: Arc<Gauges>,
    interval: Duration,
    notifier: SystemdNotifier,
}

impl<S: TelemetrySource> Poller<S> {
    pub fn new(source: S, collector: Collector, gauges: Arc<Gauges>, interval: Duration) -> Self {
        Self {
            source,
            collector,
            gauges,
            interval,
            notifier: SystemdNotifier::disabled(),
        }
    }

    /// Report readiness and per-cycle keepalives to systemd
    pub fn with_notifier(mut self, notifier: SystemdNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    /// Fetch and process one snapshot
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let snapshot = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.gauges.record_fetch_failure();
                return Err(e);
            }
        };
        let report = self.collector.process(&snapshot);
        self.gauges.update(&self.collector);
        self.gauges.record_cycle(&report);
        Ok(report)
    }

    /// Poll until `shutdown` turns true
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(interval_secs = self.interval.as_secs(), "poll loop started");
        if let Err(e) = self.notifier.notify_ready() {
            warn!(error = %e, "systemd notification failed");
        }

        while !*shutdown.borrow() {
            let started = Instant::now();
            match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        cycle = report.cycle,
                        changes = report.changes,
                        failed_requests = report.failed_requests,
                        switches = report.switches,
                        "cycle complete"
                    );
                    if let Err(e) = self.notifier.notify_cycle(&report) {
                        warn!(error = %e, "systemd notification failed");
                    }
                }
                Err(e) => error!(error = %e, "cycle failed"),
            }

            let elapsed = started.elapsed();
            self.gauges.observe_cycle_duration(elapsed);

            match self.interval.checked_sub(elapsed).filter(|r| !r.is_zero()) {
                Some(remaining) => {
                    let sleep = tokio::time::sleep(remaining);
                    tokio::pin!(sleep);
                    tokio::select! {
                        _ = &mut sleep => {}
                        changed = shutdown.changed() => {
                            // sender gone: nobody can stop us early any more
                            if changed.is_err() {
                                sleep.await;
                            }
                        }
                    }
                }
                None => {
                    self.gauges.record_overrun();
                    warn!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        interval_ms = self.interval.as_millis() as u64,
                        "cycle overran the poll interval"
                    );
                }
            }
        }

        info!(cycles = self.collector.cycles(), "poll loop stopped");
        Ok(())
    }
}

/// Shutdown channel flipped to true on ctrl-c
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received SIGINT, stopping after the current cycle");
            let _ = tx.send(true);
        }
    });
    rx
}
