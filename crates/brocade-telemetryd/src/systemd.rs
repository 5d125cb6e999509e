//! systemd service notifications
//!
//! READY once the poll loop is about to start, WATCHDOG plus a STATUS line
//! after every cycle. A no-op unless `NOTIFY_SOCKET` is set (Type=notify).

use crate::collector::CycleReport;
use crate::error::{Result, TelemetryError};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct SystemdNotifier {
    enabled: bool,
}

impl SystemdNotifier {
    /// Enabled when running under systemd with a notify socket
    pub fn new() -> Self {
        let enabled = std::env::var_os("NOTIFY_SOCKET").is_some();
        if enabled {
            debug!("systemd notification socket detected");
        }
        Self { enabled }
    }

    /// Notifier that never talks to systemd
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn notify_ready(&self) -> Result<()> {
        self.send(&[sd_notify::NotifyState::Ready], "READY")
    }

    /// Keepalive plus a one-line cycle summary for `systemctl status`
    pub fn notify_cycle(&self, report: &CycleReport) -> Result<()> {
        let status = cycle_status(report);
        self.send(
            &[
                sd_notify::NotifyState::Watchdog,
                sd_notify::NotifyState::Status(&status),
            ],
            "WATCHDOG",
        )
    }

    fn send(&self, states: &[sd_notify::NotifyState<'_>], what: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        sd_notify::notify(false, states).map_err(|e| {
            TelemetryError::Other(format!("Failed to send {} notification: {}", what, e))
        })
    }
}

impl Default for SystemdNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn cycle_status(report: &CycleReport) -> String {
    format!(
        "cycle {}: {} switches, {} changes, {} failed requests",
        report.cycle, report.switches, report.changes, report.failed_requests
    )
}
