//! Operator-facing reporting: heartbeats and corruption alerts.

use std::time::Duration;

use colored::Colorize;

use crate::scan::CorruptionEvent;
use crate::util::size::format_bytes;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

/// Turns scan findings into terminal lines and tracing events.
///
/// The reporter never stops the detector: a corruption event is the product
/// the detector exists to deliver, not a failure of the detector itself.
pub struct Reporter {
    /// Emit a heartbeat every this many clean cycles (0 disables).
    heartbeat_every: u64,
    region_len: usize,
    base_addr: usize,
}

impl Reporter {
    pub fn new(heartbeat_every: u64, region_len: usize, base_addr: usize) -> Self {
        Self {
            heartbeat_every,
            region_len,
            base_addr,
        }
    }

    /// Record a clean cycle, printing a heartbeat at the configured cadence.
    pub fn clean_cycle(&self, cycle: u64) {
        tracing::debug!(cycle, "scan cycle clean");
        if self.heartbeat_due(cycle) {
            println!(
                "{} region of {} clean as of {} (cycle {})",
                "ok".green().bold(),
                format_bytes(self.region_len),
                chrono::Utc::now().format(TIMESTAMP_FORMAT),
                cycle,
            );
        }
    }

    /// Emit the permanent record for a detected corruption.
    ///
    /// Re-detections of the same byte on later cycles come through here again
    /// on purpose: every cycle is evidence of the region's state at that
    /// time, and a stuck bit is itself signal.
    pub fn corruption(&self, event: &CorruptionEvent) {
        println!(
            "{} bit corruption at byte offset {} (cell {}, address 0x{:x}): observed 0x{:02x}, expected 0x{:02x} at {}",
            "ALERT".red().bold(),
            event.offset,
            event.cell(),
            self.base_addr + event.offset,
            event.observed,
            event.expected,
            event.at.format(TIMESTAMP_FORMAT),
        );
        tracing::warn!(
            offset = event.offset,
            observed = event.observed,
            "bit corruption detected"
        );
    }

    /// One-time warning when a pass cannot keep up with its schedule.
    pub fn pace_warning(&self, pass: Duration, interval: Duration) {
        println!(
            "{} scan pass took {:.1?}, longer than the {:.1?} interval; raise the interval or shrink the region",
            "warning".yellow().bold(),
            pass,
            interval,
        );
        tracing::warn!(?pass, ?interval, "scan pass exceeded its interval");
    }

    fn heartbeat_due(&self, cycle: u64) -> bool {
        self.heartbeat_every != 0 && cycle % self.heartbeat_every == 0
    }
}
