//! Run statistics shared between the monitor thread and the controller.

use std::fmt;
use std::time::Duration;

use crate::sync::atomics::{Counter, Gauge};
use crate::util::size::format_bytes;

/// Live counters for one detector run.
///
/// The monitor thread updates these after every pass; the controller (or the
/// embedding application) reads them at any time through a shared handle.
#[derive(Default)]
pub struct DetectorStats {
    pub(crate) cycles: Counter,
    pub(crate) clean_cycles: Counter,
    pub(crate) corruption_events: Counter,
    pub(crate) bytes_verified: Counter,
    pub(crate) last_pass_micros: Gauge,
    pub(crate) peak_pass_micros: Gauge,
}

impl DetectorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed scan cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.get()
    }

    /// Cycles that found every byte intact.
    pub fn clean_cycles(&self) -> u64 {
        self.clean_cycles.get()
    }

    /// Corruption events observed so far.
    pub fn corruption_events(&self) -> u64 {
        self.corruption_events.get()
    }

    /// Total bytes verified across all cycles.
    pub fn bytes_verified(&self) -> u64 {
        self.bytes_verified.get()
    }

    /// Duration of the most recent pass.
    pub fn last_pass(&self) -> Duration {
        Duration::from_micros(self.last_pass_micros.get())
    }

    /// Longest pass seen this run.
    pub fn peak_pass(&self) -> Duration {
        Duration::from_micros(self.peak_pass_micros.get())
    }

    pub(crate) fn record_pass(&self, elapsed: Duration, verified: u64) -> u64 {
        self.cycles.bump();
        self.bytes_verified.add(verified);
        let micros = elapsed.as_micros() as u64;
        self.last_pass_micros.set(micros);
        self.peak_pass_micros.update_max(micros);
        self.cycles.get()
    }
}

impl fmt::Display for DetectorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Detector statistics:")?;
        writeln!(f, "  Scan cycles:       {}", self.cycles())?;
        writeln!(f, "  Clean cycles:      {}", self.clean_cycles())?;
        writeln!(f, "  Corruption events: {}", self.corruption_events())?;
        writeln!(
            f,
            "  Bytes verified:    {}",
            format_bytes(self.bytes_verified() as usize)
        )?;
        writeln!(f, "  Last pass:         {:?}", self.last_pass())?;
        write!(f, "  Peak pass:         {:?}", self.peak_pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_pass_accumulates() {
        let stats = DetectorStats::new();
        assert_eq!(stats.record_pass(Duration::from_micros(150), 4096), 1);
        assert_eq!(stats.record_pass(Duration::from_micros(90), 4096), 2);

        assert_eq!(stats.cycles(), 2);
        assert_eq!(stats.bytes_verified(), 8192);
        assert_eq!(stats.last_pass(), Duration::from_micros(90));
        assert_eq!(stats.peak_pass(), Duration::from_micros(150));
    }

    #[test]
    fn test_display_summary() {
        let stats = DetectorStats::new();
        stats.record_pass(Duration::from_micros(10), 1024);
        stats.clean_cycles.bump();

        let text = stats.to_string();
        assert!(text.contains("Scan cycles:       1"));
        assert!(text.contains("Clean cycles:      1"));
        assert!(text.contains("Corruption events: 0"));
    }
}
