//! Detector configuration.

use std::time::Duration;

use crate::error::DetectorError;
use crate::region::ResidencyPolicy;
use crate::util::size::mb;

/// Default gap between integrity passes.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration captured once when the detector starts; never mutated after.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Size of the monitored region in bytes.
    pub region_size: usize,

    /// Gap between the end of one scan pass and the start of the next.
    pub scan_interval: Duration,

    /// Minimum gap between canary rewrites of the region.
    ///
    /// The rewrite rides along with a scan pass once this much time has
    /// elapsed, so the effective cadence is the first pass at or after the
    /// deadline. Zero means every pass rewrites.
    pub refresh_interval: Duration,

    /// How hard to pin the region against swapping.
    pub residency: ResidencyPolicy,

    /// Emit a liveness heartbeat every N clean cycles (0 disables).
    pub heartbeat_every: u64,

    /// Stop on its own after this many scan cycles (None = run until stopped).
    pub max_cycles: Option<u64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            region_size: mb(256),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            refresh_interval: Duration::ZERO,
            residency: ResidencyPolicy::BestEffort,
            heartbeat_every: 10,
            max_cycles: None,
        }
    }
}

impl DetectorConfig {
    /// Builder pattern: set region size in bytes.
    pub fn with_region_size(mut self, bytes: usize) -> Self {
        self.region_size = bytes;
        self
    }

    /// Builder pattern: set the scan interval.
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Builder pattern: set the minimum refresh gap.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Builder pattern: set the residency policy.
    pub fn with_residency(mut self, policy: ResidencyPolicy) -> Self {
        self.residency = policy;
        self
    }

    /// Builder pattern: set the heartbeat cadence.
    pub fn with_heartbeat_every(mut self, cycles: u64) -> Self {
        self.heartbeat_every = cycles;
        self
    }

    /// Builder pattern: bound the run to a cycle count.
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Check the configuration before the detector starts.
    ///
    /// Region sizing is the allocator's call (a zero or oversized request is
    /// an `AllocationError`); this only rejects what no allocator could save.
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.scan_interval.is_zero() {
            return Err(DetectorError::Config(
                "scan interval must be non-zero".to_owned(),
            ));
        }
        if self.max_cycles == Some(0) {
            return Err(DetectorError::Config(
                "a zero-cycle run would monitor nothing".to_owned(),
            ));
        }
        Ok(())
    }
}
