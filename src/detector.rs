//! Detector lifecycle: configuration intake, start/stop, scheduling.
//!
//! The controller never reads or writes region bytes itself. The monitor
//! thread owns the buffer for the whole of a run and findings come back over
//! a lock-free queue, so there is exactly one reader/writer of the region by
//! construction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;

use crate::config::DetectorConfig;
use crate::error::{DetectorError, RegionIntegrityError};
use crate::region::{RegionBuffer, ResidencyState};
use crate::report::Reporter;
use crate::scan::{scan_and_refresh, CorruptionEvent, ScanVerdict};
use crate::stats::DetectorStats;

/// Controller run state; transitions are strictly forward.
///
/// There is no pause/resume and no restart: once running, the region is
/// continuously watched until full shutdown, and a stopped detector stays
/// stopped for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Everything a finished run can tell the operator.
#[derive(Debug)]
pub struct RunSummary {
    /// Scan cycles completed.
    pub cycles: u64,
    /// Cycles that found every byte intact.
    pub clean_cycles: u64,
    /// Append-only record of every corruption observed, in detection order.
    pub corruption_history: Vec<CorruptionEvent>,
    /// What pinning was actually applied to the region.
    pub residency: ResidencyState,
}

/// Owns the monitored region's lifecycle.
pub struct Detector {
    config: DetectorConfig,
    state: DetectorState,
    shutdown: Arc<AtomicBool>,
    events: Arc<SegQueue<CorruptionEvent>>,
    faults: Arc<SegQueue<(usize, u8)>>,
    stats: Arc<DetectorStats>,
    history: Vec<CorruptionEvent>,
    residency: ResidencyState,
    monitor: Option<JoinHandle<Result<(), RegionIntegrityError>>>,
}

impl Detector {
    /// Create an idle detector. Nothing is allocated yet.
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: DetectorState::Idle,
            shutdown: Arc::new(AtomicBool::new(false)),
            events: Arc::new(SegQueue::new()),
            faults: Arc::new(SegQueue::new()),
            stats: Arc::new(DetectorStats::new()),
            history: Vec::new(),
            residency: ResidencyState::default(),
            monitor: None,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Shared statistics handle; stays readable after the run ends.
    pub fn stats(&self) -> Arc<DetectorStats> {
        Arc::clone(&self.stats)
    }

    /// `Idle -> Running`: validate, allocate and fill the region, start the
    /// monitor thread.
    ///
    /// Allocation happens on the caller's thread so an `AllocationError`
    /// surfaces here, synchronously, with nothing left running behind it.
    pub fn start(&mut self) -> Result<(), DetectorError> {
        if self.state != DetectorState::Idle {
            return Err(DetectorError::InvalidTransition {
                from: self.state,
                to: DetectorState::Running,
            });
        }
        self.config.validate()?;

        let region = RegionBuffer::allocate(self.config.region_size, self.config.residency)?;
        self.residency = *region.residency();

        let worker = MonitorWorker {
            region,
            config: self.config.clone(),
            shutdown: Arc::clone(&self.shutdown),
            events: Arc::clone(&self.events),
            faults: Arc::clone(&self.faults),
            stats: Arc::clone(&self.stats),
        };
        self.monitor = Some(
            thread::Builder::new()
                .name("flipwatch-monitor".to_owned())
                .spawn(move || worker.run())?,
        );
        self.state = DetectorState::Running;
        tracing::info!(
            region_size = self.config.region_size,
            interval = ?self.config.scan_interval,
            "detector running"
        );
        Ok(())
    }

    /// Ask the monitor to stop after the cell it is working on.
    ///
    /// `Running -> Stopping`. The in-flight cell always completes, so the
    /// compare-then-touch ordering is never left half done.
    pub fn request_stop(&mut self) {
        if self.state == DetectorState::Running {
            self.shutdown.store(true, Ordering::SeqCst);
            self.state = DetectorState::Stopping;
            tracing::info!("stop requested");
        }
    }

    /// Move corruption events from the monitor thread into the history.
    /// Returns how many arrived.
    pub fn drain_events(&mut self) -> usize {
        let mut drained = 0;
        while let Some(event) = self.events.pop() {
            self.history.push(event);
            drained += 1;
        }
        drained
    }

    /// Corruption events recorded so far (drains the queue first).
    pub fn history_len(&mut self) -> usize {
        self.drain_events();
        self.history.len()
    }

    /// Queue a byte write the monitor thread applies before its next pass.
    ///
    /// Fault-injection support for exercising the detection and reporting
    /// paths end to end. The write happens on the thread that owns the
    /// region, so the single-owner rule holds.
    pub fn inject_fault(&self, offset: usize, value: u8) {
        self.faults.push((offset, value));
    }

    /// True while the monitor thread is alive. A bounded run (`max_cycles`)
    /// flips this on its own; call `wait` afterwards to collect the summary.
    pub fn is_running(&self) -> bool {
        self.monitor.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Block until the monitor thread exits, release the region and return
    /// the run summary (`-> Stopped`).
    ///
    /// A `RegionIntegrityError` raised by the monitor propagates from here;
    /// the detector still ends up `Stopped` with the region released.
    pub fn wait(&mut self) -> Result<RunSummary, DetectorError> {
        let handle = self.monitor.take().ok_or(DetectorError::InvalidTransition {
            from: self.state,
            to: DetectorState::Stopped,
        })?;
        let outcome = handle
            .join()
            .map_err(|_| DetectorError::MonitorPanicked);
        // The region was dropped (and released) when the monitor returned.
        self.state = DetectorState::Stopped;
        self.drain_events();
        outcome??;

        Ok(RunSummary {
            cycles: self.stats.cycles(),
            clean_cycles: self.stats.clean_cycles(),
            corruption_history: std::mem::take(&mut self.history),
            residency: self.residency,
        })
    }

    /// Convenience: request a stop and wait out the shutdown.
    pub fn stop(&mut self) -> Result<RunSummary, DetectorError> {
        self.request_stop();
        self.wait()
    }
}

impl Drop for Detector {
    fn drop(&mut self) {
        // A detector dropped while running still shuts its thread down.
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.monitor.take() {
            let _ = handle.join();
        }
    }
}

/// The periodic task that owns the region during `Running`.
struct MonitorWorker {
    region: RegionBuffer,
    config: DetectorConfig,
    shutdown: Arc<AtomicBool>,
    events: Arc<SegQueue<CorruptionEvent>>,
    faults: Arc<SegQueue<(usize, u8)>>,
    stats: Arc<DetectorStats>,
}

impl MonitorWorker {
    fn run(mut self) -> Result<(), RegionIntegrityError> {
        let reporter = Reporter::new(
            self.config.heartbeat_every,
            self.region.len(),
            self.region.base_addr(),
        );
        // The allocation fill counts as the first touch.
        let mut last_touch = Instant::now();
        let mut pace_warned = false;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            self.apply_faults();

            let touch = self.config.refresh_interval.is_zero()
                || last_touch.elapsed() >= self.config.refresh_interval;

            let started = Instant::now();
            let verdict = scan_and_refresh(&mut self.region, touch, &self.shutdown)?;
            let elapsed = started.elapsed();

            match verdict {
                ScanVerdict::Interrupted => break,
                ScanVerdict::Clean => {
                    let cycle = self.stats.record_pass(elapsed, self.region.len() as u64);
                    self.stats.clean_cycles.bump();
                    reporter.clean_cycle(cycle);
                    if touch {
                        last_touch = Instant::now();
                    }
                }
                ScanVerdict::Corrupted(event) => {
                    // Bytes before the mismatch were verified; the rest were
                    // not visited this cycle. A partially touched pass leaves
                    // last_touch alone so the next due pass rewrites all of it.
                    self.stats.record_pass(elapsed, event.offset as u64);
                    self.stats.corruption_events.bump();
                    reporter.corruption(&event);
                    self.events.push(event);
                }
            }

            if elapsed > self.config.scan_interval && !pace_warned {
                reporter.pace_warning(elapsed, self.config.scan_interval);
                pace_warned = true;
            }

            if let Some(max) = self.config.max_cycles {
                if self.stats.cycles() >= max {
                    tracing::info!(cycles = max, "cycle bound reached");
                    break;
                }
            }

            self.idle();
        }
        Ok(())
    }

    fn apply_faults(&mut self) {
        while let Some((offset, value)) = self.faults.pop() {
            self.region.inject(offset, value);
        }
    }

    /// Sleep out the interval in short slices so a stop request does not have
    /// to wait for the whole gap.
    fn idle(&self) {
        const SLICE: Duration = Duration::from_millis(50);
        let deadline = Instant::now() + self.config.scan_interval;
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            thread::sleep(remaining.min(SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::ResidencyPolicy;

    fn quick_config(region_size: usize) -> DetectorConfig {
        DetectorConfig::default()
            .with_region_size(region_size)
            .with_scan_interval(Duration::from_millis(2))
            .with_residency(ResidencyPolicy::Off)
            .with_heartbeat_every(0)
    }

    #[test]
    fn test_bounded_run_stops_on_its_own() {
        let mut detector = Detector::new(quick_config(64 * 1024).with_max_cycles(3));
        detector.start().unwrap();
        let summary = detector.wait().unwrap();

        assert_eq!(detector.state(), DetectorState::Stopped);
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.clean_cycles, 3);
        assert!(summary.corruption_history.is_empty());
    }

    #[test]
    fn test_start_is_single_shot() {
        let mut detector = Detector::new(quick_config(16 * 1024).with_max_cycles(1));
        detector.start().unwrap();
        assert!(matches!(
            detector.start(),
            Err(DetectorError::InvalidTransition { .. })
        ));
        detector.wait().unwrap();

        // No Stopped -> Running either.
        assert!(matches!(
            detector.start(),
            Err(DetectorError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_injected_fault_lands_in_history_and_run_continues() {
        let mut detector = Detector::new(quick_config(256 * 1024));
        detector.start().unwrap();
        let stats = detector.stats();

        detector.inject_fault(100_000, 0x01);
        let deadline = Instant::now() + Duration::from_secs(10);
        while detector.history_len() == 0 {
            assert!(Instant::now() < deadline, "corruption never reported");
            thread::sleep(Duration::from_millis(2));
        }

        // Corruption is reported, not fatal: cycles keep accumulating.
        let seen = stats.cycles();
        let deadline = Instant::now() + Duration::from_secs(10);
        while stats.cycles() <= seen {
            assert!(Instant::now() < deadline, "detector stopped after corruption");
            thread::sleep(Duration::from_millis(2));
        }

        let summary = detector.stop().unwrap();
        assert!(!summary.corruption_history.is_empty());
        assert_eq!(summary.corruption_history[0].offset, 100_000);
        assert_eq!(summary.corruption_history[0].observed, 0x01);
        assert!(stats.corruption_events() >= 1);
    }

    #[test]
    fn test_stop_during_idle_is_prompt() {
        let mut detector = Detector::new(
            quick_config(64 * 1024).with_scan_interval(Duration::from_secs(3600)),
        );
        detector.start().unwrap();
        let stats = detector.stats();

        let deadline = Instant::now() + Duration::from_secs(10);
        while stats.cycles() < 1 {
            assert!(Instant::now() < deadline, "first pass never finished");
            thread::sleep(Duration::from_millis(2));
        }

        let asked = Instant::now();
        let summary = detector.stop().unwrap();
        assert!(asked.elapsed() < Duration::from_secs(2));
        assert_eq!(summary.cycles, 1);
    }

    #[test]
    fn test_wait_without_start_is_invalid() {
        let mut detector = Detector::new(quick_config(4096));
        assert!(matches!(
            detector.wait(),
            Err(DetectorError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_zero_region_is_an_allocation_error() {
        let mut detector = Detector::new(quick_config(0));
        assert!(matches!(
            detector.start(),
            Err(DetectorError::Allocation(_))
        ));
        assert_eq!(detector.state(), DetectorState::Idle);
    }
}
