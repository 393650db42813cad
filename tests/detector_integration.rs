//! End-to-end detector scenarios against the public API.

use std::time::{Duration, Instant};

use flipwatch::{
    AllocationError, Detector, DetectorConfig, DetectorError, DetectorState, ResidencyPolicy,
    SENTINEL,
};

const MIB: usize = 1024 * 1024;

fn test_config(region_size: usize) -> DetectorConfig {
    DetectorConfig::default()
        .with_region_size(region_size)
        .with_scan_interval(Duration::from_millis(5))
        .with_residency(ResidencyPolicy::Off)
        .with_heartbeat_every(0)
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !cond() {
        assert!(
            Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn clean_64mib_region_stays_clean_for_ten_cycles() {
    let mut detector = Detector::new(test_config(64 * MIB).with_max_cycles(10));
    detector.start().unwrap();
    let summary = detector.wait().unwrap();

    assert_eq!(summary.cycles, 10);
    assert_eq!(summary.clean_cycles, 10);
    assert!(summary.corruption_history.is_empty());
    assert_eq!(detector.state(), DetectorState::Stopped);
}

#[test]
fn single_flip_mid_region_is_reported_with_exact_location() {
    let mut detector = Detector::new(test_config(64 * MIB));
    detector.start().unwrap();
    let stats = detector.stats();

    // Let a few cycles complete clean before the flip lands.
    wait_until(Duration::from_secs(30), || stats.cycles() >= 3);
    assert_eq!(detector.history_len(), 0);

    detector.inject_fault(33_554_432, 0x01);
    wait_until(Duration::from_secs(30), || detector.history_len() >= 1);

    let summary = detector.stop().unwrap();
    assert!(summary.clean_cycles >= 3);
    assert!(!summary.corruption_history.is_empty());
    // Re-detections on later cycles repeat the same byte; none may disagree.
    for event in &summary.corruption_history {
        assert_eq!(event.offset, 33_554_432);
        assert_eq!(event.observed, 0x01);
        assert_eq!(event.expected, SENTINEL);
        assert_eq!(event.cell(), 33_554_432 / 4096);
    }
}

#[test]
fn oversized_request_fails_before_any_cycle() {
    let mut detector = Detector::new(test_config(usize::MAX / 2));
    let err = detector.start().unwrap_err();

    assert!(matches!(
        err,
        DetectorError::Allocation(
            AllocationError::ExceedsAvailable { .. } | AllocationError::OutOfMemory { .. }
        )
    ));
    assert_eq!(detector.state(), DetectorState::Idle);
    assert_eq!(detector.stats().cycles(), 0);
}

#[test]
fn stop_mid_run_is_prompt_and_reallocation_succeeds() {
    let mut detector =
        Detector::new(test_config(16 * MIB).with_scan_interval(Duration::from_secs(3600)));
    detector.start().unwrap();
    let stats = detector.stats();
    wait_until(Duration::from_secs(30), || stats.cycles() >= 1);

    let asked = Instant::now();
    let summary = detector.stop().unwrap();
    assert!(asked.elapsed() < Duration::from_secs(2));
    assert!(summary.corruption_history.is_empty());
    assert_eq!(detector.state(), DetectorState::Stopped);

    // The region was released; a fresh all-sentinel region allocates fine.
    let mut second = Detector::new(test_config(16 * MIB).with_max_cycles(1));
    second.start().unwrap();
    let summary = second.wait().unwrap();
    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.clean_cycles, 1);
}

#[test]
fn corruption_does_not_end_the_run() {
    let mut detector = Detector::new(test_config(MIB));
    detector.start().unwrap();
    let stats = detector.stats();

    detector.inject_fault(0, 0xFF);
    wait_until(Duration::from_secs(30), || detector.history_len() >= 1);

    // The monitor keeps cycling after the report.
    let seen = stats.cycles();
    wait_until(Duration::from_secs(30), || stats.cycles() > seen);

    let summary = detector.stop().unwrap();
    assert!(summary.cycles > summary.clean_cycles);
    assert_eq!(summary.corruption_history[0].offset, 0);
    assert_eq!(summary.corruption_history[0].observed, 0xFF);
}
