//! Error taxonomy for the detector.
//!
//! Allocation and integrity failures are fatal. A detected bit flip is a
//! domain event, not an error - it flows to the reporter and the run
//! continues, so it is deliberately absent from these types.

use thiserror::Error;

use crate::detector::DetectorState;

/// Failure to obtain or pattern-fill the monitored region at startup.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// A zero-byte region cannot be monitored.
    #[error("cannot monitor a zero-byte region")]
    ZeroSize,

    /// The request exceeds what the host reports as claimable.
    #[error("requested {requested} bytes but the host reports {available} bytes available")]
    ExceedsAvailable { requested: usize, available: usize },

    /// The host refused the allocation outright.
    #[error("the host could not provide {size} bytes")]
    OutOfMemory { size: usize },

    /// Residency lock was required but denied.
    #[error("residency lock denied by the host (errno {errno})")]
    LockDenied { errno: i32 },
}

/// The running detector lost its ability to manage the region.
///
/// Continuing to "monitor" a region we can no longer reliably rewrite would
/// report nothing of value, so this aborts the run.
#[derive(Debug, Error)]
pub enum RegionIntegrityError {
    /// A canary rewrite did not read back as the sentinel.
    #[error("rewrite at offset {offset} read back 0x{observed:02x}, expected 0x{expected:02x}")]
    ReadBack {
        offset: usize,
        expected: u8,
        observed: u8,
    },
}

/// Umbrella error for detector lifecycle operations.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    #[error("region integrity lost: {0}")]
    Integrity(#[from] RegionIntegrityError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: DetectorState,
        to: DetectorState,
    },

    #[error("could not start monitor thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("monitor thread terminated abnormally")]
    MonitorPanicked,
}
