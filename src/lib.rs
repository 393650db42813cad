//! # flipwatch
//!
//! Passive RAM bit-flip detector.
//!
//! flipwatch allocates a large region of memory, fills it with a known
//! sentinel pattern (all zero bytes), pins it as well as the host allows and
//! re-reads it on a schedule. The region is never legitimately written after
//! setup, so any byte that stops matching the sentinel was flipped underneath
//! the process - by ionizing radiation, voltage noise or failing silicon -
//! not by software.
//!
//! ## Design
//!
//! - One monitor thread owns the region and runs a combined scan + refresh
//!   pass: every cell is compared before it is rewritten, so the canary
//!   rewrite can never erase the evidence it exists to protect.
//! - The same-value rewrite marks pages dirty, which keeps OS memory
//!   compression and same-page merging from replacing the silicon under the
//!   monitor with a compressed token. `mlock`/`madvise` are applied on top
//!   where the host allows, as belt and suspenders.
//! - Corruption is reported and counted, never fatal: the detector's value is
//!   a long uptime, not a fail-fast check.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use flipwatch::{Detector, DetectorConfig};
//!
//! let config = DetectorConfig::default().with_region_size(64 * 1024 * 1024);
//! let mut detector = Detector::new(config);
//! detector.start().expect("could not allocate the region");
//! // ... let it run; corruption events accumulate in the history ...
//! let summary = detector.stop().expect("monitor failed");
//! println!(
//!     "{} cycles, {} corruption event(s)",
//!     summary.cycles,
//!     summary.corruption_history.len()
//! );
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod region;
pub mod report;
pub mod scan;
pub mod stats;

mod sync;
#[allow(dead_code)]
mod util;

pub use config::{DetectorConfig, DEFAULT_SCAN_INTERVAL};
pub use detector::{Detector, DetectorState, RunSummary};
pub use error::{AllocationError, DetectorError, RegionIntegrityError};
pub use region::{RegionBuffer, ResidencyPolicy, ResidencyState, CELL_SIZE, SENTINEL};
pub use report::Reporter;
pub use scan::{scan_and_refresh, CorruptionEvent, ScanVerdict};
pub use stats::DetectorStats;

// Size and host-memory helpers, shared with the CLI.
pub use util::size::{format_bytes, parse_size};
pub use util::sysmem;
