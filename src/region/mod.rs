//! The monitored region: allocation, sentinel fill and residency pinning.

mod buffer;
mod residency;

pub use buffer::{RegionBuffer, CELL_SIZE, SENTINEL};
pub(crate) use buffer::{write_sentinel, SENTINEL_WORD};
pub use residency::{ResidencyPolicy, ResidencyState};
