//! The combined scan and canary-refresh pass.
//!
//! One walker does both jobs so the compare-then-touch ordering per cell is
//! structural: a cell is only ever rewritten after that same cell passed its
//! comparison in the same pass. Rewriting first would erase exactly the
//! evidence the scan exists to find.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::error::RegionIntegrityError;
use crate::region::{self, RegionBuffer, CELL_SIZE, SENTINEL};

const WORD: usize = std::mem::size_of::<u64>();

/// One observed corruption: a byte that stopped holding the sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptionEvent {
    /// Byte offset from the start of the region.
    pub offset: usize,
    /// The value read back.
    pub observed: u8,
    /// The value the region must hold (always the sentinel).
    pub expected: u8,
    /// When the mismatch was observed.
    pub at: DateTime<Utc>,
}

impl CorruptionEvent {
    /// Index of the cell containing the corrupted byte.
    pub fn cell(&self) -> usize {
        self.offset / CELL_SIZE
    }
}

/// Outcome of one pass over the region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    /// Every byte matched the sentinel.
    Clean,
    /// First mismatching byte of this cycle; the pass stopped here and the
    /// corrupted cell was not rewritten.
    Corrupted(CorruptionEvent),
    /// A stop request arrived mid-pass; remaining cells were not visited.
    Interrupted,
}

/// Walk the region cell by cell in ascending offset order.
///
/// Each cell is compared against the sentinel first; only a cell that passed
/// its own comparison is rewritten, and only when `touch` is set. The pass
/// stops at the first mismatch, reported with its pre-touch value. `cancel`
/// is checked between cells, so a stop request is honored within one cell's
/// work rather than one full pass.
pub fn scan_and_refresh(
    region: &mut RegionBuffer,
    touch: bool,
    cancel: &AtomicBool,
) -> Result<ScanVerdict, RegionIntegrityError> {
    let len = region.len();
    let base = region.as_mut_ptr();

    let mut offset = 0;
    while offset < len {
        if cancel.load(Ordering::Relaxed) {
            return Ok(ScanVerdict::Interrupted);
        }
        let cell_len = CELL_SIZE.min(len - offset);

        // SAFETY: offset + cell_len <= len; cell starts are 8-aligned because
        // the base is page-aligned and cells are page-sized.
        if let Some((delta, observed)) = unsafe { first_mismatch(base.add(offset), cell_len) } {
            return Ok(ScanVerdict::Corrupted(CorruptionEvent {
                offset: offset + delta,
                observed,
                expected: SENTINEL,
                at: Utc::now(),
            }));
        }

        if touch {
            // SAFETY: same bounds as above; this cell was verified first.
            unsafe { rewrite_cell(base.add(offset), cell_len, offset)? };
        }

        offset += cell_len;
    }
    Ok(ScanVerdict::Clean)
}

/// Compare `len` bytes at `ptr` against the sentinel, word-wide, and return
/// the first mismatching byte as (offset within the range, observed value).
///
/// # Safety
/// `ptr` must be valid for `len` reads and 8-byte aligned.
unsafe fn first_mismatch(ptr: *const u8, len: usize) -> Option<(usize, u8)> {
    let words = len / WORD;
    let word_ptr = ptr as *const u64;
    for i in 0..words {
        // SAFETY: i < len / WORD, so the read stays in range.
        let word = unsafe { std::ptr::read_volatile(word_ptr.add(i)) };
        if word != region::SENTINEL_WORD {
            // Narrow to the first differing byte, in memory order.
            for (j, &byte) in word.to_ne_bytes().iter().enumerate() {
                if byte != SENTINEL {
                    return Some((i * WORD + j, byte));
                }
            }
        }
    }
    for i in (words * WORD)..len {
        // SAFETY: i < len.
        let byte = unsafe { std::ptr::read_volatile(ptr.add(i)) };
        if byte != SENTINEL {
            return Some((i, byte));
        }
    }
    None
}

/// Rewrite a verified-clean cell with the sentinel and probe the result.
///
/// The store is a semantic no-op but marks the backing page dirty, which is
/// what keeps compression and same-page merging away from the region. The
/// read-back probe catches a host that refused or mangled the store.
///
/// # Safety
/// `ptr` must be valid for `len` reads and writes and 8-byte aligned.
unsafe fn rewrite_cell(
    ptr: *mut u8,
    len: usize,
    region_offset: usize,
) -> Result<(), RegionIntegrityError> {
    // SAFETY: caller guarantees ptr/len validity and alignment.
    unsafe { region::write_sentinel(ptr, len) };

    for probe in [0, len - 1] {
        // SAFETY: probe < len.
        let observed = unsafe { std::ptr::read_volatile(ptr.add(probe)) };
        if observed != SENTINEL {
            return Err(RegionIntegrityError::ReadBack {
                offset: region_offset + probe,
                expected: SENTINEL,
                observed,
            });
        }
    }
    Ok(())
}
