//! Best-effort pinning of the region's backing pages.
//!
//! `mlock` keeps the pages out of swap; `madvise(MADV_UNMERGEABLE)` opts out
//! of same-page merging so an all-zero region is not deduplicated down to a
//! single shared page. Neither call replaces the canary rewrite: some hosts
//! compress even locked pages, so the rewrite stays the primary defense and
//! the syscalls here are belt and suspenders.

use crate::error::AllocationError;

/// How hard to pin the region against swapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResidencyPolicy {
    /// Try to lock; degrade with a warning if the host refuses.
    #[default]
    BestEffort,
    /// Treat lock denial as an allocation failure.
    Required,
    /// Skip the residency syscalls entirely.
    Off,
}

/// What actually got applied to the region.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResidencyState {
    /// Pages are locked out of swap.
    pub locked: bool,
    /// Pages are opted out of same-page merging.
    pub merge_opt_out: bool,
}

/// Pin `len` bytes at `base` according to `policy`.
pub(crate) fn pin(
    base: *mut u8,
    len: usize,
    policy: ResidencyPolicy,
) -> Result<ResidencyState, AllocationError> {
    if policy == ResidencyPolicy::Off {
        return Ok(ResidencyState::default());
    }
    let mut state = ResidencyState::default();

    match lock_pages(base, len) {
        Ok(()) => state.locked = true,
        Err(errno) => {
            if policy == ResidencyPolicy::Required {
                return Err(AllocationError::LockDenied { errno });
            }
            tracing::warn!(
                errno,
                "mlock denied; the region may be swapped (raise RLIMIT_MEMLOCK or run privileged)"
            );
        }
    }

    match unmerge_pages(base, len) {
        Ok(()) => state.merge_opt_out = true,
        Err(errno) => {
            tracing::debug!(errno, "madvise(MADV_UNMERGEABLE) unavailable on this host");
        }
    }

    Ok(state)
}

/// Undo `pin`; called during region teardown.
pub(crate) fn unpin(base: *mut u8, len: usize, state: &ResidencyState) {
    if state.locked {
        unlock_pages(base, len);
    }
}

#[cfg(unix)]
fn lock_pages(base: *mut u8, len: usize) -> Result<(), i32> {
    // SAFETY: base/len describe a live allocation owned by the caller.
    let rc = unsafe { libc::mlock(base as *const libc::c_void, len) };
    if rc == 0 {
        Ok(())
    } else {
        Err(last_errno())
    }
}

#[cfg(unix)]
fn unlock_pages(base: *mut u8, len: usize) {
    // SAFETY: same range that was locked in `lock_pages`.
    unsafe { libc::munlock(base as *const libc::c_void, len) };
}

#[cfg(target_os = "linux")]
fn unmerge_pages(base: *mut u8, len: usize) -> Result<(), i32> {
    // SAFETY: base is page-aligned (region alignment) and len covers the
    // allocation; MADV_UNMERGEABLE does not alter the mapping's contents.
    let rc = unsafe { libc::madvise(base as *mut libc::c_void, len, libc::MADV_UNMERGEABLE) };
    if rc == 0 {
        Ok(())
    } else {
        Err(last_errno())
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn unmerge_pages(_base: *mut u8, _len: usize) -> Result<(), i32> {
    Err(libc::ENOSYS)
}

#[cfg(unix)]
fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(not(unix))]
fn lock_pages(_base: *mut u8, _len: usize) -> Result<(), i32> {
    Err(0)
}

#[cfg(not(unix))]
fn unlock_pages(_base: *mut u8, _len: usize) {}

#[cfg(not(unix))]
fn unmerge_pages(_base: *mut u8, _len: usize) -> Result<(), i32> {
    Err(0)
}
