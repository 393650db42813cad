//! Host memory probes used to size the monitored region.
//!
//! Free memory is what the host holds idle right now; available memory also
//! counts what it could reclaim from caches without swapping. The detector
//! wants as much of either as the operator is willing to give up, since
//! detection probability scales with coverage of the physical DIMMs.

/// Bytes of memory the host reports as immediately free.
#[cfg(target_os = "linux")]
pub fn free_memory() -> Option<usize> {
    meminfo_field("MemFree:").or_else(sysconf_free)
}

/// Bytes of memory the host could make available by evicting caches.
#[cfg(target_os = "linux")]
pub fn available_memory() -> Option<usize> {
    meminfo_field("MemAvailable:").or_else(sysconf_free)
}

#[cfg(target_os = "linux")]
fn meminfo_field(field: &str) -> Option<usize> {
    let text = std::fs::read_to_string("/proc/meminfo").ok()?;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(field) {
            let kib = rest.trim().trim_end_matches("kB").trim();
            return kib.parse::<usize>().ok().map(|n| n * 1024);
        }
    }
    None
}

// Containers occasionally mount a restricted /proc; sysconf still answers.
#[cfg(target_os = "linux")]
fn sysconf_free() -> Option<usize> {
    // SAFETY: sysconf reads static system configuration only.
    let pages = unsafe { libc::sysconf(libc::_SC_AVPHYS_PAGES) };
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if pages > 0 && page > 0 {
        Some(pages as usize * page as usize)
    } else {
        None
    }
}

/// Bytes of memory the host reports as immediately free.
///
/// Not probed on this platform; the operator sizes the region explicitly.
#[cfg(not(target_os = "linux"))]
pub fn free_memory() -> Option<usize> {
    None
}

/// Bytes of memory the host could make available by evicting caches.
///
/// Not probed on this platform; the operator sizes the region explicitly.
#[cfg(not(target_os = "linux"))]
pub fn available_memory() -> Option<usize> {
    None
}

#[cfg(test)]
mod tests {
    #[cfg(target_os = "linux")]
    #[test]
    fn test_probes_report_something() {
        let free = super::free_memory().expect("linux host should expose free memory");
        let available = super::available_memory().expect("linux host should expose available memory");
        assert!(free > 0);
        assert!(available > 0);
    }
}
