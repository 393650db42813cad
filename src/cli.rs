//! Command-line interface for the flipwatch daemon.

use std::time::Duration;

use clap::{ArgGroup, Parser, ValueEnum};

use flipwatch::{parse_size, ResidencyPolicy};

/// Monitors otherwise-idle memory for spontaneous bit flips.
///
/// Detection probability scales with how much of the physical DRAM the
/// monitored region covers. ECC memory corrects flips before software can
/// observe them, so there is nothing for flipwatch to see there.
#[derive(Parser, Debug)]
#[command(name = "flipwatch", version, about, long_about = None)]
#[command(group(
    ArgGroup::new("region-size")
        .required(true)
        .args(["memory", "use_all"])
))]
pub struct Args {
    /// Size of the region to monitor: plain bytes or an SI suffix
    /// (200, 5kB, 64MB, 2GB).
    #[arg(short, long, value_parser = parse_size_arg)]
    pub memory: Option<usize>,

    /// Claim as much memory as the host will give up. "free" takes only
    /// memory that is idle right now; "available" also counts what the host
    /// could reclaim from caches.
    #[arg(long, value_enum, value_name = "MODE")]
    pub use_all: Option<ClaimMode>,

    /// Gap between integrity passes.
    #[arg(short, long, value_parser = parse_duration_arg, default_value = "30s")]
    pub interval: Duration,

    /// Minimum gap between canary rewrites (0s rewrites on every pass).
    #[arg(long, value_parser = parse_duration_arg, default_value = "0s")]
    pub refresh_interval: Duration,

    /// How hard to pin the region against swapping.
    #[arg(long, value_enum, default_value = "best-effort")]
    pub residency: ResidencyArg,

    /// Print a liveness heartbeat every N clean cycles (0 disables).
    #[arg(long, default_value_t = 10)]
    pub heartbeat_every: u64,

    /// Stop after N scan cycles instead of running until interrupted.
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Print extra information.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ClaimMode {
    /// Only memory the host reports as free right now.
    Free,
    /// Free memory plus what the host could reclaim without swapping.
    Available,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResidencyArg {
    /// Lock if possible, degrade with a warning if not.
    BestEffort,
    /// Refuse to start if the region cannot be locked.
    Required,
    /// Skip the residency syscalls entirely.
    Off,
}

impl From<ResidencyArg> for ResidencyPolicy {
    fn from(arg: ResidencyArg) -> Self {
        match arg {
            ResidencyArg::BestEffort => ResidencyPolicy::BestEffort,
            ResidencyArg::Required => ResidencyPolicy::Required,
            ResidencyArg::Off => ResidencyPolicy::Off,
        }
    }
}

fn parse_size_arg(s: &str) -> Result<usize, String> {
    parse_size(s)
}

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    s.parse::<humantime::Duration>()
        .map(Into::into)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_flag_parses_sizes() {
        let args = Args::parse_from(["flipwatch", "--memory", "64MB"]);
        assert_eq!(args.memory, Some(64_000_000));
        assert_eq!(args.interval, Duration::from_secs(30));
    }

    #[test]
    fn test_sizing_flags_are_required_and_exclusive() {
        assert!(Args::try_parse_from(["flipwatch"]).is_err());
        assert!(Args::try_parse_from([
            "flipwatch",
            "--memory",
            "1GB",
            "--use-all",
            "free"
        ])
        .is_err());
    }

    #[test]
    fn test_interval_accepts_humantime() {
        let args = Args::parse_from(["flipwatch", "--memory", "1MB", "-i", "2m 30s"]);
        assert_eq!(args.interval, Duration::from_secs(150));
    }
}
