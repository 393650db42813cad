//! flipwatch daemon entrypoint.
//!
//! Wires the CLI to the detector: resolves the region size, installs signal
//! handlers, then lets the monitor run until a signal or the cycle bound ends
//! the run. Detected corruption is reported and counted but never changes the
//! exit code; only allocator and integrity failures do.

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use flipwatch::{format_bytes, sysmem, Detector, DetectorConfig, DetectorError};

use cli::{Args, ClaimMode};

/// Exit code for configuration/allocation failures: nothing ever started.
const EXIT_ALLOCATION: i32 = 1;
/// Exit code for a region integrity failure while running.
const EXIT_INTEGRITY: i32 = 2;

/// Fraction of claimable memory left to the rest of the system in
/// `--use-all` mode.
const CLAIM_HEADROOM: f64 = 0.05;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(err) = run(args) {
        eprintln!("flipwatch: {err:#}");
        std::process::exit(exit_code_for(&err));
    }
}

fn run(args: Args) -> Result<()> {
    let region_size = resolve_region_size(&args)?;

    let mut config = DetectorConfig::default()
        .with_region_size(region_size)
        .with_scan_interval(args.interval)
        .with_refresh_interval(args.refresh_interval)
        .with_residency(args.residency.into())
        .with_heartbeat_every(args.heartbeat_every);
    if let Some(cycles) = args.cycles {
        config = config.with_max_cycles(cycles);
    }

    install_signal_handlers();

    let mut detector = Detector::new(config);
    detector.start()?;
    println!(
        "flipwatch: monitoring {} (scan every {})",
        format_bytes(region_size),
        humantime::format_duration(args.interval),
    );

    // Wait for a signal or for a bounded run to finish, draining events as
    // they arrive so the history stays current.
    while detector.is_running() {
        if SHUTDOWN.load(Ordering::SeqCst) {
            detector.request_stop();
            break;
        }
        detector.drain_events();
        std::thread::sleep(Duration::from_millis(100));
    }

    let stats = detector.stats();
    let summary = detector.wait()?;

    println!("{stats}");
    println!(
        "flipwatch: stopped after {} cycle(s), {} corruption event(s)",
        summary.cycles,
        summary.corruption_history.len(),
    );
    Ok(())
}

fn resolve_region_size(args: &Args) -> Result<usize> {
    if let Some(bytes) = args.memory {
        return Ok(bytes);
    }
    let claimable = match args.use_all {
        Some(ClaimMode::Free) => sysmem::free_memory(),
        Some(ClaimMode::Available) => sysmem::available_memory(),
        None => bail!("one of --memory or --use-all is required"),
    };
    let claimable = claimable
        .context("host does not expose memory statistics; pass --memory instead of --use-all")?;

    let size = (claimable as f64 * (1.0 - CLAIM_HEADROOM)) as usize;
    if size == 0 {
        bail!("host reports no claimable memory");
    }
    Ok(size)
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DetectorError>() {
        Some(DetectorError::Integrity(_)) => EXIT_INTEGRITY,
        _ => EXIT_ALLOCATION,
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

#[cfg(unix)]
fn install_signal_handlers() {
    extern "C" fn on_signal(_sig: libc::c_int) {
        SHUTDOWN.store(true, Ordering::SeqCst);
    }
    let handler = on_signal as extern "C" fn(libc::c_int);
    // SAFETY: the handler only stores to an atomic, which is
    // async-signal-safe.
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}
