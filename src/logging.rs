use log::{debug, error, info};

use crate::config::ScanConfig;
use crate::tracker::Snapshot;

/// Initialize the logger with appropriate level based on verbosity
pub fn init_logger(verbose: bool, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Off
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Off // Only show structured logs in verbose mode
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    debug!("Logger initialized with level: {level:?}");
}

/// Log the effective scan configuration
pub fn log_config_info(config: &ScanConfig, base: &str) {
    let timeout = config.timeout.unwrap_or(crate::config::DEFAULT_TIMEOUT_SECONDS);
    let workers = config.worker_count();
    let max_attempts = config.max_attempts();
    let skip_tls = config.skip_tls_verification.unwrap_or(false);

    info!("Target: {base}");
    info!("Configuration: workers={workers}, timeout={timeout}s, max_attempts={max_attempts}");
    if let Some(rps) = config.rate_limit_rps {
        info!("Rate limiting: {rps} requests/s");
    }
    info!("HTTP: skip_tls={skip_tls}, redirect_depth={}", config.redirect_depth.unwrap_or(0));
}

/// Log scan completion with final counts
pub fn log_scan_complete(snapshot: &Snapshot) {
    if snapshot.failed == 0 {
        info!(
            "Scan complete: {} probed, {} reported, {} suppressed ({}ms)",
            snapshot.completed,
            snapshot.reported,
            snapshot.suppressed,
            snapshot.elapsed.as_millis()
        );
    } else {
        error!(
            "Scan complete with failures: {} probed, {} reported, {} failed ({}ms)",
            snapshot.completed,
            snapshot.reported,
            snapshot.failed,
            snapshot.elapsed.as_millis()
        );
    }
}
