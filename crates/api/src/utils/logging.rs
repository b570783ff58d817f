use shopsync_core::DrainOutcome;
use shopsync_domain::{LoggingConfig, ShopSyncError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Calling this twice is
/// harmless; the second install is ignored and reported as `false`.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().with_current_span(true).try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        info!(level = %config.level, json = config.json, "logging initialised");
    }
    installed
}

/// Convert a `ShopSyncError` into a stable label suitable for logging.
#[inline]
pub fn error_label(error: &ShopSyncError) -> &'static str {
    error.label()
}

/// Log the result of an explicit drain with structured fields.
pub fn log_drain_outcome(trigger: &str, outcome: &DrainOutcome) {
    match outcome {
        DrainOutcome::Completed(report) => {
            let duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX);
            if report.rejected > 0 || report.storage_errors > 0 {
                warn!(
                    trigger,
                    attempted = report.attempted,
                    applied = report.applied,
                    retried = report.retried,
                    rejected = report.rejected,
                    storage_errors = report.storage_errors,
                    duration_ms,
                    "drain_completed_with_failures"
                );
            } else {
                info!(
                    trigger,
                    attempted = report.attempted,
                    applied = report.applied,
                    retried = report.retried,
                    duration_ms,
                    "drain_completed"
                );
            }
        }
        DrainOutcome::AlreadyRunning => info!(trigger, "drain_already_running"),
    }
}
