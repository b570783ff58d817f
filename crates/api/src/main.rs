//! ShopSync - offline mutation queue service
//!
//! Opens the local queue, keeps it reconciled with the remote store while
//! connectivity allows, and exits cleanly on Ctrl-C.

use std::process::ExitCode;
use std::time::Duration;

use shopsync_app::utils::{error_label, init_logging, log_drain_outcome};
use shopsync_app::AppContext;
use shopsync_domain::constants::DEFAULT_PROBE_INTERVAL_SECS;
use shopsync_domain::LoggingConfig;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();

    let config = match shopsync_infra::config::load() {
        Ok(config) => config,
        Err(err) => {
            init_logging(&LoggingConfig::default());
            error!(error = %err, kind = error_label(&err), "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) => info!(error = %err, "no .env file loaded"),
    }

    let ctx = match AppContext::new(config).await {
        Ok(ctx) => ctx,
        Err(err) => {
            error!(error = %err, kind = error_label(&err), "failed to initialise application");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = ctx.start(Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS)).await {
        error!(error = %err, kind = error_label(&err), "failed to start sync engine");
        return ExitCode::FAILURE;
    }
    info!("ShopSync running");

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl-C; shutting down");
    }

    // Last chance to flush while the remote is known to be reachable.
    if ctx.engine.is_online() {
        match ctx.engine.trigger_drain().await {
            Ok(outcome) => log_drain_outcome("shutdown", &outcome),
            Err(err) => warn!(error = %err, "final drain failed"),
        }
    }

    match ctx.engine.queue_state().await {
        Ok(state) => info!(
            pending = state.pending,
            syncing = state.syncing,
            failed = state.failed,
            "queue state at shutdown"
        ),
        Err(err) => warn!(error = %err, "failed to read queue state at shutdown"),
    }

    if let Err(err) = ctx.shutdown().await {
        error!(error = %err, kind = error_label(&err), "shutdown failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
