//! AceThrottle - Keep prefix-matched helper processes out of the way
//!
//! A background agent that periodically finds processes whose name starts with a
//! configured prefix and demotes their CPU, affinity, I/O, GPU and power settings.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod core;
mod platform;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::{
    AttributeApplier, InstanceGuard, MatchCriterion, MonitorScheduler, ProcessScanner, Settings,
    SysinfoSource,
};
use crate::platform::NativeControl;

/// Application name constant
pub const APP_NAME: &str = "AceThrottle";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    init_logging();

    info!("{} v{} starting...", APP_NAME, APP_VERSION);

    let settings = Settings::load();

    // Held for the life of the process
    let Some(_instance) = InstanceGuard::acquire(&settings.instance_name) else {
        info!("Another instance of {} is already running", APP_NAME);
        return Ok(());
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_monitor(settings));

    info!("{} shutting down", APP_NAME);
    Ok(())
}

/// Initialize the logging system
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("acethrottle=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_monitor(settings: Settings) {
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    let scanner = ProcessScanner::new(
        SysinfoSource::new(),
        MatchCriterion::new(&settings.process_prefix),
    );
    let applier = AttributeApplier::new(NativeControl::default(), settings.profile.clone());
    let mut scheduler = MonitorScheduler::new(scanner, applier, settings.check_interval());

    let summary = scheduler.run(cancel).await;
    info!(
        cycles = summary.cycles,
        failed_cycles = summary.failed_cycles,
        matched = summary.matched,
        opened = summary.opened,
        "Monitor finished"
    );
}

/// Cancel `cancel` once the OS asks the agent to stop
async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    wait_for_shutdown_signal().await;
    cancel.cancel();
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to listen for SIGTERM: {}", e);
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(windows)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::windows::{ctrl_close, ctrl_shutdown};

    let (mut close, mut shutdown) = match (ctrl_close(), ctrl_shutdown()) {
        (Ok(close), Ok(shutdown)) => (close, shutdown),
        _ => {
            warn!("Failed to listen for console close/shutdown events");
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = close.recv() => {}
        _ = shutdown.recv() => {}
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the monitor only stops when the process is killed
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
