// sortline: vision-driven sorting line controller
// Reads sortline.toml from the working directory when present

use sortline_server::{build_control_loop, DeliveryStatus, SortlineConfig, StopHandle};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let config = SortlineConfig::load_or_default(std::env::current_dir()?)?;
    info!(
        "Starting sortline: PLC {}, log {}",
        config.plc.endpoint(),
        config.log.path.display()
    );

    let stop = StopHandle::new();
    let loop_stop = stop.clone();

    // Peripherals and the loop block, so both are built and run off the runtime threads
    let mut run = tokio::task::spawn_blocking(move || {
        let mut control = build_control_loop(&config)?.with_stop_handle(loop_stop);
        control.run()
    });

    let finished = tokio::select! {
        outcome = &mut run => Some(outcome),
        _ = wait_for_shutdown() => None,
    };
    let outcome = match finished {
        Some(outcome) => outcome,
        None => {
            info!("Shutdown signal received, draining after the current frame");
            stop.request_stop();
            run.await
        }
    };

    let summary = match outcome? {
        Ok(summary) => summary,
        Err(e) => {
            error!("Run aborted: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Run {} ended ({:?}) with {} records",
        summary.run_id,
        summary.end_reason,
        summary.records.len()
    );
    if let DeliveryStatus::Failed(reason) = &summary.delivery {
        warn!("Report was not delivered: {}", reason);
    }

    Ok(())
}

/// Wait for shutdown signal
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
