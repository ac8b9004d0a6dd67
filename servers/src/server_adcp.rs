use anyhow::Result;
use lib_adcp::core::hub::BroadcastHub;
use tokio::signal;

mod adcp_logic;
use adcp_logic::{config, downstream, logger, state};

#[tokio::main]
async fn main() -> Result<()> {
    // Explicitly install the default crypto provider for rustls
    let _ = rustls::crypto::ring::default_provider().install_default();

    let settings = config::load_config().into_settings()?;
    logger::setup_logging(&settings.log_dir, &settings.log_level, settings.log_keep_files)?;
    log::info!(
        "Starting ADCP hub (port {}, queue capacity {}, epoch zone {:?}, tls {})",
        settings.port,
        settings.hub.outbound_capacity,
        settings.hub.epoch_zone,
        settings.tls.is_some()
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let hub = BroadcastHub::spawn(settings.hub);
    let app_state = state::AppState::new(hub);

    let signal_task = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        // Send shutdown signal to all components
        let _ = shutdown_tx.send(());
    });

    let result = downstream::run(settings, app_state, shutdown_rx).await;
    signal_task.abort();

    match &result {
        Ok(()) => log::info!("Shutdown complete."),
        Err(e) => log::error!("Server stopped: {:#}", e),
    }
    result
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => log::info!("SIGTERM received, initiating shutdown."),
    }
}
