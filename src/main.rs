//! obs-counter-bridge plugin entry point.
//!
//! Registers with the Stream Deck host and runs the dispatcher until the
//! host goes away or the process is interrupted.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use obs_counter_bridge::config::{BridgeConfig, LogFormat};
use obs_counter_bridge::error::BridgeError;
use obs_counter_bridge::host::{HostOutbox, HostSink, Registration, run_host_link};
use obs_counter_bridge::obs::{Transport, WsTransport};
use obs_counter_bridge::service::{
    CounterService, Dispatcher, DisplayNotifier, HealthMonitor, LongPressTimers, SessionManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = BridgeConfig::from_args_and_env()?;
    init_tracing(config.log_format);
    tracing::info!(
        port = config.host_port,
        uuid = %config.plugin_uuid,
        host_version = config.host_version.as_deref().unwrap_or("unknown"),
        "starting obs-counter-bridge"
    );

    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (outbox, outbound_rx) = HostOutbox::new();

    // Build service layer
    let host: Arc<dyn HostSink> = Arc::new(outbox);
    let transport: Arc<dyn Transport> = Arc::new(WsTransport::new(config.connect_timeout));
    let display = DisplayNotifier::new(Arc::clone(&host), config.unknown_indicator.clone());
    let sessions = SessionManager::new(transport, transport_tx, display);
    let service = CounterService::new(
        sessions,
        host,
        control_tx,
        LongPressTimers::new(config.long_press),
        HealthMonitor::new(config.health_interval),
    );

    // Connect to the host
    let url = config.host_url();
    let registration = Registration {
        event: config.register_event.clone(),
        uuid: config.plugin_uuid.clone(),
    };
    let link = tokio::spawn(async move {
        run_host_link(&url, &registration, host_tx, outbound_rx).await
    });

    let dispatcher = Dispatcher::new(service, host_rx, transport_rx, control_rx);
    let service = dispatcher
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;
    // Dropping the service closes the outbox so the link flushes and exits.
    drop(service);

    let outcome = link
        .await
        .map_err(|e| BridgeError::Internal(format!("host link task: {e}")))?;
    BridgeError::escalate_fatal(outcome)?;
    tracing::info!("stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
