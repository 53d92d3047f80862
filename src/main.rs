use anyhow::Result;
use deskmon::*;
use std::sync::{Arc, RwLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let identity = app_config.device.identity();
    tracing::info!(
        device_id = %identity.device_id,
        device_name = %identity.device_name,
        version = version::VERSION,
        "Starting desktop monitor"
    );

    let snapshot = Arc::new(RwLock::new(models::Snapshot::new()));
    let sysinfo_repo = Arc::new(sysinfo_repo::SysinfoRepo::new());
    let publish_interval_secs = app_config.monitoring.effective_publish_interval_secs();
    let capacity = collector::window_capacity(
        publish_interval_secs,
        app_config.monitoring.collection_interval_secs,
    );
    let collector = collector::Collector::new(sysinfo_repo, snapshot.clone(), capacity);

    let (session, mqtt_handle) = mqtt::BrokerSession::connect(&app_config.mqtt, identity);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            collector,
            session,
            shutdown_rx,
        },
        worker::WorkerConfig {
            collection_interval_secs: app_config.monitoring.collection_interval_secs,
            publish_interval_secs,
        },
    );

    let app = routes::app(snapshot);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            // Worker announces offline and disconnects before we stop polling
            let _ = worker_handle.await;
            mqtt_handle.abort();
        }
    }

    Ok(())
}
