// Broker session lifecycle: last will, connect/reconnect with backoff,
// discovery-before-stats ordering, best-effort snapshot publishing.

use crate::config::MqttConfig;
use crate::discovery::{self, CPU_METRIC, MEMORY_METRIC, SensorCatalog, TopicSet, metric_slug};
use crate::models::{DeviceIdentity, Snapshot};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Duration, sleep, timeout};

/// Bound on every network publish so shutdown never leaves one in flight.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);
/// Sleep after a connection error before the event loop retries.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(30);
/// Bounded wait for queued offline publishes to flush during shutdown.
pub const SHUTDOWN_FLUSH: Duration = Duration::from_secs(2);
const BROKER_KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("publish timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

/// Publish seam between the session and the discovery/statistics emitters;
/// tests substitute a recording double here.
pub trait SensorPublisher: Send + Sync {
    fn publish(
        &self,
        topic: &str,
        payload: &str,
        retain: bool,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// SensorPublisher over the rumqttc client, with a timeout on every publish.
#[derive(Clone)]
pub struct ClientPublisher {
    client: AsyncClient,
}

impl SensorPublisher for ClientPublisher {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> anyhow::Result<()> {
        // Retained messages carry config/availability; deliver at least once.
        let qos = if retain {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        timeout(
            PUBLISH_TIMEOUT,
            self.client.publish(topic, qos, retain, payload.as_bytes().to_vec()),
        )
        .await
        .map_err(PublishError::from)?
        .map_err(PublishError::from)?;
        Ok(())
    }
}

/// Broker options with the last will registered up front: if the process
/// drops uncleanly the broker itself announces "offline" on the availability
/// topic, retained.
pub fn session_options(
    cfg: &MqttConfig,
    identity: &DeviceIdentity,
    topics: &TopicSet,
) -> MqttOptions {
    let mut options = MqttOptions::new(
        format!("{}-{}", crate::version::NAME, identity.device_id),
        cfg.host.clone(),
        cfg.port,
    );
    options.set_keep_alive(BROKER_KEEP_ALIVE);
    options.set_last_will(LastWill::new(
        topics.availability(),
        "offline",
        QoS::AtLeastOnce,
        true,
    ));
    if let Some((user, pass)) = cfg.credentials() {
        options.set_credentials(user, pass);
    }
    options
}

pub struct BrokerSession {
    client: AsyncClient,
    publisher: ClientPublisher,
    state_rx: watch::Receiver<BrokerConnectionState>,
    catalog: Arc<SensorCatalog>,
    emitted_disk_configs: Arc<Mutex<HashSet<String>>>,
}

impl BrokerSession {
    /// Builds the session and spawns its network event loop. The loop owns
    /// reconnection: on ConnAck it runs the connect cycle (cleanup if
    /// configured, settle, discovery, availability) and only then flips the
    /// state to Connected, so statistics never precede discovery.
    pub fn connect(
        cfg: &MqttConfig,
        identity: DeviceIdentity,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let catalog = Arc::new(SensorCatalog::new(identity.clone()));
        let options = session_options(cfg, &identity, catalog.topics());
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(BrokerConnectionState::Connecting);
        let publisher = ClientPublisher {
            client: client.clone(),
        };
        let emitted_disk_configs = Arc::new(Mutex::new(HashSet::new()));

        let handle = tokio::spawn(run_event_loop(
            eventloop,
            publisher.clone(),
            Arc::new(state_tx),
            catalog.clone(),
            cfg.cleanup_on_connect,
            emitted_disk_configs.clone(),
        ));

        (
            Self {
                client,
                publisher,
                state_rx,
                catalog,
                emitted_disk_configs,
            },
            handle,
        )
    }

    pub fn state(&self) -> BrokerConnectionState {
        *self.state_rx.borrow()
    }

    pub fn topics(&self) -> &TopicSet {
        self.catalog.topics()
    }

    /// Retained availability publish; logged no-op when not Connected.
    pub async fn publish_availability(&self, status: &str) {
        if self.state() != BrokerConnectionState::Connected {
            tracing::debug!(status = %status, "Not connected, skipping availability publish");
            return;
        }
        publish_logged(&self.publisher, &self.catalog.topics().availability(), status, true).await;
    }

    /// Publish the full aggregated snapshot. Skipped entirely while not
    /// Connected; individual topic failures are logged and never abort the
    /// rest of the cycle.
    pub async fn publish_snapshot(&self, snapshot: &Snapshot) {
        if self.state() != BrokerConnectionState::Connected {
            tracing::debug!(operation = "publish_snapshot", "Not connected, skipping publish");
            return;
        }
        publish_snapshot_with(
            &self.publisher,
            &self.catalog,
            snapshot,
            &self.emitted_disk_configs,
        )
        .await;
    }

    /// Graceful counterpart to the last will: announce offline, wait for the
    /// queue to flush, then disconnect.
    pub async fn shutdown(&self) {
        if self.state() == BrokerConnectionState::Connected {
            publish_offline(&self.publisher, self.catalog.topics()).await;
            sleep(SHUTDOWN_FLUSH).await;
        }
        match timeout(PUBLISH_TIMEOUT, self.client.disconnect()).await {
            Ok(Ok(())) => tracing::info!("MQTT session shut down"),
            Ok(Err(e)) => tracing::warn!(error = %e, "MQTT disconnect failed"),
            Err(e) => tracing::warn!(error = %e, "MQTT disconnect timed out"),
        }
    }
}

/// Offline status and availability, retained, in that order, before the
/// connection goes away.
pub async fn publish_offline<P: SensorPublisher>(publisher: &P, topics: &TopicSet) {
    publish_logged(publisher, &topics.status(), "offline", true).await;
    publish_logged(publisher, &topics.availability(), "offline", true).await;
}

/// The per-cycle statistics publish sequence: retained status, cpu/memory
/// current + min/max/avg, per-disk value plus once-per-connection retained
/// config, then uptime. Best-effort throughout.
pub async fn publish_snapshot_with<P: SensorPublisher>(
    publisher: &P,
    catalog: &SensorCatalog,
    snapshot: &Snapshot,
    emitted_disk_configs: &Mutex<HashSet<String>>,
) {
    let topics = catalog.topics();
    publish_logged(publisher, &topics.status(), "online", true).await;

    for (metric, stat) in [
        (CPU_METRIC, &snapshot.metrics.cpu),
        (MEMORY_METRIC, &snapshot.metrics.memory),
    ] {
        let slug = metric_slug(metric);
        publish_logged(publisher, &topics.state(&slug), &stat.current.to_string(), false).await;
        for (variant, value) in [("min", stat.min), ("max", stat.max), ("avg", stat.avg)] {
            publish_logged(
                publisher,
                &topics.stat_state(&slug, variant),
                &value.to_string(),
                false,
            )
            .await;
        }
    }

    for (key, entry) in &snapshot.metrics.disk {
        publish_logged(
            publisher,
            &topics.disk_state(key),
            &entry.percent_used.to_string(),
            false,
        )
        .await;

        if mark_emitted(emitted_disk_configs, key) {
            let config = catalog.disk_config(entry);
            match serde_json::to_string(&config) {
                Ok(json) => {
                    if let Err(e) = publisher.publish(&topics.disk_config(key), &json, true).await {
                        tracing::warn!(error = %e, disk = %key, "disk config publish failed");
                        // Retry on the next cycle
                        unmark_emitted(emitted_disk_configs, key);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, disk = %key, "disk config serialization failed");
                    unmark_emitted(emitted_disk_configs, key);
                }
            }
        }
    }

    publish_logged(
        publisher,
        &topics.state("uptime"),
        &snapshot.uptime.seconds.to_string(),
        false,
    )
    .await;
    publish_logged(
        publisher,
        &topics.state("uptime_formatted"),
        &snapshot.uptime.formatted,
        false,
    )
    .await;
}

/// Returns true when this key's config has not yet been emitted on the
/// current connection.
fn mark_emitted(emitted: &Mutex<HashSet<String>>, key: &str) -> bool {
    match emitted.lock() {
        Ok(mut set) => set.insert(key.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "emitted-config lock poisoned");
            true
        }
    }
}

fn unmark_emitted(emitted: &Mutex<HashSet<String>>, key: &str) {
    if let Ok(mut set) = emitted.lock() {
        set.remove(key);
    }
}

async fn publish_logged<P: SensorPublisher>(publisher: &P, topic: &str, payload: &str, retain: bool) {
    if let Err(e) = publisher.publish(topic, payload, retain).await {
        tracing::warn!(error = %e, topic = %topic, "publish failed");
    }
}

/// Drives the rumqttc event loop. On ConnAck the connect cycle runs in its
/// own task so the loop keeps polling (publishes only flush while the loop
/// polls); on error the state drops to Disconnected and the loop backs off
/// before retrying. Never exits on broker failure.
async fn run_event_loop(
    mut eventloop: EventLoop,
    publisher: ClientPublisher,
    state_tx: Arc<watch::Sender<BrokerConnectionState>>,
    catalog: Arc<SensorCatalog>,
    cleanup_on_connect: bool,
    emitted_disk_configs: Arc<Mutex<HashSet<String>>>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("Connected to MQTT broker");
                if let Ok(mut set) = emitted_disk_configs.lock() {
                    set.clear();
                }
                let publisher = publisher.clone();
                let state_tx = state_tx.clone();
                let catalog = catalog.clone();
                tokio::spawn(async move {
                    if cleanup_on_connect {
                        discovery::cleanup_stale_topics(&publisher, catalog.topics()).await;
                        sleep(discovery::CLEANUP_SETTLE).await;
                    }
                    discovery::publish_discovery(&publisher, &catalog).await;
                    publish_logged(&publisher, &catalog.topics().availability(), "online", true)
                        .await;
                    let _ = state_tx.send(BrokerConnectionState::Connected);
                });
            }
            Ok(_) => {}
            Err(e) => {
                if *state_tx.borrow() != BrokerConnectionState::Disconnected {
                    tracing::warn!(error = %e, "MQTT connection lost, backing off");
                }
                let _ = state_tx.send(BrokerConnectionState::Disconnected);
                sleep(RECONNECT_BACKOFF).await;
                tracing::debug!("Retrying MQTT connection");
                let _ = state_tx.send(BrokerConnectionState::Connecting);
            }
        }
    }
}
