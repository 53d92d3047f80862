// Worker integration test: spawn the scheduler against an unreachable broker,
// tick, shut down, assert the shared snapshot was fed and the loop exits.

use deskmon::collector::{Collector, window_capacity};
use deskmon::config::MqttConfig;
use deskmon::models::{DeviceIdentity, Snapshot};
use deskmon::mqtt::{BrokerConnectionState, BrokerSession};
use deskmon::sysinfo_repo::SysinfoRepo;
use deskmon::worker::{WorkerConfig, WorkerDeps, spawn};
use std::sync::{Arc, RwLock};

fn unreachable_broker() -> MqttConfig {
    MqttConfig {
        host: "127.0.0.1".into(),
        port: 18_499, // nothing listens here
        ..Default::default()
    }
}

#[tokio::test]
async fn worker_ticks_and_shuts_down_without_a_broker() {
    let snapshot = Arc::new(RwLock::new(Snapshot::new()));
    let collector = Collector::new(
        Arc::new(SysinfoRepo::new()),
        snapshot.clone(),
        window_capacity(30, 1),
    );

    let identity = DeviceIdentity {
        device_id: "worker_test".into(),
        device_name: "Worker Test".into(),
    };
    let (session, mqtt_handle) = BrokerSession::connect(&unreachable_broker(), identity);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let worker_handle = spawn(
        WorkerDeps {
            collector,
            session,
            shutdown_rx,
        },
        WorkerConfig {
            collection_interval_secs: 1,
            publish_interval_secs: 30,
        },
    );

    // The first collection tick fires immediately; give it room to finish
    tokio::time::sleep(tokio::time::Duration::from_millis(900)).await;
    shutdown_tx.send(()).expect("worker alive");
    worker_handle.await.expect("worker join");
    mqtt_handle.abort();

    let snap = snapshot.read().unwrap();
    assert!(snap.timestamp > 0.0, "collect() should have run at least once");
    assert!(snap.uptime.seconds > 0.0);
    assert_eq!(snap.uptime.formatted.len(), 8);
}

#[tokio::test]
async fn session_never_reports_connected_without_a_broker() {
    let identity = DeviceIdentity {
        device_id: "state_test".into(),
        device_name: "State Test".into(),
    };
    let (session, mqtt_handle) = BrokerSession::connect(&unreachable_broker(), identity);

    tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;
    assert_ne!(session.state(), BrokerConnectionState::Connected);

    // Publishing while not connected is a logged no-op, never a panic
    session.publish_availability("online").await;
    session.shutdown().await;
    mqtt_handle.abort();
}
