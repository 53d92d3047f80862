// Background scheduler: collection ticks feed the rolling windows, publish
// ticks aggregate and push the snapshot to the broker.

use crate::collector::Collector;
use crate::mqtt::BrokerSession;
use tokio::time::{Duration, Instant, interval, interval_at};

/// Collector, session, and shutdown for the worker.
pub struct WorkerDeps {
    pub collector: Collector,
    pub session: BrokerSession,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

pub struct WorkerConfig {
    pub collection_interval_secs: u64,
    pub publish_interval_secs: u64,
}

pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        mut collector,
        session,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        collection_interval_secs,
        publish_interval_secs,
    } = config;

    tokio::spawn(async move {
        let mut collect_tick = interval(Duration::from_secs(collection_interval_secs));
        collect_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First publish waits one full window, so a cycle's collects always
        // precede its aggregate.
        let publish_interval = Duration::from_secs(publish_interval_secs);
        let mut publish_tick = interval_at(Instant::now() + publish_interval, publish_interval);
        publish_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let worker_span = tracing::span!(
            tracing::Level::DEBUG,
            "worker",
            collection_interval_secs,
            publish_interval_secs
        );
        let _guard = worker_span.enter();

        loop {
            tokio::select! {
                _ = collect_tick.tick() => {
                    if let Err(e) = collector.collect().await {
                        tracing::warn!(error = %e, operation = "collect", "metric collection failed");
                    }
                }
                _ = publish_tick.tick() => {
                    match collector.aggregate() {
                        Ok(snapshot) => session.publish_snapshot(&snapshot).await,
                        Err(e) => {
                            tracing::warn!(error = %e, operation = "aggregate", "aggregation failed");
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
            }
        }
        session.shutdown().await;
    })
}
