// Shared test helpers
#![allow(dead_code)]

use deskmon::models::*;
use deskmon::mqtt::SensorPublisher;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishRecord {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Test double for the publish seam: records successful publishes in call
/// order, fails for topics listed in `fail_topics`.
#[derive(Default)]
pub struct RecordingPublisher {
    records: Mutex<Vec<PublishRecord>>,
    fail_topics: HashSet<String>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing<I: IntoIterator<Item = String>>(topics: I) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_topics: topics.into_iter().collect(),
        }
    }

    pub fn records(&self) -> Vec<PublishRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.topic).collect()
    }
}

impl SensorPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> anyhow::Result<()> {
        if self.fail_topics.contains(topic) {
            anyhow::bail!("simulated publish failure: {topic}");
        }
        self.records.lock().unwrap().push(PublishRecord {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        });
        Ok(())
    }
}

pub fn test_identity() -> DeviceIdentity {
    DeviceIdentity {
        device_id: "dev1".into(),
        device_name: "Test Desktop".into(),
    }
}

pub fn disk_entry(key: &str, partition: &str, percent: f64) -> DiskEntry {
    DiskEntry {
        key: key.into(),
        partition: partition.into(),
        filesystem: "ext4".into(),
        device: "/dev/sda1".into(),
        percent_used: percent,
        total_gb: 100.0,
        used_gb: percent,
        free_gb: 100.0 - percent,
        error: None,
    }
}

pub fn sample_snapshot() -> Snapshot {
    let mut disk = BTreeMap::new();
    disk.insert("root".to_string(), disk_entry("root", "/", 42.5));
    disk.insert("data".to_string(), disk_entry("data", "/mnt/data", 61.0));
    Snapshot {
        status: Status::Online,
        timestamp: 1_700_000_000.12,
        metrics: Metrics {
            cpu: Stat {
                current: 30.0,
                min: 10.0,
                max: 30.0,
                avg: 20.0,
            },
            memory: Stat {
                current: 55.5,
                min: 50.0,
                max: 60.0,
                avg: 55.17,
            },
            disk,
        },
        uptime: Uptime {
            seconds: 3661.0,
            formatted: "01:01:01".into(),
        },
    }
}
