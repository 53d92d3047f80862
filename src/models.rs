// Domain models: the unified snapshot published over MQTT and served over HTTP

use serde::Serialize;
use std::collections::BTreeMap;

/// Device block constants sent in every discovery payload.
pub const DEVICE_MODEL: &str = "Computer Activity Monitor";
pub const DEVICE_MANUFACTURER: &str = "Custom";

/// Snapshot status; the process only ever reports "online" in the snapshot
/// itself ("offline" exists only on the wire, via last will or shutdown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
}

/// One instantaneous reading, consumed immediately into the rolling windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub timestamp: f64,
}

/// Windowed statistics for one scalar metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Stat {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Per-volume usage; rebuilt wholesale on every collection tick.
/// `key` is stable across ticks so downstream topic names stay stable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskEntry {
    pub key: String,
    pub partition: String,
    pub filesystem: String,
    pub device: String,
    pub percent_used: f64,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiskEntry {
    /// Degraded entry for an unreadable volume: zero usage, error set in-band.
    pub fn degraded(key: String, partition: String, device: String, error: String) -> Self {
        Self {
            key,
            partition,
            filesystem: "Unknown".into(),
            device,
            percent_used: 0.0,
            total_gb: 0.0,
            used_gb: 0.0,
            free_gb: 0.0,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub cpu: Stat,
    pub memory: Stat,
    pub disk: BTreeMap<String, DiskEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Uptime {
    pub seconds: f64,
    pub formatted: String,
}

/// The unified, publishable aggregate. Single shared instance per process,
/// behind an RwLock: written by the collection task, read by the query and
/// publish paths.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub status: Status,
    pub timestamp: f64,
    pub metrics: Metrics,
    pub uptime: Uptime,
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            status: Status::Online,
            timestamp: 0.0,
            metrics: Metrics {
                cpu: Stat::default(),
                memory: Stat::default(),
                disk: BTreeMap::new(),
            },
            uptime: Uptime {
                seconds: 0.0,
                formatted: "00:00:00".into(),
            },
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable per-process identity; all topic names derive from `device_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub device_name: String,
}

/// Round to 2 decimal places (wire format for percentages and averages).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Format uptime as HH:MM:SS; hours wrap at 24 (time-of-day rendering).
pub fn format_uptime(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let hours = (total / 3600) % 24;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Seconds since the Unix epoch, rounded to 2 decimals.
pub fn epoch_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| round2(d.as_secs_f64()))
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0.0
        })
}
