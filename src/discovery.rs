// Home Assistant MQTT discovery: topic derivation, retained config payloads,
// and cleanup of topics left behind by earlier naming schemes.

use crate::models::{DEVICE_MANUFACTURER, DEVICE_MODEL, DeviceIdentity, DiskEntry};
use crate::mqtt::SensorPublisher;
use serde::Serialize;
use tokio::time::Duration;

pub const SENSOR_ROOT: &str = "homeassistant/sensor";
pub const BINARY_SENSOR_ROOT: &str = "homeassistant/binary_sensor";

pub const CPU_METRIC: &str = "CPU Usage";
pub const MEMORY_METRIC: &str = "Memory (RAM) Usage";
pub const STAT_VARIANTS: [&str; 3] = ["min", "max", "avg"];

/// Delay between the cleanup pass and discovery publication, so a stale
/// deletion still in flight cannot overwrite the fresh config.
pub const CLEANUP_SETTLE: Duration = Duration::from_millis(500);

/// Topic-name derivation from a metric display name: lowercase, spaces to
/// underscores, parentheses stripped. Deterministic, so re-publishing never
/// produces duplicate topics.
pub fn metric_slug(display_name: &str) -> String {
    display_name
        .to_lowercase()
        .replace(' ', "_")
        .replace(['(', ')'], "")
}

/// All topic names for one device id, per the fixed namespace convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    sensor_base: String,
    binary_base: String,
}

impl TopicSet {
    pub fn new(device_id: &str) -> Self {
        Self {
            sensor_base: format!("{SENSOR_ROOT}/{device_id}"),
            binary_base: format!("{BINARY_SENSOR_ROOT}/{device_id}"),
        }
    }

    pub fn availability(&self) -> String {
        format!("{}/availability", self.binary_base)
    }

    pub fn status(&self) -> String {
        format!("{}/status", self.binary_base)
    }

    pub fn status_config(&self) -> String {
        format!("{}/status/config", self.binary_base)
    }

    pub fn state(&self, slug: &str) -> String {
        format!("{}/{slug}", self.sensor_base)
    }

    pub fn config(&self, slug: &str) -> String {
        format!("{}/{slug}/config", self.sensor_base)
    }

    pub fn stat_state(&self, slug: &str, stat: &str) -> String {
        format!("{}/{slug}_{stat}", self.sensor_base)
    }

    pub fn stat_config(&self, slug: &str, stat: &str) -> String {
        format!("{}/{slug}_{stat}/config", self.sensor_base)
    }

    pub fn disk_state(&self, key: &str) -> String {
        format!("{}/disk_{key}", self.sensor_base)
    }

    pub fn disk_config(&self, key: &str) -> String {
        format!("{}/disk_{key}/config", self.sensor_base)
    }

    fn resolve(&self, legacy: &LegacyTopic) -> String {
        match legacy.root {
            TopicRoot::Sensor => format!("{}/{}", self.sensor_base, legacy.suffix),
            TopicRoot::BinarySensor => format!("{}/{}", self.binary_base, legacy.suffix),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceBlock {
    pub identifiers: Vec<String>,
    pub name: String,
    pub model: String,
    pub manufacturer: String,
}

/// One retained discovery message describing a sensor to the hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryPayload {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub availability_topic: String,
    pub payload_available: String,
    pub payload_not_available: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    pub device: DeviceBlock,
}

/// Builds the discovery payloads for every sensor channel of one device.
#[derive(Debug, Clone)]
pub struct SensorCatalog {
    identity: DeviceIdentity,
    topics: TopicSet,
    device: DeviceBlock,
}

impl SensorCatalog {
    pub fn new(identity: DeviceIdentity) -> Self {
        let topics = TopicSet::new(&identity.device_id);
        let device = DeviceBlock {
            identifiers: vec![identity.device_id.clone()],
            name: identity.device_name.clone(),
            model: DEVICE_MODEL.into(),
            manufacturer: DEVICE_MANUFACTURER.into(),
        };
        Self {
            identity,
            topics,
            device,
        }
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    fn payload(&self, name: String, unique_suffix: &str, state_topic: String) -> DiscoveryPayload {
        DiscoveryPayload {
            name,
            unique_id: format!("{}_{unique_suffix}", self.identity.device_id),
            state_topic,
            availability_topic: self.topics.availability(),
            payload_available: "online".into(),
            payload_not_available: "offline".into(),
            payload_on: None,
            payload_off: None,
            unit_of_measurement: None,
            device_class: None,
            state_class: None,
            device: self.device.clone(),
        }
    }

    fn percent_payload(
        &self,
        name: String,
        unique_suffix: &str,
        state_topic: String,
    ) -> DiscoveryPayload {
        DiscoveryPayload {
            unit_of_measurement: Some("%".into()),
            device_class: Some("power".into()),
            state_class: Some("measurement".into()),
            ..self.payload(name, unique_suffix, state_topic)
        }
    }

    /// Binary connectivity sensor tracking the retained status topic.
    pub fn status_config(&self) -> DiscoveryPayload {
        DiscoveryPayload {
            payload_on: Some("online".into()),
            payload_off: Some("offline".into()),
            device_class: Some("connectivity".into()),
            ..self.payload(
                format!("{} Status", self.identity.device_name),
                "status",
                self.topics.status(),
            )
        }
    }

    pub fn metric_config(&self, display_name: &str) -> DiscoveryPayload {
        let slug = metric_slug(display_name);
        self.percent_payload(
            format!("{} {display_name}", self.identity.device_name),
            &slug,
            self.topics.state(&slug),
        )
    }

    pub fn statistic_config(&self, display_name: &str, stat: &str) -> DiscoveryPayload {
        let slug = metric_slug(display_name);
        self.percent_payload(
            format!("{} {display_name} ({})", self.identity.device_name, title(stat)),
            &format!("{slug}_{stat}"),
            self.topics.stat_state(&slug, stat),
        )
    }

    pub fn disk_config(&self, entry: &DiskEntry) -> DiscoveryPayload {
        self.percent_payload(
            format!(
                "{} Disk {} ({})",
                self.identity.device_name, entry.partition, entry.filesystem
            ),
            &format!("disk_{}", entry.key),
            self.topics.disk_state(&entry.key),
        )
    }

    pub fn uptime_config(&self) -> DiscoveryPayload {
        self.payload(
            format!("{} Uptime (Seconds)", self.identity.device_name),
            "uptime",
            self.topics.state("uptime"),
        )
    }

    pub fn uptime_formatted_config(&self) -> DiscoveryPayload {
        self.payload(
            format!("{} Uptime (Formatted)", self.identity.device_name),
            "uptime_formatted",
            self.topics.state("uptime_formatted"),
        )
    }

    /// The fixed discovery set published on every (re)connect. Per-disk
    /// configs are emitted lazily from the publish path as volumes appear.
    pub fn discovery_set(&self) -> Vec<(String, DiscoveryPayload)> {
        let mut set = vec![(self.topics.status_config(), self.status_config())];
        for metric in [CPU_METRIC, MEMORY_METRIC] {
            let slug = metric_slug(metric);
            set.push((self.topics.config(&slug), self.metric_config(metric)));
            for stat in STAT_VARIANTS {
                set.push((
                    self.topics.stat_config(&slug, stat),
                    self.statistic_config(metric, stat),
                ));
            }
        }
        set.push((self.topics.config("uptime"), self.uptime_config()));
        set.push((
            self.topics.config("uptime_formatted"),
            self.uptime_formatted_config(),
        ));
        set
    }
}

fn title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Publish one retained config per sensor channel. Best-effort: a failure on
/// one topic is logged and the rest are still published.
pub async fn publish_discovery<P: SensorPublisher>(publisher: &P, catalog: &SensorCatalog) {
    for (topic, payload) in catalog.discovery_set() {
        let json = match serde_json::to_string(&payload) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(error = %e, topic = %topic, "discovery payload serialization failed");
                continue;
            }
        };
        if let Err(e) = publisher.publish(&topic, &json, true).await {
            tracing::warn!(error = %e, topic = %topic, operation = "publish_discovery", "discovery publish failed");
        }
    }
    tracing::info!(operation = "publish_discovery", "Discovery configs published");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicRoot {
    Sensor,
    BinarySensor,
}

/// One historically-used topic and why it needs clearing.
pub struct LegacyTopic {
    pub root: TopicRoot,
    pub suffix: &'static str,
    pub reason: &'static str,
}

/// Retained config topics from earlier naming schemes. Known drift risk: this
/// table does not grow by itself when sensors are added; new naming-scheme
/// changes must append their old names here.
pub const LEGACY_CONFIG_TOPICS: &[LegacyTopic] = &[
    LegacyTopic {
        root: TopicRoot::BinarySensor,
        suffix: "status/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "cpu_usage/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "memory_ram_usage/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "cpu_usage_min/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "cpu_usage_max/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "cpu_usage_avg/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "memory_ram_usage_min/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "memory_ram_usage_max/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "memory_ram_usage_avg/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "uptime/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "uptime_formatted/config",
        reason: "re-announced fresh on every connect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "disk_c/config",
        reason: "pre-enumeration fixed drive-letter sensor",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "disk_d/config",
        reason: "pre-enumeration fixed drive-letter sensor",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "disk_e/config",
        reason: "pre-enumeration fixed drive-letter sensor",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "disk_f/config",
        reason: "pre-enumeration fixed drive-letter sensor",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "disk_g/config",
        reason: "pre-enumeration fixed drive-letter sensor",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "disk_h/config",
        reason: "pre-enumeration fixed drive-letter sensor",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "disk_root/config",
        reason: "pre-enumeration fixed mount sensor",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "disk_home/config",
        reason: "pre-enumeration fixed mount sensor",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "disk_boot/config",
        reason: "pre-enumeration fixed mount sensor",
    },
];

/// Retained state topics that may linger from earlier protocol versions.
pub const LEGACY_STATE_TOPICS: &[LegacyTopic] = &[
    LegacyTopic {
        root: TopicRoot::BinarySensor,
        suffix: "status",
        reason: "retained state replaced on reconnect",
    },
    LegacyTopic {
        root: TopicRoot::BinarySensor,
        suffix: "availability",
        reason: "retained state replaced on reconnect",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "cpu_usage",
        reason: "v0.1 published state retained",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "memory_ram_usage",
        reason: "v0.1 published state retained",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "uptime",
        reason: "v0.1 published state retained",
    },
    LegacyTopic {
        root: TopicRoot::Sensor,
        suffix: "uptime_formatted",
        reason: "v0.1 published state retained",
    },
];

/// Delete stale retained discovery entries by publishing empty retained
/// payloads to the historical topic list. Fire-and-forget: individual publish
/// failures are logged and skipped. The caller waits CLEANUP_SETTLE before
/// publishing fresh discovery configs.
pub async fn cleanup_stale_topics<P: SensorPublisher>(publisher: &P, topics: &TopicSet) {
    tracing::info!(operation = "cleanup_stale_topics", "Cleaning up old sensor topics");
    for legacy in LEGACY_CONFIG_TOPICS.iter().chain(LEGACY_STATE_TOPICS) {
        let topic = topics.resolve(legacy);
        match publisher.publish(&topic, "", true).await {
            Ok(()) => tracing::debug!(topic = %topic, reason = legacy.reason, "Cleaned up topic"),
            Err(e) => {
                tracing::warn!(error = %e, topic = %topic, "cleanup publish failed, skipping")
            }
        }
    }
}
