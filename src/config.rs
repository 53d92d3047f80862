use serde::Deserialize;

use crate::models::DeviceIdentity;

/// Publish interval used when dev_mode is on (faster iteration against a live hub).
pub const DEV_PUBLISH_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Run the legacy-topic cleanup pass on each (re)connect.
    pub cleanup_on_connect: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            username: None,
            password: None,
            cleanup_on_connect: false,
        }
    }
}

impl MqttConfig {
    /// Both username and password, or no auth at all. A one-sided credential
    /// is treated as unauthenticated, not as a config error.
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => {
                Some((u.clone(), p.clone()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: Option<String>,
    pub id: Option<String>,
}

impl DeviceConfig {
    /// Resolve the per-process identity. Defaults derive from the hostname so
    /// the id stays stable across restarts without any configuration.
    pub fn identity(&self) -> DeviceIdentity {
        let hostname = sysinfo::System::host_name();
        let device_name = self
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| hostname.clone())
            .unwrap_or_else(|| "desktop".into());
        let device_id = self
            .id
            .clone()
            .filter(|i| !i.is_empty())
            .or_else(|| hostname.map(|h| slugify(&h)))
            .unwrap_or_else(|| "desktop_monitor".into());
        DeviceIdentity {
            device_id,
            device_name,
        }
    }
}

/// Lowercase; anything that is not alphanumeric becomes an underscore.
fn slugify(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub collection_interval_secs: u64,
    pub publish_interval_secs: u64,
    /// Shortens the publish interval for faster iteration.
    pub dev_mode: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            collection_interval_secs: 1,
            publish_interval_secs: 30,
            dev_mode: false,
        }
    }
}

impl MonitoringConfig {
    pub fn effective_publish_interval_secs(&self) -> u64 {
        if self.dev_mode {
            DEV_PUBLISH_INTERVAL_SECS.min(self.publish_interval_secs)
        } else {
            self.publish_interval_secs
        }
    }
}

impl AppConfig {
    /// Load from CONFIG_FILE (default config.toml). A missing file is not an
    /// error: everything has a workable default.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        match std::fs::read_to_string(&path) {
            Ok(s) => Self::load_from_str(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path, "No config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.mqtt.port > 0,
            "mqtt.port must be between 1 and 65535, got {}",
            self.mqtt.port
        );
        anyhow::ensure!(
            !self.mqtt.host.is_empty(),
            "mqtt.host must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.collection_interval_secs > 0,
            "monitoring.collection_interval_secs must be > 0, got {}",
            self.monitoring.collection_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.publish_interval_secs > 0,
            "monitoring.publish_interval_secs must be > 0, got {}",
            self.monitoring.publish_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.publish_interval_secs >= self.monitoring.collection_interval_secs,
            "monitoring.publish_interval_secs ({}) must be >= collection_interval_secs ({})",
            self.monitoring.publish_interval_secs,
            self.monitoring.collection_interval_secs
        );
        Ok(())
    }
}
