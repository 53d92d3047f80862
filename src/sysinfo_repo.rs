// Host metrics via sysinfo (psutil equivalent)

use crate::models::{DiskEntry, Sample, epoch_seconds, round2};
use std::sync::Arc;
use sysinfo::{Disks, System};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Stable per-volume key derived from the mount point or drive letter.
/// "C:\" -> "c", "/" -> "root", "/mnt/data" -> "mnt_data".
pub fn disk_key(mount: &str) -> String {
    let trimmed = mount.trim_end_matches(['\\', '/']);
    if trimmed.len() == 2 && trimmed.ends_with(':') {
        if let Some(letter) = trimmed.chars().next() {
            return letter.to_ascii_lowercase().to_string();
        }
    }
    let path = trimmed.trim_start_matches('/');
    if path.is_empty() {
        return "root".into();
    }
    path.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Volume enumeration capability, selected once at startup by platform.
pub trait DiskEnumerator: Send + Sync {
    fn enumerate(&self, disks: &Disks) -> Vec<DiskEntry>;
}

/// Windows: fixed drives keyed by drive letter; anything without one is skipped.
pub struct DriveLetterEnumerator;

impl DiskEnumerator for DriveLetterEnumerator {
    fn enumerate(&self, disks: &Disks) -> Vec<DiskEntry> {
        disks
            .list()
            .iter()
            .filter(|d| {
                let mount = d.mount_point().to_string_lossy();
                mount.trim_end_matches('\\').ends_with(':')
            })
            .map(entry_from_disk)
            .collect()
    }
}

/// Generic: every mounted partition sysinfo reports, keyed by mount path.
pub struct PartitionEnumerator;

impl DiskEnumerator for PartitionEnumerator {
    fn enumerate(&self, disks: &Disks) -> Vec<DiskEntry> {
        disks.list().iter().map(entry_from_disk).collect()
    }
}

pub fn platform_enumerator() -> Arc<dyn DiskEnumerator> {
    if cfg!(windows) {
        Arc::new(DriveLetterEnumerator)
    } else {
        Arc::new(PartitionEnumerator)
    }
}

fn entry_from_disk(d: &sysinfo::Disk) -> DiskEntry {
    let mount = d.mount_point().to_string_lossy().into_owned();
    let device = d.name().to_string_lossy().into_owned();
    let key = disk_key(&mount);
    let total = d.total_space();
    if total == 0 {
        // Unreadable or empty volume: degrade this entry, never the whole call
        return DiskEntry::degraded(key, mount, device, "volume reports no capacity".into());
    }
    let available = d.available_space();
    let used = total.saturating_sub(available);
    DiskEntry {
        key,
        partition: mount,
        filesystem: d.file_system().to_string_lossy().into_owned(),
        device,
        percent_used: round2((used as f64 / total as f64) * 100.0),
        total_gb: round2(total as f64 / GIB),
        used_gb: round2(used as f64 / GIB),
        free_gb: round2(available as f64 / GIB),
        error: None,
    }
}

pub struct SysinfoRepo {
    sys: Arc<std::sync::Mutex<System>>,
    disks: Arc<std::sync::Mutex<Disks>>,
    enumerator: Arc<dyn DiskEnumerator>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        Self::with_enumerator(platform_enumerator())
    }

    pub fn with_enumerator(enumerator: Arc<dyn DiskEnumerator>) -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        let disks = Disks::new_with_refreshed_list();
        Self {
            sys: Arc::new(std::sync::Mutex::new(sys)),
            disks: Arc::new(std::sync::Mutex::new(disks)),
            enumerator,
        }
    }

    pub async fn sample_cpu(&self) -> anyhow::Result<f64> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_cpu_all();
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            sys.refresh_cpu_all();
            Ok(sys.global_cpu_usage() as f64)
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    pub async fn sample_memory(&self) -> anyhow::Result<f64> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_memory();
            let total = sys.total_memory();
            let used = total.saturating_sub(sys.available_memory());
            let percent = if total > 0 {
                (used as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            Ok(percent)
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    pub fn sample_uptime_secs(&self) -> f64 {
        System::uptime() as f64
    }

    pub async fn sample_disks(&self) -> anyhow::Result<Vec<DiskEntry>> {
        let disks = self.disks.clone();
        let enumerator = self.enumerator.clone();
        tokio::task::spawn_blocking(move || {
            let mut disks_guard = disks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo disks lock poisoned: {}", e))?;
            disks_guard.refresh(false);
            Ok(enumerator.enumerate(&disks_guard))
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    /// One instantaneous cpu+memory reading with its timestamp.
    pub async fn sample(&self) -> anyhow::Result<Sample> {
        let cpu_percent = self.sample_cpu().await?;
        let memory_percent = self.sample_memory().await?;
        Ok(Sample {
            cpu_percent,
            memory_percent,
            timestamp: epoch_seconds(),
        })
    }
}
