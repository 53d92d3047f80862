// Rolling-window metric aggregation feeding the shared snapshot

use crate::models::{DiskEntry, Sample, Snapshot, Stat, format_uptime, round2};
use crate::sysinfo_repo::SysinfoRepo;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};

/// Bounded FIFO of recent samples for one scalar metric. Oldest sample is
/// evicted when a push arrives at capacity.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Windowed statistics over the current contents. An empty window yields
    /// zeros rather than an error (startup, before the first sample lands).
    pub fn stats(&self) -> Stat {
        let Some(&current) = self.samples.back() else {
            return Stat::default();
        };
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sum = 0.0;
        for &v in &self.samples {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        Stat {
            current,
            min,
            max,
            avg: round2(sum / self.samples.len() as f64),
        }
    }
}

/// Samples per publish cycle; one sample per collection tick.
pub fn window_capacity(publish_interval_secs: u64, collection_interval_secs: u64) -> usize {
    (publish_interval_secs / collection_interval_secs.max(1)).max(1) as usize
}

/// Owns the rolling windows and is the single writer of the shared snapshot.
pub struct Collector {
    repo: Arc<SysinfoRepo>,
    cpu_window: RollingWindow,
    memory_window: RollingWindow,
    snapshot: Arc<RwLock<Snapshot>>,
}

impl Collector {
    pub fn new(repo: Arc<SysinfoRepo>, snapshot: Arc<RwLock<Snapshot>>, capacity: usize) -> Self {
        Self {
            repo,
            cpu_window: RollingWindow::new(capacity),
            memory_window: RollingWindow::new(capacity),
            snapshot,
        }
    }

    /// One collection tick: query the OS, then fold into windows and snapshot.
    pub async fn collect(&mut self) -> anyhow::Result<()> {
        let sample = self.repo.sample().await?;
        let disks = self.repo.sample_disks().await?;
        let uptime_secs = self.repo.sample_uptime_secs();
        self.apply(sample, disks, uptime_secs)
    }

    /// Fold one sample into the windows and the shared snapshot: updates
    /// current values, replaces the disk map wholesale, refreshes uptime and
    /// timestamp. Split from collect() so the cadence logic runs without the OS.
    pub fn apply(
        &mut self,
        sample: Sample,
        disks: Vec<DiskEntry>,
        uptime_secs: f64,
    ) -> anyhow::Result<()> {
        self.cpu_window.push(sample.cpu_percent);
        self.memory_window.push(sample.memory_percent);

        let disk_map: BTreeMap<String, DiskEntry> =
            disks.into_iter().map(|d| (d.key.clone(), d)).collect();

        let mut snap = self
            .snapshot
            .write()
            .map_err(|e| anyhow::anyhow!("snapshot lock poisoned: {}", e))?;
        snap.metrics.cpu.current = round2(sample.cpu_percent);
        snap.metrics.memory.current = round2(sample.memory_percent);
        snap.metrics.disk = disk_map;
        snap.uptime.seconds = round2(uptime_secs);
        snap.uptime.formatted = format_uptime(uptime_secs);
        snap.timestamp = sample.timestamp;

        tracing::debug!(
            cpu = sample.cpu_percent,
            memory = sample.memory_percent,
            operation = "collect",
            "Collected metrics"
        );
        Ok(())
    }

    /// Recompute min/max/avg for cpu and memory from the rolling windows and
    /// return a clone of the snapshot for publishing. Called once per publish
    /// cycle, after the last collect() of that cycle.
    pub fn aggregate(&self) -> anyhow::Result<Snapshot> {
        let cpu = self.cpu_window.stats();
        let memory = self.memory_window.stats();

        let mut snap = self
            .snapshot
            .write()
            .map_err(|e| anyhow::anyhow!("snapshot lock poisoned: {}", e))?;
        // current belongs to apply(); only the window stats are refreshed here.
        snap.metrics.cpu.min = cpu.min;
        snap.metrics.cpu.max = cpu.max;
        snap.metrics.cpu.avg = cpu.avg;
        snap.metrics.memory.min = memory.min;
        snap.metrics.memory.max = memory.max;
        snap.metrics.memory.avg = memory.avg;
        Ok(snap.clone())
    }

    /// The live snapshot as of the most recent collect(), independent of the
    /// aggregate cadence.
    pub fn current_snapshot(&self) -> anyhow::Result<Snapshot> {
        let snap = self
            .snapshot
            .read()
            .map_err(|e| anyhow::anyhow!("snapshot lock poisoned: {}", e))?;
        Ok(snap.clone())
    }
}
