// Rolling window and aggregation behavior

mod common;

use common::disk_entry;
use deskmon::collector::{Collector, RollingWindow, window_capacity};
use deskmon::models::{Sample, Snapshot};
use deskmon::sysinfo_repo::SysinfoRepo;
use std::sync::{Arc, RwLock};

fn sample(cpu: f64, memory: f64) -> Sample {
    Sample {
        cpu_percent: cpu,
        memory_percent: memory,
        timestamp: 1_700_000_000.0,
    }
}

fn test_collector(capacity: usize) -> (Collector, Arc<RwLock<Snapshot>>) {
    let snapshot = Arc::new(RwLock::new(Snapshot::new()));
    let collector = Collector::new(
        Arc::new(SysinfoRepo::new()),
        snapshot.clone(),
        capacity,
    );
    (collector, snapshot)
}

#[test]
fn window_never_exceeds_capacity_and_keeps_newest() {
    let mut window = RollingWindow::new(5);
    for i in 0..12 {
        window.push(i as f64);
        assert!(window.len() <= 5);
    }
    assert_eq!(window.len(), 5);
    let contents: Vec<f64> = window.iter().collect();
    assert_eq!(contents, vec![7.0, 8.0, 9.0, 10.0, 11.0]);
}

#[test]
fn window_stats_min_max_avg() {
    let mut window = RollingWindow::new(10);
    for v in [10.0, 20.0, 30.0] {
        window.push(v);
    }
    let stats = window.stats();
    assert_eq!(stats.current, 30.0);
    assert_eq!(stats.min, 10.0);
    assert_eq!(stats.max, 30.0);
    assert_eq!(stats.avg, 20.0);
}

#[test]
fn empty_window_stats_are_zero() {
    let window = RollingWindow::new(30);
    let stats = window.stats();
    assert_eq!(stats.current, 0.0);
    assert_eq!(stats.min, 0.0);
    assert_eq!(stats.max, 0.0);
    assert_eq!(stats.avg, 0.0);
}

#[test]
fn average_is_rounded_to_two_decimals() {
    let mut window = RollingWindow::new(10);
    for v in [10.0, 20.0, 35.0] {
        window.push(v);
    }
    assert_eq!(window.stats().avg, 21.67);
}

#[test]
fn window_capacity_from_intervals() {
    assert_eq!(window_capacity(30, 1), 30);
    assert_eq!(window_capacity(10, 2), 5);
    // Long interval shorter than one collection tick still gets one slot
    assert_eq!(window_capacity(1, 5), 1);
}

#[test]
fn zero_capacity_window_still_holds_one_sample() {
    let mut window = RollingWindow::new(0);
    window.push(42.0);
    assert_eq!(window.len(), 1);
    assert_eq!(window.capacity(), 1);
}

#[test]
fn collect_then_aggregate_end_to_end() {
    // collection interval 1, publish interval 3: capacity 3
    let (mut collector, _snapshot) = test_collector(window_capacity(3, 1));

    for (cpu, mem) in [(10.0, 40.0), (20.0, 50.0), (30.0, 60.0)] {
        collector
            .apply(sample(cpu, mem), vec![disk_entry("root", "/", 42.5)], 3661.0)
            .unwrap();
    }

    let snapshot = collector.aggregate().unwrap();
    assert_eq!(snapshot.metrics.cpu.current, 30.0);
    assert_eq!(snapshot.metrics.cpu.min, 10.0);
    assert_eq!(snapshot.metrics.cpu.max, 30.0);
    assert_eq!(snapshot.metrics.cpu.avg, 20.0);
    assert_eq!(snapshot.metrics.memory.avg, 50.0);
    assert_eq!(snapshot.uptime.seconds, 3661.0);
    assert_eq!(snapshot.uptime.formatted, "01:01:01");
    assert!(snapshot.metrics.disk.contains_key("root"));
}

#[test]
fn aggregate_on_empty_windows_yields_zeros() {
    let (collector, _snapshot) = test_collector(30);
    let snapshot = collector.aggregate().unwrap();
    assert_eq!(snapshot.metrics.cpu.min, 0.0);
    assert_eq!(snapshot.metrics.cpu.max, 0.0);
    assert_eq!(snapshot.metrics.cpu.avg, 0.0);
}

#[test]
fn current_snapshot_reflects_latest_collect_without_aggregate() {
    let (mut collector, _snapshot) = test_collector(30);
    collector
        .apply(sample(12.5, 33.0), vec![], 10.0)
        .unwrap();
    let snap = collector.current_snapshot().unwrap();
    assert_eq!(snap.metrics.cpu.current, 12.5);
    assert_eq!(snap.metrics.memory.current, 33.0);
    // min/max/avg untouched until aggregate() runs
    assert_eq!(snap.metrics.cpu.min, 0.0);
}

#[test]
fn aggregate_leaves_current_values_untouched() {
    let (mut collector, _snapshot) = test_collector(30);
    collector
        .apply(sample(21.666666, 55.554444), vec![], 10.0)
        .unwrap();

    let before = collector.current_snapshot().unwrap();
    assert_eq!(before.metrics.cpu.current, 21.67);

    let aggregated = collector.aggregate().unwrap();
    assert_eq!(aggregated.metrics.cpu.current, 21.67);
    assert_eq!(aggregated.metrics.memory.current, 55.55);

    let after = collector.current_snapshot().unwrap();
    assert_eq!(after.metrics.cpu.current, before.metrics.cpu.current);
}

#[test]
fn disk_map_is_replaced_wholesale_each_tick() {
    let (mut collector, _snapshot) = test_collector(30);
    collector
        .apply(sample(1.0, 1.0), vec![disk_entry("root", "/", 10.0)], 1.0)
        .unwrap();
    collector
        .apply(sample(2.0, 2.0), vec![disk_entry("data", "/mnt/data", 20.0)], 2.0)
        .unwrap();

    let snap = collector.current_snapshot().unwrap();
    assert!(!snap.metrics.disk.contains_key("root"));
    assert_eq!(snap.metrics.disk["data"].percent_used, 20.0);
}

#[test]
fn window_eviction_shifts_statistics() {
    // Capacity 3: a fourth sample evicts the first
    let (mut collector, _snapshot) = test_collector(3);
    for cpu in [10.0, 20.0, 30.0, 40.0] {
        collector.apply(sample(cpu, 0.0), vec![], 0.0).unwrap();
    }
    let snapshot = collector.aggregate().unwrap();
    assert_eq!(snapshot.metrics.cpu.min, 20.0);
    assert_eq!(snapshot.metrics.cpu.max, 40.0);
    assert_eq!(snapshot.metrics.cpu.avg, 30.0);
}
