// Sample source: key derivation and live OS sampling

use deskmon::sysinfo_repo::{SysinfoRepo, disk_key};

#[test]
fn disk_keys_are_stable_and_topic_safe() {
    assert_eq!(disk_key("/"), "root");
    assert_eq!(disk_key("/home"), "home");
    assert_eq!(disk_key("/boot/efi"), "boot_efi");
    assert_eq!(disk_key("/mnt/data"), "mnt_data");
    assert_eq!(disk_key("C:\\"), "c");
    assert_eq!(disk_key("D:"), "d");

    // Deriving twice from the same mount yields the same key
    assert_eq!(disk_key("/mnt/data"), disk_key("/mnt/data"));
}

#[tokio::test]
async fn live_samples_are_in_range() {
    let repo = SysinfoRepo::new();

    let cpu = repo.sample_cpu().await.expect("cpu");
    assert!((0.0..=100.0).contains(&cpu), "cpu% out of range: {cpu}");

    let memory = repo.sample_memory().await.expect("memory");
    assert!(
        (0.0..=100.0).contains(&memory),
        "memory% out of range: {memory}"
    );

    assert!(repo.sample_uptime_secs() >= 0.0);
}

#[tokio::test]
async fn disk_enumeration_yields_stable_unique_keys() {
    let repo = SysinfoRepo::new();
    let first = repo.sample_disks().await.expect("disks");
    let second = repo.sample_disks().await.expect("disks");

    let first_keys: Vec<&str> = first.iter().map(|d| d.key.as_str()).collect();
    let second_keys: Vec<&str> = second.iter().map(|d| d.key.as_str()).collect();
    assert_eq!(first_keys, second_keys, "keys must be stable across ticks");

    for entry in &first {
        assert!(!entry.key.is_empty());
        if entry.error.is_none() {
            assert!((0.0..=100.0).contains(&entry.percent_used));
            assert!(entry.total_gb >= entry.used_gb);
        }
    }
}
