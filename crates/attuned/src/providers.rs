//! Snapshot providers - the telemetry boundary.
//!
//! The orchestrator pulls a [`SystemSnapshot`] and an
//! [`ActivitySnapshot`] once per cycle through the [`SnapshotProvider`]
//! trait. Production uses [`SysinfoProvider`]; tests use
//! [`FakeSnapshotProvider`] with scripted snapshots and failure
//! injection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use sysinfo::{Components, DiskKind, Disks, System};
use tokio::sync::Mutex;

use attune_common::{ActivitySnapshot, SnapshotError, StorageKind, SystemSnapshot};

/// Read-only, pull-based snapshot source.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn system_snapshot(&self) -> Result<SystemSnapshot, SnapshotError>;
    async fn activity_snapshot(&self) -> Result<ActivitySnapshot, SnapshotError>;
}

// ============================================================================
// Sysinfo Provider (Production)
// ============================================================================

/// Provider backed by the sysinfo crate.
///
/// Keeps one `System` alive so CPU usage deltas accumulate between
/// cycles. GPU utilization is reported as zero; GPU telemetry comes
/// from a dedicated collaborator when one is wired in.
pub struct SysinfoProvider {
    system: Mutex<System>,
}

impl SysinfoProvider {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }

    fn cpu_temperature() -> Option<f32> {
        let components = Components::new_with_refreshed_list();
        components
            .iter()
            .filter(|c| {
                let label = c.label().to_lowercase();
                label.contains("cpu") || label.contains("core") || label.contains("tctl")
            })
            .map(|c| c.temperature())
            .fold(None, |max, t| match max {
                Some(m) if m >= t => Some(m),
                _ => Some(t),
            })
    }

    fn root_storage_kind() -> StorageKind {
        let disks = Disks::new_with_refreshed_list();
        let root = disks
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .or_else(|| disks.iter().next());

        match root {
            Some(disk) => {
                if disk.name().to_string_lossy().to_lowercase().contains("nvme") {
                    StorageKind::Nvme
                } else {
                    match disk.kind() {
                        DiskKind::SSD => StorageKind::Ssd,
                        DiskKind::HDD => StorageKind::Hdd,
                        DiskKind::Unknown(_) => StorageKind::Unknown,
                    }
                }
            }
            None => StorageKind::Unknown,
        }
    }
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotProvider for SysinfoProvider {
    async fn system_snapshot(&self) -> Result<SystemSnapshot, SnapshotError> {
        let mut sys = self.system.lock().await;
        sys.refresh_cpu();
        sys.refresh_memory();

        let total = sys.total_memory();
        let ram_utilization = if total == 0 {
            0.0
        } else {
            sys.used_memory() as f64 / total as f64
        };

        Ok(SystemSnapshot {
            cpu_utilization: (sys.global_cpu_info().cpu_usage() as f64 / 100.0).clamp(0.0, 1.0),
            gpu_utilization: 0.0,
            ram_utilization: ram_utilization.clamp(0.0, 1.0),
            cpu_temperature: Self::cpu_temperature(),
            core_count: num_cpus::get(),
            storage: Self::root_storage_kind(),
            captured_at: Utc::now(),
        })
    }

    async fn activity_snapshot(&self) -> Result<ActivitySnapshot, SnapshotError> {
        let mut sys = self.system.lock().await;
        sys.refresh_processes();

        let processes: Vec<String> = sys
            .processes()
            .values()
            .map(|p| p.name().to_string())
            .collect();

        Ok(ActivitySnapshot {
            processes,
            active_window: None,
            category: None,
            captured_at: Utc::now(),
        })
    }
}

// ============================================================================
// Fake Provider (Testing)
// ============================================================================

/// Deterministic provider for tests: scripted activity snapshots, a
/// fixed system snapshot, and per-call failure switches.
pub struct FakeSnapshotProvider {
    system: SystemSnapshot,
    scripted_activities: Mutex<VecDeque<ActivitySnapshot>>,
    default_activity: ActivitySnapshot,
    fail_system: AtomicBool,
    fail_activity: AtomicBool,
    system_calls: AtomicUsize,
    activity_calls: AtomicUsize,
}

impl FakeSnapshotProvider {
    /// Provider reporting the given processes on every cycle.
    pub fn with_processes(processes: &[&str]) -> Self {
        FakeSnapshotProviderBuilder::new()
            .default_processes(processes)
            .build()
    }

    pub fn system_calls(&self) -> usize {
        self.system_calls.load(Ordering::SeqCst)
    }

    pub fn activity_calls(&self) -> usize {
        self.activity_calls.load(Ordering::SeqCst)
    }

    /// Flip system snapshot acquisition on or off.
    pub fn set_fail_system(&self, fail: bool) {
        self.fail_system.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_activity(&self, fail: bool) {
        self.fail_activity.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SnapshotProvider for FakeSnapshotProvider {
    async fn system_snapshot(&self) -> Result<SystemSnapshot, SnapshotError> {
        self.system_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_system.load(Ordering::SeqCst) {
            return Err(SnapshotError::Unavailable("fake system failure".to_string()));
        }
        Ok(self.system.clone())
    }

    async fn activity_snapshot(&self) -> Result<ActivitySnapshot, SnapshotError> {
        self.activity_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_activity.load(Ordering::SeqCst) {
            return Err(SnapshotError::Unavailable(
                "fake activity failure".to_string(),
            ));
        }
        let mut scripted = self.scripted_activities.lock().await;
        Ok(scripted.pop_front().unwrap_or_else(|| self.default_activity.clone()))
    }
}

/// Builder for [`FakeSnapshotProvider`].
pub struct FakeSnapshotProviderBuilder {
    system: SystemSnapshot,
    scripted: VecDeque<ActivitySnapshot>,
    default_activity: ActivitySnapshot,
}

impl FakeSnapshotProviderBuilder {
    pub fn new() -> Self {
        Self {
            system: SystemSnapshot::idle(8),
            scripted: VecDeque::new(),
            default_activity: ActivitySnapshot::new(vec![]),
        }
    }

    pub fn system(mut self, system: SystemSnapshot) -> Self {
        self.system = system;
        self
    }

    /// Processes reported once the script runs out.
    pub fn default_processes(mut self, processes: &[&str]) -> Self {
        self.default_activity =
            ActivitySnapshot::new(processes.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Queue one activity snapshot; scripted snapshots are served in
    /// order before the default kicks in.
    pub fn activity(mut self, processes: &[&str]) -> Self {
        self.scripted.push_back(ActivitySnapshot::new(
            processes.iter().map(|p| p.to_string()).collect(),
        ));
        self
    }

    pub fn build(self) -> FakeSnapshotProvider {
        FakeSnapshotProvider {
            system: self.system,
            scripted_activities: Mutex::new(self.scripted),
            default_activity: self.default_activity,
            fail_system: AtomicBool::new(false),
            fail_activity: AtomicBool::new(false),
            system_calls: AtomicUsize::new(0),
            activity_calls: AtomicUsize::new(0),
        }
    }
}

impl Default for FakeSnapshotProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_provider_default_activity() {
        let provider = FakeSnapshotProvider::with_processes(&["steam", "obs"]);

        let activity = provider.activity_snapshot().await.unwrap();
        assert!(activity.mentions_process("steam"));
        assert_eq!(provider.activity_calls(), 1);
    }

    #[tokio::test]
    async fn test_fake_provider_scripted_then_default() {
        let provider = FakeSnapshotProviderBuilder::new()
            .activity(&["steam"])
            .default_processes(&[])
            .build();

        let first = provider.activity_snapshot().await.unwrap();
        assert!(first.mentions_process("steam"));

        let second = provider.activity_snapshot().await.unwrap();
        assert!(second.processes.is_empty());
    }

    #[tokio::test]
    async fn test_fake_provider_failure_injection() {
        let provider = FakeSnapshotProvider::with_processes(&[]);
        provider.set_fail_system(true);
        assert!(provider.system_snapshot().await.is_err());

        provider.set_fail_system(false);
        assert!(provider.system_snapshot().await.is_ok());
    }
}
