//! Host resource reporting

use async_trait::async_trait;
use flex_core::{Error, HostResources, Result};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Trait for host capacity reporting
#[async_trait]
pub trait HostOps: Send + Sync {
    /// Resource inventory for `nodename`
    async fn get_available_resource(&self, nodename: &str) -> Result<HostResources>;

    /// Host statistics, re-read when `refresh` is set or nothing is cached
    async fn get_host_stats(&self, refresh: bool) -> Result<HostResources>;
}

/// Reports the resources of the machine the driver runs on
///
/// CPUs come from the scheduler's view of available parallelism, memory from
/// `/proc/meminfo` and disk from the filesystem holding the instances path.
#[derive(Debug)]
pub struct LocalHostOps {
    nodename: String,
    instances_path: PathBuf,
    proc_root: PathBuf,
    cache: Mutex<Option<HostResources>>,
}

impl LocalHostOps {
    /// Create host ops for `nodename` with instances under `instances_path`
    #[must_use]
    pub fn new(nodename: impl Into<String>, instances_path: impl Into<PathBuf>) -> Self {
        Self {
            nodename: nodename.into(),
            instances_path: instances_path.into(),
            proc_root: PathBuf::from("/proc"),
            cache: Mutex::new(None),
        }
    }

    /// Read `meminfo` and `sys/kernel/osrelease` from another proc root
    #[must_use]
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    async fn collect(&self, nodename: &str) -> Result<HostResources> {
        let vcpus = std::thread::available_parallelism()
            .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
            .unwrap_or(1);

        let meminfo = tokio::fs::read_to_string(self.proc_root.join("meminfo")).await?;
        let memory = parse_meminfo(&meminfo)?;

        let release =
            tokio::fs::read_to_string(self.proc_root.join("sys/kernel/osrelease")).await?;

        let path = self.instances_path.clone();
        let disk = tokio::task::spawn_blocking(move || disk_usage_gb(&path)).await??;

        let resources = HostResources {
            vcpus,
            memory_mb: memory.total_kb / 1024,
            local_gb: disk.total_gb,
            vcpus_used: 0,
            memory_mb_used: memory.total_kb.saturating_sub(memory.available_kb) / 1024,
            local_gb_used: disk.used_gb,
            hypervisor_type: HostResources::HYPERVISOR_TYPE.to_string(),
            hypervisor_version: kernel_version(&release),
            hypervisor_hostname: nodename.to_string(),
            cpu_info: serde_json::json!({
                "arch": std::env::consts::ARCH,
                "topology": { "cpus": vcpus },
            })
            .to_string(),
        };

        tracing::debug!(
            nodename,
            vcpus = resources.vcpus,
            memory_mb = resources.memory_mb,
            local_gb = resources.local_gb,
            "Collected host resources"
        );

        Ok(resources)
    }
}

#[async_trait]
impl HostOps for LocalHostOps {
    async fn get_available_resource(&self, nodename: &str) -> Result<HostResources> {
        self.collect(nodename).await
    }

    async fn get_host_stats(&self, refresh: bool) -> Result<HostResources> {
        let mut cache = self.cache.lock().await;

        if let Some(stats) = cache.as_ref().filter(|_| !refresh) {
            return Ok(stats.clone());
        }

        let stats = self.collect(&self.nodename).await?;
        *cache = Some(stats.clone());
        Ok(stats)
    }
}

/// Memory figures from `/proc/meminfo`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemInfo {
    /// `MemTotal` in KB
    pub total_kb: u64,
    /// `MemAvailable` in KB (falls back to `MemFree`)
    pub available_kb: u64,
}

/// Parse the total and available memory from `/proc/meminfo`
pub fn parse_meminfo(contents: &str) -> Result<MemInfo> {
    let field = |name: &str| {
        contents.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            rest.split_whitespace().next()?.parse::<u64>().ok()
        })
    };

    let total_kb = field("MemTotal").ok_or_else(|| Error::InvalidConfig {
        message: "meminfo has no MemTotal".to_string(),
    })?;
    let available_kb = field("MemAvailable").or_else(|| field("MemFree")).unwrap_or(0);

    Ok(MemInfo {
        total_kb,
        available_kb,
    })
}

/// Encode a kernel release (`6.1.0-13-amd64`) as `major * 1_000_000 + minor * 1_000 + patch`
#[must_use]
pub fn kernel_version(release: &str) -> u64 {
    let numeric = release
        .trim()
        .split(|c: char| !c.is_ascii_digit() && c != '.')
        .next()
        .unwrap_or_default();

    let mut parts = numeric.split('.').map(|p| p.parse::<u64>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);

    major
        .saturating_mul(1_000_000)
        .saturating_add(minor.saturating_mul(1_000))
        .saturating_add(patch)
}

struct DiskUsage {
    total_gb: u64,
    used_gb: u64,
}

fn disk_usage_gb(path: &Path) -> Result<DiskUsage> {
    // the instances path may not exist before the first spawn
    let existing = path
        .ancestors()
        .find(|p| p.exists())
        .unwrap_or_else(|| Path::new("/"));

    let stat = nix::sys::statvfs::statvfs(existing)?;
    let fragment = stat.fragment_size() as u64;
    let total = stat.blocks() as u64 * fragment;
    let free = stat.blocks_available() as u64 * fragment;

    const GB: u64 = 1024 * 1024 * 1024;
    Ok(DiskUsage {
        total_gb: total / GB,
        used_gb: total.saturating_sub(free) / GB,
    })
}
