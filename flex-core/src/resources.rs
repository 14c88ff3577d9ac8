//! Resource value objects with compile-time unit safety

use serde::{Deserialize, Serialize};
use std::fmt;

/// Memory size value object with compile-time unit safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MemorySize(u64); // bytes

impl MemorySize {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Create from megabytes
    #[must_use]
    pub const fn from_mb(mb: u64) -> Self {
        Self(mb.saturating_mul(Self::MB))
    }

    /// Get value in bytes
    #[must_use]
    pub const fn as_bytes(self) -> u64 {
        self.0
    }

    /// Whole kilobytes (rounded down)
    #[must_use]
    pub const fn whole_kb(self) -> u64 {
        self.0 / Self::KB
    }

    /// Whole megabytes (rounded down)
    #[must_use]
    pub const fn whole_mb(self) -> u64 {
        self.0 / Self::MB
    }

    /// Get value in megabytes
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_mb(self) -> f64 {
        self.0 as f64 / Self::MB as f64
    }
}

impl fmt::Display for MemorySize {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= Self::GB {
            write!(f, "{:.2} GB", self.0 as f64 / Self::GB as f64)
        } else if self.0 >= Self::MB {
            write!(f, "{:.2} MB", self.as_mb())
        } else if self.0 >= Self::KB {
            write!(f, "{:.2} KB", self.0 as f64 / Self::KB as f64)
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

/// Host resource inventory reported to the scheduler
///
/// Field names follow the mapping the orchestration framework expects from
/// `get_available_resource`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostResources {
    /// Total vCPUs
    pub vcpus: u32,
    /// Total memory in MB
    pub memory_mb: u64,
    /// Total local disk in GB
    pub local_gb: u64,
    /// vCPUs in use
    pub vcpus_used: u32,
    /// Memory in use in MB
    pub memory_mb_used: u64,
    /// Local disk in use in GB
    pub local_gb_used: u64,
    /// Hypervisor type
    pub hypervisor_type: String,
    /// Hypervisor version
    pub hypervisor_version: u64,
    /// Hypervisor hostname
    pub hypervisor_hostname: String,
    /// CPU description (JSON encoded)
    pub cpu_info: String,
}

impl HostResources {
    /// Hypervisor type reported for LXC hosts
    pub const HYPERVISOR_TYPE: &'static str = "lxc";

    /// Free memory
    #[must_use]
    pub const fn memory_free(&self) -> MemorySize {
        MemorySize::from_mb(self.memory_mb.saturating_sub(self.memory_mb_used))
    }
}
