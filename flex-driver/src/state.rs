//! Driver-facing state and volume records

use flex_core::MemorySize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// State of a container as reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Container is running
    Running,
    /// Container exists and is stopped
    Stopped,
    /// Runtime could not determine the state (starting, freezing, ...)
    Unknown,
}

impl ContainerState {
    /// Parse the state name printed by `lxc-info`
    #[must_use]
    pub fn from_lxc(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Self::Running,
            "STOPPED" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Power state reported to the orchestration framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    /// Instance is running
    Running,
    /// Instance is shut down
    Shutdown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Result of `get_info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    /// Power state
    pub state: PowerState,
    /// Memory limit in KB
    pub max_mem_kb: u64,
    /// Memory in use in KB
    pub mem_kb: u64,
    /// Number of virtual CPUs
    pub num_cpu: u32,
    /// CPU time used in nanoseconds
    pub cpu_time_ns: u64,
}

impl InstanceInfo {
    /// Info with limits taken from the flavor and no usage figures
    #[must_use]
    pub const fn from_flavor(state: PowerState, memory: MemorySize, vcpus: u32) -> Self {
        Self {
            state,
            max_mem_kb: memory.whole_kb(),
            mem_kb: 0,
            num_cpu: vcpus,
            cpu_time_ns: 0,
        }
    }
}

/// How a reboot should be performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RebootType {
    /// Ask the container init to reboot
    #[default]
    Soft,
    /// Force stop then start
    Hard,
}

/// Host identity handed to the volume service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConnector {
    /// Management IP address
    pub ip: String,
    /// iSCSI initiator name, when the host has one
    pub initiator: Option<String>,
    /// Host name
    pub host: String,
}

/// Volume connection details from the volume service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Volume transport (`iscsi`, `local`, ...)
    pub driver_volume_type: String,
    /// Transport-specific data
    #[serde(default)]
    pub data: Value,
}

impl ConnectionInfo {
    /// Create connection info for an already attached host block device
    #[must_use]
    pub fn local(device_path: &str) -> Self {
        Self {
            driver_volume_type: "local".to_string(),
            data: serde_json::json!({ "device_path": device_path }),
        }
    }

    /// Host block device backing the volume
    #[must_use]
    pub fn device_path(&self) -> Option<&str> {
        self.data
            .get("device_path")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
    }
}

/// Volume to attach when an instance is spawned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDevice {
    /// Volume connection details
    pub connection_info: ConnectionInfo,
    /// Mountpoint inside the instance
    pub mount_device: String,
}
