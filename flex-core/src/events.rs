//! Instance lifecycle events with structured tracing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use crate::InstanceId;

/// Events emitted by the driver for instance lifecycle operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstanceEvent {
    /// LXC configuration was synthesized and persisted
    Configured {
        /// Instance ID
        id: InstanceId,
        /// Template the configuration includes
        template: String,
        /// Number of directives written after the includes
        directives: usize,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Instance spawned
    Spawned {
        /// Instance ID
        id: InstanceId,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Instance rebooted
    Rebooted {
        /// Instance ID
        id: InstanceId,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Instance powered on
    PoweredOn {
        /// Instance ID
        id: InstanceId,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Instance powered off
    PoweredOff {
        /// Instance ID
        id: InstanceId,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Instance destroyed
    Destroyed {
        /// Instance ID
        id: InstanceId,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Volume attached to the instance
    VolumeAttached {
        /// Instance ID
        id: InstanceId,
        /// Mountpoint inside the instance
        mountpoint: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Volume detached from the instance
    VolumeDetached {
        /// Instance ID
        id: InstanceId,
        /// Mountpoint inside the instance
        mountpoint: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Error occurred
    Error {
        /// Instance ID
        id: InstanceId,
        /// Error message
        message: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },
}

impl InstanceEvent {
    /// Get the instance ID from any event
    #[must_use]
    pub const fn instance_id(&self) -> &InstanceId {
        match self {
            Self::Configured { id, .. }
            | Self::Spawned { id, .. }
            | Self::Rebooted { id, .. }
            | Self::PoweredOn { id, .. }
            | Self::PoweredOff { id, .. }
            | Self::Destroyed { id, .. }
            | Self::VolumeAttached { id, .. }
            | Self::VolumeDetached { id, .. }
            | Self::Error { id, .. } => id,
        }
    }

    /// Get the timestamp from any event
    #[must_use]
    pub const fn timestamp(&self) -> SystemTime {
        match self {
            Self::Configured { timestamp, .. }
            | Self::Spawned { timestamp, .. }
            | Self::Rebooted { timestamp, .. }
            | Self::PoweredOn { timestamp, .. }
            | Self::PoweredOff { timestamp, .. }
            | Self::Destroyed { timestamp, .. }
            | Self::VolumeAttached { timestamp, .. }
            | Self::VolumeDetached { timestamp, .. }
            | Self::Error { timestamp, .. } => *timestamp,
        }
    }

    /// Short machine-readable event name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configured { .. } => "configured",
            Self::Spawned { .. } => "spawned",
            Self::Rebooted { .. } => "rebooted",
            Self::PoweredOn { .. } => "powered_on",
            Self::PoweredOff { .. } => "powered_off",
            Self::Destroyed { .. } => "destroyed",
            Self::VolumeAttached { .. } => "volume_attached",
            Self::VolumeDetached { .. } => "volume_detached",
            Self::Error { .. } => "error",
        }
    }

    /// Check if this is a critical event
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Emit structured tracing event
    pub fn emit_trace(&self) {
        let event = self.name();
        match self {
            Self::Configured {
                id,
                template,
                directives,
                ..
            } => {
                tracing::info!(
                    instance_id = %id,
                    template = %template,
                    directives,
                    event,
                    "Container configuration written"
                );
            }
            Self::VolumeAttached { id, mountpoint, .. }
            | Self::VolumeDetached { id, mountpoint, .. } => {
                tracing::info!(
                    instance_id = %id,
                    mountpoint = %mountpoint,
                    event,
                    "Instance volume changed"
                );
            }
            Self::Error { id, message, .. } => {
                tracing::error!(
                    instance_id = %id,
                    message = %message,
                    event,
                    "Instance error"
                );
            }
            _ => {
                tracing::info!(instance_id = %self.instance_id(), event, "Instance {event}");
            }
        }
    }
}

impl fmt::Display for InstanceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configured { id, template, .. } => {
                write!(f, "Instance {id} configured from template {template}")
            }
            Self::VolumeAttached { id, mountpoint, .. } => {
                write!(f, "Instance {id} volume attached at {mountpoint}")
            }
            Self::VolumeDetached { id, mountpoint, .. } => {
                write!(f, "Instance {id} volume detached from {mountpoint}")
            }
            Self::Error { id, message, .. } => write!(f, "Instance {id} error: {message}"),
            _ => write!(f, "Instance {} {}", self.instance_id(), self.name()),
        }
    }
}

// Custom SystemTime serialization
mod systemtime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(since_epoch.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}
