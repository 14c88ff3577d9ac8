//! Security mode classification

use flex_core::{Instance, SecurityMode};

/// Decides whether an instance runs privileged or unprivileged
///
/// Implementations must be pure: the same instance always yields the same
/// mode, and classification has no side effects.
pub trait SecurityPolicy: Send + Sync {
    /// Classify an instance
    fn classify(&self, instance: &Instance) -> SecurityMode;
}

/// Policy driven by the `lxc:security` instance metadata key
///
/// Values are `privileged` or `unprivileged` (case-insensitive). Instances
/// without the key, or with any other value, get the default mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataPolicy {
    default_mode: SecurityMode,
}

impl MetadataPolicy {
    /// Metadata key consulted by this policy
    pub const METADATA_KEY: &'static str = "lxc:security";

    /// Create a policy with the given fallback mode
    #[must_use]
    pub const fn new(default_mode: SecurityMode) -> Self {
        Self { default_mode }
    }

    /// Fallback mode
    #[must_use]
    pub const fn default_mode(&self) -> SecurityMode {
        self.default_mode
    }
}

impl SecurityPolicy for MetadataPolicy {
    fn classify(&self, instance: &Instance) -> SecurityMode {
        let Some(raw) = instance.metadata.get(Self::METADATA_KEY) else {
            return self.default_mode;
        };

        match raw.parse::<SecurityMode>() {
            Ok(mode) => mode,
            Err(_) => {
                tracing::warn!(
                    instance_id = %instance.id,
                    value = %raw,
                    default = %self.default_mode,
                    "Ignoring unrecognized security mode"
                );
                self.default_mode
            }
        }
    }
}
