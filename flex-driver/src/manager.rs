//! Container manager trait for pluggable implementations

use async_trait::async_trait;
use flex_core::{Instance, InstanceId, NetworkInterface, Result};

use crate::state::{BlockDevice, ConnectionInfo, ContainerState, RebootType};

/// Trait for container lifecycle management
///
/// This allows for different implementations:
/// - [`LocalContainers`](crate::LocalContainers) - LXC containers on this host
/// - [`MockContainers`](crate::MockContainers) - Testing without a runtime
///
/// # Thread Safety
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait ContainerManager: Send + Sync {
    /// Prepare the host for running containers
    async fn init(&self) -> Result<()>;

    /// Instances known to the manager
    async fn list(&self) -> Result<Vec<InstanceId>>;

    /// Configure and start a new instance
    async fn spawn(
        &self,
        instance: &Instance,
        network_info: &[NetworkInterface],
        block_devices: &[BlockDevice],
    ) -> Result<()>;

    /// Reboot a running instance
    async fn reboot(
        &self,
        instance: &Instance,
        network_info: &[NetworkInterface],
        reboot_type: RebootType,
    ) -> Result<()>;

    /// Stop an instance
    async fn stop(&self, instance: &Instance) -> Result<()>;

    /// Start a stopped instance
    async fn start(&self, instance: &Instance, network_info: &[NetworkInterface]) -> Result<()>;

    /// Stop and remove an instance
    async fn destroy(
        &self,
        instance: &Instance,
        network_info: &[NetworkInterface],
        destroy_disks: bool,
    ) -> Result<()>;

    /// Attach a volume at `mountpoint`
    async fn attach_volume(
        &self,
        connection_info: &ConnectionInfo,
        instance: &Instance,
        mountpoint: &str,
    ) -> Result<()>;

    /// Detach the volume at `mountpoint`
    async fn detach_volume(
        &self,
        connection_info: &ConnectionInfo,
        instance: &Instance,
        mountpoint: &str,
    ) -> Result<()>;

    /// Current container state
    ///
    /// A container that does not exist is `Stopped`.
    async fn state(&self, id: &InstanceId) -> Result<ContainerState>;

    /// Console log contents
    async fn console_output(&self, instance: &Instance) -> Result<String>;
}
