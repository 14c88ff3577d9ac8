//! Compute driver adapter
//!
//! [`LxcDriver`] is the entry point the orchestration framework calls. It
//! forwards lifecycle operations to a [`ContainerManager`] and host queries
//! to [`HostOps`], and answers the few queries it can serve itself (power
//! state mapping, volume connector, node names).

use flex_core::{
    DriverOptions, Error, HostResources, Instance, InstanceEvent, InstanceId, NetworkInterface,
    Result, UnknownStatePolicy,
};
use std::path::Path;
use std::time::SystemTime;

use crate::hostops::HostOps;
use crate::manager::ContainerManager;
use crate::state::{
    BlockDevice, ConnectionInfo, ContainerState, InstanceInfo, PowerState, RebootType,
    VolumeConnector,
};

/// LXC compute driver
#[derive(Debug)]
pub struct LxcDriver<C, H> {
    containers: C,
    hostops: H,
    options: DriverOptions,
}

impl<C: ContainerManager, H: HostOps> LxcDriver<C, H> {
    /// Create a driver over a container manager and host ops
    pub const fn new(containers: C, hostops: H, options: DriverOptions) -> Self {
        Self {
            containers,
            hostops,
            options,
        }
    }

    /// Container manager
    pub const fn containers(&self) -> &C {
        &self.containers
    }

    /// Host ops
    pub const fn hostops(&self) -> &H {
        &self.hostops
    }

    /// Driver options
    pub const fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Prepare the host
    pub async fn init_host(&self, host: &str) -> Result<()> {
        tracing::info!(host, "Initializing LXC compute host");
        self.containers.init().await
    }

    /// Instances present on the host
    pub async fn list_instances(&self) -> Result<Vec<InstanceId>> {
        self.containers.list().await
    }

    /// Create and start an instance
    pub async fn spawn(
        &self,
        instance: &Instance,
        network_info: &[NetworkInterface],
        block_devices: &[BlockDevice],
    ) -> Result<()> {
        let result = self
            .containers
            .spawn(instance, network_info, block_devices)
            .await;
        report(&instance.id, result, |id, timestamp| InstanceEvent::Spawned {
            id,
            timestamp,
        })
    }

    /// Reboot an instance
    pub async fn reboot(
        &self,
        instance: &Instance,
        network_info: &[NetworkInterface],
        reboot_type: RebootType,
    ) -> Result<()> {
        let result = self
            .containers
            .reboot(instance, network_info, reboot_type)
            .await;
        report(&instance.id, result, |id, timestamp| InstanceEvent::Rebooted {
            id,
            timestamp,
        })
    }

    /// Power off an instance
    pub async fn power_off(&self, instance: &Instance) -> Result<()> {
        let result = self.containers.stop(instance).await;
        report(&instance.id, result, |id, timestamp| {
            InstanceEvent::PoweredOff { id, timestamp }
        })
    }

    /// Power on an instance
    pub async fn power_on(
        &self,
        instance: &Instance,
        network_info: &[NetworkInterface],
    ) -> Result<()> {
        let result = self.containers.start(instance, network_info).await;
        report(&instance.id, result, |id, timestamp| {
            InstanceEvent::PoweredOn { id, timestamp }
        })
    }

    /// Destroy an instance, removing its disks when `destroy_disks` is set
    pub async fn destroy(
        &self,
        instance: &Instance,
        network_info: &[NetworkInterface],
        destroy_disks: bool,
    ) -> Result<()> {
        let result = self
            .containers
            .destroy(instance, network_info, destroy_disks)
            .await;
        report(&instance.id, result, |id, timestamp| {
            InstanceEvent::Destroyed { id, timestamp }
        })
    }

    /// Attach a volume to an instance at `mountpoint`
    pub async fn attach_volume(
        &self,
        connection_info: &ConnectionInfo,
        instance: &Instance,
        mountpoint: &str,
    ) -> Result<()> {
        let result = self
            .containers
            .attach_volume(connection_info, instance, mountpoint)
            .await;
        report(&instance.id, result, |id, timestamp| {
            InstanceEvent::VolumeAttached {
                id,
                mountpoint: mountpoint.to_string(),
                timestamp,
            }
        })
    }

    /// Detach the volume at `mountpoint`
    pub async fn detach_volume(
        &self,
        connection_info: &ConnectionInfo,
        instance: &Instance,
        mountpoint: &str,
    ) -> Result<()> {
        let result = self
            .containers
            .detach_volume(connection_info, instance, mountpoint)
            .await;
        report(&instance.id, result, |id, timestamp| {
            InstanceEvent::VolumeDetached {
                id,
                mountpoint: mountpoint.to_string(),
                timestamp,
            }
        })
    }

    /// Power state and limits of an instance
    pub async fn get_info(&self, instance: &Instance) -> Result<InstanceInfo> {
        let state = self.containers.state(&instance.id).await?;
        let power = self.power_state(state);

        tracing::debug!(
            instance_id = %instance.id,
            container_state = %state,
            power_state = %power,
            "Mapped container state"
        );

        Ok(InstanceInfo::from_flavor(
            power,
            instance.flavor.memory(),
            instance.flavor.vcpus,
        ))
    }

    /// Map a container state to the framework's power state
    #[must_use]
    pub const fn power_state(&self, state: ContainerState) -> PowerState {
        match state {
            ContainerState::Running => PowerState::Running,
            ContainerState::Stopped => PowerState::Shutdown,
            ContainerState::Unknown => match self.options.unknown_power_state {
                UnknownStatePolicy::Running => PowerState::Running,
                UnknownStatePolicy::Shutdown => PowerState::Shutdown,
            },
        }
    }

    /// Console log of an instance
    pub async fn get_console_output(&self, instance: &Instance) -> Result<String> {
        self.containers.console_output(instance).await
    }

    /// Resource inventory for `nodename`
    pub async fn get_available_resource(&self, nodename: &str) -> Result<HostResources> {
        self.hostops.get_available_resource(nodename).await
    }

    /// Host statistics
    pub async fn get_host_stats(&self, refresh: bool) -> Result<HostResources> {
        self.hostops.get_host_stats(refresh).await
    }

    /// Host identity for the volume service
    pub async fn get_volume_connector(&self, instance: &Instance) -> Result<VolumeConnector> {
        let initiator = read_initiator(&self.options.initiator_file).await?;
        let host = match &self.options.host {
            Some(host) => host.clone(),
            None => hostname()?,
        };

        tracing::debug!(
            instance_id = %instance.id,
            host = %host,
            has_initiator = initiator.is_some(),
            "Built volume connector"
        );

        Ok(VolumeConnector {
            ip: self.options.my_ip.clone(),
            initiator,
            host,
        })
    }

    /// Compute nodes served by this driver
    pub fn get_available_nodes(&self) -> Result<Vec<String>> {
        Ok(vec![hostname()?])
    }
}

fn report(
    id: &InstanceId,
    result: Result<()>,
    event: impl FnOnce(InstanceId, SystemTime) -> InstanceEvent,
) -> Result<()> {
    match &result {
        Ok(()) => event(id.clone(), SystemTime::now()).emit_trace(),
        Err(e) => InstanceEvent::Error {
            id: id.clone(),
            message: e.to_string(),
            timestamp: SystemTime::now(),
        }
        .emit_trace(),
    }
    result
}

/// System host name
pub fn hostname() -> Result<String> {
    let name = nix::unistd::gethostname()?;
    name.into_string().map_err(|name| Error::InvalidConfig {
        message: format!("hostname is not valid UTF-8: {}", name.to_string_lossy()),
    })
}

/// Read the iSCSI initiator name from `InitiatorName=` in `path`
///
/// A missing file means the host has no initiator.
pub async fn read_initiator(path: &Path) -> Result<Option<String>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(parse_initiator(&contents))
}

/// Extract the `InitiatorName=` value from an initiator file
#[must_use]
pub fn parse_initiator(contents: &str) -> Option<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| line.strip_prefix("InitiatorName="))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
