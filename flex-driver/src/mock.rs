//! In-memory collaborators for testing (no LXC, no filesystem)

use async_trait::async_trait;
use flex_core::{Error, HostResources, Instance, InstanceId, NetworkInterface, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::hostops::HostOps;
use crate::manager::ContainerManager;
use crate::runtime::ContainerRuntime;
use crate::state::{BlockDevice, ConnectionInfo, ContainerState, RebootType};

#[derive(Default)]
struct MockContainerState {
    instances: BTreeMap<InstanceId, ContainerState>,
    volumes: Vec<(InstanceId, String)>,
    console: BTreeMap<InstanceId, String>,
    calls: Vec<&'static str>,
    fail_next: Option<String>,
}

impl MockContainerState {
    fn record(&mut self, call: &'static str) -> Result<()> {
        self.calls.push(call);
        match self.fail_next.take() {
            Some(message) => Err(Error::Runtime { message }),
            None => Ok(()),
        }
    }

    fn require(&self, id: &InstanceId) -> Result<()> {
        if self.instances.contains_key(id) {
            Ok(())
        } else {
            Err(Error::NotFound { id: id.to_string() })
        }
    }
}

/// Mock container manager
///
/// # Example
/// ```
/// use flex_driver::{ContainerManager, ContainerState, MockContainers};
/// use flex_core::{Flavor, Instance, InstanceId};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let containers = MockContainers::new();
/// let instance = Instance::new(InstanceId::new("abc-123").unwrap(), Flavor::new(512, 1));
///
/// containers.spawn(&instance, &[], &[]).await.unwrap();
/// assert_eq!(containers.state(&instance.id).await.unwrap(), ContainerState::Running);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockContainers {
    state: Arc<Mutex<MockContainerState>>,
}

impl MockContainers {
    /// Create an empty mock manager
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call fail with a runtime error
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().await.fail_next = Some(message.into());
    }

    /// Force the state of an instance
    pub async fn set_state(&self, id: &InstanceId, state: ContainerState) {
        self.state.lock().await.instances.insert(id.clone(), state);
    }

    /// Set the console log of an instance
    pub async fn set_console(&self, id: &InstanceId, output: impl Into<String>) {
        self.state
            .lock()
            .await
            .console
            .insert(id.clone(), output.into());
    }

    /// Names of the calls made, in order
    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.lock().await.calls.clone()
    }

    /// Number of calls made
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls.len()
    }

    /// Attached volume mountpoints of an instance
    pub async fn volumes(&self, id: &InstanceId) -> Vec<String> {
        self.state
            .lock()
            .await
            .volumes
            .iter()
            .filter(|(owner, _)| owner == id)
            .map(|(_, mountpoint)| mountpoint.clone())
            .collect()
    }
}

impl std::fmt::Debug for MockContainers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockContainers").finish_non_exhaustive()
    }
}

#[async_trait]
impl ContainerManager for MockContainers {
    async fn init(&self) -> Result<()> {
        self.state.lock().await.record("init")
    }

    async fn list(&self) -> Result<Vec<InstanceId>> {
        let mut state = self.state.lock().await;
        state.record("list")?;
        Ok(state.instances.keys().cloned().collect())
    }

    async fn spawn(
        &self,
        instance: &Instance,
        _network_info: &[NetworkInterface],
        block_devices: &[BlockDevice],
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record("spawn")?;
        state
            .instances
            .insert(instance.id.clone(), ContainerState::Running);
        for device in block_devices {
            state
                .volumes
                .push((instance.id.clone(), device.mount_device.clone()));
        }

        tracing::debug!(instance_id = %instance.id, "Mock: Spawned instance");
        Ok(())
    }

    async fn reboot(
        &self,
        instance: &Instance,
        _network_info: &[NetworkInterface],
        _reboot_type: RebootType,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record("reboot")?;
        state.require(&instance.id)?;
        state
            .instances
            .insert(instance.id.clone(), ContainerState::Running);
        Ok(())
    }

    async fn stop(&self, instance: &Instance) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record("stop")?;
        state.require(&instance.id)?;
        state
            .instances
            .insert(instance.id.clone(), ContainerState::Stopped);
        Ok(())
    }

    async fn start(&self, instance: &Instance, _network_info: &[NetworkInterface]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record("start")?;
        state.require(&instance.id)?;
        state
            .instances
            .insert(instance.id.clone(), ContainerState::Running);
        Ok(())
    }

    async fn destroy(
        &self,
        instance: &Instance,
        _network_info: &[NetworkInterface],
        destroy_disks: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record("destroy")?;
        if destroy_disks {
            state.instances.remove(&instance.id);
            state.volumes.retain(|(owner, _)| owner != &instance.id);
        } else if state.instances.contains_key(&instance.id) {
            state
                .instances
                .insert(instance.id.clone(), ContainerState::Stopped);
        }
        Ok(())
    }

    async fn attach_volume(
        &self,
        _connection_info: &ConnectionInfo,
        instance: &Instance,
        mountpoint: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record("attach_volume")?;
        state.require(&instance.id)?;
        state
            .volumes
            .push((instance.id.clone(), mountpoint.to_string()));
        Ok(())
    }

    async fn detach_volume(
        &self,
        _connection_info: &ConnectionInfo,
        instance: &Instance,
        mountpoint: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record("detach_volume")?;
        state.require(&instance.id)?;
        state
            .volumes
            .retain(|(owner, mp)| !(owner == &instance.id && mp == mountpoint));
        Ok(())
    }

    async fn state(&self, id: &InstanceId) -> Result<ContainerState> {
        let mut state = self.state.lock().await;
        state.record("state")?;
        Ok(state
            .instances
            .get(id)
            .copied()
            .unwrap_or(ContainerState::Stopped))
    }

    async fn console_output(&self, instance: &Instance) -> Result<String> {
        let mut state = self.state.lock().await;
        state.record("console_output")?;
        state.require(&instance.id)?;
        Ok(state
            .console
            .get(&instance.id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Mock host ops returning fixed resources
#[derive(Clone)]
pub struct MockHostOps {
    resources: HostResources,
    calls: Arc<Mutex<Vec<(&'static str, bool)>>>,
}

impl MockHostOps {
    /// Create host ops reporting `resources`
    #[must_use]
    pub fn new(resources: HostResources) -> Self {
        Self {
            resources,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Calls made with their `refresh` flag (`false` for `get_available_resource`)
    pub async fn calls(&self) -> Vec<(&'static str, bool)> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockHostOps {
    fn default() -> Self {
        Self::new(HostResources {
            vcpus: 4,
            memory_mb: 8192,
            local_gb: 100,
            hypervisor_type: HostResources::HYPERVISOR_TYPE.to_string(),
            hypervisor_version: 1,
            hypervisor_hostname: "mock-host".to_string(),
            ..HostResources::default()
        })
    }
}

impl std::fmt::Debug for MockHostOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHostOps").finish_non_exhaustive()
    }
}

#[async_trait]
impl HostOps for MockHostOps {
    async fn get_available_resource(&self, nodename: &str) -> Result<HostResources> {
        self.calls
            .lock()
            .await
            .push(("get_available_resource", false));
        Ok(HostResources {
            hypervisor_hostname: nodename.to_string(),
            ..self.resources.clone()
        })
    }

    async fn get_host_stats(&self, refresh: bool) -> Result<HostResources> {
        self.calls.lock().await.push(("get_host_stats", refresh));
        Ok(self.resources.clone())
    }
}

/// A command recorded by [`MockRuntime`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    /// `start`
    Start(InstanceId),
    /// `stop`, with the force flag
    Stop(InstanceId, bool),
    /// `reboot`
    Reboot(InstanceId),
    /// `destroy`
    Destroy(InstanceId),
    /// `add_device`
    AddDevice(InstanceId, String, String),
    /// `remove_device`
    RemoveDevice(InstanceId, String),
}

#[derive(Default)]
struct MockRuntimeState {
    states: BTreeMap<InstanceId, ContainerState>,
    calls: Vec<RuntimeCall>,
    state_error: Option<String>,
}

/// Mock runtime tracking container states in memory
#[derive(Clone, Default)]
pub struct MockRuntime {
    state: Arc<Mutex<MockRuntimeState>>,
}

impl MockRuntime {
    /// Create a mock runtime
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received, in order
    pub async fn calls(&self) -> Vec<RuntimeCall> {
        self.state.lock().await.calls.clone()
    }

    /// Force the state of a container
    pub async fn set_state(&self, id: &InstanceId, state: ContainerState) {
        self.state.lock().await.states.insert(id.clone(), state);
    }

    /// Make state queries fail with a runtime error until cleared
    pub async fn fail_state(&self, message: Option<String>) {
        self.state.lock().await.state_error = message;
    }
}

impl std::fmt::Debug for MockRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRuntime").finish_non_exhaustive()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn start(&self, id: &InstanceId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(RuntimeCall::Start(id.clone()));
        state.states.insert(id.clone(), ContainerState::Running);
        Ok(())
    }

    async fn stop(&self, id: &InstanceId, force: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(RuntimeCall::Stop(id.clone(), force));
        state.states.insert(id.clone(), ContainerState::Stopped);
        Ok(())
    }

    async fn reboot(&self, id: &InstanceId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(RuntimeCall::Reboot(id.clone()));
        state.states.insert(id.clone(), ContainerState::Running);
        Ok(())
    }

    async fn destroy(&self, id: &InstanceId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(RuntimeCall::Destroy(id.clone()));
        state.states.remove(id);
        Ok(())
    }

    async fn state(&self, id: &InstanceId) -> Result<ContainerState> {
        let state = self.state.lock().await;
        if let Some(message) = &state.state_error {
            return Err(Error::Runtime {
                message: message.clone(),
            });
        }
        Ok(state
            .states
            .get(id)
            .copied()
            .unwrap_or(ContainerState::Stopped))
    }

    async fn add_device(&self, id: &InstanceId, device: &str, mountpoint: &str) -> Result<()> {
        self.state.lock().await.calls.push(RuntimeCall::AddDevice(
            id.clone(),
            device.to_string(),
            mountpoint.to_string(),
        ));
        Ok(())
    }

    async fn remove_device(&self, id: &InstanceId, device: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .calls
            .push(RuntimeCall::RemoveDevice(id.clone(), device.to_string()));
        Ok(())
    }
}
