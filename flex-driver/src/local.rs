//! Container manager for LXC containers on the local host

use async_trait::async_trait;
use flex_core::{
    Error, FlexConfig, Instance, InstanceEvent, InstanceId, LxcOptions, NetworkInterface, Result,
};
use flex_lxc::{synthesize, InstancePaths, SynthesisReport, TemplateResolver};
use flex_security::{IdMap, MetadataPolicy, SecurityPolicy};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;

use crate::manager::ContainerManager;
use crate::runtime::ContainerRuntime;
use crate::state::{BlockDevice, ConnectionInfo, ContainerState, RebootType};

/// Manages containers whose directories live under the instances path
///
/// Configuration synthesis is blocking filesystem work and runs on the
/// blocking thread pool; lifecycle calls go to the runtime.
pub struct LocalContainers<R> {
    runtime: R,
    options: Arc<LxcOptions>,
    policy: Arc<dyn SecurityPolicy>,
    idmap: Arc<IdMap>,
    paths: InstancePaths,
}

impl<R: ContainerRuntime> LocalContainers<R> {
    /// Create a manager
    pub fn new(
        runtime: R,
        options: LxcOptions,
        policy: Arc<dyn SecurityPolicy>,
        idmap: IdMap,
    ) -> Self {
        let paths = InstancePaths::new(&options.instances_path);
        Self {
            runtime,
            options: Arc::new(options),
            policy,
            idmap: Arc::new(idmap),
            paths,
        }
    }

    /// Create a manager from the driver configuration
    ///
    /// Uses the metadata security policy and the default unprivileged id map.
    pub fn from_config(runtime: R, config: &FlexConfig) -> Self {
        let policy = Arc::new(MetadataPolicy::new(config.lxc.default_security));
        Self::new(
            runtime,
            config.lxc.clone(),
            policy,
            IdMap::default_unprivileged(),
        )
    }

    /// Underlying runtime
    pub const fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Instance path layout
    pub const fn paths(&self) -> &InstancePaths {
        &self.paths
    }

    /// Synthesize the configuration for `instance` on the blocking pool
    pub async fn configure(
        &self,
        instance: &Instance,
        network_info: &[NetworkInterface],
    ) -> Result<SynthesisReport> {
        let options = Arc::clone(&self.options);
        let policy = Arc::clone(&self.policy);
        let idmap = Arc::clone(&self.idmap);
        let instance = instance.clone();
        let network_info = network_info.to_vec();

        let report = tokio::task::spawn_blocking(move || {
            synthesize(&options, policy.as_ref(), &instance, &network_info, &idmap)
        })
        .await??;

        Ok(report)
    }

    async fn ensure_exists(&self, id: &InstanceId) -> Result<()> {
        if fs::try_exists(self.paths.config(id)).await? {
            Ok(())
        } else {
            Err(Error::NotFound { id: id.to_string() })
        }
    }

    async fn attach_device(
        &self,
        connection_info: &ConnectionInfo,
        id: &InstanceId,
        mountpoint: &str,
    ) -> Result<()> {
        let device = device_path(connection_info)?;
        self.runtime.add_device(id, device, mountpoint).await
    }
}

fn device_path(connection_info: &ConnectionInfo) -> Result<&str> {
    connection_info
        .device_path()
        .ok_or_else(|| Error::Unsupported {
            operation: format!(
                "volume without device_path ({})",
                connection_info.driver_volume_type
            ),
        })
}

#[async_trait]
impl<R: ContainerRuntime> ContainerManager for LocalContainers<R> {
    async fn init(&self) -> Result<()> {
        fs::create_dir_all(self.paths.root()).await?;

        let resolver = TemplateResolver::from_options(&self.options);
        let templates = tokio::task::spawn_blocking(move || resolver.available_templates())
            .await??;

        tracing::info!(
            instances_path = %self.paths.root().display(),
            templates = templates.len(),
            default_template = %self.options.default_template,
            "LXC host initialized"
        );

        if !templates.contains(&self.options.default_template) {
            tracing::warn!(
                template = %self.options.default_template,
                "Default template is not installed"
            );
        }

        Ok(())
    }

    async fn list(&self) -> Result<Vec<InstanceId>> {
        let mut entries = match fs::read_dir(self.paths.root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Ok(id) = InstanceId::new(name.to_string_lossy()) else {
                tracing::trace!(name = ?name, "Skipping non-instance entry");
                continue;
            };

            if fs::try_exists(self.paths.config(&id)).await? {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn spawn(
        &self,
        instance: &Instance,
        network_info: &[NetworkInterface],
        block_devices: &[BlockDevice],
    ) -> Result<()> {
        let report = self.configure(instance, network_info).await?;

        InstanceEvent::Configured {
            id: instance.id.clone(),
            template: report.template,
            directives: report.directives,
            timestamp: SystemTime::now(),
        }
        .emit_trace();

        self.runtime.start(&instance.id).await?;

        for device in block_devices {
            self.attach_device(&device.connection_info, &instance.id, &device.mount_device)
                .await?;
        }

        Ok(())
    }

    async fn reboot(
        &self,
        instance: &Instance,
        _network_info: &[NetworkInterface],
        reboot_type: RebootType,
    ) -> Result<()> {
        self.ensure_exists(&instance.id).await?;

        match reboot_type {
            RebootType::Soft => self.runtime.reboot(&instance.id).await,
            RebootType::Hard => {
                self.runtime.stop(&instance.id, true).await?;
                self.runtime.start(&instance.id).await
            }
        }
    }

    async fn stop(&self, instance: &Instance) -> Result<()> {
        self.ensure_exists(&instance.id).await?;
        self.runtime.stop(&instance.id, false).await
    }

    async fn start(&self, instance: &Instance, _network_info: &[NetworkInterface]) -> Result<()> {
        self.ensure_exists(&instance.id).await?;
        self.runtime.start(&instance.id).await
    }

    async fn destroy(
        &self,
        instance: &Instance,
        _network_info: &[NetworkInterface],
        destroy_disks: bool,
    ) -> Result<()> {
        let id = &instance.id;
        let dir = self.paths.instance_dir(id);

        if !fs::try_exists(&dir).await? {
            tracing::debug!(instance_id = %id, "Instance directory already gone");
            return Ok(());
        }

        if fs::try_exists(self.paths.config(id)).await?
            && self.runtime.state(id).await? == ContainerState::Running
        {
            self.runtime.stop(id, true).await?;
        }

        if destroy_disks {
            if fs::try_exists(self.paths.config(id)).await? {
                self.runtime.destroy(id).await?;
            }
            if fs::try_exists(&dir).await? {
                fs::remove_dir_all(&dir).await?;
            }
            tracing::debug!(instance_id = %id, path = %dir.display(), "Removed instance directory");
        }

        Ok(())
    }

    async fn attach_volume(
        &self,
        connection_info: &ConnectionInfo,
        instance: &Instance,
        mountpoint: &str,
    ) -> Result<()> {
        self.ensure_exists(&instance.id).await?;
        self.attach_device(connection_info, &instance.id, mountpoint)
            .await
    }

    async fn detach_volume(
        &self,
        connection_info: &ConnectionInfo,
        instance: &Instance,
        mountpoint: &str,
    ) -> Result<()> {
        self.ensure_exists(&instance.id).await?;
        let device = device_path(connection_info)?;

        tracing::debug!(
            instance_id = %instance.id,
            device,
            mountpoint,
            "Detaching volume"
        );

        self.runtime.remove_device(&instance.id, device).await
    }

    async fn state(&self, id: &InstanceId) -> Result<ContainerState> {
        if !fs::try_exists(self.paths.config(id)).await? {
            tracing::debug!(instance_id = %id, "No container config, reporting stopped");
            return Ok(ContainerState::Stopped);
        }

        match self.runtime.state(id).await {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(instance_id = %id, error = %e, "Failed to query container state");
                Ok(ContainerState::Unknown)
            }
        }
    }

    async fn console_output(&self, instance: &Instance) -> Result<String> {
        self.ensure_exists(&instance.id).await?;

        match fs::read(self.paths.console(&instance.id)).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl<R> std::fmt::Debug for LocalContainers<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalContainers")
            .field("instances_path", &self.paths.root())
            .finish_non_exhaustive()
    }
}
