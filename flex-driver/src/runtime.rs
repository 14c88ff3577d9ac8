//! LXC runtime backends

use async_trait::async_trait;
use flex_core::{Error, InstanceId, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::state::ContainerState;

/// Low-level container operations
///
/// Implementations act on containers whose directory lives under the
/// instances path, named after the instance id.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Start the container in the background
    async fn start(&self, id: &InstanceId) -> Result<()>;

    /// Stop the container; `force` kills it without a clean shutdown
    async fn stop(&self, id: &InstanceId, force: bool) -> Result<()>;

    /// Ask the container to reboot
    async fn reboot(&self, id: &InstanceId) -> Result<()>;

    /// Remove the container and its directory
    async fn destroy(&self, id: &InstanceId) -> Result<()>;

    /// Current container state
    async fn state(&self, id: &InstanceId) -> Result<ContainerState>;

    /// Pass a host block device into the container
    async fn add_device(&self, id: &InstanceId, device: &str, mountpoint: &str) -> Result<()>;

    /// Remove a device passed in with [`add_device`](Self::add_device)
    async fn remove_device(&self, id: &InstanceId, device: &str) -> Result<()>;
}

/// Runtime driving the LXC command-line tools
///
/// Every command is run with `-P <instances_path>` so containers live in the
/// instance directories.
#[derive(Debug, Clone)]
pub struct CommandRuntime {
    lxcpath: PathBuf,
}

/// One `lxc-*` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LxcCommand {
    /// Program name
    pub program: &'static str,
    /// Arguments, starting with `-P <lxcpath> -n <id>`
    pub args: Vec<OsString>,
}

impl CommandRuntime {
    /// Create a runtime for containers under `lxcpath`
    #[must_use]
    pub fn new(lxcpath: impl Into<PathBuf>) -> Self {
        Self {
            lxcpath: lxcpath.into(),
        }
    }

    /// Container root passed with `-P`
    #[must_use]
    pub fn lxcpath(&self) -> &Path {
        &self.lxcpath
    }

    /// Build the invocation of `program` for container `id`
    #[must_use]
    pub fn command(&self, program: &'static str, id: &InstanceId, extra: &[&str]) -> LxcCommand {
        let mut args: Vec<OsString> = vec![
            "-P".into(),
            self.lxcpath.clone().into_os_string(),
            "-n".into(),
            id.as_str().into(),
        ];
        args.extend(extra.iter().map(OsString::from));

        LxcCommand { program, args }
    }

    async fn run(&self, command: LxcCommand) -> Result<String> {
        tracing::debug!(
            program = command.program,
            args = ?command.args,
            "Running LXC command"
        );

        let output = Command::new(command.program)
            .args(&command.args)
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::Runtime {
                message: format!(
                    "{} exited with {}: {}",
                    command.program,
                    output.status,
                    stderr.trim()
                ),
            })
        }
    }
}

/// Extract the state from `lxc-info -s` output
///
/// Accepts both `State:   RUNNING` and the bare state name.
#[must_use]
pub fn parse_info_state(output: &str) -> ContainerState {
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    let state = line
        .split_once(':')
        .map_or(line, |(_, value)| value);

    ContainerState::from_lxc(state)
}

#[async_trait]
impl ContainerRuntime for CommandRuntime {
    async fn start(&self, id: &InstanceId) -> Result<()> {
        self.run(self.command("lxc-start", id, &["-d"])).await?;
        Ok(())
    }

    async fn stop(&self, id: &InstanceId, force: bool) -> Result<()> {
        let extra: &[&str] = if force { &["-k"] } else { &[] };
        self.run(self.command("lxc-stop", id, extra)).await?;
        Ok(())
    }

    async fn reboot(&self, id: &InstanceId) -> Result<()> {
        self.run(self.command("lxc-stop", id, &["-r"])).await?;
        Ok(())
    }

    async fn destroy(&self, id: &InstanceId) -> Result<()> {
        self.run(self.command("lxc-destroy", id, &[])).await?;
        Ok(())
    }

    async fn state(&self, id: &InstanceId) -> Result<ContainerState> {
        let output = self.run(self.command("lxc-info", id, &["-s"])).await?;
        Ok(parse_info_state(&output))
    }

    async fn add_device(&self, id: &InstanceId, device: &str, mountpoint: &str) -> Result<()> {
        self.run(self.command("lxc-device", id, &["add", device, mountpoint]))
            .await?;
        Ok(())
    }

    async fn remove_device(&self, id: &InstanceId, device: &str) -> Result<()> {
        self.run(self.command("lxc-device", id, &["del", device]))
            .await?;
        Ok(())
    }
}
