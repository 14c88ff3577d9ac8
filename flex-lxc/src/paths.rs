//! Per-instance filesystem layout
//!
//! Every instance lives in `<instances_path>/<id>/`, which is also the LXC
//! container directory when the runtime is pointed at `instances_path`.

use flex_core::InstanceId;
use std::path::{Path, PathBuf};

/// Computes per-instance paths under the instances root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePaths {
    root: PathBuf,
}

impl InstancePaths {
    /// LXC configuration file name inside the instance directory
    pub const CONFIG_FILE: &'static str = "config";

    /// Root filesystem directory name inside the instance directory
    pub const ROOTFS_DIR: &'static str = "rootfs";

    /// Console log file name inside the instance directory
    pub const CONSOLE_LOG: &'static str = "console.log";

    /// Create a layout rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Instances root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<id>`
    #[must_use]
    pub fn instance_dir(&self, id: &InstanceId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// `<root>/<id>/config`
    #[must_use]
    pub fn config(&self, id: &InstanceId) -> PathBuf {
        self.instance_dir(id).join(Self::CONFIG_FILE)
    }

    /// `<root>/<id>/rootfs`
    #[must_use]
    pub fn rootfs(&self, id: &InstanceId) -> PathBuf {
        self.instance_dir(id).join(Self::ROOTFS_DIR)
    }

    /// `<root>/<id>/<id>.log`
    #[must_use]
    pub fn logfile(&self, id: &InstanceId) -> PathBuf {
        self.instance_dir(id).join(format!("{id}.log"))
    }

    /// `<root>/<id>/console.log`
    #[must_use]
    pub fn console(&self, id: &InstanceId) -> PathBuf {
        self.instance_dir(id).join(Self::CONSOLE_LOG)
    }
}
