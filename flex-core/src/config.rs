//! Driver configuration
//!
//! All options are grouped in [`FlexConfig`], which is loaded once (usually
//! from a TOML file) and handed to every component that needs it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result, SecurityMode};

/// Default location of the driver configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/flex/flex.toml";

/// Top-level driver configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlexConfig {
    /// LXC configuration synthesis options
    #[serde(default)]
    pub lxc: LxcOptions,

    /// Driver adapter options
    #[serde(default)]
    pub driver: DriverOptions,
}

impl FlexConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid TOML, or
    /// contains invalid values
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;

        tracing::debug!(path = %path.display(), "Loaded driver configuration");

        Ok(config)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML or contains invalid values
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check option values that serde cannot express
    ///
    /// # Errors
    /// Returns error describing the first invalid option
    pub fn validate(&self) -> Result<()> {
        let template = self.lxc.default_template.trim();
        if template.is_empty() {
            return Err(Error::InvalidConfig {
                message: "lxc.default_template cannot be empty".to_string(),
            });
        }
        if template.contains('/') {
            return Err(Error::InvalidConfig {
                message: format!("lxc.default_template '{template}' must be a bare name"),
            });
        }

        if let Some(ref cpus) = self.lxc.cpuset_cpus {
            let valid = !cpus.is_empty()
                && cpus
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == ',' || c == '-');
            if !valid {
                return Err(Error::InvalidConfig {
                    message: format!("lxc.cpuset_cpus '{cpus}' is not a cpu list"),
                });
            }
        }

        Ok(())
    }
}

/// Options for LXC configuration synthesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LxcOptions {
    /// Template used when the image does not request one
    #[serde(default = "default_template")]
    pub default_template: String,

    /// Directory holding the installed `lxc-<name>` template scripts
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,

    /// Directory holding the `<name>.common.conf` / `<name>.userns.conf` fragments
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Root of the per-instance directories (LXC config path)
    #[serde(default = "default_instances_path")]
    pub instances_path: PathBuf,

    /// Pin containers to these host CPUs (`lxc.cgroup.cpuset.cpus`), off when unset
    #[serde(default)]
    pub cpuset_cpus: Option<String>,

    /// Fail synthesis instead of omitting `lxc.rootfs` when the rootfs is missing
    #[serde(default)]
    pub require_rootfs: bool,

    /// Security mode for instances that do not request one
    #[serde(default)]
    pub default_security: SecurityMode,
}

fn default_template() -> String {
    "ubuntu".to_string()
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("/usr/share/lxc/templates")
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("/usr/share/lxc/config")
}

fn default_instances_path() -> PathBuf {
    PathBuf::from("/var/lib/nova/instances")
}

impl Default for LxcOptions {
    fn default() -> Self {
        Self {
            default_template: default_template(),
            template_dir: default_template_dir(),
            config_dir: default_config_dir(),
            instances_path: default_instances_path(),
            cpuset_cpus: None,
            require_rootfs: false,
            default_security: SecurityMode::default(),
        }
    }
}

impl LxcOptions {
    /// Set the default template
    #[must_use]
    pub fn with_default_template(mut self, template: impl Into<String>) -> Self {
        self.default_template = template.into();
        self
    }

    /// Set the installed-template directory
    #[must_use]
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = dir.into();
        self
    }

    /// Set the config fragment directory
    #[must_use]
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Set the instances root
    #[must_use]
    pub fn with_instances_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.instances_path = dir.into();
        self
    }

    /// Enable CPU pinning
    #[must_use]
    pub fn with_cpuset_cpus(mut self, cpus: impl Into<String>) -> Self {
        self.cpuset_cpus = Some(cpus.into());
        self
    }

    /// Require the rootfs to exist at synthesis time
    #[must_use]
    pub const fn with_require_rootfs(mut self, require: bool) -> Self {
        self.require_rootfs = require;
        self
    }

    /// Set the fallback security mode
    #[must_use]
    pub const fn with_default_security(mut self, mode: SecurityMode) -> Self {
        self.default_security = mode;
        self
    }
}

/// How `get_info` reports instances whose state the runtime cannot determine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStatePolicy {
    /// Report the instance as running
    #[default]
    Running,
    /// Report the instance as shut down
    Shutdown,
}

/// Options for the driver adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverOptions {
    /// Host name reported in the volume connector; defaults to the system hostname
    #[serde(default)]
    pub host: Option<String>,

    /// Management IP reported in the volume connector
    #[serde(default = "default_my_ip")]
    pub my_ip: String,

    /// File holding the iSCSI `InitiatorName=` line
    #[serde(default = "default_initiator_file")]
    pub initiator_file: PathBuf,

    /// Power state reported when the container state is unknown
    #[serde(default)]
    pub unknown_power_state: UnknownStatePolicy,
}

fn default_my_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_initiator_file() -> PathBuf {
    PathBuf::from("/etc/iscsi/initiatorname.iscsi")
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            host: None,
            my_ip: default_my_ip(),
            initiator_file: default_initiator_file(),
            unknown_power_state: UnknownStatePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = FlexConfig::default();
        assert_eq!(config.lxc.default_template, "ubuntu");
        assert_eq!(
            config.lxc.template_dir,
            PathBuf::from("/usr/share/lxc/templates")
        );
        assert!(config.lxc.cpuset_cpus.is_none());
        assert!(!config.lxc.require_rootfs);
        assert_eq!(config.lxc.default_security, SecurityMode::Unprivileged);
        assert_eq!(config.driver.unknown_power_state, UnknownStatePolicy::Running);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = FlexConfig::from_toml("").unwrap();
        assert_eq!(config, FlexConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = FlexConfig::from_toml(
            r#"
            [lxc]
            default_template = "centos"
            instances_path = "/srv/instances"
            cpuset_cpus = "0-3"
            default_security = "privileged"

            [driver]
            my_ip = "10.0.0.5"
            unknown_power_state = "shutdown"
            "#,
        )
        .unwrap();

        assert_eq!(config.lxc.default_template, "centos");
        assert_eq!(config.lxc.instances_path, PathBuf::from("/srv/instances"));
        assert_eq!(config.lxc.cpuset_cpus.as_deref(), Some("0-3"));
        assert_eq!(config.lxc.default_security, SecurityMode::Privileged);
        assert_eq!(
            config.lxc.config_dir,
            PathBuf::from("/usr/share/lxc/config")
        );
        assert_eq!(config.driver.my_ip, "10.0.0.5");
        assert_eq!(
            config.driver.unknown_power_state,
            UnknownStatePolicy::Shutdown
        );
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let result = FlexConfig::from_toml("[lxc]\ndefault_templte = \"centos\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let result = FlexConfig::from_toml("[lxc]\ndefault_template = \"\"\n");
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));

        let result = FlexConfig::from_toml("[lxc]\ncpuset_cpus = \"all\"\n");
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[lxc]\ntemplate_dir = \"/opt/lxc/templates\"").unwrap();

        let config = FlexConfig::load(file.path()).unwrap();
        assert_eq!(config.lxc.template_dir, PathBuf::from("/opt/lxc/templates"));

        assert!(FlexConfig::load("/nonexistent/flex.toml").is_err());
    }
}
