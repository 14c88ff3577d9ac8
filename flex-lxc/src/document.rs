//! In-memory LXC configuration document
//!
//! LXC configuration files are flat `key = value` lines. Include lines
//! (`lxc.include = <path>`) are kept apart from the other directives so that
//! rendering always puts them first.

use flex_core::{Error, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration keys written by the driver
pub mod keys {
    /// Include another configuration fragment
    pub const INCLUDE: &str = "lxc.include";
    /// Container hostname
    pub const UTSNAME: &str = "lxc.utsname";
    /// Root filesystem path
    pub const ROOTFS: &str = "lxc.rootfs";
    /// LXC log file
    pub const LOGFILE: &str = "lxc.logfile";
    /// Network type; every occurrence opens a new network block
    pub const NETWORK_TYPE: &str = "lxc.network.type";
    /// MAC address of the current network block
    pub const NETWORK_HWADDR: &str = "lxc.network.hwaddr";
    /// Host bridge of the current network block
    pub const NETWORK_LINK: &str = "lxc.network.link";
    /// Console output log file
    pub const CONSOLE_LOGFILE: &str = "lxc.console.logfile";
    /// Memory cgroup limit
    pub const MEMORY_LIMIT: &str = "lxc.cgroup.memory.limit_in_bytes";
    /// Cpuset cgroup CPU list
    pub const CPUSET_CPUS: &str = "lxc.cgroup.cpuset.cpus";
    /// UID/GID map entry
    pub const ID_MAP: &str = flex_security::idmap::ID_MAP_KEY;
}

/// A single `key = value` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Configuration key
    pub key: String,
    /// Configuration value
    pub value: String,
}

impl Directive {
    /// Create a directive
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.key, self.value)
    }
}

/// Ordered LXC configuration: include references followed by directives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    includes: Vec<PathBuf>,
    directives: Vec<Directive>,
}

impl ConfigDocument {
    /// Create an empty document
    #[must_use]
    pub const fn new() -> Self {
        Self {
            includes: Vec::new(),
            directives: Vec::new(),
        }
    }

    /// Parse the native LXC format
    ///
    /// Blank lines and `#` comments are skipped. Any other line without `=`
    /// is rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let mut document = Self::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::InvalidConfig {
                    message: format!("line {}: expected 'key = value', got '{line}'", number + 1),
                });
            };

            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                return Err(Error::InvalidConfig {
                    message: format!("line {}: missing key", number + 1),
                });
            }

            if key == keys::INCLUDE {
                document.includes.push(PathBuf::from(value));
            } else {
                document.directives.push(Directive::new(key, value));
            }
        }

        Ok(document)
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Write the rendered document, replacing any previous content
    ///
    /// The file is written next to its destination and renamed into place, so
    /// readers see either the old or the complete new content.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.render())
    }

    /// Add an include reference
    ///
    /// Paths containing a line break are rejected.
    pub fn push_include(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        check_single_line(keys::INCLUDE, &path.to_string_lossy())?;
        self.includes.push(path);
        Ok(())
    }

    /// Append a directive after all existing ones
    ///
    /// The key must be a bare name other than `lxc.include`, and neither key
    /// nor value may contain a line break.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let directive = Directive::new(key, value);

        if directive.key.is_empty()
            || directive.key.contains('=')
            || directive.key.chars().any(char::is_whitespace)
        {
            return Err(Error::InvalidConfig {
                message: format!("invalid configuration key '{}'", directive.key.escape_debug()),
            });
        }
        if directive.key == keys::INCLUDE {
            return Err(Error::InvalidConfig {
                message: format!("{} must be added as an include", keys::INCLUDE),
            });
        }
        check_single_line(&directive.key, &directive.value)?;

        self.directives.push(directive);
        Ok(())
    }

    /// Include references in order
    #[must_use]
    pub fn includes(&self) -> &[PathBuf] {
        &self.includes
    }

    /// Directives in order
    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// All values set for `key`, in order
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.directives
            .iter()
            .filter(move |d| d.key == key)
            .map(|d| d.value.as_str())
    }

    /// Last value set for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.directives
            .iter()
            .rev()
            .find(|d| d.key == key)
            .map(|d| d.value.as_str())
    }

    /// Whether any directive uses `key`
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.directives.iter().any(|d| d.key == key)
    }

    /// Render in the native LXC format (includes first)
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();

        for include in &self.includes {
            out.push_str(&format!("{} = {}\n", keys::INCLUDE, include.display()));
        }
        for directive in &self.directives {
            out.push_str(&format!("{directive}\n"));
        }

        out
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn check_single_line(key: &str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(Error::InvalidConfig {
            message: format!("value for {key} contains a line break: '{}'", value.escape_debug()),
        });
    }
    Ok(())
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().map(ToOwned::to_owned).ok_or_else(|| {
        Error::InvalidConfig {
            message: format!("{} is not a file path", path.display()),
        }
    })?;
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    if let Err(e) = fs::write(&tmp_path, contents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::Io(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_includes() {
        let doc = ConfigDocument::parse(
            "# generated\n\
             lxc.include = /usr/share/lxc/config/ubuntu.common.conf\n\
             \n\
             lxc.utsname = abc-123\n\
             lxc.include = /usr/share/lxc/config/ubuntu.userns.conf\n\
             lxc.network.type=veth\n",
        )
        .unwrap();

        assert_eq!(
            doc.includes(),
            &[
                PathBuf::from("/usr/share/lxc/config/ubuntu.common.conf"),
                PathBuf::from("/usr/share/lxc/config/ubuntu.userns.conf"),
            ]
        );
        assert_eq!(
            doc.directives(),
            &[
                Directive::new("lxc.utsname", "abc-123"),
                Directive::new("lxc.network.type", "veth"),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ConfigDocument::parse("lxc.utsname abc\n").is_err());
        assert!(ConfigDocument::parse(" = value\n").is_err());
    }

    #[test]
    fn test_render_puts_includes_first() {
        let mut doc = ConfigDocument::new();
        doc.append("lxc.utsname", "abc-123").unwrap();
        doc.push_include("/cfg/ubuntu.common.conf").unwrap();
        doc.append("lxc.logfile", "/tmp/abc.log").unwrap();

        assert_eq!(
            doc.render(),
            "lxc.include = /cfg/ubuntu.common.conf\n\
             lxc.utsname = abc-123\n\
             lxc.logfile = /tmp/abc.log\n"
        );
    }

    #[test]
    fn test_values_and_get() {
        let mut doc = ConfigDocument::new();
        doc.append(keys::NETWORK_LINK, "br0").unwrap();
        doc.append(keys::UTSNAME, "abc-123").unwrap();
        doc.append(keys::NETWORK_LINK, "br1").unwrap();

        assert_eq!(doc.values(keys::NETWORK_LINK).collect::<Vec<_>>(), ["br0", "br1"]);
        assert_eq!(doc.get(keys::NETWORK_LINK), Some("br1"));
        assert!(doc.contains_key(keys::UTSNAME));
        assert!(!doc.contains_key(keys::ROOTFS));
    }

    #[test]
    fn test_append_rejects_line_breaks() {
        let mut doc = ConfigDocument::new();

        for value in [
            "aa:bb:cc:dd:ee:ff\nlxc.include = /evil.conf",
            "br0\r\nlxc.rootfs = /",
            "\n",
        ] {
            assert!(matches!(
                doc.append(keys::NETWORK_HWADDR, value),
                Err(Error::InvalidConfig { .. })
            ));
        }
        assert!(doc.append("lxc.rootfs = /\nlxc.utsname", "x").is_err());
        assert!(doc.append("", "x").is_err());
        assert!(doc.append(keys::INCLUDE, "/evil.conf").is_err());
        assert!(doc.push_include("/cfg/a.conf\nlxc.rootfs = /").is_err());

        assert!(doc.directives().is_empty());
        assert!(doc.includes().is_empty());
        assert_eq!(doc.render(), "");
    }

    #[test]
    fn test_save_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc-123").join("config");

        let mut doc = ConfigDocument::new();
        doc.append(keys::UTSNAME, "first").unwrap();
        doc.save(&path).unwrap();

        let mut doc = ConfigDocument::new();
        doc.append(keys::UTSNAME, "second").unwrap();
        doc.save(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "lxc.utsname = second\n");
        assert!(!dir.path().join("abc-123").join("config.tmp").exists());
        assert_eq!(ConfigDocument::load(&path).unwrap(), doc);
    }
}
