//! User namespace UID/GID mapping
//!
//! Unprivileged containers map a range of container ids onto a subordinate
//! id range owned by the host user. LXC expresses each range as one
//! `lxc.id_map = <u|g> <container-start> <host-start> <count>` line.

use flex_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Default subordinate id file for users
pub const SUBUID_PATH: &str = "/etc/subuid";

/// Default subordinate id file for groups
pub const SUBGID_PATH: &str = "/etc/subgid";

/// LXC configuration key for id map entries
pub const ID_MAP_KEY: &str = "lxc.id_map";

/// Which id space a mapping applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    /// User ids
    Uid,
    /// Group ids
    Gid,
}

impl IdKind {
    /// Single-letter tag used by LXC
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::Uid => 'u',
            Self::Gid => 'g',
        }
    }
}

/// One contiguous id range mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapEntry {
    /// User or group ids
    pub kind: IdKind,
    /// First id inside the container
    pub container_start: u32,
    /// First id on the host
    pub host_start: u32,
    /// Number of ids in the range
    pub count: u32,
}

impl IdMapEntry {
    /// Create a mapping entry
    #[must_use]
    pub const fn new(kind: IdKind, container_start: u32, host_start: u32, count: u32) -> Self {
        Self {
            kind,
            container_start,
            host_start,
            count,
        }
    }
}

impl fmt::Display for IdMapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.kind.tag(),
            self.container_start,
            self.host_start,
            self.count
        )
    }
}

/// Ordered UID/GID mapping for an unprivileged container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdMap {
    entries: Vec<IdMapEntry>,
}

impl IdMap {
    /// Host id where the default subordinate range starts
    pub const DEFAULT_HOST_START: u32 = 100_000;

    /// Size of the default subordinate range
    pub const DEFAULT_RANGE: u32 = 65_536;

    /// Create an empty map
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build from explicit entries, keeping their order
    #[must_use]
    pub fn from_entries(entries: Vec<IdMapEntry>) -> Self {
        Self { entries }
    }

    /// Append an entry
    #[must_use]
    pub fn with_entry(mut self, entry: IdMapEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// The usual `u 0 100000 65536` / `g 0 100000 65536` mapping
    #[must_use]
    pub fn default_unprivileged() -> Self {
        Self::new()
            .with_entry(IdMapEntry::new(
                IdKind::Uid,
                0,
                Self::DEFAULT_HOST_START,
                Self::DEFAULT_RANGE,
            ))
            .with_entry(IdMapEntry::new(
                IdKind::Gid,
                0,
                Self::DEFAULT_HOST_START,
                Self::DEFAULT_RANGE,
            ))
    }

    /// Build the map from `/etc/subuid` and `/etc/subgid` style files
    ///
    /// Uses the first `user:start:count` line for `user` in each file and maps
    /// it onto container id 0.
    pub fn from_subid_files(
        user: &str,
        subuid: impl AsRef<Path>,
        subgid: impl AsRef<Path>,
    ) -> Result<Self> {
        let uid = read_subid_range(user, subuid.as_ref())?;
        let gid = read_subid_range(user, subgid.as_ref())?;

        Ok(Self::new()
            .with_entry(IdMapEntry::new(IdKind::Uid, 0, uid.0, uid.1))
            .with_entry(IdMapEntry::new(IdKind::Gid, 0, gid.0, gid.1)))
    }

    /// Entries in mapping order
    #[must_use]
    pub fn entries(&self) -> &[IdMapEntry] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// LXC `(key, value)` configuration pairs, one per entry, in order
    pub fn lxc_conf_lines(&self) -> impl Iterator<Item = (&'static str, String)> + '_ {
        self.entries
            .iter()
            .map(|entry| (ID_MAP_KEY, entry.to_string()))
    }
}

fn read_subid_range(user: &str, path: &Path) -> Result<(u32, u32)> {
    let contents = fs::read_to_string(path)?;

    let range = parse_subid_range(user, &contents).ok_or_else(|| Error::InvalidConfig {
        message: format!(
            "No subordinate id range for '{user}' in {}",
            path.display()
        ),
    })?;

    tracing::debug!(
        user,
        path = %path.display(),
        start = range.0,
        count = range.1,
        "Found subordinate id range"
    );

    Ok(range)
}

fn parse_subid_range(user: &str, contents: &str) -> Option<(u32, u32)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .find_map(|line| {
            let mut parts = line.split(':');
            let owner = parts.next()?;
            if owner != user {
                return None;
            }
            let start = parts.next()?.trim().parse().ok()?;
            let count = parts.next()?.trim().parse().ok()?;
            Some((start, count))
        })
}
