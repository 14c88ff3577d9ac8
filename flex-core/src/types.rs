//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{Error, MemorySize, Result};

/// Instance identifier with validation
///
/// Usually a UUID handed out by the orchestration layer. It doubles as the
/// LXC container name and the per-instance directory name, so it must be a
/// single safe path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceId(String);

impl InstanceId {
    /// Maximum length for instance IDs
    pub const MAX_LENGTH: usize = 64;

    /// Create a new `InstanceId` with validation
    ///
    /// # Errors
    /// Returns error if ID is invalid (empty, too long, or contains invalid characters)
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::InvalidConfig {
                message: "Instance ID cannot be empty".to_string(),
            });
        }

        if id.len() > Self::MAX_LENGTH {
            return Err(Error::InvalidConfig {
                message: format!("Instance ID too long (max {} chars)", Self::MAX_LENGTH),
            });
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidConfig {
                message: "Instance ID can only contain alphanumeric, dash, and underscore"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Get the instance ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for InstanceId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<InstanceId> for String {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

/// Instance flavor (hardware profile)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    /// Flavor name, e.g. `m1.small`
    #[serde(default)]
    pub name: Option<String>,

    /// Memory size in megabytes
    pub memory_mb: u64,

    /// Number of virtual CPUs
    #[serde(default = "default_vcpus")]
    pub vcpus: u32,
}

const fn default_vcpus() -> u32 {
    1
}

impl Flavor {
    /// Create a flavor from memory and vCPU count
    #[must_use]
    pub const fn new(memory_mb: u64, vcpus: u32) -> Self {
        Self {
            name: None,
            memory_mb,
            vcpus,
        }
    }

    /// Memory size as a typed value
    #[must_use]
    pub const fn memory(&self) -> MemorySize {
        MemorySize::from_mb(self.memory_mb)
    }

    /// Memory limit in LXC's cgroup notation, e.g. `512M`
    #[must_use]
    pub fn lxc_memory_limit(&self) -> String {
        format!("{}M", self.memory_mb)
    }
}

/// Image metadata as handed over by the image service
///
/// The payload is free-form JSON. Only `properties.template` is interpreted,
/// and any other shape simply means "no template hint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageMeta(Value);

impl ImageMeta {
    /// Image property that selects the LXC template
    pub const TEMPLATE_PROPERTY: &'static str = "template";

    /// Wrap a raw JSON value
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Metadata without any content
    #[must_use]
    pub const fn empty() -> Self {
        Self(Value::Null)
    }

    /// Metadata carrying only a template hint
    #[must_use]
    pub fn with_template(template: &str) -> Self {
        Self(serde_json::json!({
            "properties": { "template": template }
        }))
    }

    /// Template requested by the image, if it names one
    #[must_use]
    pub fn template_hint(&self) -> Option<&str> {
        self.0
            .get("properties")
            .and_then(|props| props.get(Self::TEMPLATE_PROPERTY))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Raw JSON payload
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Compute instance descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance id (also used as the container name)
    #[serde(alias = "uuid")]
    pub id: InstanceId,

    /// Hardware profile
    pub flavor: Flavor,

    /// Image metadata
    #[serde(default)]
    pub image_meta: ImageMeta,

    /// Instance key/value metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Instance {
    /// Create an instance with empty image metadata and no metadata
    #[must_use]
    pub fn new(id: InstanceId, flavor: Flavor) -> Self {
        Self {
            id,
            flavor,
            image_meta: ImageMeta::empty(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set image metadata
    #[must_use]
    pub fn with_image_meta(mut self, image_meta: ImageMeta) -> Self {
        self.image_meta = image_meta;
        self
    }

    /// Add a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Whether a container runs with host root or inside a user namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Container root is host root; no id mapping
    Privileged,
    /// Container root is mapped to an unprivileged host range
    #[default]
    Unprivileged,
}

impl SecurityMode {
    /// Lowercase name as used in metadata and configuration
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Privileged => "privileged",
            Self::Unprivileged => "unprivileged",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "privileged" => Ok(Self::Privileged),
            "unprivileged" => Ok(Self::Unprivileged),
            other => Err(Error::InvalidConfig {
                message: format!("Unknown security mode '{other}'"),
            }),
        }
    }
}

/// Virtual network a VIF is plugged into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNetwork {
    /// Host bridge backing the network
    pub bridge: String,

    /// Network label
    #[serde(default)]
    pub label: Option<String>,
}

/// Virtual network interface attached to an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// VIF id (usually a port UUID)
    pub id: String,

    /// VIF type, e.g. `ovs` or `bridge`
    #[serde(rename = "type")]
    pub vif_type: String,

    /// MAC address
    #[serde(deserialize_with = "deserialize_mac")]
    pub address: String,

    /// Owning network
    pub network: VirtualNetwork,
}

impl NetworkInterface {
    /// Length of the id prefix used in generated device names
    pub const SHORT_ID_LEN: usize = 11;

    /// VIF type plugged through a per-port Linux bridge in front of OVS
    pub const VIF_TYPE_OVS: &'static str = "ovs";

    /// Create a VIF description
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        vif_type: impl Into<String>,
        address: impl Into<String>,
        bridge: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            vif_type: vif_type.into(),
            address: address.into(),
            network: VirtualNetwork {
                bridge: bridge.into(),
                label: None,
            },
        }
    }

    /// Check that the MAC address is six colon-separated hex octets
    pub fn validate(&self) -> Result<()> {
        if is_mac_address(&self.address) {
            Ok(())
        } else {
            Err(Error::InvalidConfig {
                message: format!(
                    "VIF {}: invalid MAC address '{}'",
                    self.id,
                    self.address.escape_debug()
                ),
            })
        }
    }

    /// First 11 characters of the VIF id
    #[must_use]
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(Self::SHORT_ID_LEN) {
            Some((end, _)) => &self.id[..end],
            None => &self.id,
        }
    }

    /// Bridge the container's veth should be linked to
    ///
    /// OVS ports go through a `qbr<short-id>` Linux bridge; every other type
    /// uses the network's bridge directly.
    #[must_use]
    pub fn bridge_name(&self) -> String {
        if self.vif_type == Self::VIF_TYPE_OVS {
            format!("qbr{}", self.short_id())
        } else {
            self.network.bridge.clone()
        }
    }
}

fn is_mac_address(address: &str) -> bool {
    let octets: Vec<&str> = address.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

fn deserialize_mac<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let address = String::deserialize(deserializer)?;
    if is_mac_address(&address) {
        Ok(address)
    } else {
        Err(serde::de::Error::custom(format!(
            "invalid MAC address '{}'",
            address.escape_debug()
        )))
    }
}
