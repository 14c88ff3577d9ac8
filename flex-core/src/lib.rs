//! Flex Core - Foundation types, events, and configuration
//!
//! This crate provides the core abstractions shared by the LXC compute driver:
//! instance descriptors, resource records, lifecycle events and the driver
//! configuration.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod resources;
pub mod types;

pub use config::{DriverOptions, FlexConfig, LxcOptions, UnknownStatePolicy};
pub use error::{Error, Result};
pub use events::InstanceEvent;
pub use resources::{HostResources, MemorySize};
pub use types::{
    Flavor, ImageMeta, Instance, InstanceId, NetworkInterface, SecurityMode, VirtualNetwork,
};
