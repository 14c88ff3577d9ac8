//! LXC compute driver with pluggable container managers
//!
//! This crate provides the driver adapter the orchestration framework talks
//! to, a trait-based container manager with a local LXC implementation, and
//! mock implementations for testing.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod driver;
pub mod hostops;
pub mod local;
pub mod manager;
pub mod mock;
pub mod runtime;
pub mod state;

pub use driver::LxcDriver;
pub use hostops::{HostOps, LocalHostOps};
pub use local::LocalContainers;
pub use manager::ContainerManager;
pub use mock::{MockContainers, MockHostOps, MockRuntime, RuntimeCall};
pub use runtime::{CommandRuntime, ContainerRuntime};
pub use state::{
    BlockDevice, ConnectionInfo, ContainerState, InstanceInfo, PowerState, RebootType,
    VolumeConnector,
};

// Re-export commonly used types
pub use flex_core::{HostResources, Instance, InstanceId, NetworkInterface};
