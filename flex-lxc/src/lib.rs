//! LXC configuration synthesis
//!
//! This crate turns an instance description into an LXC container
//! configuration file:
//! - Template resolution against the templates installed on the host
//! - Template include fragments (`lxc.include`)
//! - Ordered configuration directives (name, rootfs, logging, network,
//!   console, cgroup limits, user namespace id map)

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod builder;
pub mod document;
pub mod paths;
pub mod target;
pub mod template;

pub use builder::{synthesize, LxcConfigBuilder, SynthesisReport};
pub use document::{ConfigDocument, Directive};
pub use paths::InstancePaths;
pub use target::{ConfigTarget, FileTarget, MemoryTarget};
pub use template::{write_template_includes, TemplateResolver};
