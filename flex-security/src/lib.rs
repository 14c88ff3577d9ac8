//! Security features for LXC instances
//!
//! This crate provides:
//! - Security mode classification (privileged vs. unprivileged)
//! - User namespace UID/GID mapping for unprivileged containers

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod idmap;
pub mod policy;

pub use flex_core::SecurityMode;
pub use idmap::{IdKind, IdMap, IdMapEntry};
pub use policy::{MetadataPolicy, SecurityPolicy};
