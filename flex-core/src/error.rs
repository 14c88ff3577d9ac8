//! Error types for Flex

use std::path::PathBuf;
use thiserror::Error;

/// Flex error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Requested LXC template is not installed on the host
    #[error("Cannot create instance: template '{template}' not found")]
    TemplateNotFound {
        /// Template name that was requested
        template: String,
    },

    /// Instance rootfs is missing and the configuration requires it
    #[error("Cannot create instance: rootfs {} does not exist", path.display())]
    MissingRootfs {
        /// Expected rootfs location
        path: PathBuf,
    },

    /// Container runtime command failed
    #[error("Runtime error: {message}")]
    Runtime {
        /// Error message
        message: String,
    },

    /// Instance unknown to the container manager
    #[error("Instance not found: {id}")]
    NotFound {
        /// Instance id
        id: String,
    },

    /// Operation not supported by this driver
    #[error("Operation not supported: {operation}")]
    Unsupported {
        /// Operation name
        operation: String,
    },

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// Task join error
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Result type alias for Flex operations
pub type Result<T> = std::result::Result<T, Error>;
