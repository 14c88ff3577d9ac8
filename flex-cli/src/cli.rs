//! CLI argument definitions

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flex")]
#[command(about = "LXC compute driver tools", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Driver configuration file (defaults to /etc/flex/flex.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which instance a command acts on
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["instance", "id"])))]
pub struct InstanceArgs {
    /// Instance description (JSON)
    #[arg(long)]
    pub instance: Option<PathBuf>,

    /// Instance id, used with --memory and --vcpus
    #[arg(long)]
    pub id: Option<String>,

    /// Flavor memory in MB when only --id is given
    #[arg(long, default_value = "512")]
    pub memory: u64,

    /// Flavor vCPUs when only --id is given
    #[arg(long, default_value = "1")]
    pub vcpus: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write and print the LXC configuration for an instance
    Render {
        #[command(flatten)]
        instance: InstanceArgs,

        /// Network interfaces (JSON list)
        #[arg(long)]
        network: Option<PathBuf>,

        /// Security mode override (privileged or unprivileged)
        #[arg(long)]
        security: Option<String>,

        /// Build the id map from /etc/subuid and /etc/subgid for this user
        #[arg(long)]
        idmap_user: Option<String>,
    },

    /// List installed LXC templates
    Templates,

    /// List instances on this host
    List,

    /// Create and start an instance
    Spawn {
        #[command(flatten)]
        instance: InstanceArgs,

        /// Network interfaces (JSON list)
        #[arg(long)]
        network: Option<PathBuf>,
    },

    /// Start a stopped instance
    Start {
        #[command(flatten)]
        instance: InstanceArgs,
    },

    /// Stop an instance
    Stop {
        #[command(flatten)]
        instance: InstanceArgs,
    },

    /// Reboot an instance
    Reboot {
        #[command(flatten)]
        instance: InstanceArgs,

        /// Force stop and start instead of a clean reboot
        #[arg(long)]
        hard: bool,
    },

    /// Destroy an instance
    Destroy {
        #[command(flatten)]
        instance: InstanceArgs,

        /// Keep the instance directory
        #[arg(long)]
        keep_disks: bool,
    },

    /// Show power state and limits of an instance
    Info {
        #[command(flatten)]
        instance: InstanceArgs,
    },

    /// Print the console log of an instance
    Console {
        #[command(flatten)]
        instance: InstanceArgs,
    },

    /// Print the volume connector for an instance
    Connector {
        #[command(flatten)]
        instance: InstanceArgs,
    },

    /// Print host resources
    Host {
        /// Re-read host statistics
        #[arg(long)]
        refresh: bool,
    },

    /// List compute nodes served by this host
    Nodes,

    /// Check that the host can run instances
    Check,

    /// Show version information
    Version,
}
