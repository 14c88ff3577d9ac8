use crate::cli::{Commands, InstanceArgs};
use anyhow::{Context, Result};
use flex_core::config::DEFAULT_CONFIG_PATH;
use flex_core::{FlexConfig, Flavor, Instance, InstanceId, NetworkInterface};
use flex_driver::{CommandRuntime, LocalContainers, LocalHostOps, LxcDriver};
use std::path::Path;

pub mod check;
pub mod host;
pub mod info;
pub mod lifecycle;
pub mod list;
pub mod render;
pub mod templates;

/// Driver wired to the LXC tools on this host
pub type Driver = LxcDriver<LocalContainers<CommandRuntime>, LocalHostOps>;

/// Dispatch command to appropriate handler
pub async fn dispatch(command: Commands, config: &FlexConfig) -> Result<()> {
    match command {
        Commands::Render {
            instance,
            network,
            security,
            idmap_user,
        } => render::execute(config, &instance, network.as_deref(), security, idmap_user),

        Commands::Templates => templates::execute(config),

        Commands::List => list::execute(config).await,

        Commands::Spawn { instance, network } => {
            lifecycle::spawn(config, &instance, network.as_deref()).await
        }

        Commands::Start { instance } => lifecycle::start(config, &instance).await,

        Commands::Stop { instance } => lifecycle::stop(config, &instance).await,

        Commands::Reboot { instance, hard } => lifecycle::reboot(config, &instance, hard).await,

        Commands::Destroy {
            instance,
            keep_disks,
        } => lifecycle::destroy(config, &instance, !keep_disks).await,

        Commands::Info { instance } => info::execute(config, &instance).await,

        Commands::Console { instance } => info::console(config, &instance).await,

        Commands::Connector { instance } => info::connector(config, &instance).await,

        Commands::Host { refresh } => host::execute(config, refresh).await,

        Commands::Nodes => host::nodes(config),

        Commands::Check => check::execute(config),

        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Load the configuration from `path`, the default location, or defaults
pub fn load_config(path: Option<&Path>) -> Result<FlexConfig> {
    if let Some(path) = path {
        return FlexConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let default = Path::new(DEFAULT_CONFIG_PATH);
    if default.exists() {
        FlexConfig::load(default)
            .with_context(|| format!("Failed to load config {}", default.display()))
    } else {
        tracing::debug!("No config file, using defaults");
        Ok(FlexConfig::default())
    }
}

/// Build the instance a command acts on
pub fn load_instance(args: &InstanceArgs) -> Result<Instance> {
    if let Some(path) = &args.instance {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read instance {}", path.display()))?;
        return serde_json::from_str(&contents)
            .with_context(|| format!("Invalid instance description {}", path.display()));
    }

    let id = args.id.as_deref().context("Either --instance or --id is required")?;
    let id = InstanceId::new(id).context("Invalid instance ID")?;

    Ok(Instance::new(id, Flavor::new(args.memory, args.vcpus)))
}

/// Read a JSON list of network interfaces, or none
pub fn load_network(path: Option<&Path>) -> Result<Vec<NetworkInterface>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read network info {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid network info {}", path.display()))
}

/// Build the driver for this host
pub fn build_driver(config: &FlexConfig) -> Result<Driver> {
    let nodename = match &config.driver.host {
        Some(host) => host.clone(),
        None => flex_driver::driver::hostname().context("Failed to read hostname")?,
    };

    let runtime = CommandRuntime::new(&config.lxc.instances_path);
    let containers = LocalContainers::from_config(runtime, config);
    let hostops = LocalHostOps::new(nodename, &config.lxc.instances_path);

    Ok(LxcDriver::new(containers, hostops, config.driver.clone()))
}

fn print_version() {
    println!("flex LXC compute driver");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Features:");
    println!("  • LXC configuration synthesis");
    println!("  • Unprivileged containers with id maps");
    println!("  • Driver lifecycle over the LXC tools");
}
