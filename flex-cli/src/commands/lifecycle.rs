//! Instance lifecycle commands

use anyhow::{Context, Result};
use flex_core::FlexConfig;
use flex_driver::RebootType;
use std::path::Path;

use super::{build_driver, load_instance, load_network};
use crate::cli::InstanceArgs;

pub async fn spawn(config: &FlexConfig, args: &InstanceArgs, network: Option<&Path>) -> Result<()> {
    let instance = load_instance(args)?;
    let network_info = load_network(network)?;
    let driver = build_driver(config)?;

    driver
        .spawn(&instance, &network_info, &[])
        .await
        .with_context(|| format!("Failed to spawn {}", instance.id))?;

    println!("✅ Spawned {}", instance.id);
    Ok(())
}

pub async fn start(config: &FlexConfig, args: &InstanceArgs) -> Result<()> {
    let instance = load_instance(args)?;
    let driver = build_driver(config)?;

    driver
        .power_on(&instance, &[])
        .await
        .with_context(|| format!("Failed to start {}", instance.id))?;

    println!("✅ Started {}", instance.id);
    Ok(())
}

pub async fn stop(config: &FlexConfig, args: &InstanceArgs) -> Result<()> {
    let instance = load_instance(args)?;
    let driver = build_driver(config)?;

    driver
        .power_off(&instance)
        .await
        .with_context(|| format!("Failed to stop {}", instance.id))?;

    println!("✅ Stopped {}", instance.id);
    Ok(())
}

pub async fn reboot(config: &FlexConfig, args: &InstanceArgs, hard: bool) -> Result<()> {
    let instance = load_instance(args)?;
    let driver = build_driver(config)?;
    let reboot_type = if hard {
        RebootType::Hard
    } else {
        RebootType::Soft
    };

    driver
        .reboot(&instance, &[], reboot_type)
        .await
        .with_context(|| format!("Failed to reboot {}", instance.id))?;

    println!("✅ Rebooted {}", instance.id);
    Ok(())
}

pub async fn destroy(config: &FlexConfig, args: &InstanceArgs, destroy_disks: bool) -> Result<()> {
    let instance = load_instance(args)?;
    let driver = build_driver(config)?;

    driver
        .destroy(&instance, &[], destroy_disks)
        .await
        .with_context(|| format!("Failed to destroy {}", instance.id))?;

    println!("✅ Destroyed {}", instance.id);
    Ok(())
}
