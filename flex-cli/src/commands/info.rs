//! Per-instance queries

use anyhow::{Context, Result};
use flex_core::FlexConfig;

use super::{build_driver, load_instance};
use crate::cli::InstanceArgs;

pub async fn execute(config: &FlexConfig, args: &InstanceArgs) -> Result<()> {
    let instance = load_instance(args)?;
    let driver = build_driver(config)?;

    let info = driver
        .get_info(&instance)
        .await
        .with_context(|| format!("Failed to get info for {}", instance.id))?;

    println!("\n📊 Instance '{}'", instance.id);
    println!("{:-<60}", "");
    println!("State:      {}", info.state);
    println!("Max memory: {} KB", info.max_mem_kb);
    println!("Memory:     {} KB", info.mem_kb);
    println!("vCPUs:      {}", info.num_cpu);
    println!("CPU time:   {} ns", info.cpu_time_ns);
    println!("{:-<60}", "");

    Ok(())
}

pub async fn console(config: &FlexConfig, args: &InstanceArgs) -> Result<()> {
    let instance = load_instance(args)?;
    let driver = build_driver(config)?;

    let output = driver
        .get_console_output(&instance)
        .await
        .with_context(|| format!("Failed to read console of {}", instance.id))?;

    print!("{output}");
    Ok(())
}

pub async fn connector(config: &FlexConfig, args: &InstanceArgs) -> Result<()> {
    let instance = load_instance(args)?;
    let driver = build_driver(config)?;

    let connector = driver
        .get_volume_connector(&instance)
        .await
        .context("Failed to build volume connector")?;

    println!("{}", serde_json::to_string_pretty(&connector)?);
    Ok(())
}
