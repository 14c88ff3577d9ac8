//! List command implementation

use anyhow::{Context, Result};
use flex_core::FlexConfig;

use super::build_driver;

pub async fn execute(config: &FlexConfig) -> Result<()> {
    tracing::info!("Listing instances");

    let driver = build_driver(config)?;
    let instances = driver
        .list_instances()
        .await
        .context("Failed to list instances")?;

    println!("\n📋 Instances");
    println!("{:-<60}", "");

    if instances.is_empty() {
        println!("No instances");
        return Ok(());
    }

    for id in &instances {
        println!("  {id}");
    }

    println!("{:-<60}", "");
    println!("Total: {} instance(s)", instances.len());

    Ok(())
}
