//! Host queries

use anyhow::{Context, Result};
use flex_core::FlexConfig;

use super::build_driver;

pub async fn execute(config: &FlexConfig, refresh: bool) -> Result<()> {
    let driver = build_driver(config)?;

    let stats = driver
        .get_host_stats(refresh)
        .await
        .context("Failed to read host resources")?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub fn nodes(config: &FlexConfig) -> Result<()> {
    let driver = build_driver(config)?;

    for node in driver.get_available_nodes()? {
        println!("{node}");
    }

    Ok(())
}
