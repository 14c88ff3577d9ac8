//! Render command implementation

use anyhow::{Context, Result};
use flex_core::{FlexConfig, SecurityMode};
use flex_lxc::synthesize;
use flex_security::idmap::{SUBGID_PATH, SUBUID_PATH};
use flex_security::{IdMap, MetadataPolicy};
use std::path::Path;

use super::{load_instance, load_network};
use crate::cli::InstanceArgs;

pub fn execute(
    config: &FlexConfig,
    instance: &InstanceArgs,
    network: Option<&Path>,
    security: Option<String>,
    idmap_user: Option<String>,
) -> Result<()> {
    let mut instance = load_instance(instance)?;
    let network_info = load_network(network)?;

    if let Some(mode) = security {
        let mode: SecurityMode = mode.parse().context("Invalid security mode")?;
        instance = instance.with_metadata(MetadataPolicy::METADATA_KEY, mode.as_str());
    }

    let idmap = match idmap_user {
        Some(user) => IdMap::from_subid_files(&user, SUBUID_PATH, SUBGID_PATH)
            .with_context(|| format!("Failed to read subordinate ids for {user}"))?,
        None => IdMap::default_unprivileged(),
    };

    tracing::info!(instance_id = %instance.id, "Rendering LXC configuration");

    let policy = MetadataPolicy::new(config.lxc.default_security);
    let report = synthesize(&config.lxc, &policy, &instance, &network_info, &idmap)
        .context("Failed to synthesize configuration")?;

    let contents = std::fs::read_to_string(&report.config_path)
        .with_context(|| format!("Failed to read {}", report.config_path.display()))?;

    print!("{contents}");

    Ok(())
}
