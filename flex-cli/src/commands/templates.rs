//! Templates command implementation

use anyhow::{Context, Result};
use flex_core::FlexConfig;
use flex_lxc::TemplateResolver;

pub fn execute(config: &FlexConfig) -> Result<()> {
    let resolver = TemplateResolver::from_options(&config.lxc);
    let templates = resolver.available_templates().with_context(|| {
        format!(
            "Failed to read template directory {}",
            resolver.template_dir().display()
        )
    })?;

    println!("\n📋 LXC templates in {}", resolver.template_dir().display());
    println!("{:-<60}", "");

    if templates.is_empty() {
        println!("No templates installed");
        return Ok(());
    }

    for template in &templates {
        let marker = if *template == config.lxc.default_template {
            " (default)"
        } else {
            ""
        };
        println!("  {template}{marker}");
    }

    println!("{:-<60}", "");
    println!("Total: {} template(s)", templates.len());

    Ok(())
}
