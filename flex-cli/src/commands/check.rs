//! Host readiness check

use anyhow::Result;
use flex_core::FlexConfig;
use flex_lxc::TemplateResolver;
use std::path::Path;

/// LXC tools the driver runs
const REQUIRED_BINARIES: &[&str] = &[
    "lxc-start",
    "lxc-stop",
    "lxc-info",
    "lxc-destroy",
    "lxc-device",
];

pub fn execute(config: &FlexConfig) -> Result<()> {
    println!("\n🏥 Flex Host Check\n");
    println!("{:-<60}", "");

    let mut failures = 0;

    failures += usize::from(!check_templates(config));
    failures += usize::from(!check_config_dir(&config.lxc.config_dir));
    failures += usize::from(!check_instances_path(&config.lxc.instances_path));
    failures += check_binaries();

    println!("{:-<60}", "");

    if failures > 0 {
        anyhow::bail!("{failures} check(s) failed");
    }

    println!("\n✅ Host ready\n");
    Ok(())
}

fn check_templates(config: &FlexConfig) -> bool {
    print!("Checking LXC templates... ");

    let resolver = TemplateResolver::from_options(&config.lxc);
    match resolver.available_templates() {
        Ok(templates) if templates.contains(&config.lxc.default_template) => {
            println!("✅ {} installed", templates.len());
            true
        }
        Ok(_) => {
            println!(
                "❌ default template '{}' not installed",
                config.lxc.default_template
            );
            false
        }
        Err(e) => {
            println!("❌ {e}");
            false
        }
    }
}

fn check_config_dir(dir: &Path) -> bool {
    print!("Checking LXC config directory... ");

    if dir.is_dir() {
        println!("✅ {}", dir.display());
        true
    } else {
        println!("❌ {} not found", dir.display());
        false
    }
}

fn check_instances_path(dir: &Path) -> bool {
    print!("Checking instances path... ");

    if dir.is_dir() {
        println!("✅ {}", dir.display());
        true
    } else {
        println!("❌ {} not found", dir.display());
        false
    }
}

fn check_binaries() -> usize {
    let mut missing = 0;

    for binary in REQUIRED_BINARIES {
        print!("Checking {binary}... ");

        match which::which(binary) {
            Ok(path) => println!("✅ {}", path.display()),
            Err(e) => {
                println!("❌ {e}");
                missing += 1;
            }
        }
    }

    missing
}
