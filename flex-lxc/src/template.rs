//! LXC template resolution and include fragments

use flex_core::{Error, ImageMeta, LxcOptions, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::document::{write_atomic, ConfigDocument};

/// Prefix of installed template script names (`lxc-ubuntu`)
pub const TEMPLATE_PREFIX: &str = "lxc-";

/// Picks the LXC template for an instance
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    template_dir: PathBuf,
    default_template: String,
}

impl TemplateResolver {
    /// Create a resolver over `template_dir` with a fallback template
    #[must_use]
    pub fn new(template_dir: impl Into<PathBuf>, default_template: impl Into<String>) -> Self {
        Self {
            template_dir: template_dir.into(),
            default_template: default_template.into(),
        }
    }

    /// Create a resolver from the LXC options
    #[must_use]
    pub fn from_options(options: &LxcOptions) -> Self {
        Self::new(&options.template_dir, &options.default_template)
    }

    /// Directory scanned for installed templates
    #[must_use]
    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// Template names installed on the host
    ///
    /// Each directory entry has its `lxc-` prefix stripped; entries without
    /// the prefix are taken as-is.
    pub fn available_templates(&self) -> Result<BTreeSet<String>> {
        let mut templates = BTreeSet::new();

        for entry in fs::read_dir(&self.template_dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let name = name.strip_prefix(TEMPLATE_PREFIX).unwrap_or(&*name);
            if !name.is_empty() {
                templates.insert(name.to_string());
            }
        }

        tracing::trace!(
            dir = %self.template_dir.display(),
            count = templates.len(),
            "Discovered installed templates"
        );

        Ok(templates)
    }

    /// Template the image asks for, or the configured default
    #[must_use]
    pub fn requested_template<'a>(&'a self, image_meta: &'a ImageMeta) -> &'a str {
        image_meta
            .template_hint()
            .unwrap_or(self.default_template.as_str())
    }

    /// Resolve the template for an image
    ///
    /// Returns [`Error::TemplateNotFound`] when the requested template is not
    /// installed on the host.
    pub fn resolve(&self, image_meta: &ImageMeta) -> Result<String> {
        tracing::debug!("Fetching LXC template");

        let requested = self.requested_template(image_meta);
        let available = self.available_templates()?;

        if available.contains(requested) {
            tracing::debug!(template = requested, "Resolved LXC template");
            Ok(requested.to_string())
        } else {
            tracing::warn!(
                template = requested,
                available = ?available,
                "LXC template is not installed"
            );
            Err(Error::TemplateNotFound {
                template: requested.to_string(),
            })
        }
    }
}

/// Include fragment paths for a template: `(common, userns)`
#[must_use]
pub fn include_paths(config_dir: &Path, template: &str) -> (PathBuf, PathBuf) {
    (
        config_dir.join(format!("{template}.common.conf")),
        config_dir.join(format!("{template}.userns.conf")),
    )
}

/// Write a fresh container config holding only the template includes
///
/// Any previous content of `config_path` is replaced. Either both include
/// lines are written or an error is returned.
pub fn write_template_includes(template: &str, config_dir: &Path, config_path: &Path) -> Result<()> {
    let (common, userns) = include_paths(config_dir, template);

    let mut document = ConfigDocument::new();
    document.push_include(common)?;
    document.push_include(userns)?;

    write_atomic(config_path, &document.render())?;

    tracing::debug!(
        template,
        path = %config_path.display(),
        "Wrote template includes"
    );

    Ok(())
}
