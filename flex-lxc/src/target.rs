//! Configuration targets the builder writes into

use flex_core::Result;
use std::path::{Path, PathBuf};

use crate::document::ConfigDocument;

/// Container configuration handle used during synthesis
///
/// The builder owns its target for the whole pipeline and only ever loads,
/// appends and saves.
pub trait ConfigTarget {
    /// Load the current configuration (the freshly written includes)
    fn load_config(&mut self) -> Result<()>;

    /// Append one directive after all existing ones
    fn append_config_item(&mut self, key: &str, value: &str) -> Result<()>;

    /// Persist the configuration
    fn save_config(&mut self) -> Result<()>;

    /// Current in-memory document
    fn document(&self) -> &ConfigDocument;
}

/// Target backed by the container's configuration file
#[derive(Debug, Clone)]
pub struct FileTarget {
    path: PathBuf,
    document: ConfigDocument,
}

impl FileTarget {
    /// Create a target for the file at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: ConfigDocument::new(),
        }
    }

    /// Configuration file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

}

impl ConfigTarget for FileTarget {
    fn load_config(&mut self) -> Result<()> {
        self.document = ConfigDocument::load(&self.path)?;
        tracing::trace!(
            path = %self.path.display(),
            includes = self.document.includes().len(),
            "Loaded container config"
        );
        Ok(())
    }

    fn append_config_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.document.append(key, value)
    }

    fn save_config(&mut self) -> Result<()> {
        self.document.save(&self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            directives = self.document.directives().len(),
            "Saved container config"
        );
        Ok(())
    }

    fn document(&self) -> &ConfigDocument {
        &self.document
    }
}

/// In-memory target for testing (doesn't touch filesystem)
///
/// `load_config` restores the seeded document and `save_config` records a
/// snapshot of what would have been written.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    seed: ConfigDocument,
    document: ConfigDocument,
    saved: Option<ConfigDocument>,
    loads: usize,
}

impl MemoryTarget {
    /// Create an empty target
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a target whose `load_config` yields `seed`
    #[must_use]
    pub fn with_seed(seed: ConfigDocument) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Last saved document, if `save_config` was called
    #[must_use]
    pub const fn saved(&self) -> Option<&ConfigDocument> {
        self.saved.as_ref()
    }

    /// Number of `load_config` calls
    #[must_use]
    pub const fn load_count(&self) -> usize {
        self.loads
    }
}

impl ConfigTarget for MemoryTarget {
    fn load_config(&mut self) -> Result<()> {
        self.document = self.seed.clone();
        self.loads += 1;
        Ok(())
    }

    fn append_config_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.document.append(key, value)
    }

    fn save_config(&mut self) -> Result<()> {
        self.saved = Some(self.document.clone());
        Ok(())
    }

    fn document(&self) -> &ConfigDocument {
        &self.document
    }
}
