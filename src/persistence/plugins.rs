//! Installed plugin metadata.

use serde::{Deserialize, Serialize};

use super::{load, save, PersistenceBackend};
use crate::commands::descriptor::ProcessorDescriptor;
use crate::error::Result;

/// Backend key holding the installed plugin list.
pub const INSTALLED_PLUGINS_KEY: &str = "installed-plugins";

/// A bundle of processors installed and removed together.
#[derive(Debug)]
pub struct Plugin {
    pub name: String,
    pub version: String,
    pub processors: Vec<ProcessorDescriptor>,
}

impl Plugin {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            processors: Vec::new(),
        }
    }

    pub fn with_processor(mut self, descriptor: ProcessorDescriptor) -> Self {
        self.processors.push(descriptor);
        self
    }
}

/// Persisted record of an installed plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    pub name: String,
    pub version: String,
    /// Root commands the plugin registered.
    pub commands: Vec<String>,
}

/// Reads the installed plugin list; a missing key is an empty list.
pub async fn load_installed(backend: &dyn PersistenceBackend) -> Result<Vec<InstalledPlugin>> {
    Ok(load(backend, INSTALLED_PLUGINS_KEY)
        .await?
        .unwrap_or_default())
}

pub async fn save_installed(
    backend: &dyn PersistenceBackend,
    plugins: &[InstalledPlugin],
) -> Result<()> {
    save(backend, INSTALLED_PLUGINS_KEY, plugins).await
}
