use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PluginLoadError;

pub const MANIFEST_FILE: &str = "plugin.toml";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginId(pub String);

impl PluginId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    /// Mode name the plugin registers under.
    pub name: String,
    pub version: String,
    pub abi_version: u32,
    /// WASM module, relative to the plugin directory.
    pub entry: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl PluginManifest {
    pub fn read(root_dir: &Path) -> Result<Self, PluginLoadError> {
        let path = root_dir.join(MANIFEST_FILE);
        let raw = fs::read_to_string(&path).map_err(|source| PluginLoadError::Manifest {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| PluginLoadError::Parse { path, source })
    }

    pub fn entry_path(&self, root_dir: &Path) -> PathBuf {
        root_dir.join(&self.entry)
    }
}
