use std::path::Path;

use crate::error::PluginLoadError;
use crate::plugin::PLUGIN_ABI_VERSION;
use crate::plugin::manifest::{MANIFEST_FILE, PluginId, PluginManifest};
use crate::plugin::runtime::PluginMode;
use crate::registry::{ModeDescriptor, ModeOrigin};

/// Turns plugin directories into mode descriptors.
#[derive(Debug, Clone)]
pub struct PluginLoader {
    abi_version: u32,
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self {
            abi_version: PLUGIN_ABI_VERSION,
        }
    }
}

impl PluginLoader {
    /// One result per sub-directory of `dir` holding a `plugin.toml`,
    /// in name order. A missing `dir` holds no plugins.
    pub fn scan_dir(&self, dir: &Path) -> Vec<Result<ModeDescriptor, PluginLoadError>> {
        let Ok(read) = std::fs::read_dir(dir) else {
            tracing::debug!("no plugin directory at {}", dir.display());
            return Vec::new();
        };

        let mut roots: Vec<_> = read
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.join(MANIFEST_FILE).is_file())
            .collect();
        roots.sort();

        roots.iter().map(|root| self.load(root)).collect()
    }

    pub fn load(&self, root_dir: &Path) -> Result<ModeDescriptor, PluginLoadError> {
        let manifest = PluginManifest::read(root_dir)?;
        if manifest.abi_version != self.abi_version {
            return Err(PluginLoadError::AbiMismatch {
                name: manifest.name,
                found: manifest.abi_version,
                expected: self.abi_version,
            });
        }

        let id = PluginId::new(format!("path:{}", root_dir.display()));
        let origin = ModeOrigin::Plugin {
            id: id.clone(),
            root_dir: root_dir.to_path_buf(),
        };
        let root = root_dir.to_path_buf();
        tracing::info!(
            "discovered plugin {} {} in {}",
            manifest.name,
            manifest.version,
            root.display()
        );

        let mode = PluginMode::new(id.clone(), root.clone(), manifest.clone());
        Ok(ModeDescriptor::new(origin, Box::new(mode), move || {
            Box::new(PluginMode::new(id.clone(), root.clone(), manifest.clone()))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_plugin(dir: &Path, folder: &str, name: &str, abi: u32) {
        let root = dir.join(folder);
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(
            root.join(MANIFEST_FILE),
            format!("name = \"{name}\"\nversion = \"1.0.0\"\nabi_version = {abi}\nentry = \"{name}.wasm\"\n"),
        )
        .expect("manifest");
    }

    #[test]
    fn scans_plugin_folders_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "b-weather", "weather", PLUGIN_ABI_VERSION);
        write_plugin(dir.path(), "a-emoji", "emoji", PLUGIN_ABI_VERSION);
        fs::create_dir_all(dir.path().join("not-a-plugin")).expect("mkdir");

        let names: Vec<String> = PluginLoader::default()
            .scan_dir(dir.path())
            .into_iter()
            .map(|loaded| loaded.expect("plugin").name)
            .collect();
        assert_eq!(names, vec!["emoji", "weather"]);
    }

    #[test]
    fn abi_mismatch_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "old", "old", 0x2a);

        let results = PluginLoader::default().scan_dir(dir.path());
        let err = results.into_iter().next().expect("one").expect_err("mismatch");
        assert_eq!(
            err.to_string(),
            "ABI version of plugin 'old' does not match: 0000002A expecting: 00000001"
        );
    }

    #[test]
    fn descriptors_carry_the_plugin_origin() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "weather", "weather", PLUGIN_ABI_VERSION);

        let descriptor = PluginLoader::default()
            .load(&dir.path().join("weather"))
            .expect("plugin");
        assert!(matches!(
            &descriptor.origin,
            ModeOrigin::Plugin { root_dir, .. } if *root_dir == dir.path().join("weather")
        ));
        assert!(PluginLoader::default().scan_dir(&dir.path().join("missing")).is_empty());
    }
}
