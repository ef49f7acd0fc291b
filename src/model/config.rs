use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::error::ConfigError;

/// Environment variable with extra plugin directories, colon separated.
pub const PLUGIN_PATH_ENV: &str = "QUIVER_PLUGIN_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub search: SearchConfig,
    pub filebrowser: FileBrowserConfig,
    #[serde(default)]
    pub keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub modes: String,
    pub combi_modes: String,
    pub terminal: String,
    pub plugin_path: String,
    #[serde(default)]
    pub cache_dir: Option<String>,
    pub show_mode_bar: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub max_results: usize,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileBrowserConfig {
    pub directory: String,
    pub show_hidden: bool,
}

const DEFAULTS: &str = include_str!("../../config/default.toml");

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    ///
    /// `explicit` replaces the default user config location; `skip_user`
    /// ignores user configuration entirely.
    pub fn load(explicit: Option<&Path>, skip_user: bool) -> Result<Self> {
        let mut merged: toml::Table = toml::from_str(DEFAULTS)?;

        if !skip_user {
            let path = match explicit {
                Some(path) => Some(expand_tilde(path)),
                None => default_config_path(),
            };

            if let Some(path) = path.filter(|path| path.exists()) {
                let user_str = fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let user: toml::Table = toml::from_str(&user_str)
                    .with_context(|| format!("parsing {}", path.display()))?;
                merge_tables(&mut merged, user);
                tracing::info!("loaded configuration from {}", path.display());
            } else if let Some(path) = explicit {
                return Err(anyhow!("config file {} does not exist", path.display()));
            }
        }

        Self::from_table(merged)
    }

    /// Like [`AppConfig::load`], but a broken user file only costs the user
    /// their settings: the defaults are used and the problem is returned for
    /// the startup dialog.
    pub fn load_or_defaults(
        explicit: Option<&Path>,
        skip_user: bool,
    ) -> Result<(Self, Option<ConfigError>)> {
        match Self::load(explicit, skip_user) {
            Ok(config) => Ok((config, None)),
            Err(err) => {
                tracing::warn!("falling back to default configuration: {err:#}");
                let path = explicit
                    .map(expand_tilde)
                    .or_else(default_config_path)
                    .unwrap_or_else(|| PathBuf::from("config.toml"));
                let error = ConfigError::ConfigFile {
                    path,
                    reason: format!("{err:#}"),
                };
                Ok((Self::defaults()?, Some(error)))
            }
        }
    }

    pub fn defaults() -> Result<Self> {
        Self::from_table(toml::from_str(DEFAULTS)?)
    }

    #[cfg(test)]
    pub fn from_toml(user: &str) -> Result<Self> {
        let mut merged: toml::Table = toml::from_str(DEFAULTS)?;
        merge_tables(&mut merged, toml::from_str(user)?);
        Self::from_table(merged)
    }

    fn from_table(table: toml::Table) -> Result<Self> {
        let mut config: AppConfig = toml::Value::Table(table).try_into()?;
        config.general.plugin_path = expand_tilde_str(&config.general.plugin_path)?;
        config.filebrowser.directory = expand_tilde_str(&config.filebrowser.directory)?;
        if let Some(cache_dir) = config.general.cache_dir.as_deref() {
            config.general.cache_dir = Some(expand_tilde_str(cache_dir)?);
        }
        Ok(config)
    }
}

/// Immutable snapshot of everything the launcher needs, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub modes: String,
    pub combi_modes: String,
    pub terminal: String,
    /// Primary plugin directory first, then the environment-provided ones.
    pub plugin_dirs: Vec<PathBuf>,
    pub plugins_enabled: bool,
    pub dmenu: bool,
    pub dmenu_prompt: Option<String>,
    pub selected_row: Option<usize>,
    pub filter: Option<String>,
    pub cache_dir: PathBuf,
    pub scripts_dir: Option<PathBuf>,
    pub show_mode_bar: bool,
    pub search: SearchConfig,
    pub filebrowser: FileBrowserConfig,
    pub keys: HashMap<String, String>,
    /// Problems found while reading the configuration itself.
    pub config_errors: Vec<ConfigError>,
}

impl Settings {
    pub fn resolve(config: AppConfig, cli: &Cli, env_plugin_path: Option<&str>) -> Self {
        let primary = cli
            .plugin_path
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| PathBuf::from(&config.general.plugin_path));

        let mut plugin_dirs = vec![primary];
        plugin_dirs.extend(
            env_plugin_path
                .into_iter()
                .flat_map(|value| value.split(':'))
                .filter(|dir| !dir.is_empty())
                .map(|dir| expand_tilde(Path::new(dir))),
        );

        let cache_dir = config
            .general
            .cache_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);

        Self {
            modes: cli.modes.clone().unwrap_or(config.general.modes),
            combi_modes: config.general.combi_modes,
            terminal: config.general.terminal,
            plugin_dirs,
            plugins_enabled: !cli.no_plugins,
            dmenu: cli.dmenu,
            dmenu_prompt: cli.prompt.clone(),
            selected_row: cli.selected_row,
            filter: cli.filter.clone(),
            cache_dir,
            scripts_dir: project_dirs().map(|dirs| dirs.config_dir().join("scripts")),
            show_mode_bar: config.general.show_mode_bar,
            search: config.search,
            filebrowser: config.filebrowser,
            keys: config.keys,
            config_errors: Vec::new(),
        }
    }
}

/// Later tables win; nested tables are merged key by key.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                merge_tables(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "quiver")
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

fn default_cache_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("quiver"))
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

fn expand_tilde_str(path: &str) -> Result<String> {
    if !path.starts_with('~') {
        return Ok(path.to_string());
    }
    let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(path.replacen('~', &home.to_string_lossy(), 1))
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    match expand_tilde_str(&text) {
        Ok(expanded) => PathBuf::from(expanded),
        Err(_) => path.to_path_buf(),
    }
}
