//! A mode driven by a WASM plugin.
//!
//! The module is loaded on `init` and released on `destroy`. It exports two
//! functions: `entries`, returning the rows one per line, and `result`,
//! taking a JSON [`PluginRequest`] and answering with a JSON [`PluginReply`].

use std::borrow::Cow;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ModeError;
use crate::mode::{MenuReturn, Mode, ModeContext, ModeOutcome};
use crate::plugin::manifest::{PluginId, PluginManifest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginStatus {
    Discovered,
    Loaded,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginAction {
    Accept,
    AcceptCustom,
    Delete,
    CustomKey,
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginRequest<'a> {
    pub action: PluginAction,
    pub input: &'a str,
    pub selected: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginOutcome {
    Exit,
    Next,
    Previous,
    Reload,
    Reset,
    Switch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginReply {
    pub outcome: PluginOutcome,
    /// Target of a `switch` outcome.
    #[serde(default)]
    pub index: Option<usize>,
    /// Replacement rows.
    #[serde(default)]
    pub entries: Option<Vec<String>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PluginReply {
    pub fn outcome(&self) -> ModeOutcome {
        match self.outcome {
            PluginOutcome::Exit => ModeOutcome::Exit,
            PluginOutcome::Next => ModeOutcome::Next,
            PluginOutcome::Previous => ModeOutcome::Previous,
            PluginOutcome::Reload => ModeOutcome::Reload,
            PluginOutcome::Reset => ModeOutcome::Reset,
            // a switch without a target has nowhere to go
            PluginOutcome::Switch => self.index.map_or(ModeOutcome::Exit, ModeOutcome::Switch),
        }
    }
}

pub struct PluginMode {
    pub id: PluginId,
    pub root_dir: PathBuf,
    manifest: PluginManifest,
    status: PluginStatus,
    rows: Vec<String>,
    message: Option<String>,
    #[cfg(feature = "plugins")]
    module: Option<extism::Plugin>,
}

impl PluginMode {
    pub fn new(id: PluginId, root_dir: PathBuf, manifest: PluginManifest) -> Self {
        Self {
            id,
            root_dir,
            manifest,
            status: PluginStatus::Discovered,
            rows: Vec::new(),
            message: None,
            #[cfg(feature = "plugins")]
            module: None,
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> &PluginStatus {
        &self.status
    }

    fn set_rows(&mut self, raw: &str) {
        self.rows = raw
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
    }

    fn fail(&mut self, reason: String) -> ModeError {
        self.status = PluginStatus::Error(reason.clone());
        ModeError::init(self.manifest.name.clone(), reason)
    }

    #[cfg(feature = "plugins")]
    fn load(&mut self) -> Result<(), ModeError> {
        let wasm_path = self.manifest.entry_path(&self.root_dir);
        if !wasm_path.is_file() {
            return Err(self.fail(format!("missing wasm entry: {}", wasm_path.display())));
        }

        let manifest = extism::Manifest::new([extism::Wasm::file(&wasm_path)]);
        let mut module = extism::Plugin::new(&manifest, [], true)
            .map_err(|err| self.fail(format!("{}: {err}", wasm_path.display())))?;
        let raw = module
            .call::<&str, String>("entries", "")
            .map_err(|err| self.fail(format!("entries: {err}")))?;

        self.set_rows(&raw);
        self.module = Some(module);
        self.status = PluginStatus::Loaded;
        tracing::info!("loaded plugin {} ({} rows)", self.manifest.name, self.rows.len());
        Ok(())
    }

    #[cfg(not(feature = "plugins"))]
    fn load(&mut self) -> Result<(), ModeError> {
        self.status = PluginStatus::Error("plugin support is not compiled in".to_string());
        Err(ModeError::PluginsDisabled(self.manifest.name.clone()))
    }

    #[cfg(feature = "plugins")]
    fn call_result(&mut self, request: &str) -> Result<String, String> {
        let module = self
            .module
            .as_mut()
            .ok_or_else(|| "plugin is not loaded".to_string())?;
        module
            .call::<&str, String>("result", request)
            .map_err(|err| err.to_string())
    }

    #[cfg(not(feature = "plugins"))]
    fn call_result(&mut self, _request: &str) -> Result<String, String> {
        Err("plugin support is not compiled in".to_string())
    }

    /// Apply a reply from the module and map it to an outcome.
    fn apply_reply(&mut self, raw: &str) -> ModeOutcome {
        match serde_json::from_str::<PluginReply>(raw) {
            Ok(reply) => {
                if let Some(entries) = &reply.entries {
                    self.rows = entries.clone();
                }
                self.message = reply.message.clone();
                reply.outcome()
            }
            Err(err) => {
                tracing::warn!("plugin {} sent a bad reply: {err}", self.manifest.name);
                self.message = Some(format!("bad reply from plugin: {err}"));
                ModeOutcome::Reload
            }
        }
    }
}

impl Mode for PluginMode {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn init(&mut self, _ctx: &ModeContext) -> Result<(), ModeError> {
        self.load()
    }

    fn destroy(&mut self) {
        #[cfg(feature = "plugins")]
        {
            self.module = None;
        }
        self.rows.clear();
        self.status = PluginStatus::Discovered;
    }

    fn num_entries(&self) -> usize {
        self.rows.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        self.rows.get(index).map(|row| Cow::Borrowed(row.as_str()))
    }

    fn result(&mut self, ret: MenuReturn, input: &mut String, selected: Option<usize>) -> ModeOutcome {
        let (action, key) = match ret {
            MenuReturn::Cancel => return ModeOutcome::Exit,
            MenuReturn::Accept => (PluginAction::Accept, None),
            MenuReturn::AcceptCustom => (PluginAction::AcceptCustom, None),
            MenuReturn::DeleteEntry => (PluginAction::Delete, None),
            MenuReturn::CustomKey(n) => (PluginAction::CustomKey, Some(n)),
            _ => return ModeOutcome::Reload,
        };
        let request = PluginRequest {
            action,
            input: input.as_str(),
            selected: selected
                .and_then(|index| self.rows.get(index))
                .map(String::as_str),
            key,
        };
        let request = match serde_json::to_string(&request) {
            Ok(request) => request,
            Err(err) => {
                tracing::error!("cannot encode plugin request: {err}");
                return ModeOutcome::Reload;
            }
        };

        match self.call_result(&request) {
            Ok(reply) => self.apply_reply(&reply),
            Err(err) => {
                tracing::error!("plugin {} failed: {err}", self.manifest.name);
                self.message = Some(err);
                ModeOutcome::Reload
            }
        }
    }

    fn message(&self) -> Option<String> {
        if let PluginStatus::Error(reason) = &self.status {
            return Some(reason.clone());
        }
        self.message
            .clone()
            .or_else(|| self.manifest.description.clone())
    }
}
