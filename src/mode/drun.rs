//! Desktop applications from the XDG `applications` directories.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::history::History;
use super::{EntryJob, MenuReturn, Mode, ModeContext, ModeOutcome, launch};
use crate::error::ModeError;

static FIELD_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[fFuUdDnNickvm]").expect("valid field code regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopEntry {
    /// Desktop file id, e.g. `org.gnome.Nautilus.desktop`.
    pub id: String,
    pub name: String,
    pub exec: String,
    pub terminal: bool,
}

pub struct DrunMode {
    terminal: String,
    history_path: PathBuf,
    search_dirs: Vec<PathBuf>,
    history: Option<History>,
    apps: Vec<DesktopEntry>,
    scan_pending: bool,
}

impl DrunMode {
    pub fn new(terminal: String, cache_dir: PathBuf) -> Self {
        Self::with_dirs(terminal, cache_dir, application_dirs())
    }

    pub fn with_dirs(terminal: String, cache_dir: PathBuf, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            terminal,
            history_path: cache_dir.join("quiver.druncache"),
            search_dirs,
            history: None,
            apps: Vec::new(),
            scan_pending: false,
        }
    }

    /// Used apps first, in history order; the rest by name.
    fn sort_apps(&mut self) {
        let rank = |id: &str| {
            self.history
                .as_ref()
                .and_then(|history| history.entries().position(|entry| entry == id))
                .unwrap_or(usize::MAX)
        };
        let mut apps = std::mem::take(&mut self.apps);
        apps.sort_by(|a, b| {
            rank(&a.id)
                .cmp(&rank(&b.id))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        self.apps = apps;
    }

    fn launch(&mut self, app: &DesktopEntry) -> ModeOutcome {
        let exec = strip_field_codes(&app.exec);
        let command = if app.terminal {
            launch::in_terminal(&self.terminal, &exec)
        } else {
            exec
        };
        match launch::spawn_detached(&command) {
            Ok(()) => {
                if let Some(history) = self.history.as_mut() {
                    if let Err(err) = history.record(&app.id) {
                        tracing::warn!("{err:#}");
                    }
                }
                ModeOutcome::Exit
            }
            Err(err) => {
                tracing::error!("{} failed to start: {err:#}", app.name);
                ModeOutcome::Reload
            }
        }
    }
}

impl Mode for DrunMode {
    fn name(&self) -> &str {
        "drun"
    }

    fn init(&mut self, _ctx: &ModeContext) -> Result<(), ModeError> {
        self.history = Some(History::load(&self.history_path));
        self.scan_pending = true;
        Ok(())
    }

    fn destroy(&mut self) {
        self.history = None;
        self.apps.clear();
    }

    fn num_entries(&self) -> usize {
        self.apps.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        self.apps.get(index).map(|app| Cow::Borrowed(app.name.as_str()))
    }

    fn completion(&self, index: usize) -> Option<String> {
        self.apps.get(index).map(|app| strip_field_codes(&app.exec))
    }

    fn result(&mut self, ret: MenuReturn, input: &mut String, selected: Option<usize>) -> ModeOutcome {
        let app = selected.and_then(|index| self.apps.get(index)).cloned();
        match (ret, app) {
            (MenuReturn::Cancel, _) => ModeOutcome::Exit,
            (MenuReturn::Accept, Some(app)) => self.launch(&app),
            (MenuReturn::Accept | MenuReturn::AcceptCustom, _) if !input.trim().is_empty() => {
                match launch::spawn_detached(input) {
                    Ok(()) => ModeOutcome::Exit,
                    Err(err) => {
                        tracing::error!("{err:#}");
                        ModeOutcome::Reload
                    }
                }
            }
            (MenuReturn::DeleteEntry, Some(app)) => {
                if let Some(history) = self.history.as_mut() {
                    if let Err(err) = history.remove(&app.id) {
                        tracing::warn!("{err:#}");
                    }
                }
                self.sort_apps();
                ModeOutcome::Reload
            }
            _ => ModeOutcome::Reload,
        }
    }

    fn background_job(&mut self) -> Option<EntryJob> {
        if !std::mem::take(&mut self.scan_pending) {
            return None;
        }
        let dirs = self.search_dirs.clone();
        Some(Box::new(move || {
            scan_applications(&dirs)
                .iter()
                .filter_map(|app| serde_json::to_string(app).ok())
                .collect()
        }))
    }

    fn accept_entries(&mut self, entries: Vec<String>) {
        self.apps = entries
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        self.sort_apps();
    }
}

/// `$XDG_DATA_HOME/applications` then each `$XDG_DATA_DIRS/applications`.
fn application_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    match std::env::var_os("XDG_DATA_HOME") {
        Some(home) if !home.is_empty() => dirs.push(PathBuf::from(home)),
        _ => {
            if let Some(base) = directories::BaseDirs::new() {
                dirs.push(base.home_dir().join(".local/share"));
            }
        }
    }
    let data_dirs = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    dirs.extend(data_dirs.split(':').filter(|dir| !dir.is_empty()).map(PathBuf::from));
    dirs.into_iter().map(|dir| dir.join("applications")).collect()
}

/// Visible applications; the first directory providing an id wins.
pub fn scan_applications(dirs: &[PathBuf]) -> Vec<DesktopEntry> {
    let mut seen = HashSet::new();
    let mut apps = Vec::new();
    for dir in dirs {
        let walker = ignore::WalkBuilder::new(dir)
            .standard_filters(false)
            .follow_links(true)
            .build();
        for entry in walker.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("desktop") {
                continue;
            }
            let Some(id) = desktop_id(dir, path) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            match std::fs::read_to_string(path) {
                Ok(contents) => apps.extend(parse_desktop_entry(&id, &contents)),
                Err(err) => tracing::debug!("skipping {}: {err}", path.display()),
            }
        }
    }
    apps
}

/// `sub/dir/app.desktop` under an applications dir has the id `sub-dir-app.desktop`.
fn desktop_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|part| part.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("-"))
}

pub fn parse_desktop_entry(id: &str, contents: &str) -> Option<DesktopEntry> {
    let mut in_main_group = false;
    let mut name = None;
    let mut exec = None;
    let mut terminal = false;
    let mut is_application = false;

    for line in contents.lines().map(str::trim) {
        if line.starts_with('[') {
            in_main_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_main_group || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match (key.trim(), value.trim()) {
            ("Name", value) => name = Some(value.to_string()),
            ("Exec", value) => exec = Some(value.to_string()),
            ("Type", value) => is_application = value == "Application",
            ("Terminal", value) => terminal = value == "true",
            ("NoDisplay" | "Hidden", "true") => return None,
            _ => {}
        }
    }

    if !is_application {
        return None;
    }
    Some(DesktopEntry {
        id: id.to_string(),
        name: name?,
        exec: exec?,
        terminal,
    })
}

/// Drop `%f`-style field codes and unescape `%%`.
pub fn strip_field_codes(exec: &str) -> String {
    let stripped = FIELD_CODE_RE.replace_all(exec, "");
    stripped
        .replace("%%", "%")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
