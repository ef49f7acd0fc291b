//! Executables found on `$PATH`, most recently used first.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use super::history::History;
use super::{EntryJob, MenuReturn, Mode, ModeContext, ModeOutcome, accepted_text, launch};
use crate::error::ModeError;

pub struct RunMode {
    history_path: PathBuf,
    history: Option<History>,
    scanned: Vec<String>,
    entries: Vec<String>,
    scan_pending: bool,
    message: Option<String>,
}

impl RunMode {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            history_path: cache_dir.join("quiver.runcache"),
            history: None,
            scanned: Vec::new(),
            entries: Vec::new(),
            scan_pending: false,
            message: None,
        }
    }

    /// History first, then the scanned executables not already listed.
    fn rebuild(&mut self) {
        let history = self.history.as_ref();
        self.entries = history
            .into_iter()
            .flat_map(History::entries)
            .map(str::to_string)
            .collect();
        self.entries.extend(
            self.scanned
                .iter()
                .filter(|entry| !history.is_some_and(|history| history.contains(entry)))
                .cloned(),
        );
    }
}

impl Mode for RunMode {
    fn name(&self) -> &str {
        "run"
    }

    fn init(&mut self, _ctx: &ModeContext) -> Result<(), ModeError> {
        self.history = Some(History::load(&self.history_path));
        self.scan_pending = true;
        self.rebuild();
        Ok(())
    }

    fn destroy(&mut self) {
        self.history = None;
        self.scanned.clear();
        self.entries.clear();
    }

    fn num_entries(&self) -> usize {
        self.entries.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        self.entries.get(index).map(|entry| Cow::Borrowed(entry.as_str()))
    }

    fn result(&mut self, ret: MenuReturn, input: &mut String, selected: Option<usize>) -> ModeOutcome {
        match ret {
            MenuReturn::Cancel => ModeOutcome::Exit,
            MenuReturn::DeleteEntry => {
                let Some(entry) = selected.and_then(|index| self.entries.get(index)).cloned() else {
                    return ModeOutcome::Reload;
                };
                if let Some(history) = self.history.as_mut() {
                    if let Err(err) = history.remove(&entry) {
                        tracing::warn!("{err:#}");
                    }
                }
                self.rebuild();
                ModeOutcome::Reload
            }
            MenuReturn::Accept | MenuReturn::AcceptCustom => {
                let Some(command) = accepted_text(self, ret, input, selected) else {
                    return ModeOutcome::Reload;
                };
                match launch::spawn_detached(&command) {
                    Ok(()) => {
                        if let Some(history) = self.history.as_mut() {
                            if let Err(err) = history.record(&command) {
                                tracing::warn!("{err:#}");
                            }
                        }
                        ModeOutcome::Exit
                    }
                    Err(err) => {
                        tracing::error!("{err:#}");
                        self.message = Some(format!("{err:#}"));
                        ModeOutcome::Reload
                    }
                }
            }
            _ => ModeOutcome::Reload,
        }
    }

    fn message(&self) -> Option<String> {
        self.message.clone()
    }

    fn background_job(&mut self) -> Option<EntryJob> {
        if !std::mem::take(&mut self.scan_pending) {
            return None;
        }
        let path = std::env::var_os("PATH")?;
        Some(Box::new(move || scan_path(&path)))
    }

    fn accept_entries(&mut self, entries: Vec<String>) {
        self.scanned = entries;
        self.rebuild();
    }
}

/// Sorted, de-duplicated names of the executables in a `$PATH` value.
pub fn scan_path(path: &std::ffi::OsStr) -> Vec<String> {
    let mut found = BTreeSet::new();
    for dir in std::env::split_paths(path) {
        let Ok(read) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in read.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                found.insert(name.to_string());
            }
        }
    }
    tracing::debug!("found {} executables on PATH", found.len());
    found.into_iter().collect()
}
