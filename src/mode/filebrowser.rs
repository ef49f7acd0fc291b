//! Directory browsing: one level at a time, or every file below a root.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

use super::{EntryJob, MenuReturn, Mode, ModeContext, ModeOutcome, launch};
use crate::error::ModeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
}

pub struct FileBrowser {
    start: PathBuf,
    current: PathBuf,
    show_hidden: bool,
    nodes: Vec<FileNode>,
}

impl FileBrowser {
    pub fn new(start: PathBuf, show_hidden: bool) -> Self {
        Self {
            current: start.clone(),
            start,
            show_hidden,
            nodes: Vec::new(),
        }
    }

    pub fn current_dir(&self) -> &Path {
        &self.current
    }

    /// `..` first (unless at `/`), then directories, then files.
    pub fn refresh(&mut self) -> Result<()> {
        self.nodes.clear();
        if let Some(parent) = self.current.parent() {
            self.nodes.push(FileNode {
                path: parent.to_path_buf(),
                name: "..".to_string(),
                is_dir: true,
            });
        }
        self.nodes.extend(list_dir(&self.current, self.show_hidden)?);
        Ok(())
    }

    fn enter(&mut self, dir: PathBuf) -> ModeOutcome {
        let previous = std::mem::replace(&mut self.current, dir);
        if let Err(err) = self.refresh() {
            tracing::warn!("cannot open {}: {err:#}", self.current.display());
            self.current = previous;
            if let Err(err) = self.refresh() {
                tracing::warn!("{err:#}");
            }
            return ModeOutcome::Reload;
        }
        ModeOutcome::Reset
    }

    fn resolve_input(&self, input: &str) -> PathBuf {
        let typed = crate::model::config::expand_tilde(Path::new(input.trim()));
        if typed.is_absolute() {
            typed
        } else {
            self.current.join(typed)
        }
    }
}

impl Mode for FileBrowser {
    fn name(&self) -> &str {
        "filebrowser"
    }

    fn init(&mut self, _ctx: &ModeContext) -> Result<(), ModeError> {
        self.current = self.start.clone();
        self.refresh().map_err(|err| ModeError::init("filebrowser", format!("{err:#}")))
    }

    fn destroy(&mut self) {
        self.nodes.clear();
    }

    fn num_entries(&self) -> usize {
        self.nodes.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        self.nodes.get(index).map(|node| {
            if node.is_dir && node.name != ".." {
                Cow::Owned(format!("{}/", node.name))
            } else {
                Cow::Borrowed(node.name.as_str())
            }
        })
    }

    fn completion(&self, index: usize) -> Option<String> {
        self.nodes
            .get(index)
            .map(|node| node.path.to_string_lossy().into_owned())
    }

    fn result(&mut self, ret: MenuReturn, input: &mut String, selected: Option<usize>) -> ModeOutcome {
        let target = match (ret, selected.and_then(|index| self.nodes.get(index))) {
            (MenuReturn::Cancel, _) => return ModeOutcome::Exit,
            (MenuReturn::Accept, Some(node)) => node.path.clone(),
            (MenuReturn::Accept | MenuReturn::AcceptCustom, _) if !input.trim().is_empty() => {
                self.resolve_input(input)
            }
            _ => return ModeOutcome::Reload,
        };

        if target.is_dir() {
            self.enter(target)
        } else {
            open_path(&target)
        }
    }

    fn message(&self) -> Option<String> {
        Some(self.current_dir().display().to_string())
    }
}

/// Every file below the start directory, honouring ignore files.
pub struct RecursiveBrowser {
    start: PathBuf,
    show_hidden: bool,
    files: Vec<PathBuf>,
    walk_pending: bool,
}

impl RecursiveBrowser {
    pub fn new(start: PathBuf, show_hidden: bool) -> Self {
        Self {
            start,
            show_hidden,
            files: Vec::new(),
            walk_pending: false,
        }
    }
}

impl Mode for RecursiveBrowser {
    fn name(&self) -> &str {
        "recursivebrowser"
    }

    fn init(&mut self, _ctx: &ModeContext) -> Result<(), ModeError> {
        if !self.start.is_dir() {
            return Err(ModeError::init(
                "recursivebrowser",
                format!("{} is not a directory", self.start.display()),
            ));
        }
        self.walk_pending = true;
        Ok(())
    }

    fn destroy(&mut self) {
        self.files.clear();
    }

    fn num_entries(&self) -> usize {
        self.files.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        let path = self.files.get(index)?;
        Some(path.strip_prefix(&self.start).unwrap_or(path).to_string_lossy())
    }

    fn result(&mut self, ret: MenuReturn, input: &mut String, selected: Option<usize>) -> ModeOutcome {
        let target = match (ret, selected.and_then(|index| self.files.get(index))) {
            (MenuReturn::Cancel, _) => return ModeOutcome::Exit,
            (MenuReturn::Accept, Some(path)) => path.clone(),
            (MenuReturn::Accept | MenuReturn::AcceptCustom, _) if !input.trim().is_empty() => {
                self.start.join(input.trim())
            }
            _ => return ModeOutcome::Reload,
        };
        open_path(&target)
    }

    fn background_job(&mut self) -> Option<EntryJob> {
        if !std::mem::take(&mut self.walk_pending) {
            return None;
        }
        let start = self.start.clone();
        let show_hidden = self.show_hidden;
        Some(Box::new(move || {
            all_file_paths(&start, show_hidden)
                .into_iter()
                .map(|path| path.to_string_lossy().into_owned())
                .collect()
        }))
    }

    fn accept_entries(&mut self, entries: Vec<String>) {
        self.files = entries.into_iter().map(PathBuf::from).collect();
    }
}

fn list_dir(dir: &Path, show_hidden: bool) -> Result<Vec<FileNode>> {
    // read_dir first so an unreadable directory is an error, not an empty list
    std::fs::read_dir(dir)?;

    let mut nodes: Vec<FileNode> = WalkBuilder::new(dir)
        .max_depth(Some(1))
        .standard_filters(false)
        .hidden(!show_hidden)
        .build()
        .flatten()
        .filter_map(|entry| {
            let path = entry.path().to_path_buf();
            if path == dir {
                return None;
            }

            let is_dir = std::fs::metadata(&path).ok()?.is_dir();
            let name = entry.file_name().to_str()?.to_string();
            Some(FileNode { path, name, is_dir })
        })
        .collect();

    nodes.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });
    Ok(nodes)
}

fn all_file_paths(root: &Path, show_hidden: bool) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkBuilder::new(root)
        .hidden(!show_hidden)
        .build()
        .flatten()
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            if metadata.is_file() {
                Some(entry.path().to_path_buf())
            } else {
                None
            }
        })
        .collect();
    files.sort();
    files
}

fn open_path(path: &Path) -> ModeOutcome {
    let text = path.to_string_lossy();
    let launched = shlex::try_quote(&text)
        .with_context(|| format!("cannot quote {}", path.display()))
        .and_then(|quoted| launch::spawn_detached(&format!("xdg-open {quoted}")));
    match launched {
        Ok(()) => ModeOutcome::Exit,
        Err(err) => {
            tracing::error!("{err:#}");
            ModeOutcome::Reload
        }
    }
}
