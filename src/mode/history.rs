//! Usage-ordered launch history, one `<count> <entry>` line per item.

use std::path::PathBuf;

use anyhow::{Context, Result};

const MAX_ENTRIES: usize = 25;

#[derive(Debug, Clone)]
pub struct History {
    path: PathBuf,
    items: Vec<(String, u32)>,
}

impl History {
    /// Read the history file. A missing or unreadable file is an empty history.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match std::fs::read_to_string(&path) {
            Ok(contents) => parse(&contents),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("failed to read history {}: {err}", path.display());
                }
                Vec::new()
            }
        };
        Self { path, items }
    }

    /// Entries, most used first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(entry, _)| entry.as_str())
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.items.iter().any(|(candidate, _)| candidate == entry)
    }

    /// Count one more use of `entry`. It goes ahead of entries with the same
    /// count, so a fresh entry survives the cut to `MAX_ENTRIES`.
    pub fn record(&mut self, entry: &str) -> Result<()> {
        let count = match self.items.iter().position(|(candidate, _)| candidate == entry) {
            Some(index) => self.items.remove(index).1.saturating_add(1),
            None => 1,
        };
        let at = self.items.partition_point(|(_, other)| *other > count);
        self.items.insert(at, (entry.to_string(), count));
        self.items.truncate(MAX_ENTRIES);
        self.save()
    }

    /// Forget `entry`. Returns false when it was not in the history.
    pub fn remove(&mut self, entry: &str) -> Result<bool> {
        let before = self.items.len();
        self.items.retain(|(candidate, _)| candidate != entry);
        if self.items.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents: String = self
            .items
            .iter()
            .map(|(entry, count)| format!("{count} {entry}\n"))
            .collect();
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write history {}", self.path.display()))
    }
}

fn parse(contents: &str) -> Vec<(String, u32)> {
    let mut items: Vec<(String, u32)> = contents
        .lines()
        .filter_map(|line| {
            let (count, entry) = line.trim_end().split_once(' ')?;
            let count = count.parse().ok()?;
            (!entry.is_empty()).then(|| (entry.to_string(), count))
        })
        .collect();
    items.sort_by(|a, b| b.1.cmp(&a.1));
    items
}
