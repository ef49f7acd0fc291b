//! Hosts from the user's ssh config and known_hosts.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use super::{MenuReturn, Mode, ModeContext, ModeOutcome, accepted_text, launch};
use crate::error::ModeError;

static HOST_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*host\s+(.+)$").expect("valid host regex"));
static BRACKETED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\]]+)\]:\d+$").expect("valid bracketed host regex"));

pub struct SshMode {
    terminal: String,
    config_path: Option<PathBuf>,
    known_hosts_path: Option<PathBuf>,
    hosts: Vec<String>,
}

impl SshMode {
    pub fn new(terminal: String) -> Self {
        match directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".ssh")) {
            Some(dir) => Self::with_paths(terminal, dir.join("config"), dir.join("known_hosts")),
            None => Self {
                terminal,
                config_path: None,
                known_hosts_path: None,
                hosts: Vec::new(),
            },
        }
    }

    pub fn with_paths(terminal: String, config: PathBuf, known_hosts: PathBuf) -> Self {
        Self {
            terminal,
            config_path: Some(config),
            known_hosts_path: Some(known_hosts),
            hosts: Vec::new(),
        }
    }

    fn command(&self, host: &str) -> Result<String> {
        let host = shlex::try_quote(host).with_context(|| format!("cannot quote host {host:?}"))?;
        Ok(launch::in_terminal(&self.terminal, &format!("ssh {host}")))
    }
}

impl Mode for SshMode {
    fn name(&self) -> &str {
        "ssh"
    }

    fn init(&mut self, _ctx: &ModeContext) -> Result<(), ModeError> {
        let mut hosts = BTreeSet::new();
        if let Some(contents) = read_optional(self.config_path.as_deref()) {
            hosts.extend(config_hosts(&contents));
        }
        if let Some(contents) = read_optional(self.known_hosts_path.as_deref()) {
            hosts.extend(known_hosts(&contents));
        }
        self.hosts = hosts.into_iter().collect();
        tracing::debug!("ssh mode found {} hosts", self.hosts.len());
        Ok(())
    }

    fn destroy(&mut self) {
        self.hosts.clear();
    }

    fn num_entries(&self) -> usize {
        self.hosts.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        self.hosts.get(index).map(|host| Cow::Borrowed(host.as_str()))
    }

    fn result(&mut self, ret: MenuReturn, input: &mut String, selected: Option<usize>) -> ModeOutcome {
        if ret == MenuReturn::Cancel {
            return ModeOutcome::Exit;
        }
        let Some(host) = accepted_text(self, ret, input, selected) else {
            return ModeOutcome::Reload;
        };

        match self
            .command(&host)
            .and_then(|command| launch::spawn_detached(&command))
        {
            Ok(()) => ModeOutcome::Exit,
            Err(err) => {
                tracing::error!("{err:#}");
                ModeOutcome::Reload
            }
        }
    }
}

fn read_optional(path: Option<&Path>) -> Option<String> {
    let path = path?;
    match std::fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to read {}: {err}", path.display());
            }
            None
        }
    }
}

/// Concrete names from `Host` lines; patterns are skipped.
fn config_hosts(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| HOST_LINE_RE.captures(line))
        .flat_map(|caps| {
            caps[1]
                .split_whitespace()
                .filter(|host| !host.contains(['*', '?', '!']))
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn known_hosts(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        // hashed entries carry no usable name
        .filter(|field| !field.starts_with('|') && !field.starts_with('@'))
        .flat_map(|field| field.split(','))
        .map(|host| match BRACKETED_RE.captures(host) {
            Some(caps) => caps[1].to_string(),
            None => host.to_string(),
        })
        .filter(|host| !host.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_patterns_are_skipped() {
        let hosts = config_hosts(
            "Host *\n  User me\nHost build web-1\nhost *.internal db\nHostName ignored\n",
        );
        assert_eq!(hosts, vec!["build", "web-1", "db"]);
    }

    #[test]
    fn known_hosts_lines() {
        let hosts = known_hosts(
            "# comment\nexample.org,192.0.2.1 ssh-ed25519 AAAA\n[git.local]:2222 ssh-rsa AAAA\n|1|abc=|def= ssh-rsa AAAA\n",
        );
        assert_eq!(hosts, vec!["example.org", "192.0.2.1", "git.local"]);
    }

    #[test]
    fn init_merges_and_sorts_both_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("config");
        let known = dir.path().join("known_hosts");
        std::fs::write(&config, "Host zulu alpha\n").expect("write");
        std::fs::write(&known, "alpha ssh-ed25519 AAAA\nmike ssh-ed25519 AAAA\n").expect("write");

        let mut mode = SshMode::with_paths("xterm".into(), config, known);
        mode.init(&ModeContext::default()).expect("init");
        let hosts: Vec<_> = (0..mode.num_entries())
            .filter_map(|i| mode.display_value(i).map(Cow::into_owned))
            .collect();
        assert_eq!(hosts, vec!["alpha", "mike", "zulu"]);
    }

    #[test]
    fn missing_files_give_an_empty_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut mode = SshMode::with_paths(
            "xterm".into(),
            dir.path().join("nope"),
            dir.path().join("nope2"),
        );
        mode.init(&ModeContext::default()).expect("init");
        assert_eq!(mode.num_entries(), 0);
    }

    #[test]
    fn launch_commands_quote_the_host() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mode = SshMode::with_paths("xterm".into(), dir.path().join("a"), dir.path().join("b"));

        let words = |host: &str| shlex::split(&mode.command(host).expect("quoted")).expect("split");
        assert_eq!(words("user@host"), vec!["xterm", "-e", "ssh", "user@host"]);
        assert_eq!(words("odd host"), vec!["xterm", "-e", "ssh", "odd host"]);
        assert_eq!(words("it's"), vec!["xterm", "-e", "ssh", "it's"]);
        assert!(mode.command("bad\0host").is_err());
    }
}
