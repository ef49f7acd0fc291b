//! Modes backed by an external command.
//!
//! The command is run through `sh -c`. Without an argument it prints the
//! initial rows, collected on a worker thread; after a selection it is run again with the chosen text as
//! `$1` and `QUIVER_RETV` saying why. Any rows it prints replace the list,
//! no rows closes the launcher. Lines of the form `\0key\x1fvalue` set the
//! `prompt` or `message` instead of adding a row.

use std::borrow::Cow;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Stdio};

use super::launch::OUTSIDE_ENV;
use super::{EntryJob, MenuReturn, Mode, ModeContext, ModeOutcome};
use crate::error::ModeError;
use crate::registry::{ModeDescriptor, ModeOrigin};

pub const RETV_ENV: &str = "QUIVER_RETV";

const RETV_INITIAL: u8 = 0;
const RETV_ENTRY: u8 = 1;
const RETV_CUSTOM_INPUT: u8 = 2;
/// `custom-N` is reported as `9 + N`, so `custom-1` is 10.
const RETV_CUSTOM_KEY_BASE: u8 = 9;

/// Turns mode names that match no known mode into script modes.
pub trait ScriptProvider {
    fn is_valid_spec(&self, spec: &str) -> bool;
    fn parse_spec(&self, spec: &str) -> Option<ModeDescriptor>;
}

/// Accepts ad-hoc `name:command` specs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptModes;

impl ScriptProvider for ScriptModes {
    fn is_valid_spec(&self, spec: &str) -> bool {
        split_spec(spec).is_some()
    }

    fn parse_spec(&self, spec: &str) -> Option<ModeDescriptor> {
        let (name, command) = split_spec(spec)?;
        Some(descriptor(name, command))
    }
}

fn split_spec(spec: &str) -> Option<(&str, &str)> {
    let (name, command) = spec.split_once(':')?;
    let (name, command) = (name.trim(), command.trim());
    (!name.is_empty() && !command.is_empty()).then_some((name, command))
}

fn descriptor(name: &str, command: &str) -> ModeDescriptor {
    let (name, command) = (name.to_string(), command.to_string());
    ModeDescriptor::new(
        ModeOrigin::Script,
        Box::new(ScriptMode::new(&name, &command)),
        move || Box::new(ScriptMode::new(&name, &command)),
    )
}

/// One script mode per executable in `dir`, named after the file stem.
pub fn user_scripts(dir: &Path) -> Vec<ModeDescriptor> {
    let Ok(read) = std::fs::read_dir(dir) else {
        tracing::debug!("no user scripts in {}", dir.display());
        return Vec::new();
    };

    let mut scripts: Vec<(String, String)> = read
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            let metadata = std::fs::metadata(&path).ok()?;
            if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
                return None;
            }
            let name = path.file_stem()?.to_str()?.to_string();
            match shlex::try_quote(path.to_str()?) {
                Ok(command) => Some((name, command.into_owned())),
                Err(err) => {
                    tracing::warn!("skipping script {}: {err}", path.display());
                    None
                }
            }
        })
        .collect();
    scripts.sort();

    scripts
        .iter()
        .map(|(name, command)| descriptor(name, command))
        .collect()
}

pub struct ScriptMode {
    name: String,
    command: String,
    rows: Vec<String>,
    prompt: Option<String>,
    message: Option<String>,
    listing_pending: bool,
}

impl ScriptMode {
    pub fn new(name: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            rows: Vec::new(),
            prompt: None,
            message: None,
            listing_pending: false,
        }
    }

    /// Replace rows and options with the script's output.
    fn load<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        self.rows.clear();
        self.message = None;
        for line in lines {
            match line.strip_prefix('\0') {
                Some(option) => self.apply_option(option),
                None => self.rows.push(line.to_string()),
            }
        }
    }

    fn apply_option(&mut self, option: &str) {
        let Some((key, value)) = option.split_once('\x1f') else {
            tracing::debug!("script {}: malformed option {option:?}", self.name);
            return;
        };
        match key {
            "prompt" => self.prompt = Some(value.to_string()),
            "message" => self.message = Some(value.to_string()),
            other => tracing::debug!("script {}: unsupported option {other}", self.name),
        }
    }
}

impl Mode for ScriptMode {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _ctx: &ModeContext) -> Result<(), ModeError> {
        self.listing_pending = true;
        Ok(())
    }

    fn destroy(&mut self) {
        self.rows.clear();
        self.prompt = None;
        self.message = None;
        self.listing_pending = false;
    }

    fn num_entries(&self) -> usize {
        self.rows.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        self.rows.get(index).map(|row| Cow::Borrowed(row.as_str()))
    }

    fn result(&mut self, ret: MenuReturn, input: &mut String, selected: Option<usize>) -> ModeOutcome {
        let selected_row = selected.and_then(|index| self.rows.get(index)).cloned();
        let (retv, arg) = match (ret, selected_row) {
            (MenuReturn::Cancel, _) => return ModeOutcome::Exit,
            (MenuReturn::Accept, Some(row)) => (RETV_ENTRY, row),
            (MenuReturn::Accept | MenuReturn::AcceptCustom, _) if !input.is_empty() => {
                (RETV_CUSTOM_INPUT, input.clone())
            }
            (MenuReturn::CustomKey(n), row) => (
                RETV_CUSTOM_KEY_BASE.saturating_add(n),
                row.unwrap_or_else(|| input.clone()),
            ),
            _ => return ModeOutcome::Reload,
        };

        match execute(&self.name, &self.command, retv, Some(&arg)) {
            Ok(output) => {
                self.load(output.lines());
                if self.rows.is_empty() {
                    ModeOutcome::Exit
                } else {
                    ModeOutcome::Reset
                }
            }
            Err(err) => {
                tracing::error!("script {} failed: {err}", self.name);
                self.message = Some(err.to_string());
                ModeOutcome::Reload
            }
        }
    }

    fn prompt(&self) -> Option<String> {
        self.prompt.clone()
    }

    fn message(&self) -> Option<String> {
        self.message.clone()
    }

    fn background_job(&mut self) -> Option<EntryJob> {
        if !std::mem::take(&mut self.listing_pending) {
            return None;
        }
        let (name, command) = (self.name.clone(), self.command.clone());
        Some(Box::new(move || match execute(&name, &command, RETV_INITIAL, None) {
            Ok(output) => output.lines().map(str::to_string).collect(),
            Err(err) => {
                tracing::error!("script {name} failed: {err}");
                vec![format!("\0message\x1f{err}")]
            }
        }))
    }

    fn accept_entries(&mut self, entries: Vec<String>) {
        self.load(entries.iter().map(String::as_str));
    }
}

/// Run the script once and collect what it prints.
fn execute(name: &str, command: &str, retv: u8, arg: Option<&str>) -> std::io::Result<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .arg(name)
        .args(arg)
        .env(RETV_ENV, retv.to_string())
        .env(OUTSIDE_ENV, "1")
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()?;
    if !output.status.success() {
        tracing::warn!("script {name} exited with {}", output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(mode: &ScriptMode) -> Vec<String> {
        (0..mode.num_entries())
            .filter_map(|i| mode.display_value(i).map(Cow::into_owned))
            .collect()
    }

    fn start(mode: &mut ScriptMode) {
        mode.init(&ModeContext::default()).expect("init");
        let job = mode.background_job().expect("initial listing");
        mode.accept_entries(job());
    }

    #[test]
    fn specs_need_a_name_and_a_command() {
        let scripts = ScriptModes;
        assert!(scripts.is_valid_spec("fruit:echo apple"));
        assert!(!scripts.is_valid_spec("fruit"));
        assert!(!scripts.is_valid_spec(":echo apple"));
        assert!(!scripts.is_valid_spec("fruit:  "));

        let descriptor = scripts.parse_spec("fruit:echo apple").expect("descriptor");
        assert_eq!(descriptor.name, "fruit");
        assert_eq!(descriptor.origin, ModeOrigin::Script);
    }

    #[test]
    fn initial_rows_and_options() {
        let mut mode = ScriptMode::new(
            "fruit",
            r#"printf 'apple\nbanana\n\0prompt\037pick\n\0message\037ripe only\n'"#,
        );
        start(&mut mode);

        assert_eq!(rows(&mode), vec!["apple", "banana"]);
        assert_eq!(mode.prompt().as_deref(), Some("pick"));
        assert_eq!(mode.message().as_deref(), Some("ripe only"));
    }

    #[test]
    fn selection_runs_the_script_again() {
        let script = r#"if [ -z "$1" ]; then echo one; echo two; elif [ "$1" = quit ]; then :; else echo "got $1 retv $QUIVER_RETV"; fi"#;
        let mut mode = ScriptMode::new("echoer", script);
        start(&mut mode);

        let mut input = String::new();
        assert_eq!(mode.result(MenuReturn::Accept, &mut input, Some(1)), ModeOutcome::Reset);
        assert_eq!(rows(&mode), vec!["got two retv 1"]);

        let mut input = "typed".to_string();
        assert_eq!(mode.result(MenuReturn::AcceptCustom, &mut input, Some(0)), ModeOutcome::Reset);
        assert_eq!(rows(&mode), vec!["got typed retv 2"]);

        let mut input = String::new();
        assert_eq!(mode.result(MenuReturn::CustomKey(1), &mut input, Some(0)), ModeOutcome::Reset);
        assert_eq!(rows(&mode), vec!["got got typed retv 2 retv 10"]);

        let mut input = "quit".to_string();
        assert_eq!(mode.result(MenuReturn::AcceptCustom, &mut input, None), ModeOutcome::Exit);
    }

    #[test]
    fn init_leaves_the_initial_listing_to_a_worker() {
        let mut mode = ScriptMode::new("slow", "sleep 2; echo late");
        let started = std::time::Instant::now();
        mode.init(&ModeContext::default()).expect("init");
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(mode.num_entries(), 0);

        assert!(mode.background_job().is_some());
        assert!(mode.background_job().is_none());
        mode.destroy();
        assert!(mode.background_job().is_none());
    }

    #[test]
    fn user_scripts_are_named_after_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("power menu.sh");
        std::fs::write(&script, "#!/bin/sh\necho reboot\n").expect("write");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        std::fs::write(dir.path().join("README"), "not a script").expect("write");

        let descriptors = user_scripts(dir.path());
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "power menu");
        assert!(user_scripts(&dir.path().join("missing")).is_empty());
    }
}
