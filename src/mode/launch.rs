//! Starting programs picked from a mode.

use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

/// Set in the environment of everything quiver starts.
pub const OUTSIDE_ENV: &str = "QUIVER_OUTSIDE";

/// Run `command` through `sh -c`, detached from the launcher.
///
/// The child gets its own process group and no stdio, so it outlives quiver
/// and never draws on the launcher's terminal.
pub fn spawn_detached(command: &str) -> Result<()> {
    let command = command.trim();
    if command.is_empty() {
        anyhow::bail!("empty command");
    }

    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env(OUTSIDE_ENV, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .with_context(|| format!("failed to start `{command}`"))?;

    tracing::info!(pid = child.id(), "launched {command}");
    Ok(())
}

/// `<terminal> -e <command>`.
pub fn in_terminal(terminal: &str, command: &str) -> String {
    format!("{terminal} -e {command}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_commands_are_refused() {
        assert!(spawn_detached("   ").is_err());
    }

    #[test]
    fn terminal_wrapping() {
        assert_eq!(in_terminal("xterm", "ssh box"), "xterm -e ssh box");
    }
}
