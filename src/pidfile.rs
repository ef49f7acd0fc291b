//! Single-instance guard.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::error::PidFileError;

pub const PIDFILE_NAME: &str = "quiver.pid";

/// Holds the pidfile for the life of the process and removes it on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claim `path`. A live owner is an error unless `replace` is set, in
    /// which case it is asked to terminate first.
    pub fn acquire(path: &Path, replace: bool) -> Result<Self, PidFileError> {
        let io_err = |source| PidFileError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(owner) = read_owner(path) {
            if owner != std::process::id() as i32 && is_alive(owner) {
                if !replace {
                    return Err(PidFileError::AlreadyRunning(owner));
                }
                tracing::info!("replacing running instance {owner}");
                if let Err(err) = kill(Pid::from_raw(owner), Signal::SIGTERM) {
                    tracing::warn!("failed to signal {owner}: {err}");
                }
                wait_for_exit(owner);
            } else {
                tracing::debug!("removing stale pidfile {}", path.display());
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, format!("{}\n", std::process::id())).map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        // only remove it while it still names us
        if read_owner(&self.path) == Some(std::process::id() as i32) {
            if let Err(err) = std::fs::remove_file(&self.path) {
                tracing::warn!("failed to remove {}: {err}", self.path.display());
            }
        }
    }
}

fn read_owner(path: &Path) -> Option<i32> {
    std::fs::read_to_string(path)
        .ok()?
        .trim()
        .parse()
        .ok()
        .filter(|pid: &i32| *pid > 0)
}

fn is_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

fn wait_for_exit(pid: i32) {
    for _ in 0..20 {
        if !is_alive(pid) {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    tracing::warn!("instance {pid} is still running");
}
