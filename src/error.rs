use std::path::PathBuf;

use thiserror::Error;

/// A mode could not be set up or driven.
#[derive(Debug, Error)]
pub enum ModeError {
    #[error("failed to initialize the mode: {mode}: {reason}")]
    Init { mode: String, reason: String },

    #[error("mode {mode}: {source}")]
    Io {
        mode: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mode {0} needs plugin support, which is not compiled in")]
    PluginsDisabled(String),
}

impl ModeError {
    pub fn init(mode: impl Into<String>, reason: impl ToString) -> Self {
        Self::Init {
            mode: mode.into(),
            reason: reason.to_string(),
        }
    }
}

/// Problems with the user's configuration. Collected, never fatal on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Mode {name} is not found.")]
    UnknownMode { name: String },

    #[error("Empty mode name at position {position} in the mode list.")]
    EmptyModeName { position: usize },

    #[error("Invalid key binding for {action}: {chord}")]
    InvalidBinding { action: String, chord: String },

    #[error("Failed to load {}, using the defaults: {reason}", path.display())]
    ConfigFile { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("no modes are enabled")]
    NoActiveModes,

    #[error(transparent)]
    Init(#[from] ModeError),
}

impl SwitchError {
    /// Fatal errors end the process; the rest only cancel the pending switch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SwitchError::NoActiveModes)
    }
}

#[derive(Debug, Error)]
pub enum PluginLoadError {
    #[error("{}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("ABI version of plugin '{name}' does not match: {found:08X} expecting: {expected:08X}")]
    AbiMismatch {
        name: String,
        found: u32,
        expected: u32,
    },
}

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("another instance is already running (pid {0})")]
    AlreadyRunning(i32),

    #[error("pidfile {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_modes_are_fatal() {
        assert!(SwitchError::NoActiveModes.is_fatal());
        let init = SwitchError::from(ModeError::init("ssh", "boom"));
        assert!(!init.is_fatal());
        assert_eq!(
            init.to_string(),
            "failed to initialize the mode: ssh: boom"
        );
    }

    #[test]
    fn abi_mismatch_message_is_hex() {
        let err = PluginLoadError::AbiMismatch {
            name: "calc".into(),
            found: 1,
            expected: 7,
        };
        assert_eq!(
            err.to_string(),
            "ABI version of plugin 'calc' does not match: 00000001 expecting: 00000007"
        );
    }
}
