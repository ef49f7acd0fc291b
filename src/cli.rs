use std::ffi::OsString;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};

#[derive(Parser, Debug, Default)]
#[command(name = "quiver")]
#[command(about = "A keyboard-driven launcher and mode switcher")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
    /// Show this mode (the first enabled mode when no name is given)
    #[arg(long, value_name = "MODE", num_args = 0..=1)]
    pub show: Option<Option<String>>,

    /// Enabled modes, separated by ',' or '#' (overrides the config file)
    #[arg(long, value_name = "LIST")]
    pub modes: Option<String>,

    /// Read entries from stdin and print the selected one to stdout
    #[arg(long)]
    pub dmenu: bool,

    /// Prompt shown in dmenu mode
    #[arg(short = 'p', long, value_name = "TEXT")]
    pub prompt: Option<String>,

    /// Show a dialog with this message and exit ('-' reads it from stdin)
    #[arg(short = 'e', value_name = "MESSAGE")]
    pub message: Option<String>,

    /// Disable loading of external plugins
    #[arg(long)]
    pub no_plugins: bool,

    /// Directory used to search for plugins
    #[arg(long, value_name = "DIR")]
    pub plugin_path: Option<PathBuf>,

    /// Row highlighted when the first view opens
    #[arg(long, value_name = "N")]
    pub selected_row: Option<usize>,

    /// Initial filter text
    #[arg(long, value_name = "TEXT")]
    pub filter: Option<String>,

    /// Load an alternative configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ignore user configuration, use defaults only
    #[arg(long)]
    pub no_config: bool,

    /// Replace an already running instance
    #[arg(long)]
    pub replace: bool,

    /// Write logs to this file instead of the data directory
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print the detected modes and exit
    #[arg(long)]
    pub list_modes: bool,
}

impl Cli {
    /// Parse process arguments, accepting `-show run` as well as `--show run`.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }
}

/// Rewrite single-dash long options (`-no-plugins`) to their double-dash form.
///
/// Only names clap knows as long options are touched, so values such as a
/// `-` message or a filter starting with a dash pass through untouched.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let command = Cli::command();
    let long_names: Vec<&str> = command
        .get_arguments()
        .filter_map(|arg| arg.get_long())
        .chain(["help", "version"])
        .collect();

    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(position, arg)| {
            if position == 0 {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            match text.strip_prefix('-') {
                Some(name)
                    if !name.starts_with('-')
                        && name.len() > 1
                        && long_names.contains(&name) =>
                {
                    OsString::from(format!("-{text}"))
                }
                _ => arg,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(normalize_args(args.iter().copied()))
    }

    #[test]
    fn single_dash_long_flags_are_accepted() {
        let cli = parse(&["quiver", "-show", "run", "-no-plugins", "-selected-row", "2"]);
        assert_eq!(cli.show, Some(Some("run".to_string())));
        assert!(cli.no_plugins);
        assert_eq!(cli.selected_row, Some(2));
    }

    #[test]
    fn show_without_a_mode() {
        let cli = parse(&["quiver", "-show"]);
        assert_eq!(cli.show, Some(None));

        let cli = parse(&["quiver", "--show", "--filter", "fire"]);
        assert_eq!(cli.show, Some(None));
        assert_eq!(cli.filter.as_deref(), Some("fire"));
    }

    #[test]
    fn short_flags_and_dash_values_survive() {
        let normalized = normalize_args(["quiver", "-e", "-", "-filter", "fox", "-p", "pick"]);
        let normalized: Vec<_> = normalized.iter().map(|arg| arg.to_string_lossy()).collect();
        assert_eq!(
            normalized,
            vec!["quiver", "-e", "-", "--filter", "fox", "-p", "pick"]
        );
    }

    #[test]
    fn unknown_single_dash_words_are_not_rewritten() {
        let normalized = normalize_args(["quiver", "--filter", "-bogus"]);
        assert_eq!(normalized[2], OsString::from("-bogus"));
    }
}
