mod app;
mod cli;
mod diagnostics;
mod error;
mod keymap;
mod mode;
mod model;
mod msg;
mod pidfile;
mod plugin;
mod registry;
mod switcher;
mod view;
mod worker;

#[cfg(test)]
mod test_support;

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::{App, Launch};
use cli::Cli;
use mode::launch::OUTSIDE_ENV;
use model::config::{self, AppConfig, PLUGIN_PATH_ENV, Settings};
use msg::Msg;
use pidfile::{PIDFILE_NAME, PidFile};

fn main() {
    let cli = Cli::parse_args();
    let guard = match init_logging(cli.log.as_deref()) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("quiver: cannot set up logging: {err:#}");
            None
        }
    };

    let code = match launch(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("quiver: {err:#}");
            1
        }
    };
    tracing::info!("quiver exiting with {code}");
    // exit skips destructors; flush the log first
    drop(guard);
    std::process::exit(code);
}

/// Log to a daily file in the data directory, or to `--log`. Never stdout.
fn init_logging(explicit: Option<&Path>) -> Result<WorkerGuard> {
    let appender = match explicit {
        Some(path) => {
            let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty());
            let dir = dir.unwrap_or_else(|| Path::new("."));
            let name = path.file_name().context("log path has no file name")?;
            tracing_appender::rolling::never(dir, name)
        }
        None => {
            let log_dir = config::project_dirs()
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| std::env::temp_dir().join("quiver"));
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("creating {}", log_dir.display()))?;
            tracing_appender::rolling::daily(&log_dir, "quiver.log")
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quiver=info"));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .with_ansi(false)
        .init();

    Ok(guard)
}

fn launch(cli: Cli) -> Result<i32> {
    tracing::info!("quiver starting");

    // launched from one of our own children
    if std::env::var_os(OUTSIDE_ENV).is_some() {
        anyhow::bail!("refusing to run from inside a program quiver started");
    }

    let (config, config_error) = AppConfig::load_or_defaults(cli.config.as_deref(), cli.no_config)?;
    let env_plugin_path = std::env::var(PLUGIN_PATH_ENV).ok();
    let mut settings = Settings::resolve(config, &cli, env_plugin_path.as_deref());
    settings.config_errors.extend(config_error);
    settings.dmenu |= invoked_as_dmenu();

    std::fs::create_dir_all(&settings.cache_dir)
        .with_context(|| format!("creating cache directory {}", settings.cache_dir.display()))?;

    let (tx, rx) = mpsc::channel::<Msg>();
    let dmenu = settings.dmenu;
    let pidfile = pidfile_path(&settings);
    let mut app = if dmenu {
        let rows = mode::dmenu::read_rows(io::stdin().lock());
        tracing::info!("dmenu with {} rows", rows.len());
        App::dmenu(settings, tx.clone(), rows)
    } else {
        App::new(settings, tx.clone())
    };

    if cli.list_modes {
        for line in app.list_modes() {
            println!("{line}");
        }
        app.teardown();
        return Ok(0);
    }

    let launch = match (&cli.message, &cli.show) {
        _ if dmenu => Launch::Show(None),
        (Some(message), _) => Launch::Message(read_message(message)?),
        (None, Some(show)) => Launch::Show(show.clone()),
        (None, None) => Launch::Nothing,
    };

    let _pidfile = if dmenu {
        None
    } else {
        Some(PidFile::acquire(&pidfile, cli.replace)?)
    };

    let result = app.startup(launch).and_then(|()| {
        for warning in app.take_warnings() {
            eprintln!("{warning}");
        }
        if app.should_quit {
            return Ok(());
        }
        run_terminal(&mut app, tx, rx)
    });
    app.teardown();
    result?;

    if let Some(selection) = app.dmenu_output() {
        println!("{selection}");
    }
    Ok(app.exit_code())
}

/// `-e -` takes the message from stdin.
fn read_message(message: &str) -> Result<String> {
    if message != "-" {
        return Ok(message.to_string());
    }
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("reading message from stdin")?;
    Ok(text.trim_end().to_string())
}

fn invoked_as_dmenu() -> bool {
    std::env::args_os()
        .next()
        .map(PathBuf::from)
        .and_then(|path| path.file_name().map(|name| name == "dmenu"))
        .unwrap_or(false)
}

fn pidfile_path(settings: &Settings) -> PathBuf {
    config::project_dirs()
        .and_then(|dirs| dirs.runtime_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| settings.cache_dir.clone())
        .join(PIDFILE_NAME)
}

/// Draw on stderr so stdout stays free for dmenu output.
fn run_terminal(app: &mut App, tx: mpsc::Sender<Msg>, rx: mpsc::Receiver<Msg>) -> Result<()> {
    enable_raw_mode()?;
    let mut stderr = io::stderr();
    execute!(stderr, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stderr);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, app, tx, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stderr>>,
    app: &mut App,
    tx: mpsc::Sender<Msg>,
    rx: mpsc::Receiver<Msg>,
) -> Result<()> {
    // Input thread: terminal events become messages
    thread::spawn(move || {
        loop {
            let msg = match event::read() {
                Ok(Event::Key(key)) => Msg::Key(key),
                Ok(Event::Mouse(mouse)) => Msg::Mouse(mouse),
                Ok(Event::Resize(w, h)) => Msg::Resize(w, h),
                Ok(_) => continue,
                Err(err) => {
                    tracing::error!("terminal input failed: {err}");
                    Msg::Quit
                }
            };
            let quit = matches!(msg, Msg::Quit);
            if tx.send(msg).is_err() || quit {
                break;
            }
        }
    });

    terminal.draw(|f| app.view(f))?;

    loop {
        // Batch-drain all pending messages
        let first = rx.recv()?;
        app.update(first)?;

        while let Ok(msg) = rx.try_recv() {
            app.update(msg)?;
        }

        if app.should_quit {
            break;
        }

        terminal.draw(|f| app.view(f))?;
    }

    Ok(())
}
