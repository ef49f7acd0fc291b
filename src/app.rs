use std::collections::HashMap;
use std::sync::mpsc;

use anyhow::Result;
use ratatui::Frame;

use crate::diagnostics::Diagnostics;
use crate::keymap::Keymap;
use crate::mode::dmenu::{DmenuMode, DmenuSelection};
use crate::mode::script::{self, ScriptModes};
use crate::mode::{self, ModeOutcome};
use crate::model::config::Settings;
use crate::msg::Msg;
use crate::plugin::PluginLoader;
use crate::registry::{ModeDescriptor, ModeKey, ModeOrigin, ModeRegistry};
use crate::switcher::{ModeSwitcher, Transition};
use crate::view::render::{self, ModeBar};
use crate::view::{FilterOptions, View, ViewStack};
use crate::worker::{self, GenerationClock};

/// `EX_DATAERR`: startup errors and failed first binds.
pub const EX_DATAERR: i32 = 65;

/// What the command line asked to show first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    /// `-e`: a message dialog and nothing else.
    Message(String),
    /// `-show`, with or without a mode name.
    Show(Option<String>),
    /// No instruction at all.
    Nothing,
}

pub struct App {
    settings: Settings,
    registry: ModeRegistry,
    switcher: ModeSwitcher,
    views: ViewStack,
    keymap: Keymap,
    diagnostics: Diagnostics,
    scripts: ScriptModes,
    clock: GenerationClock,
    event_tx: mpsc::Sender<Msg>,
    /// Generation of the newest background job per mode.
    jobs: HashMap<ModeKey, u64>,
    dmenu_selection: Option<DmenuSelection>,
    pub should_quit: bool,
    exit_code: i32,
}

impl App {
    /// Launcher session over every discoverable mode.
    pub fn new(settings: Settings, event_tx: mpsc::Sender<Msg>) -> Self {
        let mut diagnostics = Diagnostics::default();
        let keymap = load_keymap(&settings, &mut diagnostics);

        let plugin_dirs = if settings.plugins_enabled {
            settings.plugin_dirs.clone()
        } else {
            tracing::info!("plugins disabled");
            Vec::new()
        };
        let user_scripts = settings
            .scripts_dir
            .as_deref()
            .map(script::user_scripts)
            .unwrap_or_default();

        let mut registry = ModeRegistry::new();
        registry.collect(
            mode::builtins(&settings, &keymap),
            &plugin_dirs,
            &PluginLoader::default(),
            user_scripts,
            &mut diagnostics,
        );

        let modes = settings.modes.clone();
        Self::with_registry(settings, event_tx, registry, keymap, diagnostics).activate(&modes)
    }

    /// Session with a single dmenu mode over `rows`.
    pub fn dmenu(settings: Settings, event_tx: mpsc::Sender<Msg>, rows: Vec<String>) -> Self {
        let mut diagnostics = Diagnostics::default();
        let keymap = load_keymap(&settings, &mut diagnostics);

        let make_prompt = settings.dmenu_prompt.clone();
        let dmenu = DmenuMode::new(rows, make_prompt.clone());
        let selection = dmenu.selection();
        let mut registry = ModeRegistry::new();
        registry.register(ModeDescriptor::new(ModeOrigin::Builtin, Box::new(dmenu), move || {
            Box::new(DmenuMode::new(Vec::new(), make_prompt.clone()))
        }));

        let mut app = Self::with_registry(settings, event_tx, registry, keymap, diagnostics)
            .activate("dmenu");
        app.dmenu_selection = Some(selection);
        app
    }

    fn with_registry(
        settings: Settings,
        event_tx: mpsc::Sender<Msg>,
        registry: ModeRegistry,
        keymap: Keymap,
        mut diagnostics: Diagnostics,
    ) -> Self {
        for err in &settings.config_errors {
            diagnostics.error(err.to_string());
        }
        Self {
            settings,
            registry,
            switcher: ModeSwitcher::new(),
            views: ViewStack::default(),
            keymap,
            diagnostics,
            scripts: ScriptModes,
            clock: GenerationClock::new(),
            event_tx,
            jobs: HashMap::new(),
            dmenu_selection: None,
            should_quit: false,
            exit_code: 0,
        }
    }

    fn activate(mut self, list: &str) -> Self {
        for err in self.registry.activate(list, &self.scripts) {
            self.diagnostics.error(err.to_string());
        }
        self
    }

    /// Warnings gathered so far, to be printed before the UI starts.
    pub fn take_warnings(&mut self) -> Vec<String> {
        self.diagnostics.take_warnings()
    }

    /// One line per known mode, enabled ones marked with `*`.
    pub fn list_modes(&self) -> Vec<String> {
        self.registry
            .listing()
            .into_iter()
            .map(|(name, active)| format!("{} {name}", if active { "*" } else { " " }))
            .collect()
    }

    /// Decide what the first view shows.
    ///
    /// Configuration errors win over everything else; the process then
    /// exits with [`EX_DATAERR`] once the dialog is dismissed.
    pub fn startup(&mut self, launch: Launch) -> Result<()> {
        if let Some(text) = self.diagnostics.startup_dialog() {
            self.show_dialog(text, EX_DATAERR);
            return Ok(());
        }

        match launch {
            Launch::Message(text) => self.show_dialog(text, 0),
            Launch::Show(Some(name)) => match self.resolve_show(&name) {
                Some(index) => self.run_mode_index(index)?,
                None => {
                    let text = self.diagnostics.startup_dialog().unwrap_or_default();
                    self.show_dialog(text, EX_DATAERR);
                }
            },
            Launch::Show(None) if self.registry.active_len() > 0 => self.run_mode_index(0)?,
            Launch::Show(None) | Launch::Nothing => {
                let text = self.unsure_text();
                self.show_dialog(text, 0);
            }
        }

        if self.views.is_empty() {
            self.should_quit = true;
        }
        Ok(())
    }

    /// Active index for `-show name`, enabling the mode when needed.
    fn resolve_show(&mut self, name: &str) -> Option<usize> {
        if let Some(index) = self.registry.active_index_of(name) {
            return Some(index);
        }

        match self.registry.enable(name, &self.scripts) {
            Ok(index) => {
                self.diagnostics
                    .warning(format!("Mode {name} is not enabled. It has been enabled for now."));
                Some(index)
            }
            Err(err) => {
                let known = self
                    .registry
                    .listing()
                    .into_iter()
                    .map(|(known, _)| format!("        * {known}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                self.diagnostics
                    .error(format!("{err}\nThe following modes are known:\n{known}"));
                None
            }
        }
    }

    fn unsure_text(&self) -> String {
        let (enabled, disabled): (Vec<_>, Vec<_>) =
            self.registry.listing().into_iter().partition(|(_, active)| *active);

        let mut text = String::from(
            "quiver is unsure what to show.\n\nPlease specify the mode you want to show.\n\n    quiver -show {mode}\n",
        );
        if !enabled.is_empty() {
            text.push_str("\nThe following modes are enabled:\n");
            for (name, _) in &enabled {
                text.push_str(&format!("    * {name}\n"));
            }
        }
        if !disabled.is_empty() {
            text.push_str("\nThe following modes can be enabled:\n");
            for (name, _) in &disabled {
                text.push_str(&format!("    * {name}\n"));
            }
        }
        text.push_str("\nTo activate a mode, add it to the modes list in the configuration.");
        text
    }

    fn show_dialog(&mut self, text: String, exit_code: i32) {
        self.exit_code = exit_code;
        self.views.set_active(View::dialog(text));
    }

    /// Bind the first view of the session to the active mode at `index`.
    fn run_mode_index(&mut self, index: usize) -> Result<()> {
        match self.switcher.bind_initial(index, &mut self.registry) {
            Ok(key) => {
                if let Some(descriptor) = self.registry.descriptor(key) {
                    tracing::info!("showing {} ({:?})", descriptor.name, descriptor.origin);
                }
                let Some(mode) = self.registry.mode(key) else {
                    return Ok(());
                };
                let generation = self.clock.next();
                let view = View::new(
                    key,
                    mode,
                    generation,
                    self.filter_options(),
                    self.settings.filter.as_deref().unwrap_or_default(),
                    self.settings.selected_row.unwrap_or_default(),
                );
                self.views.set_active(view);
                self.start_background_job(key, generation);
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err.into()),
            Err(err) => {
                let text = err.to_string();
                self.diagnostics.error(text.clone());
                self.show_dialog(text, EX_DATAERR);
                Ok(())
            }
        }
    }

    fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            max_results: self.settings.search.max_results,
            case_sensitive: self.settings.search.case_sensitive,
        }
    }

    fn start_background_job(&mut self, key: ModeKey, generation: u64) {
        let Some(job) = self.registry.mode_mut(key).and_then(|mode| mode.background_job()) else {
            return;
        };
        self.jobs.insert(key, generation);
        worker::spawn(job, key, generation, self.event_tx.clone());
    }

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Key(key) => {
                let finished = match self.views.active_mut() {
                    Some(view) => {
                        let mode = view.mode_key().and_then(|key| self.registry.mode(key));
                        view.handle_key(key, &self.keymap, mode)
                    }
                    None => false,
                };
                if finished {
                    self.process_result()?;
                }
            }
            Msg::Mouse(event) => {
                let finished = self
                    .views
                    .active_mut()
                    .is_some_and(|view| view.handle_mouse(event));
                if finished {
                    self.process_result()?;
                }
            }
            // the next draw picks up the new size
            Msg::Resize(..) => {}
            Msg::EntriesReady {
                mode,
                generation,
                entries,
            } => self.accept_entries(mode, generation, entries),
            Msg::Quit => self.should_quit = true,
        }
        Ok(())
    }

    fn accept_entries(&mut self, key: ModeKey, generation: u64, entries: Vec<String>) {
        if self.jobs.get(&key) != Some(&generation) {
            tracing::debug!("dropping stale entries for generation {generation}");
            return;
        }
        self.jobs.remove(&key);

        let Some(mode) = self.registry.mode_mut(key) else {
            tracing::debug!("dropping entries for a released mode");
            return;
        };
        mode.accept_entries(entries);

        let view = self
            .views
            .active_mut()
            .filter(|view| view.mode_key() == Some(key));
        if let (Some(view), Some(mode)) = (view, self.registry.mode(key)) {
            view.refilter(mode);
        }
    }

    /// Hand a finished view to its mode and apply the outcome.
    fn process_result(&mut self) -> Result<()> {
        let Some(view) = self.views.active_mut() else {
            return Ok(());
        };
        let Some(ret) = view.return_value() else {
            return Ok(());
        };
        let Some(current) = view.mode_key() else {
            // dismissed dialog
            self.views.remove_active();
            self.quit_when_empty();
            return Ok(());
        };

        let mut input = view.user_input().to_string();
        let selected = view.selected_entry();
        let outcome = match self.registry.mode_mut(current) {
            Some(mode) => mode::dispatch_result(mode, ret, &mut input, selected),
            None => ModeOutcome::Exit,
        };
        tracing::debug!("{ret:?} -> {outcome:?}");

        let transition = self.switcher.apply(outcome, &mut self.registry);
        let Some(view) = self.views.active_mut() else {
            return Ok(());
        };
        if input != view.user_input() {
            if let Some(mode) = self.registry.mode(current) {
                view.set_user_input(&input, mode);
            }
        }

        match transition {
            Ok(Transition::Rebind {
                key, clear_input, ..
            }) => {
                let Some(mode) = self.registry.mode(key) else {
                    return Ok(());
                };
                if clear_input {
                    view.clear_input();
                }
                let generation = self.clock.next();
                view.switch_mode(key, mode, generation);
                self.start_background_job(key, generation);
            }
            Ok(Transition::Terminate) => {
                self.views.remove_active();
                self.quit_when_empty();
            }
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                let text = err.to_string();
                view.set_message(text.clone());
                view.resume();
                self.diagnostics.error(text);
            }
        }
        Ok(())
    }

    fn quit_when_empty(&mut self) {
        if self.views.is_empty() {
            self.switcher.terminate();
            self.should_quit = true;
        }
    }

    pub fn view(&mut self, frame: &mut Frame) {
        let bar = ModeBar {
            names: self
                .registry
                .active()
                .iter()
                .filter_map(|key| self.registry.mode(*key))
                .map(|mode| mode.display_name().to_string())
                .collect(),
            current: self.switcher.current(),
            visible: self.settings.show_mode_bar && self.dmenu_selection.is_none(),
        };

        let Some(view) = self.views.active_mut() else {
            return;
        };
        let mode = view.mode_key().and_then(|key| self.registry.mode(key));
        render::render(frame, view, mode, &bar);
    }

    /// The line picked in dmenu mode.
    pub fn dmenu_output(&self) -> Option<String> {
        self.dmenu_selection
            .as_ref()
            .and_then(|selection| selection.borrow().clone())
    }

    /// Process exit status once the session is over.
    ///
    /// A dmenu session that ends without a pick fails like `dmenu` does.
    pub fn exit_code(&self) -> i32 {
        if self.exit_code == 0 && self.dmenu_selection.is_some() && self.dmenu_output().is_none() {
            return 1;
        }
        self.exit_code
    }

    /// Release every view and mode. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.views.clear();
        self.jobs.clear();
        self.registry.deactivate_all();
        self.diagnostics.clear();
        self.switcher.terminate();
        tracing::debug!("session torn down");
    }
}

fn load_keymap(settings: &Settings, diagnostics: &mut Diagnostics) -> Keymap {
    let (keymap, errors) = Keymap::new(&settings.keys);
    for err in errors {
        diagnostics.error(err.to_string());
    }
    keymap
}
