//! The mode capability and the built-in modes.
//!
//! A mode supplies a list of entries, renders each row as text, and decides
//! what happens once the user is done with the view (run something, rebuild
//! the list, move on to another mode, or exit).

pub mod combi;
pub mod dmenu;
pub mod drun;
pub mod filebrowser;
pub mod history;
pub mod keys;
pub mod launch;
pub mod run;
pub mod script;
pub mod ssh;

use std::borrow::Cow;
use std::rc::Rc;

use crate::error::ModeError;
use crate::keymap::Keymap;
use crate::model::config::Settings;
use crate::registry::{ModeDescriptor, ModeOrigin};

/// What the user did to finish a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuReturn {
    /// Accept the highlighted entry.
    Accept,
    /// Accept the typed text verbatim, ignoring the highlighted entry.
    AcceptCustom,
    Cancel,
    /// Move on to the next active mode.
    Next,
    /// Move back to the previous active mode.
    Previous,
    /// Jump straight to the active mode at this index.
    QuickSwitch(usize),
    /// Remove the highlighted entry (history, for instance).
    DeleteEntry,
    /// One of the user-defined custom keys, numbered from 1.
    CustomKey(u8),
}

/// What a mode asks for once it has handled a [`MenuReturn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeOutcome {
    Exit,
    Next,
    Previous,
    /// Rebind the same mode; its entry list is read again.
    Reload,
    /// Rebind the same mode with an empty input and selection.
    Reset,
    /// Bind the active mode at this index. Out-of-range targets exit.
    Switch(usize),
}

/// Work that produces a mode's entries off the event-loop thread.
pub type EntryJob = Box<dyn FnOnce() -> Vec<String> + Send + 'static>;

/// Creates a fresh, uninitialized instance of a mode.
pub type ModeFactory = Rc<dyn Fn() -> Box<dyn Mode>>;

pub trait Mode {
    fn name(&self) -> &str;

    fn display_name(&self) -> &str {
        self.name()
    }

    /// One-time setup. Only called on an uninitialized (or destroyed) mode.
    fn init(&mut self, ctx: &ModeContext) -> Result<(), ModeError>;

    /// Release everything `init` acquired.
    fn destroy(&mut self) {}

    fn num_entries(&self) -> usize;

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>>;

    /// Text placed in the input when the user asks to complete `index`.
    fn completion(&self, index: usize) -> Option<String> {
        self.display_value(index).map(Cow::into_owned)
    }

    fn result(&mut self, ret: MenuReturn, input: &mut String, selected: Option<usize>) -> ModeOutcome;

    /// Prompt shown in front of the input. Defaults to the display name.
    fn prompt(&self) -> Option<String> {
        None
    }

    fn message(&self) -> Option<String> {
        None
    }

    fn preprocess_input(&self, input: &str) -> String {
        input.to_string()
    }

    /// Whether entry `index` may be shown at all for this input, before any
    /// fuzzy matching.
    fn row_visible(&self, _index: usize, _input: &str) -> bool {
        true
    }

    /// Work to run in the background before the entry list is complete.
    fn background_job(&mut self) -> Option<EntryJob> {
        None
    }

    /// Receives the output of a finished [`EntryJob`].
    fn accept_entries(&mut self, _entries: Vec<String>) {}
}

/// Lets a mode create instances of other catalogue modes while it initializes.
#[derive(Clone, Default)]
pub struct ModeContext {
    factories: Vec<(String, ModeFactory)>,
}

impl ModeContext {
    pub fn new(factories: Vec<(String, ModeFactory)>) -> Self {
        Self { factories }
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn Mode>> {
        self.factories
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, factory)| factory())
    }
}

fn builtin<M: Mode + 'static>(make: impl Fn() -> M + 'static) -> ModeDescriptor {
    ModeDescriptor::new(ModeOrigin::Builtin, Box::new(make()), move || Box::new(make()))
}

/// The modes compiled into quiver, in catalogue order.
pub fn builtins(settings: &Settings, keymap: &Keymap) -> Vec<ModeDescriptor> {
    let cache_dir = settings.cache_dir.clone();
    let terminal = settings.terminal.clone();
    let combi_modes = settings.combi_modes.clone();
    let browse_dir = std::path::PathBuf::from(&settings.filebrowser.directory);
    let show_hidden = settings.filebrowser.show_hidden;
    let keymap = keymap.clone();

    vec![
        builtin({
            let cache_dir = cache_dir.clone();
            move || run::RunMode::new(cache_dir.clone())
        }),
        builtin({
            let terminal = terminal.clone();
            move || ssh::SshMode::new(terminal.clone())
        }),
        builtin(move || drun::DrunMode::new(terminal.clone(), cache_dir.clone())),
        builtin(move || combi::CombiMode::new(&combi_modes)),
        builtin(move || keys::KeysMode::new(keymap.clone())),
        builtin({
            let browse_dir = browse_dir.clone();
            move || filebrowser::FileBrowser::new(browse_dir.clone(), show_hidden)
        }),
        builtin(move || filebrowser::RecursiveBrowser::new(browse_dir.clone(), show_hidden)),
    ]
}

/// Turns a finished view into a mode outcome.
///
/// Mode navigation is handled here so no individual mode has to know about it.
pub fn dispatch_result(
    mode: &mut dyn Mode,
    ret: MenuReturn,
    input: &mut String,
    selected: Option<usize>,
) -> ModeOutcome {
    match ret {
        MenuReturn::Next => ModeOutcome::Next,
        MenuReturn::Previous => ModeOutcome::Previous,
        MenuReturn::QuickSwitch(index) => ModeOutcome::Switch(index),
        _ => mode.result(ret, input, selected),
    }
}

/// Entry text for an accept: the highlighted row, or the typed text for a
/// custom accept or when nothing is highlighted.
pub(crate) fn accepted_text(
    mode: &dyn Mode,
    ret: MenuReturn,
    input: &str,
    selected: Option<usize>,
) -> Option<String> {
    match (ret, selected) {
        (MenuReturn::Accept, Some(index)) => mode.display_value(index).map(Cow::into_owned),
        (MenuReturn::Accept | MenuReturn::AcceptCustom, _) => {
            let text = input.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}
