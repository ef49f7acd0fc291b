use std::borrow::Cow;
use std::cell::Cell;
use std::rc::Rc;

use crate::error::ModeError;
use crate::mode::{EntryJob, Mode, ModeContext, ModeOutcome};
use crate::registry::{ModeDescriptor, ModeOrigin};
use crate::mode::script::ScriptProvider;

/// Call counters shared between a [`StubMode`] and the test that built it.
#[derive(Debug, Default)]
pub struct StubStats {
    pub inits: Cell<usize>,
    pub destroys: Cell<usize>,
    pub results: Cell<usize>,
}

/// A mode with canned entries and a canned outcome.
pub struct StubMode {
    name: String,
    entries: Vec<String>,
    outcome: ModeOutcome,
    fail_init: bool,
    background: Option<Vec<String>>,
    stats: Rc<StubStats>,
}

impl StubMode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
            outcome: ModeOutcome::Exit,
            fail_init: false,
            background: None,
            stats: Rc::default(),
        }
    }

    pub fn with_entries<const N: usize>(mut self, entries: [&str; N]) -> Self {
        self.entries = entries.iter().map(|entry| entry.to_string()).collect();
        self
    }

    pub fn with_outcome(mut self, outcome: ModeOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Hand out one background job producing `entries`.
    pub fn with_background<const N: usize>(mut self, entries: [&str; N]) -> Self {
        self.background = Some(entries.iter().map(|entry| entry.to_string()).collect());
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn stats(&self) -> Rc<StubStats> {
        Rc::clone(&self.stats)
    }

    pub fn results_seen(&self) -> usize {
        self.stats.results.get()
    }

    pub fn into_descriptor(self) -> ModeDescriptor {
        let name = self.name.clone();
        let entries = self.entries.clone();
        let outcome = self.outcome;
        let fail_init = self.fail_init;
        let background = self.background.clone();
        let stats = Rc::clone(&self.stats);
        ModeDescriptor::new(ModeOrigin::Builtin, Box::new(self), move || {
            Box::new(StubMode {
                name: name.clone(),
                entries: entries.clone(),
                outcome,
                fail_init,
                background: background.clone(),
                stats: Rc::clone(&stats),
            })
        })
    }
}

impl Mode for StubMode {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _ctx: &ModeContext) -> Result<(), ModeError> {
        self.stats.inits.set(self.stats.inits.get() + 1);
        if self.fail_init {
            return Err(ModeError::init(&self.name, "stub refused to start"));
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.stats.destroys.set(self.stats.destroys.get() + 1);
    }

    fn num_entries(&self) -> usize {
        self.entries.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        self.entries.get(index).map(|entry| Cow::Borrowed(entry.as_str()))
    }

    fn result(
        &mut self,
        _ret: crate::mode::MenuReturn,
        _input: &mut String,
        _selected: Option<usize>,
    ) -> ModeOutcome {
        self.stats.results.set(self.stats.results.get() + 1);
        self.outcome
    }

    fn background_job(&mut self) -> Option<EntryJob> {
        let entries = self.background.take()?;
        Some(Box::new(move || entries))
    }

    fn accept_entries(&mut self, entries: Vec<String>) {
        self.entries = entries;
    }
}

/// Script provider that accepts nothing, or only the names it was given.
#[derive(Default)]
pub struct StubScripts {
    accepted: Vec<String>,
}

impl StubScripts {
    pub fn accepting(names: &[&str]) -> Self {
        Self {
            accepted: names.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl ScriptProvider for StubScripts {
    fn is_valid_spec(&self, spec: &str) -> bool {
        self.accepted.iter().any(|name| name == spec)
    }

    fn parse_spec(&self, spec: &str) -> Option<ModeDescriptor> {
        if !self.is_valid_spec(spec) {
            return None;
        }
        let mut descriptor = StubMode::new(spec).into_descriptor();
        descriptor.origin = ModeOrigin::Script;
        Some(descriptor)
    }
}
