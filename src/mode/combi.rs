//! Several modes presented as one list.
//!
//! Each row is prefixed with the name of the mode it came from. Typing
//! `!prefix ` first limits the list to the sub-modes whose name starts with
//! `prefix`; the rest of the input is the filter.

use std::borrow::Cow;

use super::{EntryJob, MenuReturn, Mode, ModeContext, ModeOutcome};
use crate::error::ModeError;

pub struct CombiMode {
    sub_names: Vec<String>,
    subs: Vec<Box<dyn Mode>>,
    /// (sub-mode, entry) for every row.
    rows: Vec<(usize, usize)>,
}

impl CombiMode {
    pub fn new(combi_modes: &str) -> Self {
        Self {
            sub_names: combi_modes
                .split([',', '#'])
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            subs: Vec::new(),
            rows: Vec::new(),
        }
    }

    fn rebuild_rows(&mut self) {
        self.rows = self
            .subs
            .iter()
            .enumerate()
            .flat_map(|(sub, mode)| (0..mode.num_entries()).map(move |entry| (sub, entry)))
            .collect();
    }

    /// Sub-mode picked by a leading `!prefix `, and the input after it.
    fn scope<'a>(&self, input: &'a str) -> (Option<usize>, &'a str) {
        let Some(rest) = input.strip_prefix('!') else {
            return (None, input);
        };
        let (prefix, tail) = rest.split_once(' ').unwrap_or((rest, ""));
        if prefix.is_empty() {
            return (None, tail);
        }
        let sub = self
            .subs
            .iter()
            .position(|mode| mode.name().starts_with(prefix));
        (sub, tail)
    }

    /// Create and initialize each sub-mode in order, stopping at the first failure.
    fn init_subs(&self, ctx: &ModeContext, subs: &mut Vec<Box<dyn Mode>>) -> Result<(), ModeError> {
        for name in &self.sub_names {
            if name == "combi" {
                return Err(ModeError::init("combi", "combi cannot contain itself"));
            }
            let mut mode = ctx
                .create(name)
                .ok_or_else(|| ModeError::init("combi", format!("unknown mode {name}")))?;
            mode.init(ctx)?;
            subs.push(mode);
        }
        Ok(())
    }

    fn forward(&mut self, sub: usize, ret: MenuReturn, input: &mut String, entry: Option<usize>) -> ModeOutcome {
        let outcome = self.subs[sub].result(ret, input, entry);
        if outcome == ModeOutcome::Reload || outcome == ModeOutcome::Reset {
            self.rebuild_rows();
        }
        outcome
    }
}

impl Mode for CombiMode {
    fn name(&self) -> &str {
        "combi"
    }

    fn init(&mut self, ctx: &ModeContext) -> Result<(), ModeError> {
        let mut subs = Vec::with_capacity(self.sub_names.len());
        if let Err(err) = self.init_subs(ctx, &mut subs) {
            // release the ones that did start
            for mode in &mut subs {
                mode.destroy();
            }
            return Err(err);
        }
        if subs.is_empty() {
            return Err(ModeError::init("combi", "no modes to combine"));
        }
        self.subs = subs;
        self.rebuild_rows();
        Ok(())
    }

    fn destroy(&mut self) {
        for mode in &mut self.subs {
            mode.destroy();
        }
        self.subs.clear();
        self.rows.clear();
    }

    fn num_entries(&self) -> usize {
        self.rows.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        let (sub, entry) = *self.rows.get(index)?;
        let mode = &self.subs[sub];
        let value = mode.display_value(entry)?;
        Some(Cow::Owned(format!("{} {value}", mode.display_name())))
    }

    fn completion(&self, index: usize) -> Option<String> {
        let (sub, entry) = *self.rows.get(index)?;
        self.subs[sub].completion(entry)
    }

    fn result(&mut self, ret: MenuReturn, input: &mut String, selected: Option<usize>) -> ModeOutcome {
        if ret == MenuReturn::Cancel {
            return ModeOutcome::Exit;
        }

        let (scoped, tail) = self.scope(input);
        let tail = tail.to_string();

        if ret != MenuReturn::AcceptCustom {
            if let Some((sub, entry)) = selected.and_then(|row| self.rows.get(row)).copied() {
                return self.forward(sub, ret, input, Some(entry));
            }
        }

        // Typed text goes to the scoped mode, or the first one.
        let sub = scoped.unwrap_or(0);
        if sub >= self.subs.len() {
            return ModeOutcome::Reload;
        }
        let mut text = if scoped.is_some() { tail } else { input.clone() };
        let outcome = self.forward(sub, ret, &mut text, None);
        *input = text;
        outcome
    }

    fn preprocess_input(&self, input: &str) -> String {
        match self.scope(input) {
            (Some(_), tail) => tail.to_string(),
            (None, _) => input.to_string(),
        }
    }

    fn row_visible(&self, index: usize, input: &str) -> bool {
        match (self.scope(input), self.rows.get(index)) {
            ((Some(scoped), _), Some((sub, _))) => *sub == scoped,
            _ => true,
        }
    }

    fn background_job(&mut self) -> Option<EntryJob> {
        let jobs: Vec<(usize, EntryJob)> = self
            .subs
            .iter_mut()
            .enumerate()
            .filter_map(|(sub, mode)| mode.background_job().map(|job| (sub, job)))
            .collect();
        if jobs.is_empty() {
            return None;
        }
        Some(Box::new(move || {
            jobs.into_iter()
                .filter_map(|(sub, job)| serde_json::to_string(&(sub, job())).ok())
                .collect()
        }))
    }

    fn accept_entries(&mut self, entries: Vec<String>) {
        for line in entries {
            match serde_json::from_str::<(usize, Vec<String>)>(&line) {
                Ok((sub, rows)) => {
                    if let Some(mode) = self.subs.get_mut(sub) {
                        mode.accept_entries(rows);
                    }
                }
                Err(err) => tracing::warn!("dropping combi entries: {err}"),
            }
        }
        self.rebuild_rows();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModeRegistry;
    use crate::test_support::StubMode;

    fn context() -> ModeContext {
        let mut registry = ModeRegistry::new();
        registry.register(StubMode::new("drun").with_entries(["Firefox", "Files"]).into_descriptor());
        registry.register(
            StubMode::new("run")
                .with_entries(["firefox", "htop"])
                .with_outcome(ModeOutcome::Reload)
                .into_descriptor(),
        );
        registry.context()
    }

    fn rows(mode: &CombiMode) -> Vec<String> {
        (0..mode.num_entries())
            .filter_map(|i| mode.display_value(i).map(Cow::into_owned))
            .collect()
    }

    #[test]
    fn concatenates_prefixed_rows() {
        let mut mode = CombiMode::new("drun, run");
        mode.init(&context()).expect("init");
        assert_eq!(
            rows(&mode),
            vec!["drun Firefox", "drun Files", "run firefox", "run htop"]
        );
    }

    #[test]
    fn bang_prefix_scopes_rows_and_input() {
        let mut mode = CombiMode::new("drun,run");
        mode.init(&context()).expect("init");

        assert_eq!(mode.preprocess_input("!ru fire"), "fire");
        assert_eq!(mode.preprocess_input("fire"), "fire");
        let visible: Vec<usize> = (0..mode.num_entries())
            .filter(|i| mode.row_visible(*i, "!ru fire"))
            .collect();
        assert_eq!(visible, vec![2, 3]);
        assert!((0..4).all(|i| mode.row_visible(i, "fire")));
    }

    #[test]
    fn results_go_to_the_owning_mode() {
        let mut mode = CombiMode::new("drun,run");
        mode.init(&context()).expect("init");

        let mut input = String::new();
        assert_eq!(mode.result(MenuReturn::Accept, &mut input, Some(0)), ModeOutcome::Exit);
        assert_eq!(mode.result(MenuReturn::Accept, &mut input, Some(3)), ModeOutcome::Reload);

        let mut input = "!run top".to_string();
        assert_eq!(mode.result(MenuReturn::AcceptCustom, &mut input, Some(0)), ModeOutcome::Reload);
        assert_eq!(input, "top");
    }

    #[test]
    fn unknown_or_recursive_sub_modes_fail_init() {
        assert!(CombiMode::new("drun,nope").init(&context()).is_err());
        assert!(CombiMode::new("combi").init(&context()).is_err());
        assert!(CombiMode::new("").init(&context()).is_err());
    }

    #[test]
    fn destroy_reaches_every_sub_mode() {
        let drun = StubMode::new("drun");
        let stats = drun.stats();
        let mut registry = ModeRegistry::new();
        registry.register(drun.into_descriptor());

        let mut mode = CombiMode::new("drun");
        mode.init(&registry.context()).expect("init");
        assert_eq!(stats.inits.get(), 1);
        mode.destroy();
        assert_eq!(stats.destroys.get(), 1);
        assert_eq!(mode.num_entries(), 0);
    }

    #[test]
    fn failed_init_releases_the_started_sub_modes() {
        let drun = StubMode::new("drun");
        let drun_stats = drun.stats();
        let broken = StubMode::new("broken").failing_init();
        let broken_stats = broken.stats();
        let mut registry = ModeRegistry::new();
        registry.register(drun.into_descriptor());
        registry.register(broken.into_descriptor());

        let mut mode = CombiMode::new("drun,broken");
        assert!(mode.init(&registry.context()).is_err());
        assert_eq!(drun_stats.inits.get(), 1);
        assert_eq!(drun_stats.destroys.get(), 1);
        assert_eq!(broken_stats.destroys.get(), 0);
        assert_eq!(mode.num_entries(), 0);
    }
}
