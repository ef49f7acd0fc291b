//! Decides which active mode a view is bound to next.

use crate::error::SwitchError;
use crate::mode::ModeOutcome;
use crate::registry::{ModeKey, ModeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchState {
    /// No view has been bound yet.
    #[default]
    Idle,
    /// A view is bound to the active mode at this index.
    Bound(usize),
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Rebind the current view to the active mode at `index`.
    Rebind {
        index: usize,
        key: ModeKey,
        /// Empty the input and selection before rebinding.
        clear_input: bool,
    },
    /// Release the current view.
    Terminate,
}

#[derive(Debug, Default)]
pub struct ModeSwitcher {
    state: SwitchState,
}

impl ModeSwitcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn state(&self) -> SwitchState {
        self.state
    }

    pub fn current(&self) -> Option<usize> {
        match self.state {
            SwitchState::Bound(index) => Some(index),
            _ => None,
        }
    }

    /// Bind the first view of the session.
    pub fn bind_initial(
        &mut self,
        index: usize,
        registry: &mut ModeRegistry,
    ) -> Result<ModeKey, SwitchError> {
        let key = registry
            .active_key(index)
            .ok_or(SwitchError::NoActiveModes)?;
        registry.ensure_initialized(key)?;
        self.state = SwitchState::Bound(index);
        Ok(key)
    }

    /// Map a mode outcome to the next binding.
    ///
    /// On an initialization error nothing changes: the current index stays
    /// and the caller keeps showing the current view.
    pub fn apply(
        &mut self,
        outcome: ModeOutcome,
        registry: &mut ModeRegistry,
    ) -> Result<Transition, SwitchError> {
        let current = self.current().unwrap_or_default();
        let Some(index) = target_index(outcome, current, registry.active_len())? else {
            self.state = SwitchState::Terminated;
            return Ok(Transition::Terminate);
        };

        let key = registry
            .active_key(index)
            .ok_or(SwitchError::NoActiveModes)?;
        registry.ensure_initialized(key)?;

        self.state = SwitchState::Bound(index);
        Ok(Transition::Rebind {
            index,
            key,
            clear_input: outcome == ModeOutcome::Reset,
        })
    }

    pub fn terminate(&mut self) {
        self.state = SwitchState::Terminated;
    }
}

/// The active-mode index an outcome leads to, or `None` to exit.
pub fn target_index(
    outcome: ModeOutcome,
    current: usize,
    active: usize,
) -> Result<Option<usize>, SwitchError> {
    match outcome {
        ModeOutcome::Exit => Ok(None),
        ModeOutcome::Switch(target) if target >= active => Ok(None),
        _ if active == 0 => Err(SwitchError::NoActiveModes),
        ModeOutcome::Next => Ok(Some((current + 1) % active)),
        ModeOutcome::Previous => Ok(Some(if current == 0 {
            active - 1
        } else {
            (current - 1) % active
        })),
        ModeOutcome::Reload | ModeOutcome::Reset => Ok(Some(current)),
        ModeOutcome::Switch(target) => Ok(Some(target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubMode, StubScripts};

    fn target(outcome: ModeOutcome, current: usize, active: usize) -> Option<usize> {
        target_index(outcome, current, active).expect("non-fatal")
    }

    #[test]
    fn next_wraps_and_cycles_back() {
        for active in 1..=8 {
            for start in 0..active {
                assert_eq!(target(ModeOutcome::Next, start, active), Some((start + 1) % active));

                let mut index = start;
                for _ in 0..active {
                    index = target(ModeOutcome::Next, index, active).expect("bound");
                }
                assert_eq!(index, start);
            }
        }
    }

    #[test]
    fn previous_wraps_and_undoes_next() {
        for active in 1..=8 {
            for start in 0..active {
                let expected = if start == 0 { active - 1 } else { start - 1 };
                assert_eq!(target(ModeOutcome::Previous, start, active), Some(expected));

                let next = target(ModeOutcome::Next, start, active).expect("bound");
                assert_eq!(target(ModeOutcome::Previous, next, active), Some(start));
            }
        }
    }

    #[test]
    fn reload_and_reset_stay_put() {
        assert_eq!(target(ModeOutcome::Reload, 2, 4), Some(2));
        assert_eq!(target(ModeOutcome::Reset, 2, 4), Some(2));
    }

    #[test]
    fn explicit_targets_and_the_exit_sentinel() {
        assert_eq!(target(ModeOutcome::Switch(1), 0, 3), Some(1));
        for active in 0..6 {
            for current in 0..=active {
                assert_eq!(target(ModeOutcome::Switch(active), current, active), None);
                assert_eq!(target(ModeOutcome::Exit, current, active), None);
            }
        }
    }

    #[test]
    fn navigation_without_modes_is_fatal() {
        for outcome in [
            ModeOutcome::Next,
            ModeOutcome::Previous,
            ModeOutcome::Reload,
            ModeOutcome::Reset,
        ] {
            let err = target_index(outcome, 0, 0).expect_err("fatal");
            assert!(err.is_fatal());
        }
    }

    fn registry(list: &str, modes: Vec<StubMode>) -> ModeRegistry {
        let mut registry = ModeRegistry::new();
        for mode in modes {
            registry.register(mode.into_descriptor());
        }
        assert!(registry.activate(list, &StubScripts::default()).is_empty());
        registry
    }

    #[test]
    fn next_twice_wraps_back_to_run() {
        let mut registry = registry(
            "run,ssh",
            vec![StubMode::new("run"), StubMode::new("ssh"), StubMode::new("drun")],
        );
        let mut switcher = ModeSwitcher::new();

        let run = switcher.bind_initial(0, &mut registry).expect("bind");
        assert_eq!(switcher.current(), Some(0));

        let Transition::Rebind { index, key, .. } = switcher
            .apply(ModeOutcome::Next, &mut registry)
            .expect("switch")
        else {
            panic!("expected a rebind");
        };
        assert_eq!(index, 1);
        assert_eq!(registry.descriptor(key).map(|d| d.name.as_str()), Some("ssh"));

        let transition = switcher.apply(ModeOutcome::Next, &mut registry).expect("switch");
        assert_eq!(
            transition,
            Transition::Rebind {
                index: 0,
                key: run,
                clear_input: false
            }
        );
    }

    #[test]
    fn reset_asks_for_a_cleared_input() {
        let mut registry = registry("run", vec![StubMode::new("run")]);
        let mut switcher = ModeSwitcher::new();
        switcher.bind_initial(0, &mut registry).expect("bind");

        let transition = switcher.apply(ModeOutcome::Reset, &mut registry).expect("reset");
        assert!(matches!(transition, Transition::Rebind { clear_input: true, .. }));
    }

    #[test]
    fn failed_init_keeps_the_current_binding() {
        let broken = StubMode::new("broken").failing_init();
        let broken_stats = broken.stats();
        let mut registry = registry("run,broken", vec![StubMode::new("run"), broken]);
        let mut switcher = ModeSwitcher::new();
        switcher.bind_initial(0, &mut registry).expect("bind");

        let err = switcher
            .apply(ModeOutcome::Next, &mut registry)
            .expect_err("init fails");

        assert!(matches!(err, SwitchError::Init(_)));
        assert!(!err.is_fatal());
        assert_eq!(switcher.current(), Some(0));
        assert_eq!(broken_stats.inits.get(), 1);
    }

    #[test]
    fn exit_terminates() {
        let mut registry = registry("run", vec![StubMode::new("run")]);
        let mut switcher = ModeSwitcher::new();
        switcher.bind_initial(0, &mut registry).expect("bind");

        assert_eq!(
            switcher.apply(ModeOutcome::Switch(1), &mut registry).expect("exit"),
            Transition::Terminate
        );
        assert_eq!(switcher.state(), SwitchState::Terminated);
    }

    #[test]
    fn binding_without_modes_fails() {
        let mut registry = ModeRegistry::new();
        let mut switcher = ModeSwitcher::new();
        let err = switcher.bind_initial(0, &mut registry).expect_err("no modes");
        assert!(err.is_fatal());
        assert_eq!(switcher.state(), SwitchState::Idle);
    }
}
