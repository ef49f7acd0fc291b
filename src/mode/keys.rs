use std::borrow::Cow;

use super::{MenuReturn, Mode, ModeContext, ModeOutcome};
use crate::error::ModeError;
use crate::keymap::Keymap;

/// Read-only listing of the effective key bindings.
pub struct KeysMode {
    keymap: Keymap,
    lines: Vec<String>,
}

impl KeysMode {
    pub fn new(keymap: Keymap) -> Self {
        Self {
            keymap,
            lines: Vec::new(),
        }
    }
}

impl Mode for KeysMode {
    fn name(&self) -> &str {
        "keys"
    }

    fn init(&mut self, _ctx: &ModeContext) -> Result<(), ModeError> {
        self.lines = self.keymap.describe();
        Ok(())
    }

    fn num_entries(&self) -> usize {
        self.lines.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        self.lines.get(index).map(|line| Cow::Borrowed(line.as_str()))
    }

    fn result(&mut self, ret: MenuReturn, _input: &mut String, _selected: Option<usize>) -> ModeOutcome {
        match ret {
            MenuReturn::Cancel => ModeOutcome::Exit,
            _ => ModeOutcome::Reload,
        }
    }

    fn message(&self) -> Option<String> {
        Some("Key bindings (set overrides in the [keys] config table)".to_string())
    }
}
