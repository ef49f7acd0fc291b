//! Pick one line of standard input and print it.

use std::borrow::Cow;
use std::cell::RefCell;
use std::io::BufRead;
use std::rc::Rc;

use super::{MenuReturn, Mode, ModeContext, ModeOutcome, accepted_text};
use crate::error::ModeError;

/// Where the chosen line ends up once the view closes.
pub type DmenuSelection = Rc<RefCell<Option<String>>>;

pub struct DmenuMode {
    rows: Vec<String>,
    prompt: Option<String>,
    selection: DmenuSelection,
}

impl DmenuMode {
    pub fn new(rows: Vec<String>, prompt: Option<String>) -> Self {
        Self {
            rows,
            prompt,
            selection: DmenuSelection::default(),
        }
    }

    pub fn selection(&self) -> DmenuSelection {
        Rc::clone(&self.selection)
    }
}

/// Non-empty lines of `reader`. Unreadable input counts as no input.
pub fn read_rows(reader: impl BufRead) -> Vec<String> {
    reader
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.is_empty())
        .collect()
}

impl Mode for DmenuMode {
    fn name(&self) -> &str {
        "dmenu"
    }

    fn init(&mut self, _ctx: &ModeContext) -> Result<(), ModeError> {
        Ok(())
    }

    fn num_entries(&self) -> usize {
        self.rows.len()
    }

    fn display_value(&self, index: usize) -> Option<Cow<'_, str>> {
        self.rows.get(index).map(|row| Cow::Borrowed(row.as_str()))
    }

    fn result(&mut self, ret: MenuReturn, input: &mut String, selected: Option<usize>) -> ModeOutcome {
        match ret {
            MenuReturn::Cancel => ModeOutcome::Exit,
            MenuReturn::Accept | MenuReturn::AcceptCustom => {
                match accepted_text(self, ret, input, selected) {
                    Some(text) => {
                        *self.selection.borrow_mut() = Some(text);
                        ModeOutcome::Exit
                    }
                    None => ModeOutcome::Reload,
                }
            }
            _ => ModeOutcome::Reload,
        }
    }

    fn prompt(&self) -> Option<String> {
        self.prompt.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_non_empty_lines() {
        let rows = read_rows("one\n\ntwo words\nthree".as_bytes());
        assert_eq!(rows, vec!["one", "two words", "three"]);
    }

    #[test]
    fn accept_records_the_choice() {
        let mut mode = DmenuMode::new(vec!["a".into(), "b".into()], Some("pick".into()));
        let selection = mode.selection();

        let mut input = String::new();
        assert_eq!(mode.result(MenuReturn::Accept, &mut input, None), ModeOutcome::Reload);
        assert!(selection.borrow().is_none());

        assert_eq!(mode.result(MenuReturn::Accept, &mut input, Some(1)), ModeOutcome::Exit);
        assert_eq!(selection.borrow().as_deref(), Some("b"));

        let mut input = "custom".to_string();
        mode.result(MenuReturn::AcceptCustom, &mut input, Some(0));
        assert_eq!(selection.borrow().as_deref(), Some("custom"));
    }

    #[test]
    fn cancel_leaves_nothing_selected() {
        let mut mode = DmenuMode::new(vec!["a".into()], None);
        let selection = mode.selection();
        assert_eq!(mode.result(MenuReturn::Cancel, &mut String::new(), Some(0)), ModeOutcome::Exit);
        assert!(selection.borrow().is_none());
    }
}
