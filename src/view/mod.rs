//! The modal selection surface bound to one mode at a time.

pub mod render;
pub mod textbox;

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use ratatui::layout::Rect;

use crate::keymap::{Action, Keymap};
use crate::mode::{MenuReturn, Mode};
use crate::registry::ModeKey;
use textbox::TextInput;

const DOUBLE_CLICK: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy)]
pub struct FilterOptions {
    pub max_results: usize,
    pub case_sensitive: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            max_results: 500,
            case_sensitive: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ViewKind {
    Mode(ModeKey),
    /// Message-only view, dismissed by any key.
    Dialog(String),
}

#[derive(Debug)]
pub struct View {
    kind: ViewKind,
    generation: u64,
    input: TextInput,
    filtered: Vec<usize>,
    selected: usize,
    offset: usize,
    return_value: Option<MenuReturn>,
    message: Option<String>,
    options: FilterOptions,
    list_area: Rect,
    last_click: Option<(usize, Instant)>,
}

impl View {
    pub fn new(
        key: ModeKey,
        mode: &dyn Mode,
        generation: u64,
        options: FilterOptions,
        filter: &str,
        selected_row: usize,
    ) -> Self {
        let mut view = Self::with_kind(ViewKind::Mode(key), generation, options);
        view.input = TextInput::new(filter);
        view.refilter(mode);
        view.set_selected_row(selected_row);
        view
    }

    pub fn dialog(text: impl Into<String>) -> Self {
        Self::with_kind(ViewKind::Dialog(text.into()), 0, FilterOptions::default())
    }

    fn with_kind(kind: ViewKind, generation: u64, options: FilterOptions) -> Self {
        Self {
            kind,
            generation,
            input: TextInput::default(),
            filtered: Vec::new(),
            selected: 0,
            offset: 0,
            return_value: None,
            message: None,
            options,
            list_area: Rect::default(),
            last_click: None,
        }
    }

    pub fn mode_key(&self) -> Option<ModeKey> {
        match self.kind {
            ViewKind::Mode(key) => Some(key),
            ViewKind::Dialog(_) => None,
        }
    }

    pub fn dialog_text(&self) -> Option<&str> {
        match &self.kind {
            ViewKind::Dialog(text) => Some(text),
            ViewKind::Mode(_) => None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn return_value(&self) -> Option<MenuReturn> {
        self.return_value
    }

    pub fn user_input(&self) -> &str {
        self.input.text()
    }

    pub fn input(&self) -> &TextInput {
        &self.input
    }

    /// Replace the input text, e.g. after a mode rewrote it.
    pub fn set_user_input(&mut self, text: &str, mode: &dyn Mode) {
        self.input.set_text(text);
        self.refilter(mode);
    }

    /// Entry index of the highlighted row.
    pub fn selected_entry(&self) -> Option<usize> {
        self.filtered.get(self.selected).copied()
    }

    pub fn selected_row(&self) -> usize {
        self.selected
    }

    pub fn set_selected_row(&mut self, row: usize) {
        self.selected = row.min(self.filtered.len().saturating_sub(1));
    }

    pub fn filtered(&self) -> &[usize] {
        &self.filtered
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Rebind in place: same surface and input, new mode and generation.
    pub fn switch_mode(&mut self, key: ModeKey, mode: &dyn Mode, generation: u64) {
        self.kind = ViewKind::Mode(key);
        self.generation = generation;
        self.return_value = None;
        self.message = None;
        self.selected = 0;
        self.offset = 0;
        self.refilter(mode);
    }

    /// Forget the outcome so the view keeps taking input.
    pub fn resume(&mut self) {
        self.return_value = None;
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.selected = 0;
        self.offset = 0;
    }

    /// Recompute the visible rows from the mode's entries and the input.
    pub fn refilter(&mut self, mode: &dyn Mode) {
        let raw = self.input.text();
        let query = mode.preprocess_input(raw);
        let total = mode.num_entries();

        if query.trim().is_empty() {
            self.filtered = (0..total)
                .filter(|index| mode.row_visible(*index, raw))
                .take(self.options.max_results)
                .collect();
        } else {
            let matcher = if self.options.case_sensitive {
                SkimMatcherV2::default().respect_case()
            } else {
                SkimMatcherV2::default().ignore_case()
            };
            let mut scored: Vec<(i64, usize)> = (0..total)
                .filter(|index| mode.row_visible(*index, raw))
                .filter_map(|index| {
                    let candidate = mode.display_value(index)?;
                    matcher
                        .fuzzy_match(&candidate, query.trim())
                        .map(|score| (score, index))
                })
                .collect();
            scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            self.filtered = scored
                .into_iter()
                .take(self.options.max_results)
                .map(|(_, index)| index)
                .collect();
        }

        if self.filtered.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.filtered.len() {
            self.selected = self.filtered.len() - 1;
        }
    }

    /// Feed a key press. Returns true once the view has an outcome.
    pub fn handle_key(&mut self, key: KeyEvent, keymap: &Keymap, mode: Option<&dyn Mode>) -> bool {
        if key.kind == KeyEventKind::Release {
            return false;
        }

        let Some(mode) = mode.filter(|_| self.mode_key().is_some()) else {
            // Dialogs close on any key.
            self.return_value = Some(MenuReturn::Cancel);
            return true;
        };

        let Some(action) = keymap.lookup(&key) else {
            if let KeyCode::Char(ch) = key.code {
                if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
                    self.input.insert(ch);
                    self.refilter(mode);
                }
            }
            return false;
        };

        let finish = match action {
            Action::Accept => Some(MenuReturn::Accept),
            Action::AcceptCustom => Some(MenuReturn::AcceptCustom),
            Action::Cancel => Some(MenuReturn::Cancel),
            Action::ModeNext => Some(MenuReturn::Next),
            Action::ModePrevious => Some(MenuReturn::Previous),
            Action::DeleteEntry => Some(MenuReturn::DeleteEntry),
            Action::Custom(n) => Some(MenuReturn::CustomKey(n)),
            Action::SelectMode(n) => Some(MenuReturn::QuickSwitch(usize::from(n.saturating_sub(1)))),
            Action::RowUp => {
                self.move_selection(-1);
                None
            }
            Action::RowDown => {
                self.move_selection(1);
                None
            }
            Action::PageUp => {
                self.move_selection(-(self.page_size() as isize));
                None
            }
            Action::PageDown => {
                self.move_selection(self.page_size() as isize);
                None
            }
            Action::RowFirst => {
                self.selected = 0;
                None
            }
            Action::RowLast => {
                self.selected = self.filtered.len().saturating_sub(1);
                None
            }
            Action::Complete => {
                if let Some(text) = self.selected_entry().and_then(|entry| mode.completion(entry)) {
                    self.input.set_text(&text);
                    self.refilter(mode);
                }
                None
            }
            edit => {
                if self.edit_input(edit) {
                    self.refilter(mode);
                }
                None
            }
        };

        self.return_value = finish;
        finish.is_some()
    }

    fn edit_input(&mut self, action: Action) -> bool {
        match action {
            Action::MoveCharBack => self.input.move_back(),
            Action::MoveCharForward => self.input.move_forward(),
            Action::MoveFront => self.input.move_front(),
            Action::MoveEnd => self.input.move_end(),
            Action::MoveWordBack => self.input.move_word_back(),
            Action::MoveWordForward => self.input.move_word_forward(),
            Action::RemoveCharBack => return self.input.remove_char_back(),
            Action::RemoveCharForward => return self.input.remove_char_forward(),
            Action::RemoveWordBack => return self.input.remove_word_back(),
            Action::ClearLine => {
                let changed = !self.input.text().is_empty();
                self.input.clear();
                return changed;
            }
            _ => {}
        }
        false
    }

    /// Feed a mouse event. Returns true once the view has an outcome.
    pub fn handle_mouse(&mut self, event: MouseEvent) -> bool {
        if self.mode_key().is_none() {
            return false;
        }

        match event.kind {
            MouseEventKind::ScrollUp => self.move_selection(-1),
            MouseEventKind::ScrollDown => self.move_selection(1),
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(row) = self.row_at(event.column, event.row) else {
                    return false;
                };
                let now = Instant::now();
                let double = self
                    .last_click
                    .is_some_and(|(last, at)| last == row && now.duration_since(at) < DOUBLE_CLICK);
                self.selected = row;
                self.last_click = Some((row, now));
                if double {
                    self.return_value = Some(MenuReturn::Accept);
                    return true;
                }
            }
            _ => {}
        }
        false
    }

    fn row_at(&self, column: u16, row: u16) -> Option<usize> {
        let area = self.list_area;
        let inside = column >= area.x
            && column < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        if !inside {
            return None;
        }
        let index = self.offset + usize::from(row - area.y);
        (index < self.filtered.len()).then_some(index)
    }

    fn move_selection(&mut self, delta: isize) {
        if self.filtered.is_empty() {
            self.selected = 0;
            return;
        }
        let max = self.filtered.len().saturating_sub(1) as isize;
        self.selected = (self.selected as isize + delta).clamp(0, max) as usize;
    }

    fn page_size(&self) -> usize {
        usize::from(self.list_area.height).max(1)
    }

    /// Keep the selection on screen for a list area of `height` rows.
    pub(crate) fn layout_rows(&mut self, area: Rect) -> std::ops::Range<usize> {
        self.list_area = area;
        let height = usize::from(area.height).max(1);
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + height {
            self.offset = self.selected + 1 - height;
        }
        let end = (self.offset + height).min(self.filtered.len());
        self.offset.min(end)..end
    }
}

/// The one active view plus the views it replaced.
#[derive(Debug, Default)]
pub struct ViewStack {
    active: Option<View>,
    stack: Vec<View>,
}

impl ViewStack {
    /// Make `view` active; the previously active view waits underneath.
    pub fn set_active(&mut self, view: View) {
        if let Some(previous) = self.active.take() {
            self.stack.push(previous);
        }
        self.active = Some(view);
    }

    /// Drop the active view and bring back the one underneath, if any.
    pub fn remove_active(&mut self) -> Option<View> {
        let removed = self.active.take();
        self.active = self.stack.pop();
        removed
    }

    pub fn active(&self) -> Option<&View> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut View> {
        self.active.as_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none()
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.stack.clear();
    }
}
