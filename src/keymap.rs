//! Key chord parsing and the launcher's key bindings.
//!
//! Every action has default chords such as "ctrl+n" or "shift+right". The
//! `[keys]` config table replaces the chords of an action with a comma
//! separated list of its own.

use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Accept,
    AcceptCustom,
    Cancel,
    ModeNext,
    ModePrevious,
    RowUp,
    RowDown,
    PageUp,
    PageDown,
    RowFirst,
    RowLast,
    MoveCharBack,
    MoveCharForward,
    MoveFront,
    MoveEnd,
    MoveWordBack,
    MoveWordForward,
    RemoveCharBack,
    RemoveCharForward,
    RemoveWordBack,
    ClearLine,
    DeleteEntry,
    Complete,
    /// User-defined key, numbered from 1.
    Custom(u8),
    /// Jump to the active mode with this index, numbered from 1.
    SelectMode(u8),
}

const FIXED_BINDINGS: &[(&str, Action, &str)] = &[
    ("accept", Action::Accept, "enter"),
    ("accept-custom", Action::AcceptCustom, "shift+enter,alt+enter"),
    ("cancel", Action::Cancel, "esc,ctrl+c,ctrl+g"),
    ("mode-next", Action::ModeNext, "shift+right,ctrl+tab"),
    ("mode-previous", Action::ModePrevious, "shift+left"),
    ("row-up", Action::RowUp, "up,ctrl+p,backtab"),
    ("row-down", Action::RowDown, "down,ctrl+n,tab"),
    ("page-prev", Action::PageUp, "pageup"),
    ("page-next", Action::PageDown, "pagedown"),
    ("row-first", Action::RowFirst, "ctrl+home"),
    ("row-last", Action::RowLast, "ctrl+end"),
    ("move-char-back", Action::MoveCharBack, "left,ctrl+b"),
    ("move-char-forward", Action::MoveCharForward, "right,ctrl+f"),
    ("move-front", Action::MoveFront, "home,ctrl+a"),
    ("move-end", Action::MoveEnd, "end,ctrl+e"),
    ("move-word-back", Action::MoveWordBack, "alt+b,ctrl+left"),
    ("move-word-forward", Action::MoveWordForward, "alt+f,ctrl+right"),
    ("remove-char-back", Action::RemoveCharBack, "backspace,ctrl+h"),
    ("remove-char-forward", Action::RemoveCharForward, "delete,ctrl+d"),
    ("remove-word-back", Action::RemoveWordBack, "ctrl+w,alt+backspace"),
    ("clear-line", Action::ClearLine, "ctrl+u"),
    ("delete-entry", Action::DeleteEntry, "shift+delete"),
    ("complete", Action::Complete, "ctrl+l"),
];

/// Custom keys and mode jumps: `custom-N` on alt+N, `select-mode-N` on fN.
const NUMBERED: u8 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub key: KeyCode,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl KeyChord {
    pub fn matches(&self, event: &KeyEvent) -> bool {
        let mods = event.modifiers;
        if self.ctrl != mods.contains(KeyModifiers::CONTROL)
            || self.alt != mods.contains(KeyModifiers::ALT)
        {
            return false;
        }

        match (&self.key, &event.code) {
            // Terminals fold shift into the character (or into BackTab).
            (KeyCode::Char(want), KeyCode::Char(got)) => want.eq_ignore_ascii_case(got),
            (KeyCode::BackTab, KeyCode::BackTab) => true,
            (want, got) => want == got && self.shift == mods.contains(KeyModifiers::SHIFT),
        }
    }
}

impl std::fmt::Display for KeyChord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ctrl {
            f.write_str("ctrl+")?;
        }
        if self.alt {
            f.write_str("alt+")?;
        }
        if self.shift {
            f.write_str("shift+")?;
        }
        match self.key {
            KeyCode::Char(' ') => f.write_str("space"),
            KeyCode::Char(ch) => write!(f, "{ch}"),
            KeyCode::F(n) => write!(f, "f{n}"),
            KeyCode::Enter => f.write_str("enter"),
            KeyCode::Esc => f.write_str("esc"),
            KeyCode::Tab => f.write_str("tab"),
            KeyCode::BackTab => f.write_str("backtab"),
            KeyCode::Backspace => f.write_str("backspace"),
            KeyCode::Delete => f.write_str("delete"),
            KeyCode::Up => f.write_str("up"),
            KeyCode::Down => f.write_str("down"),
            KeyCode::Left => f.write_str("left"),
            KeyCode::Right => f.write_str("right"),
            KeyCode::Home => f.write_str("home"),
            KeyCode::End => f.write_str("end"),
            KeyCode::PageUp => f.write_str("pageup"),
            KeyCode::PageDown => f.write_str("pagedown"),
            ref other => write!(f, "{other:?}"),
        }
    }
}

pub fn parse_key_chord(input: &str) -> Option<KeyChord> {
    let trimmed = input.trim().to_lowercase();
    if trimmed.is_empty() {
        return None;
    }

    let mut chord = KeyChord {
        key: KeyCode::Null,
        ctrl: false,
        alt: false,
        shift: false,
    };

    for part in trimmed.split('+').map(str::trim).filter(|part| !part.is_empty()) {
        match part {
            "ctrl" | "control" => chord.ctrl = true,
            "alt" | "mod1" => chord.alt = true,
            "shift" => chord.shift = true,
            key => {
                if chord.key != KeyCode::Null {
                    return None;
                }
                chord.key = parse_key(key)?;
            }
        }
    }

    (chord.key != KeyCode::Null).then_some(chord)
}

fn parse_key(key: &str) -> Option<KeyCode> {
    let code = match key {
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "backtab" => KeyCode::BackTab,
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" | "prior" => KeyCode::PageUp,
        "pagedown" | "next" => KeyCode::PageDown,
        "space" => KeyCode::Char(' '),
        _ => {
            if let Some(number) = key.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                return (1..=24).contains(&number).then_some(KeyCode::F(number));
            }
            let mut chars = key.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            KeyCode::Char(ch)
        }
    };
    Some(code)
}

fn parse_chord_list(list: &str) -> Option<Vec<KeyChord>> {
    list.split(',')
        .filter(|chord| !chord.trim().is_empty())
        .map(parse_key_chord)
        .collect()
}

#[derive(Debug, Clone)]
struct Binding {
    name: String,
    action: Action,
    chords: Vec<KeyChord>,
}

#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: Vec<Binding>,
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new(&HashMap::new()).0
    }
}

impl Keymap {
    /// Default bindings with per-action overrides applied.
    pub fn new(overrides: &HashMap<String, String>) -> (Self, Vec<ConfigError>) {
        let mut bindings: Vec<Binding> = FIXED_BINDINGS
            .iter()
            .map(|(name, action, chords)| Binding {
                name: name.to_string(),
                action: *action,
                chords: parse_chord_list(chords).unwrap_or_default(),
            })
            .collect();

        for n in 1..=NUMBERED {
            bindings.push(Binding {
                name: format!("custom-{n}"),
                action: Action::Custom(n),
                chords: parse_chord_list(&format!("alt+{n}")).unwrap_or_default(),
            });
        }
        for n in 1..=NUMBERED {
            bindings.push(Binding {
                name: format!("select-mode-{n}"),
                action: Action::SelectMode(n),
                chords: parse_chord_list(&format!("f{n}")).unwrap_or_default(),
            });
        }

        let mut errors = Vec::new();
        let mut names: Vec<&String> = overrides.keys().collect();
        names.sort();
        for name in names {
            let chords = &overrides[name];
            let Some(binding) = bindings.iter_mut().find(|binding| &binding.name == name) else {
                errors.push(ConfigError::InvalidBinding {
                    action: name.clone(),
                    chord: chords.clone(),
                });
                continue;
            };
            match parse_chord_list(chords) {
                Some(parsed) => binding.chords = parsed,
                None => errors.push(ConfigError::InvalidBinding {
                    action: name.clone(),
                    chord: chords.clone(),
                }),
            }
        }

        (Self { bindings }, errors)
    }

    pub fn lookup(&self, event: &KeyEvent) -> Option<Action> {
        self.bindings
            .iter()
            .find(|binding| binding.chords.iter().any(|chord| chord.matches(event)))
            .map(|binding| binding.action)
    }

    /// One `name: chord, chord` line per binding, for the keys mode.
    pub fn describe(&self) -> Vec<String> {
        self.bindings
            .iter()
            .map(|binding| {
                let chords: Vec<String> = binding.chords.iter().map(ToString::to_string).collect();
                format!("{}: {}", binding.name, chords.join(", "))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn parses_modifiers_and_keys() {
        let chord = parse_key_chord("Ctrl+Shift+Tab").expect("chord");
        assert_eq!(chord.key, KeyCode::Tab);
        assert!(chord.ctrl && chord.shift && !chord.alt);

        assert_eq!(parse_key_chord("f5").map(|c| c.key), Some(KeyCode::F(5)));
        assert!(parse_key_chord("ctrl+a+b").is_none());
        assert!(parse_key_chord("ctrl+").is_none());
        assert!(parse_key_chord("hyper+x").is_none());
    }

    #[test]
    fn default_bindings_resolve() {
        let keymap = Keymap::default();
        assert_eq!(
            keymap.lookup(&key(KeyCode::Enter, KeyModifiers::NONE)),
            Some(Action::Accept)
        );
        assert_eq!(
            keymap.lookup(&key(KeyCode::Right, KeyModifiers::SHIFT)),
            Some(Action::ModeNext)
        );
        assert_eq!(
            keymap.lookup(&key(KeyCode::Right, KeyModifiers::NONE)),
            Some(Action::MoveCharForward)
        );
        assert_eq!(
            keymap.lookup(&key(KeyCode::Char('w'), KeyModifiers::CONTROL)),
            Some(Action::RemoveWordBack)
        );
        assert_eq!(
            keymap.lookup(&key(KeyCode::Char('3'), KeyModifiers::ALT)),
            Some(Action::Custom(3))
        );
        assert_eq!(
            keymap.lookup(&key(KeyCode::F(2), KeyModifiers::NONE)),
            Some(Action::SelectMode(2))
        );
        assert_eq!(
            keymap.lookup(&key(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Some(Action::RowUp)
        );
        assert_eq!(keymap.lookup(&key(KeyCode::Char('w'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn overrides_replace_defaults_and_report_mistakes() {
        let overrides = HashMap::from([
            ("row-down".to_string(), "ctrl+j".to_string()),
            ("no-such-action".to_string(), "ctrl+x".to_string()),
            ("row-up".to_string(), "ctrl+k+j".to_string()),
        ]);
        let (keymap, errors) = Keymap::new(&overrides);

        assert_eq!(
            keymap.lookup(&key(KeyCode::Char('j'), KeyModifiers::CONTROL)),
            Some(Action::RowDown)
        );
        assert_eq!(keymap.lookup(&key(KeyCode::Down, KeyModifiers::NONE)), None);
        // the broken override leaves the defaults in place
        assert_eq!(
            keymap.lookup(&key(KeyCode::Up, KeyModifiers::NONE)),
            Some(Action::RowUp)
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn describe_lists_every_binding() {
        let lines = Keymap::default().describe();
        assert!(lines.contains(&"accept: enter".to_string()));
        assert!(lines.contains(&"mode-next: shift+right, ctrl+tab".to_string()));
        assert!(lines.iter().any(|line| line.starts_with("select-mode-9: f9")));
    }
}
