use crossterm::event::{KeyEvent, MouseEvent};

use crate::registry::ModeKey;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),

    // -- Background work
    EntriesReady {
        mode: ModeKey,
        generation: u64,
        entries: Vec<String>,
    },

    // -- System
    Quit,
}
