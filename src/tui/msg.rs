//! Key bindings for the investigation TUI
//!
//! Keys map to an `Action` (what the user asked for). The app turns actions
//! into `trace::Msg` where they touch the investigation itself; everything
//! else (focus cycling, help, quit) stays in the TUI.

use crossterm::event::{KeyCode, KeyModifiers};

/// What the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Leave the TUI
    Quit,
    /// Replay the stored trace from the start
    StartReplay,
    /// Move the focus ring to the next visible node
    FocusNext,
    /// Move the focus ring to the previous visible node
    FocusPrev,
    /// Open the inspector on the focused node
    SelectFocused,
    /// Close the inspector (or the help overlay)
    ClearSelection,
    /// Toggle the key help overlay
    ToggleHelp,
    /// Nothing bound
    Noop,
}

/// Convert a key press to an action. Pure.
pub fn key_to_action(code: KeyCode, modifiers: KeyModifiers, help_open: bool) -> Action {
    if help_open {
        return match code {
            KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => Action::ToggleHelp,
            _ => Action::Noop,
        };
    }

    match code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,

        KeyCode::Char('r') => Action::StartReplay,

        KeyCode::Char('j') | KeyCode::Down | KeyCode::Right | KeyCode::Tab => Action::FocusNext,
        KeyCode::Char('k') | KeyCode::Up | KeyCode::Left | KeyCode::BackTab => Action::FocusPrev,

        KeyCode::Enter => Action::SelectFocused,
        KeyCode::Esc => Action::ClearSelection,

        KeyCode::Char('?') => Action::ToggleHelp,

        _ => Action::Noop,
    }
}
