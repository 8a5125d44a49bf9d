//! Key and mouse bindings: arrows or hjkl for the cursor, left button for drag-to-fuse.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CursorLeft,
    CursorRight,
    CursorUp,
    CursorDown,
    /// Begin a selection at the cursor, or end the active one.
    Grab,
    Cancel,
    Pause,
    Quit,
    None,
}

/// Pointer gesture in terminal coordinates (column, row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pointer {
    Down(u16, u16),
    Drag(u16, u16),
    Up(u16, u16),
}

/// Map key event to game action. Supports both normal (arrows, space) and vim (hjkl).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod && modifiers != KeyModifiers::CONTROL {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc if no_mod => Action::Quit,
        KeyCode::Char('c') if modifiers == KeyModifiers::CONTROL => Action::Quit,
        KeyCode::Char('p') if no_mod => Action::Pause,
        KeyCode::Left | KeyCode::Char('h') if no_mod => Action::CursorLeft,
        KeyCode::Right | KeyCode::Char('l') if no_mod => Action::CursorRight,
        KeyCode::Up | KeyCode::Char('k') if no_mod => Action::CursorUp,
        KeyCode::Down | KeyCode::Char('j') if no_mod => Action::CursorDown,
        KeyCode::Enter | KeyCode::Char(' ') if no_mod => Action::Grab,
        KeyCode::Char('c') | KeyCode::Backspace if no_mod => Action::Cancel,
        _ => Action::None,
    }
}

/// Left-button gestures only; moves, scrolls and other buttons are ignored.
pub fn mouse_to_pointer(mouse: MouseEvent) -> Option<Pointer> {
    let (col, row) = (mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => Some(Pointer::Down(col, row)),
        MouseEventKind::Drag(MouseButton::Left) => Some(Pointer::Drag(col, row)),
        MouseEventKind::Up(MouseButton::Left) => Some(Pointer::Up(col, row)),
        _ => None,
    }
}
