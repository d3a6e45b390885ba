//! Keyboard shortcut registry.

use crate::input::KeyEvent;
use crate::tools::ToolKind;

/// What a key press asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetTool(ToolKind),
    DeleteSelection,
    Copy,
    Paste,
    Duplicate,
    Undo,
    Redo,
    /// Drop the selection and abandon any gesture.
    Cancel,
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub ctrl: bool,
    pub shift: bool,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(key: &'static str, ctrl: bool, shift: bool, description: &'static str) -> Self {
        Self {
            key,
            ctrl,
            shift,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+D").
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(self.key);
        parts.join("+")
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new("V", false, false, "Select tool"),
            Shortcut::new("R", false, false, "Rectangle tool"),
            Shortcut::new("O", false, false, "Circle tool"),
            Shortcut::new("T", false, false, "Triangle tool"),
            Shortcut::new("S", false, false, "Star tool"),
            Shortcut::new("L", false, false, "Line tool"),
            Shortcut::new("A", false, false, "Arrow tool"),
            Shortcut::new("P", false, false, "Pencil tool"),
            Shortcut::new("X", false, false, "Text tool"),
            Shortcut::new("C", true, false, "Copy shapes"),
            Shortcut::new("V", true, false, "Paste shapes"),
            Shortcut::new("D", true, false, "Duplicate selection"),
            Shortcut::new("Z", true, false, "Undo"),
            Shortcut::new("Z", true, true, "Redo"),
            Shortcut::new("Y", true, false, "Redo"),
            Shortcut::new("Delete", false, false, "Delete selected shapes"),
            Shortcut::new("Backspace", false, false, "Delete selected shapes"),
            Shortcut::new("Escape", false, false, "Clear selection"),
        ]
    }

    /// Map a key press to a command. Nothing fires while a text field has
    /// focus.
    pub fn resolve(event: &KeyEvent) -> Option<Command> {
        if event.text_input_focused {
            return None;
        }
        let key = event.key.as_str();
        match key {
            "Delete" | "Backspace" => return Some(Command::DeleteSelection),
            "Escape" => return Some(Command::Cancel),
            _ => {}
        }

        let mut chars = key.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };
        let c = c.to_ascii_lowercase();
        let m = event.modifiers;
        if m.command() {
            return match (c, m.shift) {
                ('c', false) => Some(Command::Copy),
                ('v', false) => Some(Command::Paste),
                ('d', false) => Some(Command::Duplicate),
                ('z', false) => Some(Command::Undo),
                ('z', true) | ('y', false) => Some(Command::Redo),
                _ => None,
            };
        }
        if m.alt {
            return None;
        }
        ToolKind::from_shortcut(c).map(Command::SetTool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;

    fn press(key: &str, modifiers: Modifiers) -> Option<Command> {
        ShortcutRegistry::resolve(&KeyEvent::new(key, modifiers))
    }

    #[test]
    fn test_clipboard_and_history_keys() {
        assert_eq!(press("c", Modifiers::CTRL), Some(Command::Copy));
        assert_eq!(press("V", Modifiers::CTRL), Some(Command::Paste));
        assert_eq!(press("d", Modifiers::CTRL), Some(Command::Duplicate));
        assert_eq!(press("z", Modifiers::CTRL), Some(Command::Undo));
        let ctrl_shift = Modifiers {
            shift: true,
            ..Modifiers::CTRL
        };
        assert_eq!(press("Z", ctrl_shift), Some(Command::Redo));
        let cmd = Modifiers {
            meta: true,
            ..Modifiers::NONE
        };
        assert_eq!(press("y", cmd), Some(Command::Redo));
    }

    #[test]
    fn test_tool_keys_without_modifiers() {
        assert_eq!(press("r", Modifiers::NONE), Some(Command::SetTool(ToolKind::Rectangle)));
        assert_eq!(press("v", Modifiers::NONE), Some(Command::SetTool(ToolKind::Select)));
        assert_eq!(press("q", Modifiers::NONE), None);
    }

    #[test]
    fn test_delete_keys() {
        assert_eq!(press("Delete", Modifiers::NONE), Some(Command::DeleteSelection));
        assert_eq!(press("Backspace", Modifiers::NONE), Some(Command::DeleteSelection));
    }

    #[test]
    fn test_suppressed_while_typing() {
        let mut event = KeyEvent::new("Backspace", Modifiers::NONE);
        event.text_input_focused = true;
        assert_eq!(ShortcutRegistry::resolve(&event), None);
    }

    #[test]
    fn test_format() {
        let s = Shortcut::new("Z", true, true, "Redo");
        assert_eq!(s.format(), "Ctrl+Shift+Z");
        assert!(ShortcutRegistry::all().iter().any(|s| s.key == "D" && s.ctrl));
    }
}
