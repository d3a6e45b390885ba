//! Drawing tools.

use crate::shapes::ShapeKind;
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Select,
    Rectangle,
    Circle,
    Triangle,
    Star,
    Line,
    Arrow,
    #[serde(rename = "pencil")]
    Freehand,
    Text,
    /// Images are inserted through the session; on the canvas this tool
    /// selects like [`ToolKind::Select`].
    Image,
}

impl ToolKind {
    pub const ALL: [ToolKind; 10] = [
        ToolKind::Select,
        ToolKind::Rectangle,
        ToolKind::Circle,
        ToolKind::Triangle,
        ToolKind::Star,
        ToolKind::Line,
        ToolKind::Arrow,
        ToolKind::Freehand,
        ToolKind::Text,
        ToolKind::Image,
    ];

    /// Shape produced by dragging out a box with this tool.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            ToolKind::Rectangle => Some(ShapeKind::Rectangle),
            ToolKind::Circle => Some(ShapeKind::Circle),
            ToolKind::Triangle => Some(ShapeKind::Triangle),
            ToolKind::Star => Some(ShapeKind::Star),
            ToolKind::Line => Some(ShapeKind::Line),
            ToolKind::Arrow => Some(ShapeKind::Arrow),
            ToolKind::Text => Some(ShapeKind::Text),
            ToolKind::Select | ToolKind::Freehand | ToolKind::Image => None,
        }
    }

    /// Tools that pick and move shapes instead of drawing.
    pub fn selects(self) -> bool {
        matches!(self, ToolKind::Select | ToolKind::Image)
    }

    /// Single-key shortcut shown in the toolbar.
    pub fn shortcut(self) -> Option<char> {
        match self {
            ToolKind::Select => Some('V'),
            ToolKind::Rectangle => Some('R'),
            ToolKind::Circle => Some('O'),
            ToolKind::Triangle => Some('T'),
            ToolKind::Star => Some('S'),
            ToolKind::Line => Some('L'),
            ToolKind::Arrow => Some('A'),
            ToolKind::Freehand => Some('P'),
            ToolKind::Text => Some('X'),
            ToolKind::Image => None,
        }
    }

    pub fn from_shortcut(key: char) -> Option<ToolKind> {
        let key = key.to_ascii_uppercase();
        Self::ALL.into_iter().find(|t| t.shortcut() == Some(key))
    }

    pub fn label(self) -> &'static str {
        match self {
            ToolKind::Select => "Select",
            ToolKind::Rectangle => "Rectangle",
            ToolKind::Circle => "Circle",
            ToolKind::Triangle => "Triangle",
            ToolKind::Star => "Star",
            ToolKind::Line => "Line",
            ToolKind::Arrow => "Arrow",
            ToolKind::Freehand => "Pencil",
            ToolKind::Text => "Text",
            ToolKind::Image => "Image",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcuts_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for tool in ToolKind::ALL {
            if let Some(key) = tool.shortcut() {
                assert!(seen.insert(key), "duplicate shortcut {key}");
                assert_eq!(ToolKind::from_shortcut(key.to_ascii_lowercase()), Some(tool));
            }
        }
    }

    #[test]
    fn test_drawing_tools_map_to_shapes() {
        assert_eq!(ToolKind::Star.shape_kind(), Some(ShapeKind::Star));
        assert_eq!(ToolKind::Freehand.shape_kind(), None);
        assert!(ToolKind::Image.selects());
        assert!(!ToolKind::Text.selects());
    }
}
