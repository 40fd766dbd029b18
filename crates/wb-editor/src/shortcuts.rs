//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s. `key` is the
//! DOM `KeyboardEvent.key` value. On macOS `meta` is ⌘; elsewhere `ctrl`
//! plays the same role.

use crate::input::Modifiers;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Edit ──
    Undo,
    Redo,
    Delete,
    SelectAll,
    Deselect,

    // ── View ──
    ZoomIn,
    ZoomOut,
    /// Zoom to 100% and center on the cards.
    ZoomReset,
    /// Space held: pointer-down pans instead of selecting.
    PanStart,
}

impl ShortcutAction {
    /// Zoom stays available while a card or block editor has focus; every
    /// other key belongs to the editor then.
    pub fn allowed_while_editing(self) -> bool {
        matches!(
            self,
            ShortcutAction::ZoomIn | ShortcutAction::ZoomOut | ShortcutAction::ZoomReset
        )
    }
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action, or `None` if the combo is unbound.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        let cmd = modifiers.command();

        // ── Modifier combos first (most specific) ──
        if cmd && modifiers.shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "a" | "A" => Some(ShortcutAction::SelectAll),
                "=" | "+" => Some(ShortcutAction::ZoomIn),
                "-" => Some(ShortcutAction::ZoomOut),
                "0" => Some(ShortcutAction::ZoomReset),
                _ => None,
            };
        }

        // ── Single keys ──
        match key {
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Deselect),
            " " => Some(ShortcutAction::PanStart),
            _ => None,
        }
    }
}
