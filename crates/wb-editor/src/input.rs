//! Input event abstraction.
//!
//! Pointer coordinates are screen-space pixels relative to the canvas
//! container; the viewport converts them to canvas space.

use serde::{Deserialize, Serialize};

/// Keyboard modifier state at the time of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const ALT: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: true,
        meta: false,
    };

    /// Shift extends or toggles the selection.
    pub fn additive(&self) -> bool {
        self.shift
    }

    /// ⌘ on macOS, Ctrl elsewhere.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointerButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

/// Why an in-flight gesture was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CancelReason {
    WindowBlur,
    PointerLeave,
    VisibilityHidden,
}

/// Unified input event consumed by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InputEvent {
    PointerDown {
        x: f64,
        y: f64,
        #[serde(default)]
        button: PointerButton,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerMove {
        x: f64,
        y: f64,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerUp {
        x: f64,
        y: f64,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Double click, used on empty canvas to remember a placement point.
    DoubleClick { x: f64, y: f64 },
    /// Wheel or trackpad scroll. With ⌘/Ctrl held this zooms at the pointer.
    Wheel {
        x: f64,
        y: f64,
        dx: f64,
        dy: f64,
        #[serde(default)]
        modifiers: Modifiers,
    },
    KeyDown {
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
    },
    KeyUp { key: String },
    Cancel { reason: CancelReason },
}

impl InputEvent {
    pub fn pointer_down(x: f64, y: f64) -> Self {
        InputEvent::PointerDown {
            x,
            y,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_move(x: f64, y: f64) -> Self {
        InputEvent::PointerMove {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_up(x: f64, y: f64) -> Self {
        InputEvent::PointerUp {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }
}

/// Which edge or corner of a card a resize grabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeDirection {
    N,
    S,
    E,
    W,
    Ne,
    Nw,
    Se,
    Sw,
}

impl ResizeDirection {
    pub fn north(self) -> bool {
        matches!(self, Self::N | Self::Ne | Self::Nw)
    }

    pub fn south(self) -> bool {
        matches!(self, Self::S | Self::Se | Self::Sw)
    }

    pub fn east(self) -> bool {
        matches!(self, Self::E | Self::Ne | Self::Se)
    }

    pub fn west(self) -> bool {
        matches!(self, Self::W | Self::Nw | Self::Sw)
    }

    /// CSS cursor name for the handle.
    pub fn cursor(self) -> &'static str {
        match self {
            Self::N => "n-resize",
            Self::S => "s-resize",
            Self::E => "e-resize",
            Self::W => "w-resize",
            Self::Ne => "ne-resize",
            Self::Nw => "nw-resize",
            Self::Se => "se-resize",
            Self::Sw => "sw-resize",
        }
    }
}
