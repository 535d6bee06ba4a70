//! Toolkit-neutral pointer events

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mask::Modifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Clicked,
    Pressed,
    Released,
    Entered,
    Exited,
    Dragged,
    Moved,
    WheelMoved,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Clicked => "MOUSE_CLICKED",
            EventKind::Pressed => "MOUSE_PRESSED",
            EventKind::Released => "MOUSE_RELEASED",
            EventKind::Entered => "MOUSE_ENTERED",
            EventKind::Exited => "MOUSE_EXITED",
            EventKind::Dragged => "MOUSE_DRAGGED",
            EventKind::Moved => "MOUSE_MOVED",
            EventKind::WheelMoved => "MOUSE_WHEEL_MOVED",
        };
        f.write_str(name)
    }
}

/// A pointer event after modifier normalization.
///
/// `modifiers` is the state at the time of the event. For a release it still
/// contains the released button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub kind: EventKind,
    pub x: i32,
    pub y: i32,
    /// Button that changed state, for press/release/click
    pub button: Option<u8>,
    pub click_count: u8,
    pub modifiers: Modifiers,
}

impl NormalizedEvent {
    pub fn new(kind: EventKind, x: i32, y: i32, modifiers: Modifiers) -> Self {
        Self {
            kind,
            x,
            y,
            button: None,
            click_count: 0,
            modifiers,
        }
    }

    pub fn with_button(mut self, button: u8) -> Self {
        self.button = Some(button);
        self
    }

    pub fn with_click_count(mut self, click_count: u8) -> Self {
        self.click_count = click_count;
        self
    }
}

impl fmt::Display for NormalizedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at ({}, {})", self.kind, self.x, self.y)?;
        if let Some(button) = self.button {
            write!(f, " button {}", button)?;
        }
        if self.click_count > 0 {
            write!(f, " clicks {}", self.click_count)?;
        }
        write!(f, " {}", self.modifiers)
    }
}
