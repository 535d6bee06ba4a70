//! Input robot abstraction
//!
//! A robot synthesizes hardware-level key and button events. Both robots in
//! this crate speak evdev, so the event sequences they emit are built here.

use anyhow::Result;
use evdev::{EventType, InputEvent, Key, RelativeAxisType};
use modmask_core::{MaskError, ModifierKey, NativeLayout};

/// Event value constants for key events.
pub mod event_value {
    pub const RELEASE: i32 = 0;
    pub const PRESS: i32 = 1;
    pub const REPEAT: i32 = 2;
}

/// A key the robot can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotKey {
    Modifier(ModifierKey),
    /// Used to dismiss menus the focus click may have opened
    Escape,
}

impl RobotKey {
    pub fn to_key(self) -> Key {
        match self {
            RobotKey::Modifier(ModifierKey::Shift) => Key::KEY_LEFTSHIFT,
            RobotKey::Modifier(ModifierKey::Ctrl) => Key::KEY_LEFTCTRL,
            RobotKey::Modifier(ModifierKey::Meta) => Key::KEY_LEFTMETA,
            RobotKey::Modifier(ModifierKey::Alt) => Key::KEY_LEFTALT,
            // ISO_Level3_Shift on most XKB layouts
            RobotKey::Modifier(ModifierKey::AltGraph) => Key::KEY_RIGHTALT,
            RobotKey::Escape => Key::KEY_ESC,
        }
    }
}

/// Map an evdev key to the logical modifier it drives, if any.
pub fn modifier_for_key(key: Key) -> Option<ModifierKey> {
    match key {
        Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => Some(ModifierKey::Shift),
        Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => Some(ModifierKey::Ctrl),
        Key::KEY_LEFTMETA | Key::KEY_RIGHTMETA => Some(ModifierKey::Meta),
        Key::KEY_LEFTALT => Some(ModifierKey::Alt),
        Key::KEY_RIGHTALT => Some(ModifierKey::AltGraph),
        _ => None,
    }
}

/// evdev key for a 1-based button index.
///
/// Only buttons 1-3 exist on the robot.
pub fn button_key(button: u8) -> Result<Key, MaskError> {
    match button {
        1 => Ok(Key::BTN_LEFT),
        2 => Ok(Key::BTN_MIDDLE),
        3 => Ok(Key::BTN_RIGHT),
        _ => Err(MaskError::ButtonOutOfRange { button, max: 3 }),
    }
}

/// 1-based button index for an evdev key.
pub fn button_for_key(key: Key) -> Option<u8> {
    match key {
        Key::BTN_LEFT => Some(1),
        Key::BTN_MIDDLE => Some(2),
        Key::BTN_RIGHT => Some(3),
        _ => None,
    }
}

fn syn() -> InputEvent {
    InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)
}

/// Key or button state change followed by SYN_REPORT.
pub fn key_events(key: Key, value: i32) -> [InputEvent; 2] {
    [InputEvent::new(EventType::KEY, key.code(), value), syn()]
}

/// Relative motion followed by SYN_REPORT.
pub fn motion_events(dx: i32, dy: i32) -> Vec<InputEvent> {
    let mut events = Vec::with_capacity(3);
    if dx != 0 {
        events.push(InputEvent::new(
            EventType::RELATIVE,
            RelativeAxisType::REL_X.0,
            dx,
        ));
    }
    if dy != 0 {
        events.push(InputEvent::new(
            EventType::RELATIVE,
            RelativeAxisType::REL_Y.0,
            dy,
        ));
    }
    events.push(syn());
    events
}

/// Synthesizes input for the harness.
///
/// Each call injects one hardware-level action. Delivery of the resulting
/// pointer events is asynchronous and happens through a separate channel.
pub trait InputRobot: Send {
    fn key_press(&mut self, key: RobotKey) -> Result<()>;

    fn key_release(&mut self, key: RobotKey) -> Result<()>;

    /// Press a 1-based mouse button.
    fn mouse_press(&mut self, button: u8) -> Result<()>;

    fn mouse_release(&mut self, button: u8) -> Result<()>;

    /// Move the pointer to an absolute position in robot coordinates.
    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()>;

    /// Where the robot believes the pointer is.
    fn position(&self) -> (i32, i32);

    /// Current extended-modifier state in [`InputRobot::layout`] encoding.
    fn native_state(&self) -> u32;

    fn layout(&self) -> &NativeLayout;

    /// Buttons the platform reports.
    fn button_count(&self) -> u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robot_keys_round_trip_to_modifiers() {
        for modifier in ModifierKey::ALL {
            let key = RobotKey::Modifier(modifier).to_key();
            assert_eq!(modifier_for_key(key), Some(modifier));
        }
        assert_eq!(modifier_for_key(RobotKey::Escape.to_key()), None);
    }

    #[test]
    fn test_button_keys() {
        assert_eq!(button_key(1), Ok(Key::BTN_LEFT));
        assert_eq!(button_key(3), Ok(Key::BTN_RIGHT));
        assert_eq!(
            button_key(4),
            Err(MaskError::ButtonOutOfRange { button: 4, max: 3 })
        );
        assert_eq!(button_for_key(Key::BTN_MIDDLE), Some(2));
        assert_eq!(button_for_key(Key::KEY_A), None);
    }

    #[test]
    fn test_motion_events_skip_zero_axes() {
        let events = motion_events(1, 0);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), EventType::RELATIVE);
        assert_eq!(events[0].code(), RelativeAxisType::REL_X.0);
        assert_eq!(events[0].value(), 1);
        assert_eq!(events[1].event_type(), EventType::SYNCHRONIZATION);
    }

    #[test]
    fn test_key_events_end_with_syn() {
        let [press, sync] = key_events(Key::KEY_LEFTSHIFT, event_value::PRESS);
        assert_eq!(press.code(), Key::KEY_LEFTSHIFT.code());
        assert_eq!(press.value(), 1);
        assert_eq!(sync.event_type(), EventType::SYNCHRONIZATION);
    }
}
