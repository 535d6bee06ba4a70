//! Raw evdev events to normalized pointer events
//!
//! The tracker plays the part of the window system: it keeps the held keys
//! and buttons as a native state word in a chosen [`NativeLayout`], and every
//! time a pointer event is due it translates that word into [`Modifiers`].
//!
//! ## Emitted events
//!
//! | evdev input                    | normalized output                       |
//! |--------------------------------|-----------------------------------------|
//! | modifier key press/release     | none (state only)                       |
//! | button press                   | `Pressed`                               |
//! | button release                 | `Released`, then `Clicked` if unmoved   |
//! | REL_X / REL_Y then SYN_REPORT  | `Dragged` with a button held, else `Moved` |
//! | REL_WHEEL then SYN_REPORT      | `WheelMoved`                            |
//!
//! `Released` and `Clicked` carry the state from before the button went up,
//! so a release of button 2 still reports button 2.

use std::collections::HashSet;

use evdev::{InputEvent, InputEventKind, Key, RelativeAxisType, Synchronization};
use modmask_core::{translate, ButtonBudget, EventKind, Modifiers, NativeLayout, NormalizedEvent};

use crate::robot::{button_for_key, event_value, modifier_for_key};

#[derive(Debug, Clone)]
pub struct PointerTracker {
    layout: NativeLayout,
    budget: ButtonBudget,
    held_keys: HashSet<Key>,
    held_buttons: [bool; 3],
    position: (i32, i32),
    /// Where each button went down, cleared on any motion
    press_position: [Option<(i32, i32)>; 3],
    pending_motion: (i32, i32),
    pending_wheel: i32,
}

impl PointerTracker {
    pub fn new(layout: NativeLayout, budget: ButtonBudget, origin: (i32, i32)) -> Self {
        Self {
            layout,
            budget,
            held_keys: HashSet::new(),
            held_buttons: [false; 3],
            position: origin,
            press_position: [None; 3],
            pending_motion: (0, 0),
            pending_wheel: 0,
        }
    }

    pub fn layout(&self) -> &NativeLayout {
        &self.layout
    }

    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    pub fn is_button_held(&self, button: u8) -> bool {
        (1..=3).contains(&button) && self.held_buttons[usize::from(button - 1)]
    }

    pub fn held_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.held_keys.iter().copied()
    }

    /// Current native state word in this tracker's layout.
    ///
    /// Modifiers and buttons the layout cannot encode are absent.
    pub fn native_state(&self) -> u32 {
        let mut native = 0;

        for key in &self.held_keys {
            if let Some(bit) = modifier_for_key(*key).and_then(|m| self.layout.modifier_mask(m)) {
                native |= bit;
            }
        }

        for (index, held) in self.held_buttons.iter().enumerate() {
            if *held {
                if let Ok(bit) = self.layout.button_mask(index as u8 + 1) {
                    native |= bit;
                }
            }
        }

        native
    }

    /// Normalized view of the current state.
    pub fn modifiers(&self) -> Modifiers {
        translate(self.native_state(), &self.layout, self.budget)
    }

    /// Feed one raw event; returns the pointer events it completes.
    pub fn process(&mut self, event: &InputEvent) -> Vec<NormalizedEvent> {
        match event.kind() {
            InputEventKind::Key(key) => self.process_key(key, event.value()),
            InputEventKind::RelAxis(axis) => {
                match axis {
                    RelativeAxisType::REL_X => self.pending_motion.0 += event.value(),
                    RelativeAxisType::REL_Y => self.pending_motion.1 += event.value(),
                    RelativeAxisType::REL_WHEEL => self.pending_wheel += event.value(),
                    _ => {}
                }
                Vec::new()
            }
            InputEventKind::Synchronization(Synchronization::SYN_REPORT) => self.flush_motion(),
            _ => Vec::new(),
        }
    }

    fn process_key(&mut self, key: Key, value: i32) -> Vec<NormalizedEvent> {
        if modifier_for_key(key).is_some() {
            match value {
                event_value::PRESS => {
                    self.held_keys.insert(key);
                }
                event_value::RELEASE => {
                    self.held_keys.remove(&key);
                }
                event_value::REPEAT => {}
                _ => {}
            }
            return Vec::new();
        }

        let Some(button) = button_for_key(key) else {
            return Vec::new();
        };
        let index = usize::from(button - 1);
        let (x, y) = self.position;

        match value {
            event_value::PRESS => {
                self.held_buttons[index] = true;
                self.press_position[index] = Some(self.position);
                vec![NormalizedEvent::new(EventKind::Pressed, x, y, self.modifiers())
                    .with_button(button)
                    .with_click_count(1)]
            }
            event_value::RELEASE => {
                if !self.held_buttons[index] {
                    return Vec::new();
                }

                let modifiers = self.modifiers();
                let mut events = vec![NormalizedEvent::new(EventKind::Released, x, y, modifiers)
                    .with_button(button)
                    .with_click_count(1)];

                if self.press_position[index] == Some(self.position) {
                    events.push(
                        NormalizedEvent::new(EventKind::Clicked, x, y, modifiers)
                            .with_button(button)
                            .with_click_count(1),
                    );
                }

                self.held_buttons[index] = false;
                self.press_position[index] = None;
                events
            }
            _ => Vec::new(),
        }
    }

    fn flush_motion(&mut self) -> Vec<NormalizedEvent> {
        let mut events = Vec::new();
        let (dx, dy) = std::mem::take(&mut self.pending_motion);
        let wheel = std::mem::take(&mut self.pending_wheel);

        if dx != 0 || dy != 0 {
            self.position = (self.position.0 + dx, self.position.1 + dy);
            self.press_position = [None; 3];

            let kind = if self.held_buttons.iter().any(|held| *held) {
                EventKind::Dragged
            } else {
                EventKind::Moved
            };
            events.push(NormalizedEvent::new(
                kind,
                self.position.0,
                self.position.1,
                self.modifiers(),
            ));
        }

        if wheel != 0 {
            events.push(NormalizedEvent::new(
                EventKind::WheelMoved,
                self.position.0,
                self.position.1,
                self.modifiers(),
            ));
        }

        events
    }
}
