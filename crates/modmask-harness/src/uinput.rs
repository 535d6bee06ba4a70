//! Virtual pointer/keyboard robot via uinput
//!
//! The robot creates one virtual device that can press the five modifier
//! keys, Escape and three mouse buttons, and move relatively. It mirrors
//! everything it emits into a [`PointerTracker`] so it can answer
//! [`InputRobot::native_state`] without asking the kernel.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use evdev::{uinput::VirtualDeviceBuilder, AttributeSet, InputEvent, Key, RelativeAxisType};
use modmask_core::{ButtonBudget, ModifierKey, NativeLayout};
use nix::unistd::{access, AccessFlags};

use crate::robot::{button_key, event_value, key_events, motion_events, InputRobot, RobotKey};
use crate::tracker::PointerTracker;

const UINPUT_PATH: &str = "/dev/uinput";

/// Fail early with a readable message when uinput is not writable.
pub fn check_uinput_access() -> Result<()> {
    access(Path::new(UINPUT_PATH), AccessFlags::R_OK | AccessFlags::W_OK).with_context(|| {
        format!(
            "{} is not accessible; add yourself to the input group or run as root",
            UINPUT_PATH
        )
    })
}

/// Robot backed by a uinput virtual device.
pub struct UinputRobot {
    device: evdev::uinput::VirtualDevice,
    mirror: PointerTracker,
}

impl UinputRobot {
    /// Create the virtual device with the pointer resting at `origin`.
    ///
    /// `origin` is in robot coordinates; the event source reading this
    /// device must start from the same point.
    pub fn new(name: &str, layout: NativeLayout, origin: (i32, i32)) -> Result<Self> {
        check_uinput_access()?;

        let mut keys = AttributeSet::<Key>::new();
        for modifier in ModifierKey::ALL {
            keys.insert(RobotKey::Modifier(modifier).to_key());
        }
        keys.insert(RobotKey::Escape.to_key());
        for button in 1..=ButtonBudget::MAX {
            keys.insert(button_key(button)?);
        }

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);
        axes.insert(RelativeAxisType::REL_WHEEL);

        let device = VirtualDeviceBuilder::new()?
            .name(name)
            .with_keys(&keys)?
            .with_relative_axes(&axes)?
            .build()
            .context("Failed to create uinput virtual device")?;

        tracing::debug!("Created virtual device '{}'", name);

        Ok(Self {
            device,
            mirror: PointerTracker::new(layout, ButtonBudget::default(), origin),
        })
    }

    /// Device node of the virtual device (e.g. `/dev/input/event17`).
    ///
    /// Returns `None` until udev has created the node.
    pub fn devnode(&mut self) -> Result<Option<PathBuf>> {
        let mut nodes = self
            .device
            .enumerate_dev_nodes_blocking()
            .context("Failed to enumerate virtual device nodes")?;
        nodes.next().transpose().map_err(Into::into)
    }

    fn emit(&mut self, events: &[InputEvent]) -> Result<()> {
        self.device.emit(events)?;
        for event in events {
            self.mirror.process(event);
        }
        Ok(())
    }

    /// Release every key and button this robot still holds.
    pub fn release_all(&mut self) -> Result<()> {
        let keys: Vec<Key> = self.mirror.held_keys().collect();
        for key in keys {
            self.emit(&key_events(key, event_value::RELEASE))?;
        }
        for button in 1..=ButtonBudget::MAX {
            if self.mirror.is_button_held(button) {
                self.emit(&key_events(button_key(button)?, event_value::RELEASE))?;
            }
        }
        Ok(())
    }
}

impl InputRobot for UinputRobot {
    fn key_press(&mut self, key: RobotKey) -> Result<()> {
        self.emit(&key_events(key.to_key(), event_value::PRESS))
    }

    fn key_release(&mut self, key: RobotKey) -> Result<()> {
        self.emit(&key_events(key.to_key(), event_value::RELEASE))
    }

    fn mouse_press(&mut self, button: u8) -> Result<()> {
        self.emit(&key_events(button_key(button)?, event_value::PRESS))
    }

    fn mouse_release(&mut self, button: u8) -> Result<()> {
        if !self.mirror.is_button_held(button) {
            // Validate the index even when there is nothing to release
            button_key(button)?;
            return Ok(());
        }
        self.emit(&key_events(button_key(button)?, event_value::RELEASE))
    }

    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()> {
        let (cx, cy) = self.mirror.position();
        let (dx, dy) = (x - cx, y - cy);
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        self.emit(&motion_events(dx, dy))
    }

    fn position(&self) -> (i32, i32) {
        self.mirror.position()
    }

    fn native_state(&self) -> u32 {
        self.mirror.native_state()
    }

    fn layout(&self) -> &NativeLayout {
        self.mirror.layout()
    }

    fn button_count(&self) -> u8 {
        ButtonBudget::MAX
    }
}

impl Drop for UinputRobot {
    fn drop(&mut self) {
        // A stuck modifier on a virtual device can lock up the desktop
        if let Err(e) = self.release_all() {
            tracing::warn!("Failed to release held inputs: {:#}", e);
        }
    }
}
