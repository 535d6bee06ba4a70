//! In-process robot that delivers through the same tracker as evdev
//!
//! The loopback robot builds exactly the evdev sequences [`UinputRobot`]
//! would write, feeds them straight into a [`PointerTracker`], and sends the
//! resulting events down a channel. No kernel device is involved, so the
//! whole harness can run in unit tests and on machines without uinput.
//!
//! [`LoopbackFaults`] lets a test make the stack misbehave the way a desktop
//! environment sometimes does: swallowing a modifier, or delivering nothing.
//!
//! [`UinputRobot`]: crate::UinputRobot

use anyhow::Result;
use evdev::InputEvent;
use modmask_core::{ButtonBudget, Modifiers, NativeLayout, NormalizedEvent};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::robot::{button_key, event_value, key_events, motion_events, InputRobot, RobotKey};
use crate::tracker::PointerTracker;

/// Misbehaviour to inject into delivered events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackFaults {
    /// Bits stripped from every delivered event
    pub dropped: Modifiers,
    /// Deliver nothing at all
    pub silent: bool,
}

pub struct LoopbackRobot {
    tracker: PointerTracker,
    sender: UnboundedSender<NormalizedEvent>,
    faults: LoopbackFaults,
    /// Set once the receiving end has gone away
    closed: bool,
}

/// Create a loopback robot and the receiving end of its event queue.
pub fn loopback(
    layout: NativeLayout,
    origin: (i32, i32),
) -> (LoopbackRobot, UnboundedReceiver<NormalizedEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let robot = LoopbackRobot {
        tracker: PointerTracker::new(layout, ButtonBudget::default(), origin),
        sender,
        faults: LoopbackFaults::default(),
        closed: false,
    };
    (robot, receiver)
}

impl LoopbackRobot {
    pub fn with_faults(mut self, faults: LoopbackFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn set_faults(&mut self, faults: LoopbackFaults) {
        self.faults = faults;
    }

    fn inject(&mut self, events: &[InputEvent]) -> Result<()> {
        for event in events {
            // State keeps tracking so native_state stays right
            for mut normalized in self.tracker.process(event) {
                if self.faults.silent || self.closed {
                    continue;
                }
                normalized.modifiers -= self.faults.dropped;
                if self.sender.send(normalized).is_err() {
                    tracing::debug!("Event receiver dropped, stopping loopback delivery");
                    self.closed = true;
                }
            }
        }
        Ok(())
    }
}

impl InputRobot for LoopbackRobot {
    fn key_press(&mut self, key: RobotKey) -> Result<()> {
        self.inject(&key_events(key.to_key(), event_value::PRESS))
    }

    fn key_release(&mut self, key: RobotKey) -> Result<()> {
        self.inject(&key_events(key.to_key(), event_value::RELEASE))
    }

    fn mouse_press(&mut self, button: u8) -> Result<()> {
        self.inject(&key_events(button_key(button)?, event_value::PRESS))
    }

    fn mouse_release(&mut self, button: u8) -> Result<()> {
        self.inject(&key_events(button_key(button)?, event_value::RELEASE))
    }

    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()> {
        let (cx, cy) = self.tracker.position();
        if (x, y) == (cx, cy) {
            return Ok(());
        }
        self.inject(&motion_events(x - cx, y - cy))
    }

    fn position(&self) -> (i32, i32) {
        self.tracker.position()
    }

    fn native_state(&self) -> u32 {
        self.tracker.native_state()
    }

    fn layout(&self) -> &NativeLayout {
        self.tracker.layout()
    }

    fn button_count(&self) -> u8 {
        ButtonBudget::MAX
    }
}
