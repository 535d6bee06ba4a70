//! modmask harness
//!
//! Drives a synthetic input robot, collects the normalized pointer events the
//! input stack delivers, and checks their modifier masks.
//!
//! ## Architecture
//!
//! - [`InputRobot`]: injects key and button events ([`UinputRobot`] for the
//!   real kernel input stack, [`LoopbackRobot`] for an in-process stack)
//! - [`PointerTracker`]: turns raw evdev events into [`NormalizedEvent`]s
//! - [`EvdevEventSource`]: reads a device node and feeds a tracker
//! - [`Harness`]: the test fixture; owns the verifier and runs scenarios
//!
//! [`NormalizedEvent`]: modmask_core::NormalizedEvent

pub mod device;
mod fixture;
mod loopback;
mod report;
mod robot;
mod scenario;
mod source;
mod tracker;
mod uinput;

pub use fixture::{Harness, StepFailure};
pub use loopback::{loopback, LoopbackFaults, LoopbackRobot};
pub use report::{RunReport, ScenarioOutcome, ScenarioReport, SkipReason};
pub use robot::{InputRobot, RobotKey};
pub use source::EvdevEventSource;
pub use tracker::PointerTracker;
pub use uinput::UinputRobot;
