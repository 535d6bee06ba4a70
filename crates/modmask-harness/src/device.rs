//! Input device discovery
//!
//! Used by `modmask devices` to show which nodes the harness could read, and
//! to spot a robot device left behind by a crashed run.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use evdev::{Device, EventType, Key, RelativeAxisType};
use serde::Serialize;

/// Rough classification of an input device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    Keyboard,
    Pointer,
    /// Keys and relative motion on one node, like the robot's own device
    Combined,
    Other,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Keyboard => "keyboard",
            DeviceKind::Pointer => "pointer",
            DeviceKind::Combined => "keyboard+pointer",
            DeviceKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Information about an input device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub name: String,
    pub vendor: u16,
    pub product: u16,
    pub kind: DeviceKind,
}

impl DeviceInfo {
    /// vendor:product string (e.g. "046d:c52b")
    pub fn vendor_product(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor, self.product)
    }
}

fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("event"))
        .unwrap_or(false)
}

/// Enumerate all readable input devices, sorted by path.
pub fn enumerate_devices() -> Result<Vec<DeviceInfo>> {
    let mut devices = Vec::new();

    for entry in std::fs::read_dir("/dev/input")? {
        let path = entry?.path();
        if !is_event_node(&path) {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                let id = device.input_id();
                devices.push(DeviceInfo {
                    name: device.name().unwrap_or("Unknown").to_string(),
                    vendor: id.vendor(),
                    product: id.product(),
                    kind: classify(&device),
                    path,
                });
            }
            Err(e) => {
                tracing::debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}

pub fn is_keyboard(device: &Device) -> bool {
    device.supported_events().contains(EventType::KEY)
        && device
            .supported_keys()
            .map(|keys| keys.contains(Key::KEY_A) || keys.contains(Key::KEY_LEFTSHIFT))
            .unwrap_or(false)
}

pub fn is_pointer(device: &Device) -> bool {
    let has_motion = device
        .supported_relative_axes()
        .map(|axes| axes.contains(RelativeAxisType::REL_X) && axes.contains(RelativeAxisType::REL_Y))
        .unwrap_or(false);
    let has_button = device
        .supported_keys()
        .map(|keys| keys.contains(Key::BTN_LEFT))
        .unwrap_or(false);
    has_motion && has_button
}

pub fn classify(device: &Device) -> DeviceKind {
    kind_from(is_keyboard(device), is_pointer(device))
}

fn kind_from(keyboard: bool, pointer: bool) -> DeviceKind {
    match (keyboard, pointer) {
        (true, true) => DeviceKind::Combined,
        (true, false) => DeviceKind::Keyboard,
        (false, true) => DeviceKind::Pointer,
        (false, false) => DeviceKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_node_filter() {
        assert!(is_event_node(Path::new("/dev/input/event3")));
        assert!(!is_event_node(Path::new("/dev/input/mice")));
        assert!(!is_event_node(Path::new("/dev/input/by-id")));
    }

    #[test]
    fn test_kind_from() {
        assert_eq!(kind_from(true, true), DeviceKind::Combined);
        assert_eq!(kind_from(false, true), DeviceKind::Pointer);
        assert_eq!(kind_from(false, false), DeviceKind::Other);
        assert_eq!(DeviceKind::Combined.to_string(), "keyboard+pointer");
    }

    #[test]
    fn test_vendor_product() {
        let info = DeviceInfo {
            path: PathBuf::from("/dev/input/event0"),
            name: "Mouse".to_string(),
            vendor: 0x46d,
            product: 0xc52b,
            kind: DeviceKind::Pointer,
        };
        assert_eq!(info.vendor_product(), "046d:c52b");
    }
}
