//! Configuration data model

use std::fmt;
use std::time::Duration;

use modmask_core::{ModifierKey, NativeLayout};
use serde::Serialize;

/// Root configuration structure
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub harness: HarnessConfig,
    pub surface: SurfaceConfig,
    pub scenarios: ScenarioSelection,
}

/// Robot timing and platform settings
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub log_level: LogLevel,
    /// Buttons the platform reports; the harness never tests more than three
    pub button_count: u8,
    /// Robot delay while resetting state between tests
    pub short_delay: Duration,
    /// Robot delay while a test is running
    pub long_delay: Duration,
    /// Pause after each test before the next one starts
    pub settle: Duration,
    /// Native encoding of the platform under test
    pub layout: NativeLayout,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            button_count: 3,
            short_delay: Duration::from_millis(50),
            long_delay: Duration::from_millis(500),
            settle: Duration::from_millis(500),
            layout: NativeLayout::X11,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string for `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Screen rectangle of the window the robot clicks into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl SurfaceConfig {
    /// Where the pointer rests between actions
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            width: 400,
            height: 400,
        }
    }
}

/// The button sequences the harness knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    SingleButtonPressRelease,
    HoldOnePressAnother,
    PressAllInSequence,
    ClickAndDrag,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 4] = [
        ScenarioKind::SingleButtonPressRelease,
        ScenarioKind::HoldOnePressAnother,
        ScenarioKind::PressAllInSequence,
        ScenarioKind::ClickAndDrag,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScenarioKind::SingleButtonPressRelease => "single-button-press-release",
            ScenarioKind::HoldOnePressAnother => "hold-one-press-another",
            ScenarioKind::PressAllInSequence => "press-all-in-sequence",
            ScenarioKind::ClickAndDrag => "click-and-drag",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ScenarioKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown scenario: {}", s))
    }
}

/// Which scenarios run, and with which held modifier
#[derive(Debug, Clone)]
pub struct ScenarioSelection {
    pub enabled: Vec<ScenarioKind>,
    /// Explicit modifier list; `None` entries mean "no key held".
    /// When unset, see [`ScenarioSelection::modifiers_for`].
    pub modifiers: Option<Vec<Option<ModifierKey>>>,
}

impl Default for ScenarioSelection {
    fn default() -> Self {
        Self {
            enabled: ScenarioKind::ALL.to_vec(),
            modifiers: None,
        }
    }
}

impl ScenarioSelection {
    /// Held-modifier variants to run for `kind`.
    ///
    /// Without an explicit list, press/release runs bare and with each of the
    /// five modifiers; every other scenario runs bare only.
    pub fn modifiers_for(&self, kind: ScenarioKind) -> Vec<Option<ModifierKey>> {
        if let Some(modifiers) = &self.modifiers {
            return modifiers.clone();
        }

        match kind {
            ScenarioKind::SingleButtonPressRelease => std::iter::once(None)
                .chain(ModifierKey::ALL.into_iter().map(Some))
                .collect(),
            _ => vec![None],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_center() {
        assert_eq!(SurfaceConfig::default().center(), (300, 300));
    }

    #[test]
    fn test_default_modifiers_full_coverage() {
        let selection = ScenarioSelection::default();
        let variants = selection.modifiers_for(ScenarioKind::SingleButtonPressRelease);
        assert_eq!(variants.len(), 6);
        assert_eq!(variants[0], None);
        assert!(variants.contains(&Some(ModifierKey::AltGraph)));

        assert_eq!(selection.modifiers_for(ScenarioKind::ClickAndDrag), vec![None]);
    }

    #[test]
    fn test_explicit_modifiers_apply_everywhere() {
        let selection = ScenarioSelection {
            enabled: ScenarioKind::ALL.to_vec(),
            modifiers: Some(vec![Some(ModifierKey::Shift)]),
        };
        for kind in ScenarioKind::ALL {
            assert_eq!(selection.modifiers_for(kind), vec![Some(ModifierKey::Shift)]);
        }
    }

    #[test]
    fn test_scenario_kind_from_str() {
        assert_eq!(
            "Click-And-Drag".parse::<ScenarioKind>(),
            Ok(ScenarioKind::ClickAndDrag)
        );
        assert!("double-click".parse::<ScenarioKind>().is_err());
    }
}
