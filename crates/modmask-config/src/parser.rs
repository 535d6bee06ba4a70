//! KDL configuration parser

use std::path::Path;
use std::time::Duration;

use modmask_core::{ModifierKey, NativeLayout};

use crate::error::ConfigError;
use crate::model::*;

/// Where the CLI looks for a configuration file by default
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/modmask/config.kdl";

/// Convert a node name's span from kdl's miette version to ours
fn node_span(node: &kdl::KdlNode) -> miette::SourceSpan {
    let span = node.name().span();
    miette::SourceSpan::from((span.offset(), span.len()))
}

fn invalid(node: &kdl::KdlNode, source: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        src: source.to_string(),
        span: node_span(node),
        message: message.into(),
    }
}

fn first_i64(node: &kdl::KdlNode, source: &str) -> Result<i64, ConfigError> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_i64())
        .ok_or_else(|| {
            invalid(
                node,
                source,
                format!("`{}` expects an integer", node.name().value()),
            )
        })
}

fn first_string<'a>(node: &'a kdl::KdlNode, source: &str) -> Result<&'a str, ConfigError> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| {
            invalid(
                node,
                source,
                format!("`{}` expects a string", node.name().value()),
            )
        })
}

fn millis(node: &kdl::KdlNode, source: &str) -> Result<Duration, ConfigError> {
    let value = first_i64(node, source)?;
    u64::try_from(value)
        .map(Duration::from_millis)
        .map_err(|_| invalid(node, source, "delay must not be negative"))
}

fn dimension(node: &kdl::KdlNode, source: &str, positive: bool) -> Result<i32, ConfigError> {
    let value = first_i64(node, source)?;
    let value =
        i32::try_from(value).map_err(|_| invalid(node, source, "value does not fit in 32 bits"))?;
    if positive && value <= 0 {
        return Err(invalid(node, source, "size must be positive"));
    }
    Ok(value)
}

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse the configuration file if it exists, otherwise use defaults
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl uses an older miette version, so we need to extract offset/len manually
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "harness" => {
                config.harness = parse_harness(node, content)?;
            }
            "surface" => {
                config.surface = parse_surface(node, content)?;
            }
            "scenarios" => {
                config.scenarios = parse_scenarios(node, content)?;
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_harness(node: &kdl::KdlNode, source: &str) -> Result<HarnessConfig, ConfigError> {
    let mut harness = HarnessConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "log-level" => {
                    harness.log_level = first_string(child, source)?
                        .parse()
                        .map_err(|e: String| invalid(child, source, e))?;
                }
                "button-count" => {
                    let count = first_i64(child, source)?;
                    harness.button_count = u8::try_from(count)
                        .ok()
                        .filter(|&n| n > 0)
                        .ok_or_else(|| {
                            invalid(child, source, "button count must be between 1 and 255")
                        })?;
                }
                "short-delay-ms" => {
                    harness.short_delay = millis(child, source)?;
                }
                "long-delay-ms" => {
                    harness.long_delay = millis(child, source)?;
                }
                "settle-ms" => {
                    harness.settle = millis(child, source)?;
                }
                "layout" => {
                    harness.layout = first_string(child, source)?
                        .parse::<NativeLayout>()
                        .map_err(|e| invalid(child, source, e.to_string()))?;
                }
                name => {
                    tracing::warn!("Unknown harness option: {}", name);
                }
            }
        }
    }

    Ok(harness)
}

fn parse_surface(node: &kdl::KdlNode, source: &str) -> Result<SurfaceConfig, ConfigError> {
    let mut surface = SurfaceConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "x" => surface.x = dimension(child, source, false)?,
                "y" => surface.y = dimension(child, source, false)?,
                "width" => surface.width = dimension(child, source, true)?,
                "height" => surface.height = dimension(child, source, true)?,
                name => {
                    tracing::warn!("Unknown surface option: {}", name);
                }
            }
        }
    }

    Ok(surface)
}

fn parse_scenarios(node: &kdl::KdlNode, source: &str) -> Result<ScenarioSelection, ConfigError> {
    let mut selection = ScenarioSelection {
        enabled: Vec::new(),
        modifiers: None,
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let name = child.name().value();

            if name == "modifiers" {
                selection.modifiers = Some(parse_modifier_list(child, source)?);
                continue;
            }

            let kind: ScenarioKind = name.parse().map_err(|_| ConfigError::UnknownScenario {
                name: name.to_string(),
            })?;
            if !selection.enabled.contains(&kind) {
                selection.enabled.push(kind);
            }
        }
    }

    // A block holding only `modifiers` still runs every scenario
    if selection.enabled.is_empty() {
        selection.enabled = ScenarioKind::ALL.to_vec();
    }

    Ok(selection)
}

fn parse_modifier_list(
    node: &kdl::KdlNode,
    source: &str,
) -> Result<Vec<Option<ModifierKey>>, ConfigError> {
    let mut modifiers = Vec::new();

    for entry in node.entries() {
        let name = entry
            .value()
            .as_string()
            .ok_or_else(|| invalid(node, source, "modifier names must be strings"))?;

        let modifier = if name.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(
                name.parse::<ModifierKey>()
                    .map_err(|_| ConfigError::UnknownModifier {
                        name: name.to_string(),
                    })?,
            )
        };

        if !modifiers.contains(&modifier) {
            modifiers.push(modifier);
        }
    }

    if modifiers.is_empty() {
        return Err(invalid(node, source, "`modifiers` needs at least one entry"));
    }

    Ok(modifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config.harness.button_count, 3);
        assert_eq!(config.harness.layout, NativeLayout::X11);
        assert_eq!(config.surface, SurfaceConfig::default());
        assert_eq!(config.scenarios.enabled, ScenarioKind::ALL.to_vec());
    }

    #[test]
    fn test_parse_full_config() {
        let kdl = r#"
            harness {
                log-level "debug"
                button-count 5
                short-delay-ms 10
                long-delay-ms 200
                settle-ms 0
                layout "cocoa"
            }
            surface {
                x 0
                y 50
                width 640
                height 480
            }
            scenarios {
                click-and-drag
                press-all-in-sequence
                modifiers "none" "shift" "altgr"
            }
        "#;

        let config = parse_config_str(kdl).unwrap();
        assert_eq!(config.harness.log_level, LogLevel::Debug);
        assert_eq!(config.harness.button_count, 5);
        assert_eq!(config.harness.short_delay, Duration::from_millis(10));
        assert_eq!(config.harness.long_delay, Duration::from_millis(200));
        assert_eq!(config.harness.settle, Duration::ZERO);
        assert_eq!(config.harness.layout, NativeLayout::COCOA);
        assert_eq!(config.surface.center(), (320, 290));
        assert_eq!(
            config.scenarios.enabled,
            vec![ScenarioKind::ClickAndDrag, ScenarioKind::PressAllInSequence]
        );
        assert_eq!(
            config.scenarios.modifiers,
            Some(vec![None, Some(ModifierKey::Shift), Some(ModifierKey::AltGraph)])
        );
    }

    #[test]
    fn test_unknown_scenario_error() {
        let result = parse_config_str("scenarios {\n    triple-click\n}");
        match result {
            Err(ConfigError::UnknownScenario { name }) => assert_eq!(name, "triple-click"),
            other => panic!("expected UnknownScenario, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_modifier_error() {
        let result = parse_config_str("scenarios {\n    modifiers \"hyper\"\n}");
        assert!(matches!(result, Err(ConfigError::UnknownModifier { .. })));
    }

    #[test]
    fn test_negative_delay_rejected() {
        let result = parse_config_str("harness {\n    long-delay-ms -5\n}");
        match result {
            Err(ConfigError::InvalidValue { message, .. }) => {
                assert!(message.contains("negative"));
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_width_rejected() {
        let result = parse_config_str("surface {\n    width 0\n}");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_unknown_layout_rejected() {
        let result = parse_config_str("harness {\n    layout \"wayland\"\n}");
        match result {
            Err(ConfigError::InvalidValue { message, .. }) => {
                assert!(message.contains("wayland"));
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_string_where_integer_expected() {
        let result = parse_config_str("harness {\n    button-count \"three\"\n}");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_syntax_error() {
        let result = parse_config_str("harness {");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = parse_config_str("window-manager \"sway\"\nharness {\n    colour \"red\"\n}");
        assert!(config.is_ok());
    }

    #[test]
    fn test_empty_scenarios_block_keeps_all() {
        let config = parse_config_str("scenarios {\n}").unwrap();
        assert_eq!(config.scenarios.enabled, ScenarioKind::ALL.to_vec());
    }

    #[test]
    fn test_modifiers_only_block_keeps_all_scenarios() {
        let config = parse_config_str("scenarios {\n    modifiers \"shift\"\n}").unwrap();
        assert_eq!(config.scenarios.enabled, ScenarioKind::ALL.to_vec());
        for kind in ScenarioKind::ALL {
            assert_eq!(
                config.scenarios.modifiers_for(kind),
                vec![Some(ModifierKey::Shift)]
            );
        }
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.kdl")).unwrap();
        assert_eq!(config.harness.button_count, 3);
    }

    #[test]
    fn test_parse_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, "harness {\n    button-count 2\n}\n").unwrap();

        let config = parse_config(&path).unwrap();
        assert_eq!(config.harness.button_count, 2);
    }
}
