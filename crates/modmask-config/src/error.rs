use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(modmask::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid value: {message}")]
    #[diagnostic(code(modmask::config::invalid_value))]
    InvalidValue {
        #[source_code]
        src: String,
        #[label("{message}")]
        span: miette::SourceSpan,
        message: String,
    },

    #[error("Unknown scenario: {name}")]
    #[diagnostic(
        code(modmask::config::unknown_scenario),
        help("expected one of: single-button-press-release, hold-one-press-another, press-all-in-sequence, click-and-drag")
    )]
    UnknownScenario { name: String },

    #[error("Unknown modifier: {name}")]
    #[diagnostic(
        code(modmask::config::unknown_modifier),
        help("expected one of: none, shift, ctrl, meta, alt, alt-graph")
    )]
    UnknownModifier { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
