use thiserror::Error;

/// Errors raised by mask lookups and name parsing.
///
/// Translation itself never fails; these are precondition violations on the
/// lookup helpers around it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MaskError {
    /// A button index outside the range the encoding can represent
    #[error("only buttons 1-{max} have a mask value, requested button {button}")]
    ButtonOutOfRange { button: u8, max: u8 },

    /// The layout has no bit for this button
    #[error("layout {layout} has no mask for button {button}")]
    ButtonUnsupported { layout: &'static str, button: u8 },

    #[error("unknown native layout: {name}")]
    UnknownLayout { name: String },

    #[error("unknown modifier: {name}")]
    UnknownModifier { name: String },
}
