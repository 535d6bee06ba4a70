//! Modifier-mask translation and verification for modmask
//!
//! This crate maps platform-native modifier/button encodings onto a single
//! toolkit-neutral [`Modifiers`] mask, and provides the [`MismatchVerifier`]
//! that compares delivered events against an expected mask.

mod error;
mod event;
mod mask;
mod verifier;

pub use error::MaskError;
pub use event::{EventKind, NormalizedEvent};
pub use mask::{translate, ButtonBudget, ModifierKey, Modifiers, NativeLayout};
pub use verifier::{CheckedBit, Mismatch, MismatchVerifier};
