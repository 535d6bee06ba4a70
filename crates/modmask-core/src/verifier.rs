//! Mismatch-accumulating modifier verifier
//!
//! The verifier is told what mask to expect before each synthetic action and
//! then fed every event the window system delivers. It never fails on its
//! own; instead it keeps a log of every bit that disagreed, which the caller
//! reads once the action has settled.
//!
//! ```text
//!  set_expectation(M) ──▶ log = [no event delivery]
//!        │
//!        ▼
//!  observe(e) ──▶ sentinel dropped, one entry per differing bit
//!        │
//!        ▼
//!  mismatches() ──▶ empty == pass
//! ```
//!
//! The sentinel makes "nothing was delivered" and "something was delivered
//! wrong" visible through the same channel.

use std::fmt;

use crate::error::MaskError;
use crate::event::{EventKind, NormalizedEvent};
use crate::mask::{ButtonBudget, ModifierKey, Modifiers};

/// One bit the verifier compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckedBit {
    Modifier(ModifierKey),
    /// 1-based button index, always inside `1..=Modifiers::BUTTON_NUMBER`.
    /// Built through [`CheckedBit::button`] outside this crate.
    #[non_exhaustive]
    Button(u8),
}

impl CheckedBit {
    /// Checked bit for a 1-based button index.
    pub fn button(n: u8) -> Result<Self, MaskError> {
        Modifiers::button(n)?;
        Ok(CheckedBit::Button(n))
    }

    /// Normalized mask for this bit.
    pub fn mask(self) -> Modifiers {
        match self {
            CheckedBit::Modifier(key) => key.flag(),
            CheckedBit::Button(n) => Modifiers::from_bits_retain(1 << (7 + u32::from(n))),
        }
    }
}

impl fmt::Display for CheckedBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckedBit::Modifier(key) => write!(f, "{}", key),
            CheckedBit::Button(n) => write!(f, "button{}", n),
        }
    }
}

/// An entry in the mismatch log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// No event has been checked since the expectation was set
    NoEventDelivered,
    /// A delivered event disagreed with the expectation on one bit
    Bit {
        kind: EventKind,
        bit: CheckedBit,
        expected: Modifiers,
        observed: Modifiers,
    },
}

impl Mismatch {
    pub fn bit(&self) -> Option<CheckedBit> {
        match self {
            Mismatch::NoEventDelivered => None,
            Mismatch::Bit { bit, .. } => Some(*bit),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::NoEventDelivered => f.write_str("no event delivery"),
            Mismatch::Bit {
                kind,
                bit,
                expected,
                observed,
            } => write!(
                f,
                "{}: mask {} 0x{:x}, expected: {}, have: {}",
                kind,
                bit,
                bit.mask().bits(),
                expected,
                observed
            ),
        }
    }
}

/// Compares delivered events against the currently expected mask.
///
/// Owned by whoever drains the event queue. There is no internal locking:
/// exactly one task sets expectations and feeds observations.
#[derive(Debug, Clone)]
pub struct MismatchVerifier {
    expected: Modifiers,
    log: Vec<Mismatch>,
    check_enabled: bool,
    buttons: ButtonBudget,
}

impl Default for MismatchVerifier {
    fn default() -> Self {
        Self::new(ButtonBudget::default())
    }
}

impl MismatchVerifier {
    /// Create a verifier expecting an empty mask, with checking enabled.
    pub fn new(buttons: ButtonBudget) -> Self {
        Self {
            expected: Modifiers::empty(),
            log: vec![Mismatch::NoEventDelivered],
            check_enabled: true,
            buttons,
        }
    }

    pub fn expected(&self) -> Modifiers {
        self.expected
    }

    pub fn buttons(&self) -> ButtonBudget {
        self.buttons
    }

    /// Replace the expectation without touching the log.
    pub fn set_expected(&mut self, mask: Modifiers) {
        self.expected = mask;
    }

    /// Clear the log and seed it with the "no event delivery" sentinel.
    ///
    /// The sentinel is dropped as soon as any event is checked.
    pub fn reset_mismatches(&mut self) {
        self.log.clear();
        self.log.push(Mismatch::NoEventDelivered);
    }

    /// Set the expectation for the next action and start a fresh log.
    ///
    /// Equivalent to [`set_expected`](Self::set_expected) followed by
    /// [`reset_mismatches`](Self::reset_mismatches).
    pub fn set_expectation(&mut self, mask: Modifiers) {
        self.set_expected(mask);
        self.reset_mismatches();
    }

    pub fn set_check_enabled(&mut self, enabled: bool) {
        self.check_enabled = enabled;
    }

    pub fn check_enabled(&self) -> bool {
        self.check_enabled
    }

    /// Compare one delivered event against the expectation.
    ///
    /// Each of the five modifier bits and each budgeted button bit is
    /// compared; every differing bit appends its own entry. Does nothing
    /// while checking is disabled.
    pub fn observe(&mut self, event: &NormalizedEvent) {
        if !self.check_enabled {
            tracing::debug!("received {}, modifier check disabled", event.kind);
            return;
        }

        tracing::debug!(
            "received {}, expected {}, current {}",
            event.kind,
            self.expected,
            event.modifiers
        );

        // Something was delivered, whether or not it is correct.
        if self.log == [Mismatch::NoEventDelivered] {
            self.log.clear();
        }

        let bits = ModifierKey::ALL
            .into_iter()
            .map(CheckedBit::Modifier)
            .chain(self.buttons.buttons().map(CheckedBit::Button));

        for bit in bits {
            let mask = bit.mask();
            if event.modifiers & mask != self.expected & mask {
                self.log.push(Mismatch::Bit {
                    kind: event.kind,
                    bit,
                    expected: self.expected,
                    observed: event.modifiers,
                });
            }
        }
    }

    /// The mismatch log, in the order entries were recorded.
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.log
    }

    /// The mismatch log rendered as messages.
    pub fn failure_messages(&self) -> Vec<String> {
        self.log.iter().map(ToString::to_string).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.log.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressed(modifiers: Modifiers) -> NormalizedEvent {
        NormalizedEvent::new(EventKind::Pressed, 300, 300, modifiers).with_button(1)
    }

    #[test]
    fn test_new_verifier_has_sentinel() {
        let verifier = MismatchVerifier::default();
        assert_eq!(verifier.mismatches(), &[Mismatch::NoEventDelivered]);
    }

    #[test]
    fn test_set_expectation_seeds_sentinel() {
        let mut verifier = MismatchVerifier::default();
        verifier.set_expectation(Modifiers::SHIFT | Modifiers::BUTTON1);
        assert_eq!(verifier.mismatches(), &[Mismatch::NoEventDelivered]);
        assert_eq!(verifier.failure_messages(), vec!["no event delivery"]);
    }

    #[test]
    fn test_matching_event_clears_log() {
        let expected = Modifiers::CTRL | Modifiers::BUTTON2;
        let mut verifier = MismatchVerifier::default();
        verifier.set_expectation(expected);
        verifier.observe(&pressed(expected));
        assert!(verifier.is_clean());
    }

    #[test]
    fn test_ctrl_only_difference() {
        let mut verifier = MismatchVerifier::default();
        verifier.set_expectation(Modifiers::CTRL | Modifiers::BUTTON1);
        verifier.observe(&pressed(Modifiers::BUTTON1));

        let log = verifier.mismatches();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].bit(), Some(CheckedBit::Modifier(ModifierKey::Ctrl)));
        assert_eq!(
            log[0].to_string(),
            "MOUSE_PRESSED: mask ctrl 0x2, expected: [ctrl, button1], have: [button1]"
        );
    }

    #[test]
    fn test_multiple_bits_on_one_event() {
        let mut verifier = MismatchVerifier::default();
        verifier.set_expectation(Modifiers::SHIFT | Modifiers::BUTTON1);
        verifier.observe(&pressed(Modifiers::ALT | Modifiers::BUTTON3));

        let bits: Vec<_> = verifier.mismatches().iter().filter_map(Mismatch::bit).collect();
        assert_eq!(
            bits,
            vec![
                CheckedBit::Modifier(ModifierKey::Shift),
                CheckedBit::Modifier(ModifierKey::Alt),
                CheckedBit::Button(1),
                CheckedBit::Button(3),
            ]
        );
    }

    #[test]
    fn test_consecutive_observations_accumulate() {
        let mut verifier = MismatchVerifier::default();
        verifier.set_expectation(Modifiers::BUTTON1);
        verifier.observe(&pressed(Modifiers::BUTTON1 | Modifiers::SHIFT));
        verifier.observe(&pressed(Modifiers::BUTTON1 | Modifiers::META));

        let bits: Vec<_> = verifier.mismatches().iter().filter_map(Mismatch::bit).collect();
        assert_eq!(
            bits,
            vec![
                CheckedBit::Modifier(ModifierKey::Shift),
                CheckedBit::Modifier(ModifierKey::Meta),
            ]
        );
    }

    #[test]
    fn test_repeated_mismatch_keeps_duplicates() {
        let mut verifier = MismatchVerifier::default();
        verifier.set_expectation(Modifiers::BUTTON1);
        verifier.observe(&pressed(Modifiers::empty()));
        verifier.observe(&pressed(Modifiers::empty()));
        assert_eq!(verifier.mismatches().len(), 2);
        assert_eq!(verifier.mismatches()[0], verifier.mismatches()[1]);
    }

    #[test]
    fn test_disabled_check_is_noop() {
        let mut verifier = MismatchVerifier::default();
        verifier.set_expectation(Modifiers::BUTTON1);
        verifier.set_check_enabled(false);
        verifier.observe(&pressed(Modifiers::SHIFT));
        assert_eq!(verifier.mismatches(), &[Mismatch::NoEventDelivered]);

        verifier.set_check_enabled(true);
        verifier.observe(&pressed(Modifiers::BUTTON1));
        assert!(verifier.is_clean());
    }

    #[test]
    fn test_buttons_outside_budget_not_checked() {
        let mut verifier = MismatchVerifier::new(ButtonBudget::new(1));
        verifier.set_expectation(Modifiers::BUTTON1);
        verifier.observe(&pressed(Modifiers::BUTTON1 | Modifiers::BUTTON2));
        assert!(verifier.is_clean());
    }

    #[test]
    fn test_set_expected_keeps_log() {
        let mut verifier = MismatchVerifier::default();
        verifier.set_expectation(Modifiers::BUTTON1);
        verifier.observe(&pressed(Modifiers::empty()));
        verifier.set_expected(Modifiers::empty());
        assert_eq!(verifier.mismatches().len(), 1);
        assert_eq!(verifier.expected(), Modifiers::empty());

        verifier.reset_mismatches();
        assert_eq!(verifier.mismatches(), &[Mismatch::NoEventDelivered]);
    }

    #[test]
    fn test_checked_button_rejects_out_of_range() {
        assert_eq!(
            CheckedBit::button(0),
            Err(MaskError::ButtonOutOfRange { button: 0, max: 16 })
        );
        assert!(CheckedBit::button(17).is_err());
        assert_eq!(CheckedBit::button(2).unwrap().mask(), Modifiers::BUTTON2);
        assert_eq!(CheckedBit::button(16).unwrap().mask().bits(), 1 << 23);
        assert_eq!(CheckedBit::button(3).unwrap().to_string(), "button3");
    }

    #[test]
    fn test_sentinel_not_restored_after_clean_event() {
        let mut verifier = MismatchVerifier::default();
        verifier.set_expectation(Modifiers::empty());
        verifier.observe(&NormalizedEvent::new(EventKind::Moved, 0, 0, Modifiers::empty()));
        verifier.observe(&NormalizedEvent::new(EventKind::Moved, 1, 1, Modifiers::empty()));
        assert!(verifier.is_clean());
    }
}
