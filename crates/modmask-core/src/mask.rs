//! Native and normalized modifier encodings
//!
//! # Encodings
//!
//! Every windowing backend reports "which modifiers and buttons are down" as a
//! bitmask, but each one puts the bits somewhere else:
//!
//! ```text
//!              shift     ctrl      meta      alt       alt-graph  button1  button2  button3
//!  X11         1<<0      1<<2      1<<6 Mod4 1<<3 Mod1 1<<7 Mod5  1<<8     1<<9     1<<10
//!  Win32 MK_*  0x0004    0x0008    -         -         -          0x0001   0x0010   0x0002
//!  Cocoa       1<<17     1<<18     1<<20     1<<19     -          1<<0     1<<2     1<<1
//!  normalized  1<<0      1<<1      1<<2      1<<3      1<<4       1<<8     1<<9     1<<10
//! ```
//!
//! A [`NativeLayout`] describes one such column. [`translate`] projects a
//! native mask through a layout into [`Modifiers`], the normalized encoding.
//!
//! ## Button numbering
//!
//! Button 1 is the primary (left) button, button 2 the middle button and
//! button 3 the secondary (right) button, on every layout. Win32 and Cocoa
//! number right before middle natively; the layout tables absorb that.
//!
//! ## Missing modifiers
//!
//! A `None` entry means the backend has no bit for that modifier at all
//! (Win32 mouse messages carry no Alt state, Cocoa has no AltGr flag). Such
//! modifiers can never appear in translated output and are reported through
//! [`NativeLayout::unsupported_modifiers`] so callers can treat them as an
//! environment limitation rather than a translation defect.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::MaskError;

bitflags! {
    /// Toolkit-neutral modifier and button mask.
    ///
    /// Bits 0-4 are the modifier keys, bits 8-23 are buttons 1-16.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const META = 1 << 2;
        const ALT = 1 << 3;
        const ALT_GRAPH = 1 << 4;

        const BUTTON1 = 1 << 8;
        const BUTTON2 = 1 << 9;
        const BUTTON3 = 1 << 10;

        /// Every button bit the encoding can carry
        const BUTTONS = 0x00FF_FF00;
    }
}

impl Modifiers {
    /// Number of buttons the normalized encoding can represent.
    pub const BUTTON_NUMBER: u8 = 16;

    /// All five modifier-key bits.
    pub const KEYS: Modifiers = Modifiers::SHIFT
        .union(Modifiers::CTRL)
        .union(Modifiers::META)
        .union(Modifiers::ALT)
        .union(Modifiers::ALT_GRAPH);

    /// Mask for a 1-based button index.
    pub fn button(button: u8) -> Result<Self, MaskError> {
        if button == 0 || button > Self::BUTTON_NUMBER {
            return Err(MaskError::ButtonOutOfRange {
                button,
                max: Self::BUTTON_NUMBER,
            });
        }
        Ok(Self::from_bits_retain(1 << (7 + u32::from(button))))
    }

    /// Iterate the 1-based indices of the buttons set in this mask.
    pub fn pressed_buttons(self) -> impl Iterator<Item = u8> {
        (1..=Self::BUTTON_NUMBER)
            .filter(move |&n| Self::button(n).map_or(false, |b| self.contains(b)))
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = ModifierKey::ALL
            .iter()
            .filter(|key| self.contains(key.flag()))
            .map(|key| key.name().to_string())
            .collect();
        names.extend(self.pressed_buttons().map(|n| format!("button{}", n)));

        write!(f, "[{}]", names.join(", "))
    }
}

/// A logical modifier key, independent of left/right variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModifierKey {
    Shift,
    Ctrl,
    Meta,
    Alt,
    AltGraph,
}

impl ModifierKey {
    /// All modifier keys, in the order they are checked and displayed.
    pub const ALL: [ModifierKey; 5] = [
        ModifierKey::Shift,
        ModifierKey::Ctrl,
        ModifierKey::Meta,
        ModifierKey::Alt,
        ModifierKey::AltGraph,
    ];

    /// The normalized bit for this key.
    pub fn flag(self) -> Modifiers {
        match self {
            ModifierKey::Shift => Modifiers::SHIFT,
            ModifierKey::Ctrl => Modifiers::CTRL,
            ModifierKey::Meta => Modifiers::META,
            ModifierKey::Alt => Modifiers::ALT,
            ModifierKey::AltGraph => Modifiers::ALT_GRAPH,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModifierKey::Shift => "shift",
            ModifierKey::Ctrl => "ctrl",
            ModifierKey::Meta => "meta",
            ModifierKey::Alt => "alt",
            ModifierKey::AltGraph => "alt-graph",
        }
    }
}

impl fmt::Display for ModifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModifierKey {
    type Err = MaskError;

    /// Parse a modifier name (case-insensitive).
    ///
    /// Recognized names:
    /// - Shift: "shift"
    /// - Ctrl: "ctrl", "control"
    /// - Meta: "meta", "super", "command", "cmd"
    /// - Alt: "alt", "option"
    /// - AltGraph: "alt-graph", "altgraph", "altgr", "graph"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shift" => Ok(ModifierKey::Shift),
            "ctrl" | "control" => Ok(ModifierKey::Ctrl),
            "meta" | "super" | "command" | "cmd" => Ok(ModifierKey::Meta),
            "alt" | "option" => Ok(ModifierKey::Alt),
            "alt-graph" | "altgraph" | "altgr" | "graph" => Ok(ModifierKey::AltGraph),
            _ => Err(MaskError::UnknownModifier {
                name: s.to_string(),
            }),
        }
    }
}

/// Bit positions of one platform's native modifier encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeLayout {
    pub name: &'static str,
    pub shift: Option<u32>,
    pub ctrl: Option<u32>,
    pub meta: Option<u32>,
    pub alt: Option<u32>,
    pub alt_graph: Option<u32>,
    /// Buttons 1, 2 and 3 (primary, middle, secondary)
    pub buttons: [Option<u32>; 3],
}

impl NativeLayout {
    /// X11 core protocol `state` field (`KeyButMask`).
    pub const X11: NativeLayout = NativeLayout {
        name: "x11",
        shift: Some(1 << 0),
        ctrl: Some(1 << 2),
        meta: Some(1 << 6),
        alt: Some(1 << 3),
        alt_graph: Some(1 << 7),
        buttons: [Some(1 << 8), Some(1 << 9), Some(1 << 10)],
    };

    /// Win32 mouse-message `MK_*` key state.
    pub const WIN32: NativeLayout = NativeLayout {
        name: "win32",
        shift: Some(0x0004),
        ctrl: Some(0x0008),
        meta: None,
        alt: None,
        alt_graph: None,
        buttons: [Some(0x0001), Some(0x0010), Some(0x0002)],
    };

    /// Cocoa modifier flags with the pressed-button bitmap in the low bits.
    pub const COCOA: NativeLayout = NativeLayout {
        name: "cocoa",
        shift: Some(1 << 17),
        ctrl: Some(1 << 18),
        meta: Some(1 << 20),
        alt: Some(1 << 19),
        alt_graph: None,
        buttons: [Some(1 << 0), Some(1 << 2), Some(1 << 1)],
    };

    /// The normalized encoding viewed as a native layout.
    pub const NORMALIZED: NativeLayout = NativeLayout {
        name: "normalized",
        shift: Some(Modifiers::SHIFT.bits()),
        ctrl: Some(Modifiers::CTRL.bits()),
        meta: Some(Modifiers::META.bits()),
        alt: Some(Modifiers::ALT.bits()),
        alt_graph: Some(Modifiers::ALT_GRAPH.bits()),
        buttons: [
            Some(Modifiers::BUTTON1.bits()),
            Some(Modifiers::BUTTON2.bits()),
            Some(Modifiers::BUTTON3.bits()),
        ],
    };

    pub const ALL: [NativeLayout; 4] = [
        NativeLayout::X11,
        NativeLayout::WIN32,
        NativeLayout::COCOA,
        NativeLayout::NORMALIZED,
    ];

    /// Native bit for a modifier key, if the platform has one.
    pub fn modifier_mask(&self, key: ModifierKey) -> Option<u32> {
        match key {
            ModifierKey::Shift => self.shift,
            ModifierKey::Ctrl => self.ctrl,
            ModifierKey::Meta => self.meta,
            ModifierKey::Alt => self.alt,
            ModifierKey::AltGraph => self.alt_graph,
        }
    }

    /// Native bit for a 1-based button index.
    ///
    /// Only buttons 1-3 have a native mask; anything else is rejected.
    pub fn button_mask(&self, button: u8) -> Result<u32, MaskError> {
        if !(1..=ButtonBudget::MAX).contains(&button) {
            return Err(MaskError::ButtonOutOfRange {
                button,
                max: ButtonBudget::MAX,
            });
        }
        self.buttons[usize::from(button - 1)].ok_or(MaskError::ButtonUnsupported {
            layout: self.name,
            button,
        })
    }

    /// Number of leading buttons this layout can encode.
    pub fn button_count(&self) -> u8 {
        self.buttons.iter().take_while(|b| b.is_some()).count() as u8
    }

    /// Modifier keys this platform cannot report at all.
    pub fn unsupported_modifiers(&self) -> Vec<ModifierKey> {
        ModifierKey::ALL
            .into_iter()
            .filter(|key| self.modifier_mask(*key).is_none())
            .collect()
    }

    pub fn supports(&self, key: ModifierKey) -> bool {
        self.modifier_mask(key).is_some()
    }

    /// Union of every native bit the translator looks at under `budget`.
    pub fn recognized_bits(&self, budget: ButtonBudget) -> u32 {
        let keys = ModifierKey::ALL
            .iter()
            .filter_map(|key| self.modifier_mask(*key))
            .fold(0, |acc, bit| acc | bit);
        budget
            .buttons()
            .filter_map(|n| self.button_mask(n).ok())
            .fold(keys, |acc, bit| acc | bit)
    }

    /// Build the native mask a platform would report for `modifiers`.
    ///
    /// Modifiers and buttons the layout cannot express are dropped.
    pub fn encode(&self, modifiers: Modifiers) -> u32 {
        let mut native = 0;

        for key in ModifierKey::ALL {
            if let Some(bit) = self.modifier_mask(key) {
                if modifiers.contains(key.flag()) {
                    native |= bit;
                }
            }
        }

        for n in 1..=ButtonBudget::MAX {
            if let (Ok(bit), Ok(flag)) = (self.button_mask(n), Modifiers::button(n)) {
                if modifiers.contains(flag) {
                    native |= bit;
                }
            }
        }

        native
    }
}

impl FromStr for NativeLayout {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        NativeLayout::ALL
            .into_iter()
            .find(|layout| layout.name == lower)
            .ok_or_else(|| MaskError::UnknownLayout {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for NativeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// How many buttons are compared.
///
/// The smaller of what the platform reports, what the normalized encoding
/// supports, and three. Extra buttons are unreliable across backends, so
/// only the common three-button case is ever tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonBudget(u8);

impl ButtonBudget {
    pub const MAX: u8 = 3;

    pub fn new(platform_reported: u8) -> Self {
        Self(
            platform_reported
                .min(Modifiers::BUTTON_NUMBER)
                .min(Self::MAX),
        )
    }

    /// Budget further limited by what `layout` can encode.
    pub fn for_layout(layout: &NativeLayout, platform_reported: u8) -> Self {
        Self::new(platform_reported.min(layout.button_count()))
    }

    pub fn count(self) -> u8 {
        self.0
    }

    /// 1-based button indices inside the budget.
    pub fn buttons(self) -> RangeInclusive<u8> {
        1..=self.0
    }
}

impl Default for ButtonBudget {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

/// Translate a native modifier mask into the normalized encoding.
///
/// Each of the five modifier bits and each budgeted button bit is tested
/// independently; a normalized bit is set only when its native bit is set.
/// Native bits the layout does not recognize are ignored.
pub fn translate(native: u32, layout: &NativeLayout, budget: ButtonBudget) -> Modifiers {
    let mut mask = Modifiers::empty();

    for key in ModifierKey::ALL {
        if let Some(bit) = layout.modifier_mask(key) {
            if native & bit != 0 {
                mask |= key.flag();
            }
        }
    }

    for n in budget.buttons() {
        if let (Ok(bit), Ok(flag)) = (layout.button_mask(n), Modifiers::button(n)) {
            if native & bit != 0 {
                mask |= flag;
            }
        }
    }

    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_shift_and_button1_only() {
        let native = NativeLayout::X11.shift.unwrap() | NativeLayout::X11.buttons[0].unwrap();
        let mask = translate(native, &NativeLayout::X11, ButtonBudget::default());
        assert_eq!(mask, Modifiers::SHIFT | Modifiers::BUTTON1);
    }

    #[test]
    fn test_x11_all_bits() {
        // Shift | Control | Mod1 | Mod4 | Mod5 | Button1-3
        let native = 0x1 | 0x4 | 0x8 | 0x40 | 0x80 | 0x100 | 0x200 | 0x400;
        let mask = translate(native, &NativeLayout::X11, ButtonBudget::default());
        assert_eq!(
            mask,
            Modifiers::KEYS | Modifiers::BUTTON1 | Modifiers::BUTTON2 | Modifiers::BUTTON3
        );
    }

    #[test]
    fn test_win32_right_button_is_button3() {
        // MK_RBUTTON | MK_CONTROL
        let mask = translate(0x0002 | 0x0008, &NativeLayout::WIN32, ButtonBudget::default());
        assert_eq!(mask, Modifiers::CTRL | Modifiers::BUTTON3);
    }

    #[test]
    fn test_cocoa_command_is_meta() {
        let mask = translate(1 << 20, &NativeLayout::COCOA, ButtonBudget::default());
        assert_eq!(mask, Modifiers::META);
    }

    #[test]
    fn test_x11_lock_mask_ignored() {
        // LockMask (caps lock) and Mod2 (num lock) are not modifiers we check
        let mask = translate(0x2 | 0x10, &NativeLayout::X11, ButtonBudget::default());
        assert!(mask.is_empty());
    }

    #[test]
    fn test_budget_limits_buttons() {
        let native = NativeLayout::X11.encode(Modifiers::BUTTON1 | Modifiers::BUTTON3);
        let mask = translate(native, &NativeLayout::X11, ButtonBudget::new(2));
        assert_eq!(mask, Modifiers::BUTTON1);
    }

    #[test]
    fn test_budget_caps_at_three() {
        assert_eq!(ButtonBudget::new(0).count(), 0);
        assert_eq!(ButtonBudget::new(2).count(), 2);
        assert_eq!(ButtonBudget::new(5).count(), 3);
        assert_eq!(ButtonBudget::new(u8::MAX).count(), 3);
    }

    #[test]
    fn test_native_button_mask_rejects_out_of_range() {
        assert_eq!(NativeLayout::X11.button_mask(1), Ok(1 << 8));
        assert_eq!(
            NativeLayout::X11.button_mask(0),
            Err(MaskError::ButtonOutOfRange { button: 0, max: 3 })
        );
        assert_eq!(
            NativeLayout::X11.button_mask(4),
            Err(MaskError::ButtonOutOfRange { button: 4, max: 3 })
        );
    }

    #[test]
    fn test_normalized_button_mask() {
        assert_eq!(Modifiers::button(1), Ok(Modifiers::BUTTON1));
        assert_eq!(Modifiers::button(3), Ok(Modifiers::BUTTON3));
        assert_eq!(Modifiers::button(16).unwrap().bits(), 1 << 23);
        assert!(Modifiers::BUTTONS.contains(Modifiers::button(16).unwrap()));
        assert!(Modifiers::button(0).is_err());
        assert!(Modifiers::button(17).is_err());
    }

    #[test]
    fn test_unsupported_modifiers() {
        assert!(NativeLayout::X11.unsupported_modifiers().is_empty());
        assert_eq!(
            NativeLayout::WIN32.unsupported_modifiers(),
            vec![ModifierKey::Meta, ModifierKey::Alt, ModifierKey::AltGraph]
        );
        assert_eq!(
            NativeLayout::COCOA.unsupported_modifiers(),
            vec![ModifierKey::AltGraph]
        );
    }

    #[test]
    fn test_encode_drops_unsupported() {
        let native = NativeLayout::WIN32.encode(Modifiers::ALT | Modifiers::SHIFT);
        assert_eq!(native, 0x0004);
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!("X11".parse::<NativeLayout>(), Ok(NativeLayout::X11));
        assert_eq!("cocoa".parse::<NativeLayout>(), Ok(NativeLayout::COCOA));
        assert!("wayland".parse::<NativeLayout>().is_err());
    }

    #[test]
    fn test_modifier_key_from_str() {
        assert_eq!("Control".parse::<ModifierKey>(), Ok(ModifierKey::Ctrl));
        assert_eq!("altgr".parse::<ModifierKey>(), Ok(ModifierKey::AltGraph));
        assert_eq!("super".parse::<ModifierKey>(), Ok(ModifierKey::Meta));
        assert!("hyper".parse::<ModifierKey>().is_err());
    }

    #[test]
    fn test_modifiers_display() {
        let mask = Modifiers::SHIFT | Modifiers::CTRL | Modifiers::BUTTON2;
        assert_eq!(mask.to_string(), "[shift, ctrl, button2]");
        assert_eq!(Modifiers::empty().to_string(), "[]");
    }

    fn any_layout() -> impl Strategy<Value = NativeLayout> {
        prop::sample::select(NativeLayout::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_unknown_bits_ignored(
            native in any::<u32>(),
            noise in any::<u32>(),
            layout in any_layout(),
            buttons in 0u8..=5,
        ) {
            let budget = ButtonBudget::new(buttons);
            let unknown = noise & !layout.recognized_bits(budget);
            prop_assert_eq!(
                translate(native ^ unknown, &layout, budget),
                translate(native, &layout, budget)
            );
        }

        #[test]
        fn prop_normalized_projection_idempotent(native in any::<u32>(), layout in any_layout()) {
            let budget = ButtonBudget::default();
            let once = translate(native, &layout, budget);
            let twice = translate(once.bits(), &NativeLayout::NORMALIZED, budget);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_output_only_from_set_bits(native in any::<u32>(), layout in any_layout()) {
            let mask = translate(native, &layout, ButtonBudget::default());
            for key in ModifierKey::ALL {
                if mask.contains(key.flag()) {
                    prop_assert!(native & layout.modifier_mask(key).unwrap() != 0);
                }
            }
        }

        #[test]
        fn prop_encode_then_translate_keeps_supported(bits in 0u32..0x800, layout in any_layout()) {
            let wanted = Modifiers::from_bits_truncate(bits)
                & (Modifiers::KEYS | Modifiers::BUTTON1 | Modifiers::BUTTON2 | Modifiers::BUTTON3);
            let translated = translate(layout.encode(wanted), &layout, ButtonBudget::default());
            let supported = ModifierKey::ALL
                .into_iter()
                .filter(|key| !layout.supports(*key))
                .fold(wanted, |acc, key| acc - key.flag());
            prop_assert_eq!(translated, supported);
        }
    }
}
