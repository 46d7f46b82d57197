#![forbid(unsafe_code)]

//! Virtual-key resolution: DOM `code` + `location` → [`VirtualKey`] + [`KeyLocation`].
//!
//! Virtual-key values follow the AWT `KeyEvent.VK_*` numbering, which is what
//! the remote side expects. The mapping is total: identifiers it does not know
//! resolve to [`VirtualKey::UNDEFINED`].

use serde::{Deserialize, Serialize};

/// Canonical virtual key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualKey(pub u16);

impl VirtualKey {
    pub const UNDEFINED: Self = Self(0x00);
    pub const BACK_SPACE: Self = Self(0x08);
    pub const TAB: Self = Self(0x09);
    pub const ENTER: Self = Self(0x0A);
    pub const SHIFT: Self = Self(0x10);
    pub const CONTROL: Self = Self(0x11);
    pub const ALT: Self = Self(0x12);
    pub const PAUSE: Self = Self(0x13);
    pub const CAPS_LOCK: Self = Self(0x14);
    pub const ESCAPE: Self = Self(0x1B);
    pub const SPACE: Self = Self(0x20);
    pub const PAGE_UP: Self = Self(0x21);
    pub const PAGE_DOWN: Self = Self(0x22);
    pub const END: Self = Self(0x23);
    pub const HOME: Self = Self(0x24);
    pub const LEFT: Self = Self(0x25);
    pub const UP: Self = Self(0x26);
    pub const RIGHT: Self = Self(0x27);
    pub const DOWN: Self = Self(0x28);
    pub const COMMA: Self = Self(0x2C);
    pub const MINUS: Self = Self(0x2D);
    pub const PERIOD: Self = Self(0x2E);
    pub const SLASH: Self = Self(0x2F);
    pub const DIGIT_0: Self = Self(0x30);
    pub const SEMICOLON: Self = Self(0x3B);
    pub const EQUALS: Self = Self(0x3D);
    pub const A: Self = Self(0x41);
    pub const OPEN_BRACKET: Self = Self(0x5B);
    pub const BACK_SLASH: Self = Self(0x5C);
    pub const CLOSE_BRACKET: Self = Self(0x5D);
    pub const NUMPAD0: Self = Self(0x60);
    pub const MULTIPLY: Self = Self(0x6A);
    pub const ADD: Self = Self(0x6B);
    pub const SUBTRACT: Self = Self(0x6D);
    pub const DECIMAL: Self = Self(0x6E);
    pub const DIVIDE: Self = Self(0x6F);
    pub const F1: Self = Self(0x70);
    pub const DELETE: Self = Self(0x7F);
    pub const NUM_LOCK: Self = Self(0x90);
    pub const SCROLL_LOCK: Self = Self(0x91);
    pub const LESS: Self = Self(0x99);
    pub const PRINTSCREEN: Self = Self(0x9A);
    pub const INSERT: Self = Self(0x9B);
    pub const META: Self = Self(0x9D);
    pub const BACK_QUOTE: Self = Self(0xC0);
    pub const QUOTE: Self = Self(0xDE);
    pub const CONTEXT_MENU: Self = Self(0x020D);
    pub const F13: Self = Self(0xF000);

    /// Letter key `A`..=`Z`.
    #[must_use]
    pub fn letter(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        upper
            .is_ascii_uppercase()
            .then(|| Self(Self::A.0 + (upper as u16 - 'A' as u16)))
    }

    /// Digit key `0`..=`9` on the main block.
    #[must_use]
    pub fn digit(d: u8) -> Option<Self> {
        (d <= 9).then(|| Self(Self::DIGIT_0.0 + u16::from(d)))
    }

    /// Numpad digit `0`..=`9`.
    #[must_use]
    pub fn numpad(d: u8) -> Option<Self> {
        (d <= 9).then(|| Self(Self::NUMPAD0.0 + u16::from(d)))
    }

    /// Function key `F1`..=`F24`.
    #[must_use]
    pub fn function(n: u8) -> Option<Self> {
        match n {
            1..=12 => Some(Self(Self::F1.0 + u16::from(n - 1))),
            13..=24 => Some(Self(Self::F13.0 + u16::from(n - 13))),
            _ => None,
        }
    }
}

/// Canonical key location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyLocation {
    #[default]
    Standard,
    Left,
    Right,
    Numpad,
}

impl KeyLocation {
    /// DOM `KeyboardEvent.location` value.
    #[must_use]
    pub const fn from_dom(location: u32) -> Self {
        match location {
            1 => Self::Left,
            2 => Self::Right,
            3 => Self::Numpad,
            _ => Self::Standard,
        }
    }
}

/// Maps a raw physical key identifier and location to a canonical key.
///
/// Implementations must be pure and total.
pub trait KeyResolver {
    fn resolve(&self, code: &str, location: u32) -> (VirtualKey, KeyLocation);
}

impl<F> KeyResolver for F
where
    F: Fn(&str, u32) -> (VirtualKey, KeyLocation),
{
    fn resolve(&self, code: &str, location: u32) -> (VirtualKey, KeyLocation) {
        self(code, location)
    }
}

/// Resolver for the DOM `KeyboardEvent.code` vocabulary.
#[derive(Debug, Default, Clone, Copy)]
pub struct DomKeyResolver;

impl KeyResolver for DomKeyResolver {
    fn resolve(&self, code: &str, location: u32) -> (VirtualKey, KeyLocation) {
        let vk = dom_code_to_vk(code);
        let mut loc = KeyLocation::from_dom(location);
        // Some wrappers drop `location`; the numpad block is still identifiable.
        if loc == KeyLocation::Standard && code.starts_with("Numpad") {
            loc = KeyLocation::Numpad;
        }
        (vk, loc)
    }
}

fn dom_code_to_vk(code: &str) -> VirtualKey {
    if let Some(rest) = code.strip_prefix("Key") {
        let mut chars = rest.chars();
        if let (Some(c), None) = (chars.next(), chars.next())
            && let Some(vk) = VirtualKey::letter(c)
        {
            return vk;
        }
        return VirtualKey::UNDEFINED;
    }
    if let Some(d) = single_digit(code.strip_prefix("Digit")) {
        return VirtualKey::digit(d).unwrap_or(VirtualKey::UNDEFINED);
    }
    if let Some(d) = single_digit(code.strip_prefix("Numpad")) {
        return VirtualKey::numpad(d).unwrap_or(VirtualKey::UNDEFINED);
    }
    if let Some(n) = code
        .strip_prefix('F')
        .and_then(|rest| rest.parse::<u8>().ok())
    {
        return VirtualKey::function(n).unwrap_or(VirtualKey::UNDEFINED);
    }

    match code {
        "Backspace" => VirtualKey::BACK_SPACE,
        "Tab" => VirtualKey::TAB,
        "Enter" | "NumpadEnter" => VirtualKey::ENTER,
        "ShiftLeft" | "ShiftRight" => VirtualKey::SHIFT,
        "ControlLeft" | "ControlRight" => VirtualKey::CONTROL,
        "AltLeft" | "AltRight" => VirtualKey::ALT,
        "MetaLeft" | "MetaRight" | "OSLeft" | "OSRight" => VirtualKey::META,
        "Pause" => VirtualKey::PAUSE,
        "CapsLock" => VirtualKey::CAPS_LOCK,
        "Escape" => VirtualKey::ESCAPE,
        "Space" => VirtualKey::SPACE,
        "PageUp" => VirtualKey::PAGE_UP,
        "PageDown" => VirtualKey::PAGE_DOWN,
        "End" => VirtualKey::END,
        "Home" => VirtualKey::HOME,
        "ArrowLeft" => VirtualKey::LEFT,
        "ArrowUp" => VirtualKey::UP,
        "ArrowRight" => VirtualKey::RIGHT,
        "ArrowDown" => VirtualKey::DOWN,
        "Comma" => VirtualKey::COMMA,
        "Minus" => VirtualKey::MINUS,
        "Period" => VirtualKey::PERIOD,
        "Slash" => VirtualKey::SLASH,
        "Semicolon" => VirtualKey::SEMICOLON,
        "Equal" => VirtualKey::EQUALS,
        "BracketLeft" => VirtualKey::OPEN_BRACKET,
        "Backslash" => VirtualKey::BACK_SLASH,
        "BracketRight" => VirtualKey::CLOSE_BRACKET,
        "Backquote" => VirtualKey::BACK_QUOTE,
        "Quote" => VirtualKey::QUOTE,
        "IntlBackslash" => VirtualKey::LESS,
        "NumpadMultiply" => VirtualKey::MULTIPLY,
        "NumpadAdd" => VirtualKey::ADD,
        "NumpadSubtract" => VirtualKey::SUBTRACT,
        "NumpadDecimal" => VirtualKey::DECIMAL,
        "NumpadDivide" => VirtualKey::DIVIDE,
        "Delete" => VirtualKey::DELETE,
        "NumLock" => VirtualKey::NUM_LOCK,
        "ScrollLock" => VirtualKey::SCROLL_LOCK,
        "PrintScreen" => VirtualKey::PRINTSCREEN,
        "Insert" => VirtualKey::INSERT,
        "ContextMenu" => VirtualKey::CONTEXT_MENU,
        _ => VirtualKey::UNDEFINED,
    }
}

fn single_digit(rest: Option<&str>) -> Option<u8> {
    let rest = rest?;
    let mut chars = rest.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    c.to_digit(10).and_then(|d| u8::try_from(d).ok())
}
