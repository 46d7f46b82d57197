#![forbid(unsafe_code)]

//! Raw platform notifications and their classification.
//!
//! The web host forwards three families of DOM events from the scratch
//! textarea:
//! - `keydown` / `keyup` (physical key transitions),
//! - `compositionstart` / `compositionupdate` / `compositionend`, and
//! - `input` (the textarea contents changed).
//!
//! [`DomEvent`] is a JSON-friendly mirror of the DOM fields the core reads, so
//! browser captures can be recorded and replayed. [`RawNotification`] is the
//! classified, typed form the [`CompositionMachine`](crate::CompositionMachine)
//! consumes.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{ImeError, Result};

bitflags! {
    /// Modifier keys held during a key transition.
    ///
    /// Encoded as a compact `u8` bitset on the wire (`mods`).
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const META  = 0b1000;
    }
}

impl Modifiers {
    #[must_use]
    pub fn from_flags(shift: bool, alt: bool, ctrl: bool, meta: bool) -> Self {
        let mut mods = Self::empty();
        mods.set(Self::SHIFT, shift);
        mods.set(Self::ALT, alt);
        mods.set(Self::CTRL, ctrl);
        mods.set(Self::META, meta);
        mods
    }
}

/// Direction of a physical key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDirection {
    Down,
    Up,
}

/// Phase of an IME composition lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionPhase {
    Start,
    Update,
    End,
}

/// Classified DOM event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Key(KeyDirection),
    Composition(CompositionPhase),
    TextMutation,
}

impl NotificationKind {
    /// Classify a DOM event `type` string.
    ///
    /// Anything outside the documented event model is a protocol violation;
    /// unknown browser behavior is never silently dropped.
    pub fn classify(event_type: &str) -> Result<Self> {
        match event_type {
            "keydown" => Ok(Self::Key(KeyDirection::Down)),
            "keyup" => Ok(Self::Key(KeyDirection::Up)),
            "compositionstart" => Ok(Self::Composition(CompositionPhase::Start)),
            "compositionupdate" => Ok(Self::Composition(CompositionPhase::Update)),
            "compositionend" => Ok(Self::Composition(CompositionPhase::End)),
            "input" => Ok(Self::TextMutation),
            other => Err(ImeError::unknown_notification(other)),
        }
    }

    #[must_use]
    pub const fn dom_type(self) -> &'static str {
        match self {
            Self::Key(KeyDirection::Down) => "keydown",
            Self::Key(KeyDirection::Up) => "keyup",
            Self::Composition(CompositionPhase::Start) => "compositionstart",
            Self::Composition(CompositionPhase::Update) => "compositionupdate",
            Self::Composition(CompositionPhase::End) => "compositionend",
            Self::TextMutation => "input",
        }
    }
}

/// A physical key transition as reported by the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyTransition {
    pub direction: KeyDirection,
    /// Logical key (DOM `key`), e.g. `"a"`, `"Shift"`, `"Process"`, `"Dead"`.
    pub key: String,
    /// Physical key identifier (DOM `code`), e.g. `"KeyA"`, `"ShiftLeft"`.
    pub code: String,
    /// DOM `location` (0 standard, 1 left, 2 right, 3 numpad).
    pub location: u32,
    /// Legacy numeric key code (DOM `keyCode`); 229 while an IME is busy.
    pub key_code: u32,
    pub mods: Modifiers,
    /// Platform event time in milliseconds. Informational only.
    pub timestamp_ms: f64,
}

impl KeyTransition {
    #[must_use]
    pub fn new(
        direction: KeyDirection,
        key: impl Into<String>,
        code: impl Into<String>,
        key_code: u32,
    ) -> Self {
        Self {
            direction,
            key: key.into(),
            code: code.into(),
            location: 0,
            key_code,
            mods: Modifiers::empty(),
            timestamp_ms: 0.0,
        }
    }

    #[must_use]
    pub fn down(key: impl Into<String>, code: impl Into<String>, key_code: u32) -> Self {
        Self::new(KeyDirection::Down, key, code, key_code)
    }

    #[must_use]
    pub fn up(key: impl Into<String>, code: impl Into<String>, key_code: u32) -> Self {
        Self::new(KeyDirection::Up, key, code, key_code)
    }

    #[must_use]
    pub fn with_location(mut self, location: u32) -> Self {
        self.location = location;
        self
    }

    #[must_use]
    pub fn with_mods(mut self, mods: Modifiers) -> Self {
        self.mods = mods;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp_ms: f64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionNotification {
    pub phase: CompositionPhase,
    /// Composed text; the committed text for [`CompositionPhase::End`].
    pub data: Option<String>,
}

/// Classified raw notification.
#[derive(Debug, Clone, PartialEq)]
pub enum RawNotification {
    Key(KeyTransition),
    Composition(CompositionNotification),
    TextMutation,
}

impl RawNotification {
    #[must_use]
    pub const fn composition_start() -> Self {
        Self::Composition(CompositionNotification {
            phase: CompositionPhase::Start,
            data: None,
        })
    }

    #[must_use]
    pub fn composition_update(data: impl Into<String>) -> Self {
        Self::Composition(CompositionNotification {
            phase: CompositionPhase::Update,
            data: Some(data.into()),
        })
    }

    #[must_use]
    pub fn composition_end(text: impl Into<String>) -> Self {
        Self::Composition(CompositionNotification {
            phase: CompositionPhase::End,
            data: Some(text.into()),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::Key(key) => NotificationKind::Key(key.direction),
            Self::Composition(comp) => NotificationKind::Composition(comp.phase),
            Self::TextMutation => NotificationKind::TextMutation,
        }
    }
}

impl From<KeyTransition> for RawNotification {
    fn from(value: KeyTransition) -> Self {
        Self::Key(value)
    }
}

/// JSON-friendly mirror of a DOM `KeyboardEvent` / `CompositionEvent` /
/// `InputEvent`.
///
/// Field names follow the DOM so a capture script can serialize events with
/// a plain property copy. Missing fields take their DOM defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub key_code: u32,
    pub location: u32,
    pub shift_key: bool,
    pub alt_key: bool,
    pub ctrl_key: bool,
    pub meta_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub time_stamp: f64,
}

impl DomEvent {
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn mods(&self) -> Modifiers {
        Modifiers::from_flags(self.shift_key, self.alt_key, self.ctrl_key, self.meta_key)
    }

    /// Decode one capture line.
    pub fn from_json_str(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_json_string(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl TryFrom<&DomEvent> for RawNotification {
    type Error = ImeError;

    fn try_from(event: &DomEvent) -> Result<Self> {
        Ok(match NotificationKind::classify(&event.event_type)? {
            NotificationKind::Key(direction) => Self::Key(KeyTransition {
                direction,
                key: event.key.clone().unwrap_or_default(),
                code: event.code.clone().unwrap_or_default(),
                location: event.location,
                key_code: event.key_code,
                mods: event.mods(),
                timestamp_ms: event.time_stamp,
            }),
            NotificationKind::Composition(phase) => Self::Composition(CompositionNotification {
                phase,
                data: event.data.clone(),
            }),
            NotificationKind::TextMutation => Self::TextMutation,
        })
    }
}
