#![forbid(unsafe_code)]

//! Canonical, engine-independent output events and their wire encoding.
//!
//! The JSON shape is intentionally small and stable: a `kind` tag plus the
//! minimum fields the remote side needs.

use serde::{Deserialize, Serialize};

use crate::input::{KeyDirection, Modifiers};
use crate::keymap::{KeyLocation, VirtualKey};

/// A genuine physical key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// Milliseconds since the session's reference instant.
    pub timestamp: u32,
    pub vk: VirtualKey,
    pub location: KeyLocation,
    pub mods: Modifiers,
    pub direction: KeyDirection,
    /// Logical key when it is a single character.
    pub key_char: Option<char>,
}

/// One unit of committed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharEvent {
    pub timestamp: u32,
    pub ch: char,
    pub mods: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalEvent {
    Key(KeyEvent),
    Char(CharEvent),
}

impl CanonicalEvent {
    #[must_use]
    pub const fn timestamp(&self) -> u32 {
        match self {
            Self::Key(key) => key.timestamp,
            Self::Char(ch) => ch.timestamp,
        }
    }

    #[must_use]
    pub const fn as_char(&self) -> Option<char> {
        match self {
            Self::Char(ev) => Some(ev.ch),
            Self::Key(_) => None,
        }
    }

    /// Encode this event as a stable JSON string.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&CanonicalEventJson::from(self))
    }

    /// Decode a previously encoded event.
    ///
    /// Errors occur if the JSON does not match the schema, including a `char`
    /// field that is not exactly one character.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let json: CanonicalEventJson = serde_json::from_str(s)?;
        Self::try_from(json).map_err(serde::de::Error::custom)
    }
}

impl From<KeyEvent> for CanonicalEvent {
    fn from(value: KeyEvent) -> Self {
        Self::Key(value)
    }
}

impl From<CharEvent> for CanonicalEvent {
    fn from(value: CharEvent) -> Self {
        Self::Char(value)
    }
}

/// Wire form of [`CanonicalEvent`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalEventJson {
    Key {
        ts: u32,
        vk: u16,
        location: KeyLocation,
        mods: u8,
        direction: KeyDirection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_char: Option<String>,
    },
    Char {
        ts: u32,
        #[serde(rename = "char")]
        ch: String,
        mods: u8,
    },
}

impl From<&CanonicalEvent> for CanonicalEventJson {
    fn from(value: &CanonicalEvent) -> Self {
        match value {
            CanonicalEvent::Key(key) => Self::Key {
                ts: key.timestamp,
                vk: key.vk.0,
                location: key.location,
                mods: key.mods.bits(),
                direction: key.direction,
                key_char: key.key_char.map(String::from),
            },
            CanonicalEvent::Char(ch) => Self::Char {
                ts: ch.timestamp,
                ch: ch.ch.to_string(),
                mods: ch.mods.bits(),
            },
        }
    }
}

impl TryFrom<CanonicalEventJson> for CanonicalEvent {
    type Error = String;

    fn try_from(value: CanonicalEventJson) -> Result<Self, Self::Error> {
        Ok(match value {
            CanonicalEventJson::Key {
                ts,
                vk,
                location,
                mods,
                direction,
                key_char,
            } => Self::Key(KeyEvent {
                timestamp: ts,
                vk: VirtualKey(vk),
                location,
                mods: Modifiers::from_bits_truncate(mods),
                direction,
                key_char: key_char.as_deref().map(single_char).transpose()?,
            }),
            CanonicalEventJson::Char { ts, ch, mods } => Self::Char(CharEvent {
                timestamp: ts,
                ch: single_char(&ch)?,
                mods: Modifiers::from_bits_truncate(mods),
            }),
        })
    }
}

fn single_char(s: &str) -> Result<char, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected exactly one character, got {s:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift_down() -> CanonicalEvent {
        CanonicalEvent::Key(KeyEvent {
            timestamp: 12,
            vk: VirtualKey::SHIFT,
            location: KeyLocation::Left,
            mods: Modifiers::SHIFT,
            direction: KeyDirection::Down,
            key_char: None,
        })
    }

    #[test]
    fn key_event_json_shape_is_stable() {
        let json = shift_down().to_json_string().expect("serialize");
        assert_eq!(
            json,
            r#"{"kind":"key","ts":12,"vk":16,"location":"left","mods":1,"direction":"down"}"#
        );
    }

    #[test]
    fn char_event_json_carries_the_character() {
        let ev = CanonicalEvent::Char(CharEvent {
            timestamp: 3,
            ch: '中',
            mods: Modifiers::empty(),
        });
        let json = ev.to_json_string().expect("serialize");
        assert_eq!(json, r#"{"kind":"char","ts":3,"char":"中","mods":0}"#);
        assert_eq!(CanonicalEvent::from_json_str(&json).expect("decode"), ev);
    }

    #[test]
    fn decode_rejects_multi_character_payloads() {
        let err = CanonicalEvent::from_json_str(r#"{"kind":"char","ts":0,"char":"ab","mods":0}"#);
        assert!(err.is_err());
        let err = CanonicalEvent::from_json_str(r#"{"kind":"char","ts":0,"char":"","mods":0}"#);
        assert!(err.is_err());
    }

    #[test]
    fn decode_truncates_unknown_modifier_bits() {
        let ev = CanonicalEvent::from_json_str(r#"{"kind":"char","ts":3,"char":"A","mods":241}"#)
            .expect("decode");
        assert_eq!(
            ev,
            CanonicalEvent::Char(CharEvent {
                timestamp: 3,
                ch: 'A',
                mods: Modifiers::SHIFT,
            })
        );
    }

    #[test]
    fn accessors() {
        assert_eq!(shift_down().timestamp(), 12);
        assert_eq!(shift_down().as_char(), None);
    }
}
