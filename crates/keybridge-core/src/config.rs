#![forbid(unsafe_code)]

//! Session configuration.
//!
//! ```json
//! { "sentinel_key_code": 229, "processing_key": "Process",
//!   "char_modifiers": "case-derived", "synthesize_key_press": false }
//! ```
//!
//! Every field has a default, so `{}` is a valid configuration and
//! `ImeConfig::default()` matches the behavior browsers document for IME
//! key events.

#[cfg(feature = "toml-config")]
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::input::Modifiers;

/// `keyCode` browsers report while an IME is processing a key.
pub const IME_SENTINEL_KEY_CODE: u32 = 229;

/// DOM `key` value browsers report while an IME is processing a key.
pub const IME_PROCESSING_KEY: &str = "Process";

/// How Character Events get their modifier set.
///
/// Browsers do not report the modifiers that were held while a composition
/// was built, so any choice here is an approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CharModifierPolicy {
    /// Uppercase characters carry SHIFT, everything else is empty.
    #[default]
    CaseDerived,
    /// Always empty.
    None,
}

impl CharModifierPolicy {
    #[must_use]
    pub fn modifiers_for(self, ch: char) -> Modifiers {
        match self {
            Self::CaseDerived if ch.is_uppercase() => Modifiers::SHIFT,
            Self::CaseDerived | Self::None => Modifiers::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImeConfig {
    /// Key-down `keyCode` that marks an IME-processed key.
    pub sentinel_key_code: u32,
    /// Logical key that marks an IME placeholder key transition.
    pub processing_key: String,
    pub char_modifiers: CharModifierPolicy,
    /// Emit a Character Event after each printable, non-IME key-down.
    pub synthesize_key_press: bool,
}

impl Default for ImeConfig {
    fn default() -> Self {
        Self {
            sentinel_key_code: IME_SENTINEL_KEY_CODE,
            processing_key: IME_PROCESSING_KEY.to_string(),
            char_modifiers: CharModifierPolicy::default(),
            synthesize_key_press: false,
        }
    }
}

impl ImeConfig {
    /// Load from a JSON string and validate.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Load from a TOML string and validate.
    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "toml-config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Returns a list of problems; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.processing_key.is_empty() {
            errors.push("processing_key must not be empty".into());
        }
        if self.processing_key.chars().count() == 1 {
            errors.push(format!(
                "processing_key must not be a printable character, got {:?}",
                self.processing_key
            ));
        }
        errors
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}
