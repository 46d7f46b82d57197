#![forbid(unsafe_code)]

//! Error types for the reconciliation core.
//!
//! Every [`ImeError`] is a protocol violation: the platform delivered a
//! notification outside the event model the machine understands. None of them
//! are recoverable inside the session; the owning component decides whether to
//! [`reset`](crate::CompositionMachine::reset) or recreate it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImeError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImeError {
    #[error("unknown notification type: {event_type}")]
    UnknownNotification { event_type: String },

    #[error("composition start while a composition is already active")]
    NestedCompositionStart,

    #[error("composition end without a matching start")]
    CompositionEndWithoutStart,
}

impl ImeError {
    #[must_use]
    pub fn unknown_notification(event_type: impl Into<String>) -> Self {
        Self::UnknownNotification {
            event_type: event_type.into(),
        }
    }

    /// Short stable label for logs and host-facing fault records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownNotification { .. } => "unknown_notification",
            Self::NestedCompositionStart => "nested_composition_start",
            Self::CompositionEndWithoutStart => "composition_end_without_start",
        }
    }
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "toml-config")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_notification_names_the_type() {
        let error = ImeError::unknown_notification("paste");
        assert_eq!(error.to_string(), "unknown notification type: paste");
        assert_eq!(error.kind(), "unknown_notification");
    }

    #[test]
    fn protocol_violation_kinds_are_stable() {
        assert_eq!(
            ImeError::NestedCompositionStart.kind(),
            "nested_composition_start"
        );
        assert_eq!(
            ImeError::CompositionEndWithoutStart.kind(),
            "composition_end_without_start"
        );
    }

    #[test]
    fn validation_errors_are_joined() {
        let error = ConfigError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(error.to_string(), "validation errors: a; b");
    }
}
