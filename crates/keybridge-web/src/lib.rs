#![forbid(unsafe_code)]

//! Browser host for the keybridge composition machine.
//!
//! The host owns an invisible, always-focused `<textarea>` that receives the
//! platform IME, forwards its `keydown`, `keyup`, `composition*` and `input`
//! events to a [`keybridge_core::CompositionMachine`], and queues the
//! resulting canonical events as JSON strings for the embedding page to
//! drain.
//!
//! Everything except the DOM glue in `wasm` builds and tests natively.

pub mod host;
pub mod queue;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::ImeInput;

pub use host::HostSession;
pub use queue::{EncodedEventQueue, MAX_ENCODED_EVENTS};

/// DOM event types the host listens for on its textarea.
pub const LISTENED_EVENT_TYPES: &[&str] = &[
    "keydown",
    "keyup",
    "compositionstart",
    "compositionupdate",
    "compositionend",
    "input",
];

/// Public JS methods on `ImeInput`.
pub const KEYBRIDGE_JS_PUBLIC_METHODS: &[&str] = &[
    "handleEvent",
    "drainEvents",
    "takeFault",
    "droppedEvents",
    "isComposing",
    "focus",
    "reset",
    "dispose",
];
