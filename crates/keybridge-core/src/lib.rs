#![forbid(unsafe_code)]

//! Browser keyboard and IME reconciliation core.
//!
//! Browsers disagree on the order (and presence) of `keydown`, `keyup`,
//! `composition*` and `input` events while a user types through an input
//! method. [`CompositionMachine`] consumes those raw notifications in
//! delivery order and produces one engine-independent stream of
//! [`CanonicalEvent`]s: genuine key transitions plus one character event per
//! committed character.
//!
//! ```
//! use keybridge_core::{CanonicalEvent, CompositionMachine, KeyTransition, NullSurface, RawNotification};
//!
//! let mut events: Vec<CanonicalEvent> = Vec::new();
//! let mut machine = CompositionMachine::new(NullSurface, &mut events);
//! machine.handle(KeyTransition::down("n", "KeyN", 229).into()).unwrap();
//! machine.handle(RawNotification::composition_start()).unwrap();
//! machine.handle(RawNotification::composition_end("中文")).unwrap();
//! machine.handle(KeyTransition::up("n", "KeyN", 78).into()).unwrap();
//! drop(machine);
//!
//! let text: String = events.iter().filter_map(CanonicalEvent::as_char).collect();
//! assert_eq!(text, "中文");
//! ```

pub mod canonical;
pub mod clock;
pub mod config;
pub mod error;
pub mod input;
pub mod keymap;
pub mod machine;
pub mod replay;
pub mod sink;

pub use canonical::{CanonicalEvent, CanonicalEventJson, CharEvent, KeyEvent};
pub use clock::{ManualClock, MonotonicClock, TimestampSource};
pub use config::{CharModifierPolicy, IME_PROCESSING_KEY, IME_SENTINEL_KEY_CODE, ImeConfig};
pub use error::{ConfigError, ImeError};
pub use input::{
    CompositionNotification, CompositionPhase, DomEvent, KeyDirection, KeyTransition, Modifiers,
    NotificationKind, RawNotification,
};
pub use keymap::{DomKeyResolver, KeyLocation, KeyResolver, VirtualKey};
pub use machine::{CompositionMachine, MachineBuilder, SessionState};
pub use sink::{EventSink, FnSink, FnSurface, Journal, JournalEntry, NullSurface, ScratchSurface};
