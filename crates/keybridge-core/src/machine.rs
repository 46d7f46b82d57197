#![forbid(unsafe_code)]

//! The composition state machine.
//!
//! Consumes raw notifications in delivery order and emits canonical events.
//! The machine is single-threaded and synchronous: each call to
//! [`CompositionMachine::handle`] updates the session state, touches the
//! scratch surface and emits zero or more events before returning.
//!
//! # Key suppression
//!
//! While an IME is busy, browsers report key-downs with `keyCode == 229` and
//! the matching key-up with the real code. The pair is dropped as a unit: the
//! sentinel key-down arms `suppress_next_key_up`, and the next
//! non-placeholder key-up disarms it and is dropped too. Placeholder keys
//! (`key == "Process"`) carry no identity and are always dropped.
//!
//! # Composition
//!
//! `compositionstart` enters `Composing`; `compositionend` returns to `Idle`,
//! sweeps the scratch surface and emits one Character Event per committed
//! character. `compositionupdate` is cosmetic and ignored. `input` sweeps the
//! surface only outside a composition.

use tracing::{debug, trace, warn};

use crate::canonical::{CanonicalEvent, CharEvent, KeyEvent};
use crate::clock::{MonotonicClock, TimestampSource, relative_ms};
use crate::config::ImeConfig;
use crate::error::{ImeError, Result};
use crate::input::{
    CompositionNotification, CompositionPhase, DomEvent, KeyDirection, KeyTransition, Modifiers,
    RawNotification,
};
use crate::keymap::{DomKeyResolver, KeyResolver};
use crate::sink::{EventSink, ScratchSurface};

/// Per-focus session state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    /// Strictly between a composition start and its end.
    pub composing: bool,
    /// A sentinel key-down is waiting for its key-up.
    pub suppress_next_key_up: bool,
}

pub struct CompositionMachine<S, K, C = MonotonicClock, R = DomKeyResolver> {
    config: ImeConfig,
    state: SessionState,
    reference_ms: f64,
    clock: C,
    resolver: R,
    surface: S,
    sink: K,
    disposed: bool,
}

impl<S, K> CompositionMachine<S, K>
where
    S: ScratchSurface,
    K: EventSink,
{
    /// Machine with the default configuration, wall clock and DOM resolver.
    #[must_use]
    pub fn new(surface: S, sink: K) -> Self {
        Self::builder(surface, sink).build()
    }

    #[must_use]
    pub fn builder(surface: S, sink: K) -> MachineBuilder<S, K> {
        MachineBuilder {
            config: ImeConfig::default(),
            clock: MonotonicClock::new(),
            resolver: DomKeyResolver,
            surface,
            sink,
        }
    }
}

impl<S, K, C, R> CompositionMachine<S, K, C, R>
where
    S: ScratchSurface,
    K: EventSink,
    C: TimestampSource,
    R: KeyResolver,
{
    /// Process one classified notification.
    ///
    /// After [`dispose`](Self::dispose) every notification is ignored.
    pub fn handle(&mut self, notification: RawNotification) -> Result<()> {
        if self.disposed {
            trace!(kind = ?notification.kind(), "notification after dispose ignored");
            return Ok(());
        }
        match notification {
            RawNotification::Key(key) => {
                self.handle_key(&key);
                Ok(())
            }
            RawNotification::Composition(comp) => self.handle_composition(comp),
            RawNotification::TextMutation => {
                self.handle_text_mutation();
                Ok(())
            }
        }
    }

    /// Classify a DOM event record and process it.
    pub fn handle_dom(&mut self, event: &DomEvent) -> Result<()> {
        if self.disposed {
            trace!(event_type = %event.event_type, "notification after dispose ignored");
            return Ok(());
        }
        let notification = RawNotification::try_from(event).inspect_err(|err| {
            warn!(error = %err, "unclassifiable notification");
        })?;
        self.handle(notification)
    }

    fn handle_key(&mut self, key: &KeyTransition) {
        trace!(
            direction = ?key.direction,
            key = %key.key,
            code = %key.code,
            key_code = key.key_code,
            event_ts = key.timestamp_ms,
            "key transition"
        );

        match key.direction {
            KeyDirection::Down if key.key_code == self.config.sentinel_key_code => {
                self.state.suppress_next_key_up = true;
                trace!(code = %key.code, "sentinel key-down suppressed");
                return;
            }
            // A placeholder key-up must not consume the armed flag.
            KeyDirection::Up
                if self.state.suppress_next_key_up && key.key != self.config.processing_key =>
            {
                self.state.suppress_next_key_up = false;
                trace!(code = %key.code, "paired key-up suppressed");
                return;
            }
            _ => {}
        }

        if key.key == self.config.processing_key {
            trace!(code = %key.code, "placeholder key dropped");
            return;
        }

        let (vk, location) = self.resolver.resolve(&key.code, key.location);
        let key_char = single_char(&key.key);
        let timestamp = self.relative_now();
        self.sink.accept(CanonicalEvent::Key(KeyEvent {
            timestamp,
            vk,
            location,
            mods: key.mods,
            direction: key.direction,
            key_char,
        }));

        if self.config.synthesize_key_press
            && !self.state.composing
            && key.direction == KeyDirection::Down
            && !key.mods.intersects(Modifiers::CTRL | Modifiers::META)
            && let Some(ch) = key_char.filter(|c| !c.is_control())
        {
            self.sink.accept(CanonicalEvent::Char(CharEvent {
                timestamp,
                ch,
                mods: key.mods,
            }));
        }
    }

    fn handle_composition(&mut self, comp: CompositionNotification) -> Result<()> {
        match comp.phase {
            CompositionPhase::Start => {
                if self.state.composing {
                    warn!("composition start while composing");
                    return Err(ImeError::NestedCompositionStart);
                }
                self.state.composing = true;
                debug!("composition started");
            }
            CompositionPhase::Update => {
                trace!(data = ?comp.data, "composition update ignored");
            }
            CompositionPhase::End => {
                if !self.state.composing {
                    warn!("composition end without start");
                    return Err(ImeError::CompositionEndWithoutStart);
                }
                self.state.composing = false;
                self.surface.clear();

                let text = comp.data.unwrap_or_default();
                let timestamp = self.relative_now();
                let policy = self.config.char_modifiers;
                for ch in text.chars() {
                    self.sink.accept(CanonicalEvent::Char(CharEvent {
                        timestamp,
                        ch,
                        mods: policy.modifiers_for(ch),
                    }));
                }
                debug!(chars = text.chars().count(), "composition committed");
            }
        }
        Ok(())
    }

    fn handle_text_mutation(&mut self) {
        if self.state.composing {
            trace!("text mutation during composition");
        } else {
            self.surface.clear();
            trace!("scratch surface swept");
        }
    }

    fn relative_now(&self) -> u32 {
        relative_ms(self.clock.now_ms(), self.reference_ms)
    }

    /// Start a fresh session: idle state, empty surface, new reference instant.
    pub fn reset(&mut self) {
        if self.disposed {
            return;
        }
        self.state = SessionState::default();
        self.surface.clear();
        self.reference_ms = self.clock.now_ms();
        debug!("session reset");
    }

    /// Detach from the notification source. Later notifications are ignored.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            debug!("session disposed");
        }
    }
}

impl<S, K, C, R> CompositionMachine<S, K, C, R> {
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn is_composing(&self) -> bool {
        self.state.composing
    }

    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub const fn config(&self) -> &ImeConfig {
        &self.config
    }

    #[must_use]
    pub const fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_parts(self) -> (S, K) {
        (self.surface, self.sink)
    }
}

/// Builder for [`CompositionMachine`] with non-default collaborators.
pub struct MachineBuilder<S, K, C = MonotonicClock, R = DomKeyResolver> {
    config: ImeConfig,
    clock: C,
    resolver: R,
    surface: S,
    sink: K,
}

impl<S, K, C, R> MachineBuilder<S, K, C, R>
where
    C: TimestampSource,
{
    #[must_use]
    pub fn config(mut self, config: ImeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn clock<C2: TimestampSource>(self, clock: C2) -> MachineBuilder<S, K, C2, R> {
        MachineBuilder {
            config: self.config,
            clock,
            resolver: self.resolver,
            surface: self.surface,
            sink: self.sink,
        }
    }

    #[must_use]
    pub fn resolver<R2: KeyResolver>(self, resolver: R2) -> MachineBuilder<S, K, C, R2> {
        MachineBuilder {
            config: self.config,
            clock: self.clock,
            resolver,
            surface: self.surface,
            sink: self.sink,
        }
    }

    /// Open the session; the reference instant is read from the clock now.
    #[must_use]
    pub fn build(self) -> CompositionMachine<S, K, C, R> {
        let reference_ms = self.clock.now_ms();
        CompositionMachine {
            config: self.config,
            state: SessionState::default(),
            reference_ms,
            clock: self.clock,
            resolver: self.resolver,
            surface: self.surface,
            sink: self.sink,
            disposed: false,
        }
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CharModifierPolicy;
    use crate::keymap::{KeyLocation, VirtualKey};
    use crate::sink::{Journal, JournalEntry, NullSurface};
    use pretty_assertions::assert_eq;

    type TestMachine = CompositionMachine<Journal, Journal, ManualClock>;

    fn machine() -> (TestMachine, Journal, ManualClock) {
        machine_with(ImeConfig::default())
    }

    fn machine_with(config: ImeConfig) -> (TestMachine, Journal, ManualClock) {
        let journal = Journal::new();
        let clock = ManualClock::starting_at(1000.0);
        let machine = CompositionMachine::builder(journal.clone(), journal.clone())
            .config(config)
            .clock(clock.clone())
            .build();
        (machine, journal, clock)
    }

    fn key(direction: KeyDirection, vk: VirtualKey, ts: u32, key_char: Option<char>) -> JournalEntry {
        JournalEntry::Emit(CanonicalEvent::Key(KeyEvent {
            timestamp: ts,
            vk,
            location: KeyLocation::Standard,
            mods: Modifiers::empty(),
            direction,
            key_char,
        }))
    }

    fn ch(c: char, ts: u32) -> JournalEntry {
        JournalEntry::Emit(CanonicalEvent::Char(CharEvent {
            timestamp: ts,
            ch: c,
            mods: Modifiers::empty(),
        }))
    }

    #[test]
    fn plain_typing_sweeps_between_down_and_up() {
        let (mut m, journal, clock) = machine();
        m.handle(KeyTransition::down("a", "KeyA", 65).into()).unwrap();
        clock.advance(14.0);
        m.handle(RawNotification::TextMutation).unwrap();
        clock.advance(100.0);
        m.handle(KeyTransition::up("a", "KeyA", 65).into()).unwrap();

        assert_eq!(
            journal.entries(),
            vec![
                key(KeyDirection::Down, VirtualKey::A, 0, Some('a')),
                JournalEntry::Clear,
                key(KeyDirection::Up, VirtualKey::A, 114, Some('a')),
            ]
        );
    }

    #[test]
    fn sentinel_pair_is_suppressed() {
        let (mut m, journal, _) = machine();
        m.handle(KeyTransition::down("z", "KeyZ", 229).into()).unwrap();
        assert!(m.state().suppress_next_key_up);
        m.handle(KeyTransition::up("z", "KeyZ", 90).into()).unwrap();
        assert!(!m.state().suppress_next_key_up);
        assert!(journal.is_empty());
    }

    #[test]
    fn composition_commits_characters_in_order() {
        let (mut m, journal, clock) = machine();
        m.handle(KeyTransition::down("n", "KeyN", 229).into()).unwrap();
        m.handle(RawNotification::composition_start()).unwrap();
        m.handle(RawNotification::composition_update("zhong wen")).unwrap();
        m.handle(RawNotification::TextMutation).unwrap();
        clock.advance(42.0);
        m.handle(RawNotification::composition_end("中文")).unwrap();
        m.handle(KeyTransition::up(" ", "Space", 32).into()).unwrap();

        assert_eq!(
            journal.entries(),
            vec![JournalEntry::Clear, ch('中', 42), ch('文', 42)]
        );
        assert_eq!(m.state(), SessionState::default());
    }

    #[test]
    fn processing_placeholder_is_dropped_in_any_state() {
        let (mut m, journal, _) = machine();
        m.handle(KeyTransition::down("Process", "KeyA", 65).into()).unwrap();
        m.handle(RawNotification::composition_start()).unwrap();
        m.handle(KeyTransition::down("Process", "KeyB", 66).into()).unwrap();
        m.handle(KeyTransition::up("Process", "KeyB", 66).into()).unwrap();
        assert!(journal.is_empty());
        assert!(!m.state().suppress_next_key_up);
    }

    #[test]
    fn placeholder_sentinel_down_still_pairs_with_its_up() {
        let (mut m, journal, _) = machine();
        m.handle(KeyTransition::down("Process", "KeyA", 229).into()).unwrap();
        m.handle(KeyTransition::up("a", "KeyA", 65).into()).unwrap();
        assert!(journal.is_empty());
    }

    #[test]
    fn placeholder_key_up_leaves_the_pairing_armed() {
        let (mut m, journal, _) = machine();
        m.handle(KeyTransition::down("a", "KeyA", 229).into()).unwrap();
        m.handle(KeyTransition::up("Process", "KeyA", 229).into()).unwrap();
        assert!(m.state().suppress_next_key_up);
        m.handle(KeyTransition::up("a", "KeyA", 65).into()).unwrap();
        assert!(!m.state().suppress_next_key_up);
        assert!(journal.is_empty());
    }

    #[test]
    fn modifier_keys_survive_around_dead_key_composition() {
        let (mut m, journal, _) = machine();
        let shift = |t: KeyTransition| t.with_location(1).with_mods(Modifiers::SHIFT);
        m.handle(shift(KeyTransition::down("Shift", "ShiftLeft", 16)).into()).unwrap();
        m.handle(KeyTransition::down("Dead", "Quote", 229).into()).unwrap();
        m.handle(RawNotification::composition_start()).unwrap();
        m.handle(RawNotification::composition_update("^")).unwrap();
        m.handle(RawNotification::TextMutation).unwrap();
        m.handle(KeyTransition::up("Dead", "Quote", 222).into()).unwrap();
        m.handle(KeyTransition::up("Shift", "ShiftLeft", 16).with_location(1).into()).unwrap();
        m.handle(KeyTransition::down("û", "KeyU", 229).into()).unwrap();
        m.handle(RawNotification::composition_end("û")).unwrap();
        m.handle(KeyTransition::up("u", "KeyU", 85).into()).unwrap();

        let events = journal.events();
        assert_eq!(events.len(), 3);
        let CanonicalEvent::Key(down) = events[0] else {
            panic!("expected shift down first");
        };
        assert_eq!(down.vk, VirtualKey::SHIFT);
        assert_eq!(down.location, KeyLocation::Left);
        assert_eq!(down.mods, Modifiers::SHIFT);
        assert_eq!(down.direction, KeyDirection::Down);
        assert_eq!(down.key_char, None);
        let CanonicalEvent::Key(up) = events[1] else {
            panic!("expected shift up second");
        };
        assert_eq!((up.vk, up.direction), (VirtualKey::SHIFT, KeyDirection::Up));
        assert_eq!(events[2].as_char(), Some('û'));
    }

    #[test]
    fn mutation_during_composition_is_inert() {
        let (mut m, journal, _) = machine();
        m.handle(RawNotification::composition_start()).unwrap();
        m.handle(RawNotification::TextMutation).unwrap();
        m.handle(RawNotification::TextMutation).unwrap();
        assert!(journal.is_empty());
        assert!(m.is_composing());
    }

    #[test]
    fn update_is_a_no_op_even_when_idle() {
        let (mut m, journal, _) = machine();
        m.handle(RawNotification::composition_update("x")).unwrap();
        assert_eq!(m.state(), SessionState::default());
        assert!(journal.is_empty());
    }

    #[test]
    fn end_without_start_is_a_protocol_violation() {
        let (mut m, journal, _) = machine();
        assert_eq!(
            m.handle(RawNotification::composition_end("x")),
            Err(ImeError::CompositionEndWithoutStart)
        );
        assert!(journal.is_empty());
    }

    #[test]
    fn nested_start_is_a_protocol_violation() {
        let (mut m, _, _) = machine();
        m.handle(RawNotification::composition_start()).unwrap();
        assert_eq!(
            m.handle(RawNotification::composition_start()),
            Err(ImeError::NestedCompositionStart)
        );
        assert!(m.is_composing());
    }

    #[test]
    fn unknown_dom_type_is_fatal() {
        let (mut m, journal, _) = machine();
        let err = m.handle_dom(&DomEvent::new("beforeinput")).unwrap_err();
        assert_eq!(err, ImeError::unknown_notification("beforeinput"));
        assert!(journal.is_empty());
    }

    #[test]
    fn disposed_machine_ignores_everything() {
        let (mut m, journal, _) = machine();
        m.dispose();
        m.handle(KeyTransition::down("a", "KeyA", 65).into()).unwrap();
        m.handle(RawNotification::TextMutation).unwrap();
        m.handle(RawNotification::composition_end("x")).unwrap();
        m.handle_dom(&DomEvent::new("bogus")).unwrap();
        m.reset();
        assert!(journal.is_empty());
        assert!(m.is_disposed());
    }

    #[test]
    fn reset_reanchors_the_reference_instant() {
        let (mut m, journal, clock) = machine();
        m.handle(RawNotification::composition_start()).unwrap();
        clock.advance(500.0);
        m.reset();
        assert_eq!(m.state(), SessionState::default());
        clock.advance(7.0);
        m.handle(KeyTransition::down("a", "KeyA", 65).into()).unwrap();
        assert_eq!(
            journal.entries(),
            vec![
                JournalEntry::Clear,
                key(KeyDirection::Down, VirtualKey::A, 7, Some('a')),
            ]
        );
    }

    #[test]
    fn case_derived_modifiers_on_committed_text() {
        let (mut m, journal, _) = machine();
        m.handle(RawNotification::composition_start()).unwrap();
        m.handle(RawNotification::composition_end("Éa")).unwrap();
        let mods: Vec<_> = journal
            .events()
            .into_iter()
            .map(|ev| match ev {
                CanonicalEvent::Char(c) => c.mods,
                CanonicalEvent::Key(_) => panic!("unexpected key event"),
            })
            .collect();
        assert_eq!(mods, vec![Modifiers::SHIFT, Modifiers::empty()]);
    }

    #[test]
    fn none_policy_strips_modifiers() {
        let (mut m, journal, _) = machine_with(ImeConfig {
            char_modifiers: CharModifierPolicy::None,
            ..ImeConfig::default()
        });
        m.handle(RawNotification::composition_start()).unwrap();
        m.handle(RawNotification::composition_end("Q")).unwrap();
        assert_eq!(journal.events().len(), 1);
        assert_eq!(journal.entries()[1], ch('Q', 0));
    }

    #[test]
    fn synthesized_key_press_follows_printable_downs() {
        let (mut m, journal, _) = machine_with(ImeConfig {
            synthesize_key_press: true,
            ..ImeConfig::default()
        });
        m.handle(KeyTransition::down("a", "KeyA", 65).into()).unwrap();
        m.handle(KeyTransition::down("Enter", "Enter", 13).into()).unwrap();
        m.handle(
            KeyTransition::down("c", "KeyC", 67)
                .with_mods(Modifiers::CTRL)
                .into(),
        )
        .unwrap();
        m.handle(KeyTransition::up("a", "KeyA", 65).into()).unwrap();

        let chars: Vec<_> = journal.events().iter().filter_map(CanonicalEvent::as_char).collect();
        assert_eq!(chars, vec!['a']);
        assert_eq!(journal.events().len(), 5);
        assert_eq!(journal.entries()[1], ch('a', 0));
    }

    #[test]
    fn synthesized_key_press_is_withheld_while_composing() {
        let (mut m, journal, _) = machine_with(ImeConfig {
            synthesize_key_press: true,
            ..ImeConfig::default()
        });
        m.handle(RawNotification::composition_start()).unwrap();
        m.handle(KeyTransition::down("a", "KeyA", 65).into()).unwrap();
        assert_eq!(journal.events().len(), 1);
        assert_eq!(journal.events()[0].as_char(), None);
    }

    #[test]
    fn custom_resolver_and_sentinel() {
        let journal = Journal::new();
        let mut m = CompositionMachine::builder(NullSurface, journal.clone())
            .config(ImeConfig {
                sentinel_key_code: 197,
                ..ImeConfig::default()
            })
            .clock(ManualClock::default())
            .resolver(|_: &str, _: u32| (VirtualKey::ESCAPE, KeyLocation::Right))
            .build();
        m.handle(KeyTransition::down("x", "KeyX", 229).into()).unwrap();
        m.handle(KeyTransition::down("y", "KeyY", 197).into()).unwrap();
        m.handle(KeyTransition::up("y", "KeyY", 89).into()).unwrap();
        let events = journal.events();
        assert_eq!(events.len(), 1);
        let CanonicalEvent::Key(ev) = events[0] else {
            panic!("expected key event");
        };
        assert_eq!((ev.vk, ev.location), (VirtualKey::ESCAPE, KeyLocation::Right));
    }
}
