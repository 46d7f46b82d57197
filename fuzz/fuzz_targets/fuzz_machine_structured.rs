#![no_main]

use arbitrary::Arbitrary;
use keybridge_core::{
    CanonicalEvent, CompositionMachine, ImeConfig, Journal, JournalEntry, KeyTransition,
    ManualClock, RawNotification,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Down { key: String, code: String, key_code: u32, location: u8 },
    Up { key: String, code: String, key_code: u32, location: u8 },
    Start,
    Update(String),
    End(String),
    Mutation,
    Advance(u16),
    Reset,
}

#[derive(Debug, Arbitrary)]
struct Input {
    synthesize_key_press: bool,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let journal = Journal::new();
    let clock = ManualClock::default();
    let mut machine = CompositionMachine::builder(journal.clone(), journal.clone())
        .config(ImeConfig {
            synthesize_key_press: input.synthesize_key_press,
            ..ImeConfig::default()
        })
        .clock(clock.clone())
        .build();

    for op in input.ops {
        let composing = machine.is_composing();
        let mark = journal.len();
        let result = match op {
            Op::Down { key, code, key_code, location } => machine.handle(
                KeyTransition::down(key, code, key_code)
                    .with_location(u32::from(location))
                    .into(),
            ),
            Op::Up { key, code, key_code, location } => machine.handle(
                KeyTransition::up(key, code, key_code)
                    .with_location(u32::from(location))
                    .into(),
            ),
            Op::Start => machine.handle(RawNotification::composition_start()),
            Op::Update(data) => machine.handle(RawNotification::composition_update(data)),
            Op::End(text) => machine.handle(RawNotification::composition_end(text)),
            Op::Mutation => machine.handle(RawNotification::TextMutation),
            Op::Advance(ms) => {
                clock.advance(f64::from(ms));
                Ok(())
            }
            Op::Reset => {
                machine.reset();
                Ok(())
            }
        };
        if result.is_err() {
            // A rejected notification leaves no output behind.
            assert_eq!(journal.len(), mark);
            continue;
        }
        let delta = journal.entries().split_off(mark);
        if composing && machine.is_composing() {
            assert!(
                !delta
                    .iter()
                    .any(|e| matches!(e, JournalEntry::Emit(CanonicalEvent::Char(_)))),
                "character emitted mid-composition"
            );
        }
    }
});
