#![forbid(unsafe_code)]

//! Replay of recorded DOM captures.
//!
//! A capture is JSONL: one [`DomEvent`] per line, in delivery order. Blank
//! lines and lines starting with `#` are skipped so captures can carry notes.
//! Replay feeds each record through a fresh machine driven by a
//! [`ManualClock`] that follows the recorded `timeStamp`s, so the output is
//! deterministic for a given capture.

use tracing::debug;

use crate::clock::{ManualClock, TimestampSource};
use crate::config::ImeConfig;
use crate::error::ImeError;
use crate::input::DomEvent;
use crate::machine::CompositionMachine;
use crate::sink::{Journal, JournalEntry};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("line {line}: malformed capture record: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {record}: {source}")]
    Protocol {
        record: usize,
        #[source]
        source: ImeError,
    },
}

/// Parse a JSONL capture into DOM records.
pub fn parse_capture(input: &str) -> Result<Vec<DomEvent>, ReplayError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(idx, line)| {
            DomEvent::from_json_str(line.trim()).map_err(|source| ReplayError::Parse {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// Outcome of replaying a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Clears and emitted events, interleaved in the order they happened.
    pub entries: Vec<JournalEntry>,
    pub records: usize,
}

/// Replay `records` through a fresh session.
///
/// The session's reference instant is the first record's `timeStamp`. The
/// first protocol violation aborts the replay.
pub fn replay(records: &[DomEvent], config: ImeConfig) -> Result<ReplayOutcome, ReplayError> {
    let journal = Journal::new();
    let clock = ManualClock::starting_at(records.first().map_or(0.0, |r| r.time_stamp));
    let mut machine = CompositionMachine::builder(journal.clone(), journal.clone())
        .config(config)
        .clock(clock.clone())
        .build();

    for (idx, record) in records.iter().enumerate() {
        // Browsers stamp some events earlier than ones delivered before them.
        if record.time_stamp > clock.now_ms() {
            clock.set(record.time_stamp);
        }
        machine
            .handle_dom(record)
            .map_err(|source| ReplayError::Protocol {
                record: idx + 1,
                source,
            })?;
    }

    debug!(records = records.len(), entries = journal.len(), "capture replayed");
    Ok(ReplayOutcome {
        entries: journal.take(),
        records: records.len(),
    })
}

/// Parse and replay a JSONL capture.
pub fn replay_jsonl(input: &str, config: ImeConfig) -> Result<ReplayOutcome, ReplayError> {
    let records = parse_capture(input)?;
    replay(&records, config)
}
