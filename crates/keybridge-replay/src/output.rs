use std::io::Write;

use clap::ValueEnum;
use keybridge_core::replay::ReplayOutcome;
use keybridge_core::{CanonicalEvent, JournalEntry};
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One canonical event per line, in the tagged wire encoding.
    #[default]
    Jsonl,
    /// Like `jsonl`, with `{"kind":"clear"}` lines where the textarea was swept.
    Journal,
    /// A single JSON object with counts and the committed text.
    Summary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub records: usize,
    pub key_down: usize,
    pub key_up: usize,
    pub chars: usize,
    pub clears: usize,
    /// Every Character Event, concatenated.
    pub text: String,
}

impl ReplaySummary {
    #[must_use]
    pub fn from_outcome(outcome: &ReplayOutcome) -> Self {
        let mut summary = Self {
            records: outcome.records,
            ..Self::default()
        };
        for entry in &outcome.entries {
            match entry {
                JournalEntry::Clear => summary.clears += 1,
                JournalEntry::Emit(CanonicalEvent::Char(c)) => {
                    summary.chars += 1;
                    summary.text.push(c.ch);
                }
                JournalEntry::Emit(CanonicalEvent::Key(k)) => match k.direction {
                    keybridge_core::KeyDirection::Down => summary.key_down += 1,
                    keybridge_core::KeyDirection::Up => summary.key_up += 1,
                },
            }
        }
        summary
    }
}

const CLEAR_LINE: &str = r#"{"kind":"clear"}"#;

pub fn write_outcome(out: &mut impl Write, outcome: &ReplayOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Jsonl | OutputFormat::Journal => {
            for entry in &outcome.entries {
                match entry {
                    JournalEntry::Emit(event) => writeln!(out, "{}", event.to_json_string()?)?,
                    JournalEntry::Clear if format == OutputFormat::Journal => {
                        writeln!(out, "{CLEAR_LINE}")?;
                    }
                    JournalEntry::Clear => {}
                }
            }
        }
        OutputFormat::Summary => {
            let summary = ReplaySummary::from_outcome(outcome);
            writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        }
    }
    Ok(())
}
