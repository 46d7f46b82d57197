#![no_main]

use keybridge_core::ImeConfig;
use keybridge_core::replay::replay_jsonl;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Malformed records and protocol violations are errors, never panics.
    let _ = replay_jsonl(text, ImeConfig::default());
});
