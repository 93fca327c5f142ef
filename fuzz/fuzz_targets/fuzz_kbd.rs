#![no_main]

use keyseq_core::kbd::{describe_keys, parse_keys};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Parsing must never panic; whatever parses must describe and parse
    // again to the same keys.
    if let Ok(keys) = parse_keys(text) {
        let described = describe_keys(&keys);
        let reparsed = parse_keys(&described).expect("description of parsed keys must parse");
        assert_eq!(reparsed, keys, "{text:?} -> {described:?}");
    }
});
