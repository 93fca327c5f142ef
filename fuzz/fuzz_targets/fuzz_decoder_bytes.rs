#![no_main]

use keyseq_core::decoder::{
    DecoderConfig, EventDecoder, MAX_ENCODED_BYTES, MenuRegistry, TerminalCoding,
};
use keyseq_core::event::{InputEvent, RawEvent};
use keyseq_core::modifiers::ModifierAlgebra;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Every coding must accept arbitrary bytes without panicking and never
    // buffer more than one encoded character.
    let menus = MenuRegistry::new();
    for coding in [TerminalCoding::Utf8, TerminalCoding::Latin1, TerminalCoding::MetaBit] {
        let mut decoder = EventDecoder::new(DecoderConfig::default().with_coding(coding));
        let mut alg = ModifierAlgebra::new();
        let mut out = Vec::new();
        for &b in data {
            let _ = decoder.decode(&RawEvent::byte(b), &mut alg, &menus, &mut out);
            assert!(decoder.pending_bytes().len() <= MAX_ENCODED_BYTES);
        }
        // One byte in, at most one character out.
        assert!(out.len() <= data.len());
        assert!(out.iter().all(|ev| matches!(ev, InputEvent::Char(_))));
        if coding != TerminalCoding::Utf8 {
            assert_eq!(out.len(), data.len());
        }
    }
});
