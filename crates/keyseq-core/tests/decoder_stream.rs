//! Queue-to-decoder pipeline tests.
//!
//! Raw bytes go through the real queue and decoder, the way the reader
//! drains them:
//!
//! 1. Any UTF-8 text arrives as exactly its characters, however the bytes
//!    are interleaved with queue drains.
//! 2. Arbitrary byte noise never buffers more than the encoded-byte limit
//!    and every decoded character is a valid code point.

use std::sync::Arc;

use keyseq_core::decoder::{DecodeStatus, EventDecoder, MAX_ENCODED_BYTES, MenuRegistry};
use keyseq_core::event::{InputEvent, RawEvent};
use keyseq_core::modifiers::ModifierAlgebra;
use keyseq_core::queue::EventQueue;
use keyseq_core::quit::QuitState;
use proptest::prelude::*;

fn drain(
    consumer: &mut keyseq_core::queue::QueueConsumer,
    decoder: &mut EventDecoder,
    alg: &mut ModifierAlgebra,
    out: &mut Vec<InputEvent>,
) {
    let menus = MenuRegistry::new();
    while let Some(raw) = consumer.dequeue() {
        let status = decoder.decode(&raw, alg, &menus, out);
        assert!(decoder.pending_bytes().len() <= MAX_ENCODED_BYTES);
        assert_ne!(status, DecodeStatus::QuitRedirect);
    }
}

proptest! {
    #[test]
    fn utf8_text_survives_the_pipeline(
        text in "[^\u{7}]{0,24}",
        chunk in 1usize..8,
    ) {
        let (producer, mut consumer) = EventQueue::new(64, 7, Arc::new(QuitState::default()));
        let mut decoder = EventDecoder::default();
        let mut alg = ModifierAlgebra::new();
        let mut out = Vec::new();

        for piece in text.as_bytes().chunks(chunk) {
            for &b in piece {
                producer.enqueue(RawEvent::byte(b));
            }
            drain(&mut consumer, &mut decoder, &mut alg, &mut out);
        }

        let expected: Vec<InputEvent> = text.chars().map(InputEvent::char).collect();
        prop_assert_eq!(out, expected);
        prop_assert!(decoder.pending_bytes().is_empty());
    }

    #[test]
    fn byte_noise_is_bounded(bytes in prop::collection::vec(any::<u8>().prop_filter("quit", |b| *b != 7), 0..64)) {
        let (producer, mut consumer) = EventQueue::new(128, 7, Arc::new(QuitState::default()));
        let mut decoder = EventDecoder::default();
        let mut alg = ModifierAlgebra::new();
        let mut out = Vec::new();
        for &b in &bytes {
            producer.enqueue(RawEvent::byte(b));
        }
        drain(&mut consumer, &mut decoder, &mut alg, &mut out);
        for ev in &out {
            let c = ev.as_char().expect("bytes decode to characters");
            prop_assert!(c.to_char().is_some());
        }
        prop_assert!(out.len() <= bytes.len());
    }
}
