#![forbid(unsafe_code)]

//! Property tests: reading never loses, duplicates, or reorders keys.
//!
//! Run:
//!   cargo test -p keyseq-runtime --test proptest_replay

use std::time::Duration;

use keyseq_core::event::{InputEvent, RawEvent};
use keyseq_core::keymap::{Binding, Keymap};
use keyseq_runtime::{
    InputConfig, InputSink, MapContext, ReadOptions, ReadOutcome, Reader, RemapTableConfig,
    Session,
};
use proptest::prelude::*;

#[derive(Debug, Default)]
struct Reported(Vec<InputEvent>);

impl InputSink for Reported {
    fn key_read(&mut self, event: &InputEvent) {
        self.0.push(event.clone());
    }
}

#[derive(Debug)]
struct Run {
    sequences: Vec<Vec<InputEvent>>,
    reported: Vec<InputEvent>,
}

fn global() -> Keymap {
    let mut map = Keymap::named("global");
    map.bind("a b", Binding::command("ab")).unwrap();
    map.bind("c", Binding::command("cee")).unwrap();
    map.bind("d", Binding::command("dee")).unwrap();
    map
}

/// Type `input` then close the queue; read until it runs dry.
fn read_all(input: &str, translate: bool) -> Run {
    let mut remap = RemapTableConfig::default();
    if translate {
        remap = remap.with_translation("q", "r s");
    }
    let config = InputConfig::default()
        .with_echo_delay(None)
        .with_remap(remap);
    let mut session = Session::new(&config).unwrap();
    let mut reader = Reader::new(&config);
    let mut ctx = MapContext::new(global());
    let mut sink = Reported::default();

    let producer = session.producer();
    for b in input.bytes() {
        producer.enqueue(RawEvent::byte(b));
    }
    producer.close();

    let opts = ReadOptions::default().with_timeout(Duration::from_secs(2));
    let mut sequences = Vec::new();
    for _ in 0..=input.len() {
        match reader
            .read_key_sequence(&mut session, &mut ctx, &mut sink, &opts)
            .unwrap()
        {
            ReadOutcome::Sequence(seq) => sequences.push(seq.keys),
            ReadOutcome::Exhausted => break,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    Run {
        sequences,
        reported: sink.0,
    }
}

fn chars(s: &str) -> Vec<InputEvent> {
    s.chars().map(InputEvent::char).collect()
}

proptest! {
    #[test]
    fn every_key_is_read_once_in_order(body in "[abcd]{0,16}") {
        let input = format!("{body}c");
        let run = read_all(&input, false);
        let flat: Vec<_> = run.sequences.iter().flatten().cloned().collect();
        prop_assert_eq!(flat, chars(&input));
        prop_assert_eq!(run.reported, chars(&input));
        prop_assert!(run.sequences.iter().all(|s| !s.is_empty() && s.len() <= 2));
    }

    #[test]
    fn translation_splices_without_loss(body in "[abcdq]{0,16}") {
        let input = format!("{body}c");
        let run = read_all(&input, true);
        let flat: Vec<_> = run.sequences.iter().flatten().cloned().collect();
        prop_assert_eq!(flat, chars(&input.replace('q', "rs")));
        // The sink sees keys as typed, before translation.
        prop_assert_eq!(run.reported, chars(&input));
    }

    #[test]
    fn reading_is_deterministic(body in "[abcdq]{0,16}") {
        let input = format!("{body}c");
        let first = read_all(&input, true);
        let second = read_all(&input, true);
        prop_assert_eq!(first.sequences, second.sequences);
    }
}
