#![no_main]

use std::time::Duration;

use keyseq_core::event::RawEvent;
use keyseq_core::keymap::{Binding, Keymap};
use keyseq_runtime::{
    InputConfig, MapContext, NullSink, ReadOptions, ReadOutcome, Reader, RemapTableConfig,
    Session,
};
use libfuzzer_sys::fuzz_target;

fn global() -> Keymap {
    let mut map = Keymap::named("global");
    for (keys, cmd) in [
        ("C-x C-f", "find-file"),
        ("C-x 4 f", "find-file-other-window"),
        ("ESC x", "execute-extended-command"),
        ("<up>", "previous-line"),
        ("<f1> a", "apropos"),
        ("a", "self-insert-command"),
    ] {
        map.bind(keys, Binding::command(cmd)).expect("static binding");
    }
    map
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary terminal input through xterm decoding, a translation
    // table and a global map: every read ends, and no read returns more
    // keys than the configured limit.
    let config = InputConfig::default()
        .with_echo_delay(None)
        .with_max_sequence_len(8)
        .with_remap(RemapTableConfig::xterm().with_translation("C-t", "C-x 4"));
    let Ok(mut session) = Session::new(&config) else {
        return;
    };
    let mut reader = Reader::new(&config);
    let mut ctx = MapContext::new(global());

    let producer = session.producer();
    for &b in data.iter().take(1024) {
        producer.enqueue(RawEvent::byte(b));
    }
    producer.close();

    let opts = ReadOptions::default().with_timeout(Duration::from_millis(50));
    for _ in 0..=data.len().min(1024) {
        match reader.read_key_sequence(&mut session, &mut ctx, &mut NullSink, &opts) {
            Ok(ReadOutcome::Sequence(seq)) => assert!(!seq.keys.is_empty()),
            Ok(ReadOutcome::Exhausted) => return,
            Ok(_) | Err(_) => {}
        }
    }
    panic!("reader did not exhaust a closed queue");
});
