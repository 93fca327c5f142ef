#![forbid(unsafe_code)]

//! End-to-end reads: raw events in, key sequences out.
//!
//! Every test drives a real [`Session`] through its producer handle and
//! reads with a [`Reader`], so decoding, routing, remapping and lookup all
//! run together.

use std::time::Duration;

use keyseq_core::event::{
    Area, BufferId, FrameId, InputEvent, KeyboardId, Position, RawEvent, RawEventKind, WindowId,
};
use keyseq_core::kbd;
use keyseq_core::keymap::{Binding, Keymap, RemapFunction};
use keyseq_core::modifiers::Modifiers;
use keyseq_core::symbol::Symbol;
use keyseq_runtime::{
    InputConfig, InputContext, InputMacro, InputSink, KeySequence, MacroRecorder, MapContext,
    ReadError, ReadOptions, ReadOutcome, Reader, RemapLayer, RemapTableConfig, Resolution,
    Session,
};

const READ_TIMEOUT: Duration = Duration::from_millis(500);

// ============================================================================
// Harness
// ============================================================================

#[derive(Debug, Default)]
struct Collect {
    keys: Vec<InputEvent>,
    echoes: Vec<Vec<InputEvent>>,
}

impl InputSink for Collect {
    fn key_read(&mut self, event: &InputEvent) {
        self.keys.push(event.clone());
    }

    fn echo_prefix(&mut self, keys: &[InputEvent]) {
        self.echoes.push(keys.to_vec());
    }
}

struct Harness {
    session: Session,
    reader: Reader,
    ctx: MapContext,
    sink: Collect,
}

impl Harness {
    fn new(config: InputConfig, global: Keymap) -> Self {
        Self::with_context(config, MapContext::new(global))
    }

    fn with_context(config: InputConfig, ctx: MapContext) -> Self {
        Self {
            session: Session::new(&config).expect("valid config"),
            reader: Reader::new(&config),
            ctx,
            sink: Collect::default(),
        }
    }

    fn send(&self, ev: RawEvent) {
        self.session.producer().enqueue(ev);
    }

    fn bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            self.send(RawEvent::byte(b));
        }
    }

    fn try_read_with(&mut self, opts: &ReadOptions) -> Result<ReadOutcome, ReadError> {
        let mut opts = opts.clone();
        opts.timeout.get_or_insert(READ_TIMEOUT);
        self.reader
            .read_key_sequence(&mut self.session, &mut self.ctx, &mut self.sink, &opts)
    }

    fn read_with(&mut self, opts: &ReadOptions) -> ReadOutcome {
        self.try_read_with(opts).expect("read failed")
    }

    fn read(&mut self) -> ReadOutcome {
        self.read_with(&ReadOptions::default())
    }

    fn read_seq(&mut self) -> KeySequence {
        match self.read() {
            ReadOutcome::Sequence(seq) => seq,
            other => panic!("expected a key sequence, got {other:?}"),
        }
    }
}

fn events(desc: &str) -> Vec<InputEvent> {
    kbd::parse_events(desc).unwrap()
}

fn global(pairs: &[(&str, &str)]) -> Keymap {
    let mut map = Keymap::named("global");
    for (keys, cmd) in pairs {
        map.bind(keys, Binding::command(cmd)).unwrap();
    }
    map
}

fn command(seq: &KeySequence) -> Option<&str> {
    seq.command().map(Symbol::as_str)
}

fn button(pressed: bool, position: Position, ts: u64) -> RawEvent {
    RawEvent::new(
        RawEventKind::MouseButton {
            button: 1,
            pressed,
            position,
            modifiers: Modifiers::empty(),
        },
        KeyboardId(0),
        FrameId(0),
    )
    .at(ts)
}

fn click(h: &Harness, position: Position, ts: u64) {
    h.send(button(true, position, ts));
    h.send(button(false, position, ts + 10));
}

// ============================================================================
// Plain keys and remap layers
// ============================================================================

#[test]
fn function_key_translation_waits_for_an_unbound_suffix() {
    let config = InputConfig::default()
        .with_remap(RemapTableConfig::default().with_function_key("ESC O P", "<f1>"));
    let mut h = Harness::new(
        config,
        global(&[("C-x", "ctl-x-command"), ("<f1> x", "help-x")]),
    );
    h.bytes(&[0x18, 0x1b, b'O', b'P']);

    let first = h.read_seq();
    assert_eq!(first.keys, events("C-x"));
    assert_eq!(command(&first), Some("ctl-x-command"));

    h.bytes(b"x");
    let second = h.read_seq();
    assert_eq!(second.describe(), "<f1> x");
    assert_eq!(command(&second), Some("help-x"));
    assert_eq!(h.sink.keys, events("C-x ESC O P x"));
}

#[test]
fn translated_function_key_without_longer_binding_ends_the_read() {
    let config = InputConfig::default()
        .with_remap(RemapTableConfig::default().with_function_key("ESC O P", "<f1>"));
    let mut h = Harness::new(config, global(&[("C-x", "ctl-x-command"), ("x", "self-x")]));
    h.bytes(&[0x1b, b'O', b'P', b'x']);

    // An unbound <f1> is a complete sequence; the x after it starts the next.
    let first = h.read_seq();
    assert_eq!(first.keys, events("<f1>"));
    assert_eq!(first.resolution, Resolution::Unbound);

    let second = h.read_seq();
    assert_eq!(second.keys, events("x"));
    assert_eq!(command(&second), Some("self-x"));
    assert_eq!(h.sink.keys, events("ESC O P x"));
}

#[test]
fn xterm_defaults_decode_arrow_keys() {
    let config = InputConfig::default().with_remap(RemapTableConfig::xterm());
    let mut h = Harness::new(config, global(&[("<up>", "previous-line")]));
    h.bytes(b"\x1b[A");
    let seq = h.read_seq();
    assert_eq!(seq.keys, events("<up>"));
    assert_eq!(command(&seq), Some("previous-line"));
}

#[test]
fn translation_rewrites_bound_keys_too() {
    let config = InputConfig::default()
        .with_remap(RemapTableConfig::default().with_translation("C-c <f5>", "C-c r"));
    let mut h = Harness::new(
        config,
        global(&[("C-c r", "revert-buffer"), ("C-c <f5>", "never-run")]),
    );
    h.send(RawEvent::char('c', Modifiers::CTRL));
    h.send(RawEvent::new(
        RawEventKind::FunctionKey {
            keysym: 0xffc2,
            modifiers: Modifiers::empty(),
        },
        KeyboardId(0),
        FrameId(0),
    ));
    let seq = h.read_seq();
    assert_eq!(seq.keys, events("C-c r"));
    assert_eq!(command(&seq), Some("revert-buffer"));
}

#[test]
fn upper_case_reads_as_lower_case() {
    let mut h = Harness::new(InputConfig::default(), global(&[("a", "lower-a")]));
    h.send(RawEvent::char('A', Modifiers::empty()));
    let seq = h.read_seq();
    assert_eq!(seq.keys, events("a"));
    assert!(seq.shift_translated);
    assert_eq!(command(&seq), Some("lower-a"));

    h.send(RawEvent::char('A', Modifiers::empty()));
    let kept = h
        .read_with(&ReadOptions::default().with_dont_downcase_last(true))
        .into_sequence()
        .unwrap();
    assert_eq!(kept.keys, events("A"));
    assert_eq!(command(&kept), Some("lower-a"));
}

#[test]
fn upper_case_stays_when_translation_is_off() {
    let config = InputConfig::default().with_translate_upper_case(false);
    let mut h = Harness::new(config, global(&[("a", "lower-a")]));
    h.send(RawEvent::char('A', Modifiers::empty()));
    let seq = h.read_seq();
    assert_eq!(seq.keys, events("A"));
    assert_eq!(seq.resolution, Resolution::Unbound);
}

#[test]
fn command_remapping_is_applied() {
    let mut map = global(&[("C-k", "kill-line")]);
    map.bind("<remap> <kill-line>", Binding::command("kill-whole-line"))
        .unwrap();
    let mut h = Harness::new(InputConfig::default(), map);
    h.bytes(&[0x0b]);
    let seq = h.read_seq();
    assert_eq!(seq.resolution.command().map(Symbol::as_str), Some("kill-line"));
    assert_eq!(command(&seq), Some("kill-whole-line"));
}

#[test]
fn misbehaving_remap_function_is_an_error() {
    let mut h = Harness::new(InputConfig::default(), global(&[("C-t", "transpose-chars")]));
    let mut translation = Keymap::named("translation");
    translation
        .bind(
            "C-t",
            Binding::Function(RemapFunction::new("bad-translation", |_| {
                Some(Binding::command("not-a-key"))
            })),
        )
        .unwrap();
    h.session.set_translation_map(translation);
    h.bytes(&[0x14]);
    let err = h.try_read_with(&ReadOptions::default()).unwrap_err();
    assert_eq!(
        err,
        ReadError::InvalidRemapResult {
            layer: RemapLayer::Translation,
            function: Symbol::new("bad-translation"),
        }
    );
}

#[test]
fn remap_function_sees_the_prompt() {
    let mut h = Harness::new(InputConfig::default(), global(&[("y", "yes"), ("n", "no")]));
    let mut translation = Keymap::named("translation");
    translation
        .bind(
            "RET",
            Binding::Function(RemapFunction::new("confirm-return", |req| {
                (req.prompt == Some("Really? ")).then(|| Binding::Text("y".into()))
            })),
        )
        .unwrap();
    h.session.set_translation_map(translation);
    h.bytes(b"\r");
    let seq = h
        .read_with(&ReadOptions::default().with_prompt("Really? "))
        .into_sequence()
        .unwrap();
    assert_eq!(command(&seq), Some("yes"));
}

#[test]
fn overlong_sequence_is_rejected() {
    let config = InputConfig::default().with_max_sequence_len(4);
    let mut h = Harness::new(config, global(&[("a a a a a", "deep")]));
    h.bytes(b"aaaaa");
    let err = h.try_read_with(&ReadOptions::default()).unwrap_err();
    assert_eq!(err, ReadError::SequenceTooLong { limit: 4 });
}

#[test]
fn help_char_after_prefix() {
    let mut h = Harness::new(InputConfig::default(), global(&[("C-x C-f", "find-file")]));
    h.bytes(&[0x18, 0x08]);
    let seq = h.read_seq();
    assert_eq!(seq.describe(), "C-x C-h");
    assert_eq!(command(&seq), Some("describe-prefix-bindings"));
}

// ============================================================================
// Pointer events
// ============================================================================

#[test]
fn unbound_button_down_is_dropped() {
    let mut h = Harness::new(InputConfig::default(), global(&[("<mouse-1>", "mouse-set-point")]));
    click(&h, Position::in_window(WindowId(1), 4, 2), 0);
    let seq = h.read_seq();
    assert_eq!(seq.keys.len(), 1);
    assert_eq!(seq.keys[0].head_symbol().map(Symbol::as_str), Some("mouse-1"));
    assert_eq!(command(&seq), Some("mouse-set-point"));
    // Both halves of the click were read live.
    assert_eq!(h.sink.keys.len(), 2);
}

#[test]
fn double_click_falls_back_to_single() {
    let mut h = Harness::new(InputConfig::default(), global(&[("<mouse-1>", "mouse-set-point")]));
    let at = Position::in_window(WindowId(1), 4, 2);
    click(&h, at, 0);
    click(&h, at, 100);
    for _ in 0..2 {
        let seq = h.read_seq();
        assert_eq!(command(&seq), Some("mouse-set-point"));
    }
    assert_eq!(h.read(), ReadOutcome::TimedOut);
}

#[test]
fn mode_line_click_reads_with_area_prefix() {
    let mut h = Harness::new(
        InputConfig::default(),
        global(&[("<mode-line> <mouse-1>", "mouse-select-window")]),
    );
    click(
        &h,
        Position::in_window(WindowId(1), 10, 0).with_area(Area::ModeLine),
        0,
    );
    let seq = h.read_seq();
    assert_eq!(seq.keys[0], InputEvent::symbol("mode-line"));
    assert_eq!(command(&seq), Some("mouse-select-window"));
}

#[test]
fn click_in_other_window_uses_its_buffer_for_one_read() {
    let mut local = Keymap::named("dired-mode-map");
    local
        .bind("<mouse-1>", Binding::command("dired-find-file"))
        .unwrap();
    let ctx = MapContext::new(global(&[("<mouse-1>", "mouse-set-point")]))
        .with_window(WindowId(2), BufferId(5))
        .with_local_map(BufferId(5), local);
    let mut h = Harness::with_context(InputConfig::default(), ctx);
    click(&h, Position::in_window(WindowId(2), 1, 1), 0);

    let seq = h.read_seq();
    assert_eq!(command(&seq), Some("dired-find-file"));
    assert_eq!(h.ctx.current_buffer(), BufferId(0));
    assert_eq!(h.ctx.buffer_switches(), 2);
}

#[test]
fn menu_selection_reads_as_its_path() {
    let mut h = Harness::new(
        InputConfig::default(),
        global(&[("<menu-bar> <file> <open>", "find-file")]),
    );
    h.session.menus_mut().register(
        Area::MenuBar,
        3,
        vec![Symbol::new("file"), Symbol::new("open")],
    );
    h.send(RawEvent::new(
        RawEventKind::MenuSelection {
            item: 3,
            area: Area::MenuBar,
        },
        KeyboardId(0),
        FrameId(0),
    ));
    let seq = h.read_seq();
    assert_eq!(seq.describe(), "<menu-bar> <file> <open>");
    assert_eq!(command(&seq), Some("find-file"));
}

#[test]
fn dismissed_menu_rejects_the_read() {
    let mut h = Harness::new(InputConfig::default(), global(&[("C-x C-f", "find-file")]));
    h.bytes(&[0x18]);
    h.send(RawEvent::new(RawEventKind::MenuDismissed, KeyboardId(0), FrameId(0)));
    assert_eq!(h.read(), ReadOutcome::Rejected);
}

// ============================================================================
// Frames and keyboards
// ============================================================================

#[test]
fn mid_sequence_frame_switch_is_deferred() {
    let mut h = Harness::new(
        InputConfig::default(),
        global(&[("C-x C-f", "find-file"), ("<switch-frame>", "handle-switch-frame")]),
    );
    h.send(RawEvent::byte(0x18));
    h.send(RawEvent::byte(0x06).on_frame(FrameId(1)));

    let seq = h.read_seq();
    assert_eq!(seq.describe(), "C-x C-f");
    assert_eq!(seq.delayed_switch_frame, Some(InputEvent::SwitchFrame(FrameId(1))));

    let next = h
        .read_with(&ReadOptions::default().with_can_return_switch_frame(true))
        .into_sequence()
        .unwrap();
    assert_eq!(next.keys, vec![InputEvent::SwitchFrame(FrameId(1))]);
    assert_eq!(command(&next), Some("handle-switch-frame"));
}

#[test]
fn other_keyboard_takes_over_and_keys_are_kept() {
    let mut h = Harness::new(
        InputConfig::default(),
        global(&[("C-x C-f", "find-file"), ("a", "self-insert-command")]),
    );
    h.send(RawEvent::byte(0x18));
    h.send(RawEvent::char('a', Modifiers::empty()).on_keyboard(KeyboardId(1)));
    h.send(RawEvent::byte(0x06));

    let first = h.read_seq();
    assert_eq!(first.keys, events("a"));
    assert_eq!(first.keyboard, KeyboardId(1));

    let second = h.read_seq();
    assert_eq!(second.describe(), "C-x C-f");
    assert_eq!(second.keyboard, KeyboardId(0));

    // Each key reached the sink once, in arrival order.
    assert_eq!(h.sink.keys, events("C-x a C-f"));
}

#[test]
fn quit_on_locked_out_keyboard_is_queued_for_it() {
    let mut h = Harness::new(InputConfig::default(), global(&[("C-g", "keyboard-quit")]));
    h.session.set_single_keyboard(true);
    h.send(RawEvent::char('q', Modifiers::empty()).on_keyboard(KeyboardId(1)));
    h.send(RawEvent::byte(7).on_keyboard(KeyboardId(1)).on_frame(FrameId(4)));
    assert!(!h.session.quit_state().is_pending());
    assert_eq!(h.read(), ReadOutcome::TimedOut);

    h.session.set_single_keyboard(false);
    let seq = h
        .read_with(&ReadOptions::default().with_can_return_switch_frame(true))
        .into_sequence()
        .unwrap();
    assert_eq!(seq.keyboard, KeyboardId(1));
    assert_eq!(seq.keys, vec![InputEvent::SwitchFrame(FrameId(4))]);
    let quit = h.read_seq();
    assert_eq!(command(&quit), Some("keyboard-quit"));
}

// ============================================================================
// Unread input, macros and echo
// ============================================================================

#[test]
fn unread_events_are_read_but_not_reported() {
    let mut h = Harness::new(InputConfig::default(), global(&[("C-x C-f", "find-file")]));
    h.session.push_unread(events("C-x"));
    h.bytes(&[0x06]);
    let seq = h.read_seq();
    assert_eq!(seq.describe(), "C-x C-f");
    assert_eq!(h.sink.keys, events("C-f"));
}

#[test]
fn recorded_macro_plays_back_then_exhausts() {
    let mut h = Harness::new(
        InputConfig::default(),
        global(&[("C-x C-f", "find-file"), ("a", "self-insert-command")]),
    );
    let mut recorder = MacroRecorder::new("open-and-type");
    recorder.start();
    h.bytes(&[0x18, 0x06, b'a']);
    let opts = ReadOptions::default().with_timeout(READ_TIMEOUT);
    for _ in 0..2 {
        let outcome = h
            .reader
            .read_key_sequence(&mut h.session, &mut h.ctx, &mut recorder, &opts)
            .unwrap();
        assert!(outcome.sequence().is_some());
    }
    let recorded = recorder.finish();
    assert_eq!(recorded.describe(), "C-x C-f a");

    h.session.execute_macro(recorded);
    assert!(h.session.is_executing_macro());
    assert_eq!(command(&h.read_seq()), Some("find-file"));
    assert_eq!(command(&h.read_seq()), Some("self-insert-command"));
    assert_eq!(h.read(), ReadOutcome::Exhausted);
    assert!(!h.session.is_executing_macro());
    assert!(h.sink.keys.is_empty());

    h.bytes(b"a");
    assert_eq!(command(&h.read_seq()), Some("self-insert-command"));
}

#[test]
fn macro_ending_mid_sequence_exhausts() {
    let mut h = Harness::new(InputConfig::default(), global(&[("C-x C-f", "find-file")]));
    h.session
        .execute_macro(InputMacro::from_events("partial", events("C-x")));
    assert_eq!(h.read(), ReadOutcome::Exhausted);
}

#[test]
fn stalled_prefix_is_echoed_once() {
    let config = InputConfig::default().with_echo_delay(Some(Duration::from_millis(10)));
    let mut h = Harness::new(config, global(&[("C-x C-f", "find-file")]));
    h.bytes(&[0x18]);
    let outcome = h.read_with(&ReadOptions::default().with_timeout(Duration::from_millis(150)));
    assert_eq!(outcome, ReadOutcome::TimedOut);
    assert_eq!(h.sink.echoes, vec![events("C-x")]);
}

#[test]
fn closed_queue_exhausts() {
    let mut h = Harness::new(InputConfig::default(), global(&[("a", "self-insert-command")]));
    h.bytes(b"a");
    h.session.producer().close();
    assert_eq!(command(&h.read_seq()), Some("self-insert-command"));
    assert_eq!(h.read(), ReadOutcome::Exhausted);
}

#[test]
fn recent_keys_track_live_input() {
    let mut h = Harness::new(InputConfig::default(), global(&[("C-x C-f", "find-file")]));
    h.session.push_unread(events("C-x"));
    h.bytes(&[0x06]);
    let _ = h.read_seq();
    let recent: Vec<_> = h.session.recent_keys().cloned().collect();
    assert_eq!(recent, events("C-f"));
}
