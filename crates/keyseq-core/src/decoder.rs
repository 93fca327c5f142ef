#![forbid(unsafe_code)]

//! Raw event decoding into canonical input events.
//!
//! One [`EventDecoder`] exists per logical keyboard. It owns the state that
//! spans several raw events:
//!
//! - the partial multi-byte character of a terminal byte stream;
//! - click counting (double/triple clicks) and the press position of each
//!   held button, needed to tell a click from a drag;
//! - the frame of the last user event, so a frame change can be reported
//!   as a `switch-frame` event ahead of the event itself.
//!
//! # Byte decoding
//!
//! Bytes accumulate until a complete character is available; a partial code
//! unit is never emitted. At most [`MAX_ENCODED_BYTES`] bytes are buffered.
//! A byte that cannot start or continue a character is skipped, and decoding
//! resumes with the next byte.
//!
//! # Mouse events
//!
//! A press produces `down-mouse-N` (with `double-`/`triple-` when it
//! continues a burst). A release produces `mouse-N`, or `drag-mouse-N` when
//! the pointer moved more than the click fuzz or changed window; the burst
//! count carries over from the press. A release without a recorded press is
//! ignored.

use std::borrow::Cow;

use ahash::AHashMap;
use web_time::Duration;

use crate::event::{
    Area, FocusEvent, FrameId, InputEvent, MenuEvent, MouseEvent, Position, RawEvent,
    RawEventKind, WheelEvent, WindowId,
};
use crate::keysym::keysym_name;
use crate::modifiers::{KeyChar, ModifierAlgebra, Modifiers, fold_keystroke};
use crate::symbol::Symbol;

/// Largest number of raw bytes buffered for one character.
pub const MAX_ENCODED_BYTES: usize = 16;

/// Default interval for counting clicks into a burst.
pub const DEFAULT_DOUBLE_CLICK_TIME: Duration = Duration::from_millis(500);

/// Default distance a pointer may move and still count as a click.
pub const DEFAULT_DOUBLE_CLICK_FUZZ: i32 = 3;

/// Coding of a terminal byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalCoding {
    /// UTF-8.
    #[default]
    Utf8,
    /// One byte per character, ISO-8859-1.
    Latin1,
    /// 7-bit characters; the eighth bit means meta.
    MetaBit,
}

impl TerminalCoding {
    /// Parse a coding name (`utf-8`, `latin-1`, `meta`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Some(Self::Latin1),
            "meta" | "meta-bit" => Some(Self::MetaBit),
            _ => None,
        }
    }
}

/// Decoder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    pub coding: TerminalCoding,
    /// `None` disables click bursts.
    pub double_click_time: Option<Duration>,
    pub double_click_fuzz: i32,
    /// Report pointer motion as `mouse-movement` events.
    pub track_mouse: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            coding: TerminalCoding::Utf8,
            double_click_time: Some(DEFAULT_DOUBLE_CLICK_TIME),
            double_click_fuzz: DEFAULT_DOUBLE_CLICK_FUZZ,
            track_mouse: false,
        }
    }
}

impl DecoderConfig {
    #[must_use]
    pub fn with_coding(mut self, coding: TerminalCoding) -> Self {
        self.coding = coding;
        self
    }

    #[must_use]
    pub fn with_double_click_time(mut self, time: Option<Duration>) -> Self {
        self.double_click_time = time;
        self
    }

    #[must_use]
    pub fn with_track_mouse(mut self, track: bool) -> Self {
        self.track_mouse = track;
        self
    }
}

/// What [`EventDecoder::decode`] did with a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// At least one input event was pushed.
    Input,
    /// A byte was buffered; the character is incomplete.
    Pending,
    /// A malformed byte was dropped.
    Skipped,
    /// The event produces no input (untracked motion, stray release, ...).
    Ignored,
    /// A timer became due.
    Timer { id: u64 },
    /// The frame was resized.
    Resize { width: u16, height: u16 },
    /// A pop-up menu closed without a choice.
    MenuDismissed,
    /// Quit typed on another keyboard.
    QuitRedirect,
}

/// Item paths of menu, tool-bar, and tab-bar entries by backend id.
#[derive(Debug, Clone, Default)]
pub struct MenuRegistry {
    items: AHashMap<(Area, u32), Vec<Symbol>>,
}

impl MenuRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the item path selected by backend id `item` in `area`.
    pub fn register(&mut self, area: Area, item: u32, path: Vec<Symbol>) {
        self.items.insert((area, item), path);
    }

    /// The item path, if registered.
    #[must_use]
    pub fn resolve(&self, area: Area, item: u32) -> Option<&[Symbol]> {
        self.items.get(&(area, item)).map(Vec::as_slice)
    }

    /// Forget every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

// ---------------------------------------------------------------------------
// Click tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct LastClick {
    button: u8,
    window: Option<WindowId>,
    x: i32,
    y: i32,
    timestamp_ms: u64,
}

#[derive(Debug, Default)]
struct ClickTracker {
    last: Option<LastClick>,
    count: u8,
    pressed: AHashMap<u8, Position>,
}

impl ClickTracker {
    fn near(fuzz: i32, a: &Position, x: i32, y: i32) -> bool {
        (a.x - x).abs() <= fuzz && (a.y - y).abs() <= fuzz
    }

    /// Count a press of `button`; returns the burst count.
    fn press(&mut self, config: &DecoderConfig, button: u8, pos: Position, ts: u64) -> u8 {
        let continues = match (self.last, config.double_click_time) {
            (Some(last), Some(limit)) => {
                last.button == button
                    && last.window == pos.window
                    && (last.x - pos.x).abs() <= config.double_click_fuzz
                    && (last.y - pos.y).abs() <= config.double_click_fuzz
                    && ts.saturating_sub(last.timestamp_ms) < limit.as_millis() as u64
            }
            _ => false,
        };
        self.count = if continues {
            self.count.saturating_add(1)
        } else {
            1
        };
        self.last = Some(LastClick {
            button,
            window: pos.window,
            x: pos.x,
            y: pos.y,
            timestamp_ms: ts,
        });
        self.pressed.insert(button, pos);
        self.count
    }

    /// Match a release with its press; returns `(start, is_drag)`.
    fn release(&mut self, config: &DecoderConfig, button: u8, pos: &Position) -> Option<(Position, bool)> {
        let start = self.pressed.remove(&button)?;
        let drag = start.window != pos.window
            || !Self::near(config.double_click_fuzz, &start, pos.x, pos.y);
        if drag {
            // A drag ends the burst.
            self.last = None;
        }
        Some((start, drag))
    }
}

fn burst_modifier(count: u8) -> Modifiers {
    match count {
        0 | 1 => Modifiers::empty(),
        2 => Modifiers::DOUBLE,
        _ => Modifiers::TRIPLE,
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Per-keyboard raw event decoder.
#[derive(Debug)]
pub struct EventDecoder {
    config: DecoderConfig,
    pending: Vec<u8>,
    needed: usize,
    clicks: ClickTracker,
    wheel_clicks: ClickTracker,
    last_frame: Option<FrameId>,
    keysyms: AHashMap<u32, Symbol>,
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl EventDecoder {
    /// Create a decoder.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            pending: Vec::with_capacity(MAX_ENCODED_BYTES),
            needed: 0,
            clicks: ClickTracker::default(),
            wheel_clicks: ClickTracker::default(),
            last_frame: None,
            keysyms: AHashMap::new(),
        }
    }

    /// Treat `frame` as the frame of the previous event.
    #[must_use]
    pub fn with_selected_frame(mut self, frame: FrameId) -> Self {
        self.last_frame = Some(frame);
        self
    }

    /// The settings in use.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Change the terminal coding. Buffered bytes are discarded.
    pub fn set_coding(&mut self, coding: TerminalCoding) {
        self.config.coding = coding;
        self.reset_pending();
    }

    /// Turn `mouse-movement` reporting on or off.
    pub fn set_track_mouse(&mut self, track: bool) {
        self.config.track_mouse = track;
    }

    /// Bytes buffered for an incomplete character.
    #[must_use]
    pub fn pending_bytes(&self) -> &[u8] {
        &self.pending
    }

    /// The frame of the last user event.
    #[must_use]
    pub fn last_frame(&self) -> Option<FrameId> {
        self.last_frame
    }

    fn reset_pending(&mut self) {
        self.pending.clear();
        self.needed = 0;
    }

    /// Decode `raw`, pushing any input events onto `out`.
    pub fn decode(
        &mut self,
        raw: &RawEvent,
        alg: &mut ModifierAlgebra,
        menus: &MenuRegistry,
        out: &mut Vec<InputEvent>,
    ) -> DecodeStatus {
        #[cfg(feature = "tracing")]
        let before = out.len();
        let status = match raw.kind {
            RawEventKind::Byte(b) => match self.decode_byte(b) {
                ByteStep::Char(c) => {
                    self.note_frame(raw.frame, out);
                    out.push(InputEvent::Char(c));
                    DecodeStatus::Input
                }
                ByteStep::Pending => DecodeStatus::Pending,
                ByteStep::Skipped => DecodeStatus::Skipped,
            },
            RawEventKind::Char { code, modifiers } => {
                self.note_frame(raw.frame, out);
                out.push(InputEvent::Char(fold_keystroke(code, modifiers)));
                DecodeStatus::Input
            }
            RawEventKind::FunctionKey { keysym, modifiers } => {
                let base = self.keysym_symbol(keysym);
                let head = alg.apply_modifiers(modifiers & Modifiers::KEY_MASK, &base);
                self.note_frame(raw.frame, out);
                out.push(InputEvent::Symbol(head));
                DecodeStatus::Input
            }
            RawEventKind::MouseButton {
                button,
                pressed,
                position,
                modifiers,
            } => self.decode_button(raw, button, pressed, position, modifiers, alg, out),
            RawEventKind::MouseMotion { position } => {
                if self.config.track_mouse {
                    out.push(InputEvent::Mouse(MouseEvent {
                        head: Symbol::new("mouse-movement"),
                        start: position,
                        end: None,
                        click_count: 0,
                        timestamp_ms: raw.timestamp_ms,
                    }));
                    DecodeStatus::Input
                } else {
                    DecodeStatus::Ignored
                }
            }
            RawEventKind::Wheel {
                direction,
                position,
                modifiers,
            } => {
                let count = self.wheel_clicks.press(
                    &self.config,
                    direction as u8,
                    position,
                    raw.timestamp_ms,
                );
                self.wheel_clicks.pressed.clear();
                let mods = (modifiers & Modifiers::KEY_MASK) | burst_modifier(count);
                let head = alg.apply_modifiers(mods, &Symbol::new(direction.symbol_name()));
                self.note_frame(raw.frame, out);
                out.push(InputEvent::Wheel(WheelEvent {
                    head,
                    position,
                    timestamp_ms: raw.timestamp_ms,
                }));
                DecodeStatus::Input
            }
            RawEventKind::FocusIn => {
                self.note_frame(raw.frame, out);
                out.push(InputEvent::Focus(FocusEvent {
                    head: Symbol::new("focus-in"),
                    frame: raw.frame,
                }));
                DecodeStatus::Input
            }
            RawEventKind::FocusOut => {
                out.push(InputEvent::Focus(FocusEvent {
                    head: Symbol::new("focus-out"),
                    frame: raw.frame,
                }));
                DecodeStatus::Input
            }
            RawEventKind::Resize { width, height } => DecodeStatus::Resize { width, height },
            RawEventKind::MenuSelection { item, area } => match menus.resolve(area, item) {
                Some(path) => {
                    self.note_frame(raw.frame, out);
                    out.push(InputEvent::Menu(MenuEvent {
                        area,
                        path: path.to_vec(),
                        frame: raw.frame,
                    }));
                    DecodeStatus::Input
                }
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(item, ?area, "menu selection with unknown item");
                    DecodeStatus::Ignored
                }
            },
            RawEventKind::MenuDismissed => DecodeStatus::MenuDismissed,
            RawEventKind::TimerFired { id } => DecodeStatus::Timer { id },
            RawEventKind::Signal(sig) => {
                out.push(InputEvent::symbol(sig.symbol_name()));
                DecodeStatus::Input
            }
            RawEventKind::QuitRedirect => DecodeStatus::QuitRedirect,
            RawEventKind::Discarded => DecodeStatus::Ignored,
        };

        #[cfg(feature = "tracing")]
        if out.len() > before {
            tracing::debug!(raw = ?raw.kind, decoded = ?&out[before..], "decoded event");
        }
        status
    }

    fn note_frame(&mut self, frame: FrameId, out: &mut Vec<InputEvent>) {
        if let Some(last) = self.last_frame
            && last != frame
        {
            out.push(InputEvent::SwitchFrame(frame));
        }
        self.last_frame = Some(frame);
    }

    fn keysym_symbol(&mut self, keysym: u32) -> Symbol {
        self.keysyms
            .entry(keysym)
            .or_insert_with(|| match keysym_name(keysym) {
                Some(Cow::Borrowed(name)) => Symbol::new(name),
                Some(Cow::Owned(name)) => Symbol::from(name),
                None => Symbol::from(format!("key-{keysym}")),
            })
            .clone()
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_button(
        &mut self,
        raw: &RawEvent,
        button: u8,
        pressed: bool,
        position: Position,
        modifiers: Modifiers,
        alg: &mut ModifierAlgebra,
        out: &mut Vec<InputEvent>,
    ) -> DecodeStatus {
        let base = Symbol::from(format!("mouse-{button}"));
        let key_mods = modifiers & Modifiers::KEY_MASK;

        if pressed {
            let count = self
                .clicks
                .press(&self.config, button, position, raw.timestamp_ms);
            let head = alg.apply_modifiers(key_mods | Modifiers::DOWN | burst_modifier(count), &base);
            self.note_frame(raw.frame, out);
            out.push(InputEvent::Mouse(MouseEvent {
                head,
                start: position,
                end: None,
                click_count: count,
                timestamp_ms: raw.timestamp_ms,
            }));
            return DecodeStatus::Input;
        }

        let count = self.clicks.count;
        let Some((start, drag)) = self.clicks.release(&self.config, button, &position) else {
            return DecodeStatus::Ignored;
        };
        let kind = if drag { Modifiers::DRAG } else { Modifiers::empty() };
        let head = alg.apply_modifiers(key_mods | kind | burst_modifier(count), &base);
        self.note_frame(raw.frame, out);
        out.push(InputEvent::Mouse(MouseEvent {
            head,
            start,
            end: drag.then_some(position),
            click_count: count,
            timestamp_ms: raw.timestamp_ms,
        }));
        DecodeStatus::Input
    }

    fn decode_byte(&mut self, b: u8) -> ByteStep {
        match self.config.coding {
            TerminalCoding::Latin1 => ByteStep::Char(KeyChar::new(u32::from(b))),
            TerminalCoding::MetaBit => {
                if b & 0x80 != 0 {
                    ByteStep::Char(KeyChar::new(u32::from(b & 0x7f)).or_modifiers(Modifiers::META))
                } else {
                    ByteStep::Char(KeyChar::new(u32::from(b)))
                }
            }
            TerminalCoding::Utf8 => self.decode_utf8(b),
        }
    }

    fn decode_utf8(&mut self, b: u8) -> ByteStep {
        if self.pending.is_empty() {
            return match utf8_width(b) {
                Some(1) => ByteStep::Char(KeyChar::new(u32::from(b))),
                Some(n) => {
                    self.pending.push(b);
                    self.needed = n;
                    ByteStep::Pending
                }
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(byte = b, "skipping malformed terminal byte");
                    ByteStep::Skipped
                }
            };
        }

        if b & 0xC0 != 0x80 || self.pending.len() >= MAX_ENCODED_BYTES {
            #[cfg(feature = "tracing")]
            tracing::warn!(pending = ?self.pending, byte = b, "truncated multi-byte character");
            self.reset_pending();
            // The interrupting byte is decoded on its own.
            return self.decode_utf8(b);
        }

        self.pending.push(b);
        if self.pending.len() < self.needed {
            return ByteStep::Pending;
        }
        let step = match std::str::from_utf8(&self.pending)
            .ok()
            .and_then(|s| s.chars().next())
        {
            Some(c) => ByteStep::Char(KeyChar::from_char(c)),
            None => ByteStep::Skipped,
        };
        self.reset_pending();
        step
    }
}

enum ByteStep {
    Char(KeyChar),
    Pending,
    Skipped,
}

fn utf8_width(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{KeyboardId, WheelDirection};

    fn decode_all(dec: &mut EventDecoder, raws: &[RawEvent]) -> (Vec<InputEvent>, Vec<DecodeStatus>) {
        let mut alg = ModifierAlgebra::new();
        let menus = MenuRegistry::new();
        let mut out = Vec::new();
        let statuses = raws
            .iter()
            .map(|r| dec.decode(r, &mut alg, &menus, &mut out))
            .collect();
        (out, statuses)
    }

    fn heads(events: &[InputEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| crate::kbd::describe_event(e))
            .collect()
    }

    #[test]
    fn utf8_waits_for_complete_character() {
        let mut dec = EventDecoder::default();
        let bytes: Vec<_> = "é€".bytes().map(RawEvent::byte).collect();
        let (out, statuses) = decode_all(&mut dec, &bytes);
        assert_eq!(out, vec![InputEvent::char('é'), InputEvent::char('€')]);
        assert_eq!(
            statuses,
            vec![
                DecodeStatus::Pending,
                DecodeStatus::Input,
                DecodeStatus::Pending,
                DecodeStatus::Pending,
                DecodeStatus::Input
            ]
        );
    }

    #[test]
    fn malformed_bytes_are_skipped() {
        let mut dec = EventDecoder::default();
        let (out, statuses) = decode_all(
            &mut dec,
            &[RawEvent::byte(0xFF), RawEvent::byte(b'a'), RawEvent::byte(0xC3), RawEvent::byte(b'b')],
        );
        assert_eq!(out, vec![InputEvent::char('a'), InputEvent::char('b')]);
        assert_eq!(statuses[0], DecodeStatus::Skipped);
        assert_eq!(statuses[3], DecodeStatus::Input);
        assert!(dec.pending_bytes().is_empty());
    }

    #[test]
    fn meta_bit_coding() {
        let mut dec = EventDecoder::new(DecoderConfig::default().with_coding(TerminalCoding::MetaBit));
        let (out, _) = decode_all(&mut dec, &[RawEvent::byte(0x80 | b'x')]);
        assert_eq!(
            out,
            vec![InputEvent::Char(KeyChar::from_char('x').with_modifiers(Modifiers::META))]
        );
    }

    #[test]
    fn window_system_keystrokes_fold_modifiers() {
        let mut dec = EventDecoder::default();
        let (out, _) = decode_all(
            &mut dec,
            &[
                RawEvent::char('a', Modifiers::CTRL),
                RawEvent::char('A', Modifiers::CTRL | Modifiers::SHIFT),
                RawEvent::new(
                    RawEventKind::FunctionKey {
                        keysym: 0xffbe,
                        modifiers: Modifiers::META | Modifiers::CTRL,
                    },
                    KeyboardId(0),
                    FrameId(0),
                ),
            ],
        );
        assert_eq!(heads(&out), vec!["C-a", "C-S-a", "C-M-<f1>"]);
    }

    fn button(button: u8, pressed: bool, x: i32, ts: u64) -> RawEvent {
        RawEvent::new(
            RawEventKind::MouseButton {
                button,
                pressed,
                position: Position::in_window(WindowId(1), x, 0),
                modifiers: Modifiers::empty(),
            },
            KeyboardId(0),
            FrameId(0),
        )
        .at(ts)
    }

    #[test]
    fn click_bursts() {
        let mut dec = EventDecoder::default();
        let (out, _) = decode_all(
            &mut dec,
            &[
                button(1, true, 5, 0),
                button(1, false, 5, 10),
                button(1, true, 6, 100),
                button(1, false, 6, 110),
                button(1, true, 6, 200),
                button(1, false, 6, 210),
                button(1, true, 6, 2000),
            ],
        );
        assert_eq!(
            heads(&out),
            vec![
                "<down-mouse-1>",
                "<mouse-1>",
                "<double-down-mouse-1>",
                "<double-mouse-1>",
                "<triple-down-mouse-1>",
                "<triple-mouse-1>",
                "<down-mouse-1>",
            ]
        );
    }

    #[test]
    fn drag_and_stray_release() {
        let mut dec = EventDecoder::default();
        let (out, statuses) = decode_all(
            &mut dec,
            &[button(2, false, 0, 0), button(1, true, 0, 10), button(1, false, 40, 20)],
        );
        assert_eq!(statuses[0], DecodeStatus::Ignored);
        assert_eq!(heads(&out), vec!["<down-mouse-1>", "<drag-mouse-1>"]);
        let InputEvent::Mouse(drag) = &out[1] else {
            panic!("expected mouse event");
        };
        assert_eq!(drag.start.x, 0);
        assert_eq!(drag.end.map(|p| p.x), Some(40));
    }

    #[test]
    fn frame_change_inserts_switch_frame() {
        let mut dec = EventDecoder::default().with_selected_frame(FrameId(0));
        let (out, _) = decode_all(
            &mut dec,
            &[
                RawEvent::char('a', Modifiers::empty()),
                RawEvent::char('b', Modifiers::empty()).on_frame(FrameId(3)),
                RawEvent::char('c', Modifiers::empty()).on_frame(FrameId(3)),
            ],
        );
        assert_eq!(
            out,
            vec![
                InputEvent::char('a'),
                InputEvent::SwitchFrame(FrameId(3)),
                InputEvent::char('b'),
                InputEvent::char('c'),
            ]
        );
    }

    #[test]
    fn motion_only_when_tracking() {
        let motion = RawEvent::new(
            RawEventKind::MouseMotion {
                position: Position::default(),
            },
            KeyboardId(0),
            FrameId(0),
        );
        let mut dec = EventDecoder::default();
        let (out, statuses) = decode_all(&mut dec, &[motion]);
        assert!(out.is_empty());
        assert_eq!(statuses, vec![DecodeStatus::Ignored]);

        dec.set_track_mouse(true);
        let (out, _) = decode_all(&mut dec, &[motion]);
        assert_eq!(heads(&out), vec!["<mouse-movement>"]);
    }

    #[test]
    fn wheel_and_menu_and_status_events() {
        let mut dec = EventDecoder::default();
        let mut alg = ModifierAlgebra::new();
        let mut menus = MenuRegistry::new();
        menus.register(Area::MenuBar, 4, vec![Symbol::new("file"), Symbol::new("open")]);
        let mut out = Vec::new();

        let wheel = RawEvent::new(
            RawEventKind::Wheel {
                direction: WheelDirection::Down,
                position: Position::default(),
                modifiers: Modifiers::CTRL,
            },
            KeyboardId(0),
            FrameId(0),
        );
        assert_eq!(dec.decode(&wheel, &mut alg, &menus, &mut out), DecodeStatus::Input);
        let menu = RawEvent::new(
            RawEventKind::MenuSelection {
                item: 4,
                area: Area::MenuBar,
            },
            KeyboardId(0),
            FrameId(0),
        );
        assert_eq!(dec.decode(&menu, &mut alg, &menus, &mut out), DecodeStatus::Input);
        assert_eq!(heads(&out), vec!["C-<wheel-down>", "<menu-bar>"]);
        let InputEvent::Menu(m) = &out[1] else {
            panic!("expected menu event");
        };
        assert_eq!(m.path, vec![Symbol::new("file"), Symbol::new("open")]);

        let timer = RawEvent::new(RawEventKind::TimerFired { id: 9 }, KeyboardId(0), FrameId(0));
        assert_eq!(
            dec.decode(&timer, &mut alg, &menus, &mut out),
            DecodeStatus::Timer { id: 9 }
        );
        let unknown = RawEvent::new(
            RawEventKind::MenuSelection {
                item: 99,
                area: Area::ToolBar,
            },
            KeyboardId(0),
            FrameId(0),
        );
        assert_eq!(
            dec.decode(&unknown, &mut alg, &menus, &mut out),
            DecodeStatus::Ignored
        );
    }
}
