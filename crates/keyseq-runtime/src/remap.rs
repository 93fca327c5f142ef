#![forbid(unsafe_code)]

//! The three remap layers and the key buffer they rewrite.
//!
//! # Design
//!
//! Each layer is a keymap whose bindings are replacement sequences. A
//! [`RemapCursor`] walks the key buffer with a `[start, end)` window: `end`
//! advances one key per [`step`](RemapCursor::step) while the window's keys
//! form a prefix in the table; when they match a replacement (and the caller
//! allows it) the window is spliced out of the buffer, the replacement is
//! spliced in, and the cursor moves past it. A key that continues no entry
//! slides `start` forward by one.
//!
//! Layers run in a fixed order, each over the keys its predecessor has
//! settled:
//!
//! ```text
//!   keybuf:  [ .... keytran .... | .... fkey .... | .... indec .... | t
//!                 translation       function-key        decode
//! ```
//!
//! so `keytran.end <= fkey.start` and `fkey.end <= indec.start` hold between
//! steps. A splice changes the buffer under every cursor to its right; the
//! reader adjusts those and replays the whole sequence from index 0.
//!
//! # Tables
//!
//! Decode and function-key tables belong to a keyboard, the translation
//! table is shared. An absent table is an empty keymap.

use std::fmt;
use std::ops::Range;

use keyseq_core::event::InputEvent;
use keyseq_core::kbd;
use keyseq_core::keymap::{Binding, Keymap, RemapRequest};
use keyseq_core::keysym::{FUNCTION_KEY_DEFAULTS, XTERM_DECODE};
use tracing::{trace, warn};

use crate::config::{ConfigError, RemapTableConfig};
use crate::error::ReadError;

// ---------------------------------------------------------------------------
// Key buffer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct KeySlot {
    event: InputEvent,
    /// A pseudo prefix key was already inserted in front of this event.
    prefixed: bool,
}

/// The events of the sequence being read.
///
/// Positions below the reader's index have been consumed; positions at or
/// above it are mock input waiting to be re-read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyBuffer {
    slots: Vec<KeySlot>,
}

impl KeyBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The event at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&InputEvent> {
        self.slots.get(index).map(|s| &s.event)
    }

    /// Copy of the events in `range`.
    #[must_use]
    pub fn events_in(&self, range: Range<usize>) -> Vec<InputEvent> {
        self.slots[range].iter().map(|s| s.event.clone()).collect()
    }

    /// Copy of every event.
    #[must_use]
    pub fn to_events(&self) -> Vec<InputEvent> {
        self.events_in(0..self.len())
    }

    pub(crate) fn push(&mut self, event: InputEvent) {
        self.slots.push(KeySlot {
            event,
            prefixed: false,
        });
    }

    /// Replace the event at `index`, keeping its prefix mark.
    pub(crate) fn set(&mut self, index: usize, event: InputEvent) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.event = event;
        }
    }

    /// Store `event` at `index`, appending when `index` is the end.
    pub(crate) fn put(&mut self, index: usize, event: InputEvent) {
        if index < self.len() {
            self.set(index, event);
        } else {
            self.push(event);
        }
    }

    pub(crate) fn is_prefixed(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| s.prefixed)
    }

    /// Put `prefix` in front of the event at `index` (or of `event`, when
    /// `index` is the end) and mark the event prefixed.
    pub(crate) fn insert_prefix(&mut self, index: usize, prefix: InputEvent, event: InputEvent) {
        self.put(index, event);
        self.slots[index].prefixed = true;
        self.slots.insert(
            index,
            KeySlot {
                event: prefix,
                prefixed: false,
            },
        );
    }

    /// Replace `range` with `replacement`.
    pub(crate) fn splice(&mut self, range: Range<usize>, replacement: Vec<InputEvent>) {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.slots.splice(
            start..end,
            replacement.into_iter().map(|event| KeySlot {
                event,
                prefixed: false,
            }),
        );
    }

    /// Remove `range`, clamped to the buffer.
    pub(crate) fn remove(&mut self, range: Range<usize>) {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.slots.drain(start..end);
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

impl From<Vec<InputEvent>> for KeyBuffer {
    fn from(events: Vec<InputEvent>) -> Self {
        let mut buf = Self::new();
        for ev in events {
            buf.push(ev);
        }
        buf
    }
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// Which remap table a cursor walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemapLayer {
    /// Device encodings, applied unconditionally and first.
    Decode,
    /// Applied only where the sequence so far is unbound.
    FunctionKey,
    /// User translations, applied unconditionally and last.
    Translation,
}

impl RemapLayer {
    /// Conventional name of the layer's table.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Decode => "input-decode-map",
            Self::FunctionKey => "function-key-map",
            Self::Translation => "key-translation-map",
        }
    }
}

impl fmt::Display for RemapLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A scan position in one remap layer.
#[derive(Debug, Clone)]
pub struct RemapCursor {
    layer: RemapLayer,
    root: Keymap,
    map: Keymap,
    /// First key of the window being matched.
    pub start: usize,
    /// One past the last key of the window.
    pub end: usize,
}

impl RemapCursor {
    /// A cursor at index 0 of `table`.
    #[must_use]
    pub fn new(layer: RemapLayer, table: Keymap) -> Self {
        Self {
            layer,
            map: table.clone(),
            root: table,
            start: 0,
            end: 0,
        }
    }

    #[must_use]
    pub fn layer(&self) -> RemapLayer {
        self.layer
    }

    /// Collapse the window onto `at` and forget any partial match.
    pub fn reset_at(&mut self, at: usize) {
        self.start = at;
        self.end = at;
        self.map = self.root.clone();
    }

    /// Move the window by `delta` after a splice to its left.
    pub fn shift(&mut self, delta: isize) {
        self.start = self.start.saturating_add_signed(delta);
        self.end = self.end.saturating_add_signed(delta);
    }

    /// Move the window back by `n` after keys in front of it were dropped.
    pub(crate) fn drop_front(&mut self, n: usize) {
        let at = self.start.saturating_sub(n);
        self.reset_at(at);
    }

    /// Extend the window by one key and act on what it matches.
    ///
    /// Returns the length change of the buffer when a replacement was
    /// spliced in. `doit` permits the splice; without it a complete match
    /// only slides the window. Function bindings are called only when
    /// `doit` holds.
    ///
    /// # Errors
    ///
    /// [`ReadError::InvalidRemapResult`] when a function returns anything
    /// but nothing, keys, or text; [`ReadError::SequenceTooLong`] when the
    /// replacement would grow the buffer to `max_len`.
    pub fn step(
        &mut self,
        keybuf: &mut KeyBuffer,
        doit: bool,
        max_len: usize,
        prompt: Option<&str>,
    ) -> Result<Option<isize>, ReadError> {
        let Some(key) = keybuf.get(self.end).map(InputEvent::head_key) else {
            return Ok(None);
        };
        self.end += 1;
        let mut next = self.map.lookup_key(&key);

        if doit && let Some(Binding::Function(f)) = next.clone() {
            let matched = keybuf.events_in(self.start..self.end);
            let request = RemapRequest {
                prompt,
                matched: &matched,
            };
            next = match f.call(&request) {
                None => None,
                Some(b @ (Binding::Keys(_) | Binding::Text(_))) => Some(b),
                Some(_) => {
                    warn!(layer = %self.layer, function = %f.name(), "invalid remap result");
                    return Err(ReadError::InvalidRemapResult {
                        layer: self.layer,
                        function: f.name().clone(),
                    });
                }
            };
        }

        if doit && let Some(replacement) = next.as_ref().and_then(Binding::replacement) {
            let delta = replacement.len() as isize - (self.end - self.start) as isize;
            if keybuf.len() as isize + delta >= max_len as isize {
                return Err(ReadError::SequenceTooLong { limit: max_len });
            }
            trace!(
                layer = %self.layer,
                start = self.start,
                end = self.end,
                delta,
                "remap splice"
            );
            keybuf.splice(self.start..self.end, replacement);
            let at = self.end.saturating_add_signed(delta);
            self.reset_at(at);
            return Ok(Some(delta));
        }

        match next {
            Some(Binding::Prefix(sub)) => self.map = sub,
            _ => {
                let at = self.start + 1;
                self.reset_at(at);
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// The keymaps behind the three layers.
#[derive(Debug, Clone, Default)]
pub struct RemapTables {
    pub decode: Keymap,
    pub function_key: Keymap,
    pub translation: Keymap,
}

impl RemapTables {
    /// Empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The xterm decode set and default function-key translations.
    #[must_use]
    pub fn xterm() -> Self {
        let mut tables = Self {
            decode: Keymap::named(RemapLayer::Decode.table_name()),
            function_key: Keymap::named(RemapLayer::FunctionKey.table_name()),
            translation: Keymap::named(RemapLayer::Translation.table_name()),
        };
        for (from, to) in XTERM_DECODE {
            if let Err(err) = define_entry(&mut tables.decode, from, to) {
                warn!(%err, "bad builtin decode entry");
            }
        }
        for (from, to) in FUNCTION_KEY_DEFAULTS {
            if let Err(err) = define_entry(&mut tables.function_key, from, to) {
                warn!(%err, "bad builtin function-key entry");
            }
        }
        tables
    }

    /// Build tables from key-description pairs.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Keys`] naming the first entry that does not parse.
    pub fn from_config(config: &RemapTableConfig) -> Result<Self, ConfigError> {
        let mut tables = if config.xterm_defaults {
            Self::xterm()
        } else {
            Self::new()
        };
        for (from, to) in &config.decode {
            define_entry(&mut tables.decode, from, to)?;
        }
        for (from, to) in &config.function_key {
            define_entry(&mut tables.function_key, from, to)?;
        }
        for (from, to) in &config.translation {
            define_entry(&mut tables.translation, from, to)?;
        }
        Ok(tables)
    }

    /// Fresh cursors at index 0 over each table.
    #[must_use]
    pub fn cursors(&self) -> [RemapCursor; 3] {
        [
            RemapCursor::new(RemapLayer::Decode, self.decode.clone()),
            RemapCursor::new(RemapLayer::FunctionKey, self.function_key.clone()),
            RemapCursor::new(RemapLayer::Translation, self.translation.clone()),
        ]
    }
}

fn define_entry(map: &mut Keymap, from: &str, to: &str) -> Result<(), ConfigError> {
    let wrap = |source| ConfigError::Keys {
        entry: format!("{from} => {to}"),
        source,
    };
    let keys = kbd::parse_keys(from).map_err(wrap)?;
    let replacement = kbd::parse_events(to).map_err(wrap)?;
    map.define_key(&keys, Binding::Keys(replacement))
        .map_err(|e| wrap(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyseq_core::keymap::RemapFunction;

    fn events(desc: &str) -> Vec<InputEvent> {
        kbd::parse_events(desc).unwrap()
    }

    fn table(pairs: &[(&str, &str)]) -> Keymap {
        let mut map = Keymap::new();
        for (from, to) in pairs {
            define_entry(&mut map, from, to).unwrap();
        }
        map
    }

    fn run(cursor: &mut RemapCursor, buf: &mut KeyBuffer, t: usize) -> Option<isize> {
        while cursor.end < t {
            if let Some(delta) = cursor.step(buf, true, 30, None).unwrap() {
                return Some(delta);
            }
        }
        None
    }

    #[test]
    fn splice_replaces_matched_window() {
        let mut cursor = RemapCursor::new(
            RemapLayer::Decode,
            table(&[("ESC [ A", "<up>")]),
        );
        let mut buf = KeyBuffer::from(events("x ESC [ A y"));
        let delta = run(&mut cursor, &mut buf, 4);
        assert_eq!(delta, Some(-2));
        assert_eq!(buf.to_events(), events("x <up> y"));
        assert_eq!((cursor.start, cursor.end), (2, 2));
    }

    #[test]
    fn unmatched_keys_slide_the_window() {
        let mut cursor = RemapCursor::new(
            RemapLayer::Decode,
            table(&[("ESC [ A", "<up>")]),
        );
        let mut buf = KeyBuffer::from(events("ESC [ B"));
        assert_eq!(run(&mut cursor, &mut buf, 3), None);
        // B breaks the ESC [ prefix; every later start fails at once.
        assert_eq!((cursor.start, cursor.end), (3, 3));
        assert_eq!(buf.to_events(), events("ESC [ B"));
    }

    #[test]
    fn partial_match_waits_for_more_keys() {
        let mut cursor = RemapCursor::new(
            RemapLayer::Decode,
            table(&[("ESC [ A", "<up>")]),
        );
        let mut buf = KeyBuffer::from(events("ESC ["));
        assert_eq!(run(&mut cursor, &mut buf, 2), None);
        assert_eq!((cursor.start, cursor.end), (0, 2));
    }

    #[test]
    fn without_doit_a_match_only_slides() {
        let mut cursor = RemapCursor::new(
            RemapLayer::FunctionKey,
            table(&[("<f1>", "C-h")]),
        );
        let mut buf = KeyBuffer::from(events("<f1>"));
        assert_eq!(cursor.step(&mut buf, false, 30, None).unwrap(), None);
        assert_eq!((cursor.start, cursor.end), (1, 1));
        assert_eq!(buf.to_events(), events("<f1>"));
    }

    #[test]
    fn growing_splice_respects_the_limit() {
        let mut cursor = RemapCursor::new(
            RemapLayer::Translation,
            table(&[("a", "b c d e")]),
        );
        let mut buf = KeyBuffer::from(events("a"));
        let err = cursor.step(&mut buf, true, 4, None).unwrap_err();
        assert_eq!(err, ReadError::SequenceTooLong { limit: 4 });
        let mut cursor = RemapCursor::new(
            RemapLayer::Translation,
            table(&[("a", "b c d e")]),
        );
        assert_eq!(cursor.step(&mut buf, true, 5, None).unwrap(), Some(3));
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn function_bindings_are_validated() {
        let mut map = Keymap::new();
        map.bind(
            "<f9>",
            Binding::Function(RemapFunction::new("bad", |_| Some(Binding::command("oops")))),
        )
        .unwrap();
        map.bind(
            "<f8>",
            Binding::Function(RemapFunction::new("good", |req| {
                assert_eq!(req.prompt, Some("? "));
                Some(Binding::Text(format!("{}", req.matched.len())))
            })),
        )
        .unwrap();
        map.bind(
            "<f7>",
            Binding::Function(RemapFunction::new("none", |_| None)),
        )
        .unwrap();

        let mut cursor = RemapCursor::new(RemapLayer::Translation, map.clone());
        let mut buf = KeyBuffer::from(events("<f9>"));
        assert_eq!(
            cursor.step(&mut buf, true, 30, None),
            Err(ReadError::InvalidRemapResult {
                layer: RemapLayer::Translation,
                function: keyseq_core::symbol::Symbol::new("bad"),
            })
        );

        let mut cursor = RemapCursor::new(RemapLayer::Translation, map.clone());
        let mut buf = KeyBuffer::from(events("<f8>"));
        assert_eq!(cursor.step(&mut buf, true, 30, Some("? ")).unwrap(), Some(0));
        assert_eq!(buf.to_events(), events("1"));

        let mut cursor = RemapCursor::new(RemapLayer::Translation, map);
        let mut buf = KeyBuffer::from(events("<f7>"));
        assert_eq!(cursor.step(&mut buf, true, 30, None).unwrap(), None);
        assert_eq!(cursor.start, 1);
    }

    #[test]
    fn prefix_marks_survive_set_and_shift_with_splices() {
        let mut buf = KeyBuffer::from(events("a b"));
        buf.insert_prefix(1, InputEvent::symbol("mode-line"), InputEvent::char('b'));
        assert_eq!(buf.to_events(), events("a <mode-line> b"));
        assert!(buf.is_prefixed(2));
        buf.set(2, InputEvent::char('c'));
        assert!(buf.is_prefixed(2));
        buf.splice(0..1, events("x y"));
        assert!(buf.is_prefixed(3));
        buf.remove(1..10);
        assert_eq!(buf.to_events(), events("x"));
    }

    #[test]
    fn xterm_tables_parse_completely() {
        let tables = RemapTables::xterm();
        assert!(tables.translation.is_empty());
        for (from, to) in XTERM_DECODE {
            let keys = kbd::parse_keys(from).unwrap();
            assert_eq!(
                tables.decode.lookup(&keys),
                Some(Binding::Keys(events(to))),
                "{from}"
            );
        }
        for (from, to) in FUNCTION_KEY_DEFAULTS {
            let keys = kbd::parse_keys(from).unwrap();
            assert_eq!(
                tables.function_key.lookup(&keys),
                Some(Binding::Keys(events(to))),
                "{from}"
            );
        }
    }

    #[test]
    fn config_tables_report_bad_entries() {
        let config = RemapTableConfig::default().with_translation("C-c <f5", "x");
        match RemapTables::from_config(&config) {
            Err(ConfigError::Keys { entry, .. }) => assert_eq!(entry, "C-c <f5 => x"),
            other => panic!("expected key error, got {other:?}"),
        }
        let config = RemapTableConfig::xterm().with_translation("<f5>", "C-c r");
        let tables = RemapTables::from_config(&config).unwrap();
        assert!(!tables.decode.is_empty());
        assert_eq!(
            tables.translation.lookup(&kbd::parse_keys("<f5>").unwrap()),
            Some(Binding::Keys(events("C-c r")))
        );
    }
}
