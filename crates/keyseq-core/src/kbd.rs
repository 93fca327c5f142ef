#![forbid(unsafe_code)]

//! Key descriptions: parsing `"C-x <f1> M-RET"` and printing keys back.
//!
//! # Syntax
//!
//! Words are separated by whitespace. Each word is:
//!
//! - a named key: `NUL RET LFD TAB ESC SPC DEL`;
//! - a symbol in angle brackets: `<f1>`, `<down-mouse-1>`, `<C-home>`;
//! - a single character;
//! - any of the above preceded by modifier prefixes `A- C- H- M- S- s-`;
//! - a bare multi-character word without modifiers, read as one key per
//!   character (`abc` is `a b c`).
//!
//! Control on an ASCII character folds into the code (`C-a` is 1, `C-?`
//! is DEL); every other modifier becomes a bit. Symbols are respelled with
//! their modifiers in canonical order.

use crate::event::{InputEvent, Key, SWITCH_FRAME};
use crate::keymap::KeymapError;
use crate::modifiers::{
    KeyChar, Modifiers, compose_modifiers, make_ctrl_char, split_modifiers,
};
use crate::symbol::Symbol;

/// Errors from [`parse_keys`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KbdError {
    #[error("empty key description")]
    Empty,
    #[error("unterminated `<` in key description word {word:?}")]
    Unterminated { word: String },
    #[error(transparent)]
    Keymap(#[from] KeymapError),
}

const NAMED_KEYS: [(&str, u32); 7] = [
    ("NUL", 0),
    ("RET", 13),
    ("LFD", 10),
    ("TAB", 9),
    ("ESC", 27),
    ("SPC", 32),
    ("DEL", 127),
];

fn named_key(word: &str) -> Option<u32> {
    NAMED_KEYS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, code)| *code)
}

/// Split leading `X-` key modifiers off a word.
fn take_key_modifiers(word: &str) -> (Modifiers, &str) {
    let mut mods = Modifiers::empty();
    let mut rest = word;
    loop {
        let b = rest.as_bytes();
        if b.len() < 3 || b[1] != b'-' {
            break;
        }
        let m = match b[0] {
            b'A' => Modifiers::ALT,
            b'C' => Modifiers::CTRL,
            b'H' => Modifiers::HYPER,
            b'M' => Modifiers::META,
            b'S' => Modifiers::SHIFT,
            b's' => Modifiers::SUPER,
            _ => break,
        };
        mods |= m;
        rest = &rest[2..];
    }
    (mods, rest)
}

/// Apply key modifiers to a character code, folding control.
#[must_use]
pub fn char_with_modifiers(code: u32, mods: Modifiers) -> KeyChar {
    let mut c = code;
    if mods.contains(Modifiers::CTRL) {
        c = if code == u32::from(b'?') {
            127
        } else {
            make_ctrl_char(code)
        };
    }
    let rest = mods & !Modifiers::CTRL;
    KeyChar::from_raw(c | rest.bits())
}

fn parse_word(word: &str, out: &mut Vec<Key>) -> Result<(), KbdError> {
    if word.starts_with('<') && word.len() > 2 {
        if !word.ends_with('>') {
            return Err(KbdError::Unterminated { word: word.into() });
        }
        out.push(Key::Symbol(canonical_symbol(
            Modifiers::empty(),
            &word[1..word.len() - 1],
        )));
        return Ok(());
    }

    let (mods, base) = take_key_modifiers(word);

    if let Some(code) = named_key(base) {
        out.push(Key::Char(char_with_modifiers(code, mods)));
    } else if base.starts_with('<') && base.len() > 2 {
        if !base.ends_with('>') {
            return Err(KbdError::Unterminated { word: word.into() });
        }
        out.push(Key::Symbol(canonical_symbol(mods, &base[1..base.len() - 1])));
    } else {
        let mut chars = base.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => out.push(Key::Char(char_with_modifiers(c as u32, mods))),
            _ if mods.is_empty() => out.extend(base.chars().map(Key::char)),
            _ => out.push(Key::Symbol(canonical_symbol(mods, base))),
        }
    }
    Ok(())
}

fn canonical_symbol(extra: Modifiers, name: &str) -> Symbol {
    let (offset, mods) = split_modifiers(name);
    Symbol::from(compose_modifiers(mods | extra, &name[offset..]))
}

/// Parse a key description into lookup keys.
///
/// # Errors
///
/// Fails on an empty description or an unterminated `<`.
pub fn parse_keys(description: &str) -> Result<Vec<Key>, KbdError> {
    let mut out = Vec::new();
    for word in description.split_whitespace() {
        parse_word(word, &mut out)?;
    }
    if out.is_empty() {
        return Err(KbdError::Empty);
    }
    Ok(out)
}

/// Parse a key description into events.
///
/// # Errors
///
/// See [`parse_keys`].
pub fn parse_events(description: &str) -> Result<Vec<InputEvent>, KbdError> {
    Ok(parse_keys(description)?
        .into_iter()
        .map(InputEvent::from)
        .collect())
}

// ---------------------------------------------------------------------------
// Describing
// ---------------------------------------------------------------------------

fn push_key_modifiers(out: &mut String, mods: Modifiers) {
    for (bit, prefix) in [
        (Modifiers::ALT, "A-"),
        (Modifiers::CTRL, "C-"),
        (Modifiers::HYPER, "H-"),
        (Modifiers::META, "M-"),
        (Modifiers::SHIFT, "S-"),
        (Modifiers::SUPER, "s-"),
    ] {
        if mods.contains(bit) {
            out.push_str(prefix);
        }
    }
}

fn describe_char(c: KeyChar) -> String {
    let code = c.code();
    // Control codes other than ESC, TAB and RET print as C-<letter>.
    let control_code = code < 32 && !matches!(code, 9 | 13 | 27);
    let mut mods = c.modifiers();
    if control_code {
        mods |= Modifiers::CTRL;
    }

    let mut out = String::new();
    push_key_modifiers(&mut out, mods);
    match code {
        9 => out.push_str("TAB"),
        13 => out.push_str("RET"),
        27 => out.push_str("ESC"),
        1..=26 => out.push(char::from(b'a' + (code - 1) as u8)),
        0..=31 => out.push(char::from(code as u8 + 0o100)),
        32 => out.push_str("SPC"),
        127 => out.push_str("DEL"),
        _ => match char::from_u32(code) {
            Some(ch) => out.push(ch),
            None => out.push_str(&format!("\\x{code:x}")),
        },
    }
    out
}

fn describe_symbol(sym: &Symbol) -> String {
    let (offset, mods) = split_modifiers(sym.as_str());
    let mut out = String::new();
    push_key_modifiers(&mut out, mods & Modifiers::KEY_MASK);
    out.push('<');
    out.push_str(&compose_modifiers(
        mods & Modifiers::EVENT_KIND,
        &sym.as_str()[offset..],
    ));
    out.push('>');
    out
}

/// Describe one lookup key.
#[must_use]
pub fn describe_key(key: &Key) -> String {
    match key {
        Key::Char(c) => describe_char(*c),
        Key::Symbol(s) => describe_symbol(s),
    }
}

/// Describe a key sequence, words separated by spaces.
#[must_use]
pub fn describe_keys(keys: &[Key]) -> String {
    keys.iter().map(describe_key).collect::<Vec<_>>().join(" ")
}

/// Describe one event by its lookup head.
#[must_use]
pub fn describe_event(event: &InputEvent) -> String {
    match event {
        InputEvent::SwitchFrame(_) => format!("<{SWITCH_FRAME}>"),
        other => describe_key(&other.head_key()),
    }
}

/// Describe an event sequence.
#[must_use]
pub fn describe_events(events: &[InputEvent]) -> String {
    events
        .iter()
        .map(describe_event)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_control_and_meta() {
        let keys = parse_keys("C-x M-f C-M-a").unwrap();
        assert_eq!(keys[0], Key::Char(KeyChar::new(24)));
        assert_eq!(
            keys[1],
            Key::Char(KeyChar::from_char('f').with_modifiers(Modifiers::META))
        );
        assert_eq!(
            keys[2],
            Key::Char(KeyChar::new(1).with_modifiers(Modifiers::META))
        );
    }

    #[test]
    fn parses_named_keys_and_symbols() {
        let keys = parse_keys("ESC O P <f1> <C-M-home> M-<f2> C-?").unwrap();
        assert_eq!(keys[0], Key::Char(KeyChar::new(27)));
        assert_eq!(keys[1], Key::char('O'));
        assert_eq!(keys[3], Key::symbol("f1"));
        assert_eq!(keys[4], Key::symbol("C-M-home"));
        assert_eq!(keys[5], Key::symbol("M-f2"));
        assert_eq!(keys[6], Key::Char(KeyChar::new(127)));
    }

    #[test]
    fn canonicalizes_symbol_modifier_order() {
        assert_eq!(parse_keys("<M-C-f1>").unwrap(), vec![Key::symbol("C-M-f1")]);
        assert_eq!(parse_keys("C-<M-f1>").unwrap(), vec![Key::symbol("C-M-f1")]);
    }

    #[test]
    fn bare_words_are_char_sequences() {
        assert_eq!(
            parse_keys("abc").unwrap(),
            vec![Key::char('a'), Key::char('b'), Key::char('c')]
        );
    }

    #[test]
    fn shift_letter_keeps_bit() {
        assert_eq!(
            parse_keys("S-a").unwrap(),
            vec![Key::Char(KeyChar::from_char('a').with_modifiers(Modifiers::SHIFT))]
        );
        assert_eq!(
            parse_keys("C-S-a").unwrap(),
            vec![Key::Char(KeyChar::new(1).with_modifiers(Modifiers::SHIFT))]
        );
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_keys("   "), Err(KbdError::Empty));
        assert!(matches!(parse_keys("<f1"), Err(KbdError::Unterminated { .. })));
        // Too short to carry a modifier, so it is two plain characters.
        assert_eq!(parse_keys("C-").unwrap(), vec![Key::char('C'), Key::char('-')]);
    }

    #[test]
    fn describe_round_trips() {
        for desc in [
            "C-x 4 <f1> M-RET",
            "C-M-a SPC DEL ESC TAB",
            "C-@ C-z",
            "<mode-line> <down-mouse-1>",
            "C-<double-mouse-2> s-x",
        ] {
            let keys = parse_keys(desc).unwrap();
            assert_eq!(describe_keys(&keys), desc, "round trip of {desc:?}");
        }
    }

    #[test]
    fn describe_switch_frame() {
        let events = vec![
            InputEvent::SwitchFrame(crate::event::FrameId(2)),
            InputEvent::char('x'),
        ];
        assert_eq!(describe_events(&events), "<switch-frame> x");
    }
}
