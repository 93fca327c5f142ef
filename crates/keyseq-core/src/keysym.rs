#![forbid(unsafe_code)]

//! Static device tables: window-system keysyms and xterm escape sequences.
//!
//! Only a small common set is carried. Backends with richer tables supply
//! their own remap configuration.

use std::borrow::Cow;

/// Keysym names for non-character keys (X11 numbering).
const FUNCTION_KEYSYMS: &[(u32, &str)] = &[
    (0xff08, "backspace"),
    (0xff09, "tab"),
    (0xff0a, "linefeed"),
    (0xff0b, "clear"),
    (0xff0d, "return"),
    (0xff13, "pause"),
    (0xff14, "scroll-lock"),
    (0xff1b, "escape"),
    (0xff50, "home"),
    (0xff51, "left"),
    (0xff52, "up"),
    (0xff53, "right"),
    (0xff54, "down"),
    (0xff55, "prior"),
    (0xff56, "next"),
    (0xff57, "end"),
    (0xff58, "begin"),
    (0xff60, "select"),
    (0xff61, "print"),
    (0xff62, "execute"),
    (0xff63, "insert"),
    (0xff65, "undo"),
    (0xff66, "redo"),
    (0xff67, "menu"),
    (0xff68, "find"),
    (0xff69, "cancel"),
    (0xff6a, "help"),
    (0xff6b, "break"),
    (0xff7f, "kp-numlock"),
    (0xff89, "kp-tab"),
    (0xff8d, "kp-enter"),
    (0xff95, "kp-home"),
    (0xff96, "kp-left"),
    (0xff97, "kp-up"),
    (0xff98, "kp-right"),
    (0xff99, "kp-down"),
    (0xff9a, "kp-prior"),
    (0xff9b, "kp-next"),
    (0xff9c, "kp-end"),
    (0xff9e, "kp-insert"),
    (0xff9f, "kp-delete"),
    (0xffaa, "kp-multiply"),
    (0xffab, "kp-add"),
    (0xffad, "kp-subtract"),
    (0xffae, "kp-decimal"),
    (0xffaf, "kp-divide"),
    (0xffff, "delete"),
];

const KEYSYM_F1: u32 = 0xffbe;
const KEYSYM_F35: u32 = 0xffe0;
const KEYSYM_KP_0: u32 = 0xffb0;
const KEYSYM_KP_9: u32 = 0xffb9;

/// Name of the function key with `keysym`, if known.
#[must_use]
pub fn keysym_name(keysym: u32) -> Option<Cow<'static, str>> {
    match keysym {
        KEYSYM_F1..=KEYSYM_F35 => Some(Cow::Owned(format!("f{}", keysym - KEYSYM_F1 + 1))),
        KEYSYM_KP_0..=KEYSYM_KP_9 => Some(Cow::Owned(format!("kp-{}", keysym - KEYSYM_KP_0))),
        _ => FUNCTION_KEYSYMS
            .binary_search_by_key(&keysym, |(k, _)| *k)
            .ok()
            .map(|i| Cow::Borrowed(FUNCTION_KEYSYMS[i].1)),
    }
}

/// Escape sequences an xterm sends, as `(sequence, key)` key descriptions.
///
/// These belong in the decode table: they are unambiguous device encodings.
pub const XTERM_DECODE: &[(&str, &str)] = &[
    ("ESC [ A", "<up>"),
    ("ESC [ B", "<down>"),
    ("ESC [ C", "<right>"),
    ("ESC [ D", "<left>"),
    ("ESC [ H", "<home>"),
    ("ESC [ F", "<end>"),
    ("ESC [ 2 ~", "<insert>"),
    ("ESC [ 3 ~", "<delete>"),
    ("ESC [ 5 ~", "<prior>"),
    ("ESC [ 6 ~", "<next>"),
    ("ESC [ 1 5 ~", "<f5>"),
    ("ESC [ 1 7 ~", "<f6>"),
    ("ESC [ 1 8 ~", "<f7>"),
    ("ESC [ 1 9 ~", "<f8>"),
    ("ESC [ 2 0 ~", "<f9>"),
    ("ESC [ 2 1 ~", "<f10>"),
    ("ESC [ 2 3 ~", "<f11>"),
    ("ESC [ 2 4 ~", "<f12>"),
    ("ESC [ 1 ; 2 A", "<S-up>"),
    ("ESC [ 1 ; 2 B", "<S-down>"),
    ("ESC [ 1 ; 2 C", "<S-right>"),
    ("ESC [ 1 ; 2 D", "<S-left>"),
    ("ESC [ 1 ; 3 A", "<M-up>"),
    ("ESC [ 1 ; 3 B", "<M-down>"),
    ("ESC [ 1 ; 3 C", "<M-right>"),
    ("ESC [ 1 ; 3 D", "<M-left>"),
    ("ESC [ 1 ; 5 A", "<C-up>"),
    ("ESC [ 1 ; 5 B", "<C-down>"),
    ("ESC [ 1 ; 5 C", "<C-right>"),
    ("ESC [ 1 ; 5 D", "<C-left>"),
    ("ESC [ Z", "<backtab>"),
];

/// Default function-key translations.
///
/// Application-mode keypad sequences that could also be typed by hand, and
/// symbolic keys that have an ASCII equivalent.
pub const FUNCTION_KEY_DEFAULTS: &[(&str, &str)] = &[
    ("ESC O P", "<f1>"),
    ("ESC O Q", "<f2>"),
    ("ESC O R", "<f3>"),
    ("ESC O S", "<f4>"),
    ("ESC O A", "<up>"),
    ("ESC O B", "<down>"),
    ("ESC O C", "<right>"),
    ("ESC O D", "<left>"),
    ("ESC O H", "<home>"),
    ("ESC O F", "<end>"),
    ("ESC O M", "<kp-enter>"),
    ("<backspace>", "DEL"),
    ("<tab>", "TAB"),
    ("<linefeed>", "C-j"),
    ("<clear>", "C-l"),
    ("<return>", "RET"),
    ("<escape>", "ESC"),
    ("<kp-enter>", "RET"),
    ("<S-tab>", "<backtab>"),
];
