#![forbid(unsafe_code)]

//! Modifier algebra: bit-sets, control folding, and symbol name composition.
//!
//! Modifiers reach the reader in two shapes:
//!
//! - **Characters** carry their modifiers folded into the code as high bits
//!   ([`KeyChar`]). Control is folded into the code itself where ASCII has a
//!   control form, so `C-a` is code 1 and `C-S-a` is code 1 plus the shift
//!   bit.
//! - **Symbols** carry their modifiers as a dash-joined name prefix
//!   (`C-M-f1`, `double-down-mouse-1`). [`ModifierAlgebra`] splits and
//!   composes those names, memoizing both directions.
//!
//! # Canonical order
//!
//! Composed names always spell modifiers as `A- C- H- M- S- s-`, then
//! `double- triple-`, then `up- down- drag-`. A mouse event with none of the
//! event-kind bits is a click; click has no bit and no prefix.

use std::fmt;

use ahash::AHashMap;
use bitflags::bitflags;

use crate::symbol::Symbol;

bitflags! {
    /// Modifier bits.
    ///
    /// The key modifiers occupy the bits above the 22-bit character code so
    /// they can be OR-ed into a [`KeyChar`]. The mouse event-kind modifiers
    /// occupy the low bits and only ever appear on symbols.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Modifiers: u32 {
        /// Button release.
        const UP     = 1 << 0;
        /// Button press.
        const DOWN   = 1 << 1;
        /// Release after motion.
        const DRAG   = 1 << 2;
        /// Second click in a burst.
        const DOUBLE = 1 << 4;
        /// Third or later click in a burst.
        const TRIPLE = 1 << 5;
        /// Alt key (`A-`).
        const ALT    = 1 << 22;
        /// Super key (`s-`).
        const SUPER  = 1 << 23;
        /// Hyper key (`H-`).
        const HYPER  = 1 << 24;
        /// Shift key (`S-`).
        const SHIFT  = 1 << 25;
        /// Control key (`C-`).
        const CTRL   = 1 << 26;
        /// Meta key (`M-`).
        const META   = 1 << 27;

        /// Modifiers that can be held on a keyboard.
        const KEY_MASK = Self::ALT.bits() | Self::SUPER.bits() | Self::HYPER.bits()
            | Self::SHIFT.bits() | Self::CTRL.bits() | Self::META.bits();
        /// Modifiers describing the kind of mouse event.
        const EVENT_KIND = Self::UP.bits() | Self::DOWN.bits() | Self::DRAG.bits()
            | Self::DOUBLE.bits() | Self::TRIPLE.bits();
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::empty()
    }
}

impl Modifiers {
    /// Whether these modifiers describe a click (no event-kind bit).
    #[inline]
    #[must_use]
    pub fn is_click(self) -> bool {
        !self.intersects(Self::EVENT_KIND)
    }
}

/// Mask of the character code bits in a [`KeyChar`].
pub const CHAR_CODE_MASK: u32 = 0x3F_FFFF;

/// Largest valid character code.
pub const MAX_CHAR: u32 = 0x3F_FFFF;

// ---------------------------------------------------------------------------
// KeyChar
// ---------------------------------------------------------------------------

/// A character with key modifiers folded into its high bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyChar(u32);

impl KeyChar {
    /// Build from a character code, discarding any bits above the code mask.
    #[must_use]
    pub const fn new(code: u32) -> Self {
        Self(code & CHAR_CODE_MASK)
    }

    /// Build from a Rust `char`.
    #[must_use]
    pub const fn from_char(c: char) -> Self {
        Self(c as u32)
    }

    /// Build from a raw value that already carries folded modifier bits.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & (CHAR_CODE_MASK | Modifiers::KEY_MASK.bits()))
    }

    /// The raw value, code and modifier bits together.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The character code without modifier bits.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0 & CHAR_CODE_MASK
    }

    /// The modifier bits.
    #[inline]
    #[must_use]
    pub fn modifiers(self) -> Modifiers {
        Modifiers::from_bits_truncate(self.0 & !CHAR_CODE_MASK) & Modifiers::KEY_MASK
    }

    /// Whether the value has any modifier bits.
    #[inline]
    #[must_use]
    pub fn has_modifiers(self) -> bool {
        self.0 & !CHAR_CODE_MASK != 0
    }

    /// The code as a `char` if it is a Unicode scalar value.
    #[must_use]
    pub fn to_char(self) -> Option<char> {
        char::from_u32(self.code())
    }

    /// Replace the modifier bits.
    #[must_use]
    pub fn with_modifiers(self, modifiers: Modifiers) -> Self {
        Self(self.code() | (modifiers & Modifiers::KEY_MASK).bits())
    }

    /// Add modifier bits without folding control.
    #[must_use]
    pub fn or_modifiers(self, modifiers: Modifiers) -> Self {
        Self(self.0 | (modifiers & Modifiers::KEY_MASK).bits())
    }

    /// The lower-case form of a shifted or upper-case character.
    ///
    /// An explicit shift bit is removed first; otherwise an upper-case code
    /// is downcased, keeping the other modifiers. Returns `None` when the
    /// character has no lower-case form.
    #[must_use]
    pub fn unshifted(self) -> Option<Self> {
        let mods = self.modifiers();
        if mods.contains(Modifiers::SHIFT) {
            return Some(self.with_modifiers(mods - Modifiers::SHIFT));
        }
        let c = self.to_char()?;
        if !c.is_uppercase() {
            return None;
        }
        let mut lower = c.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(l), None) if l != c => Some(Self::from_char(l).with_modifiers(mods)),
            _ => None,
        }
    }
}

impl fmt::Debug for KeyChar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_char() {
            Some(c) if !self.has_modifiers() => write!(f, "KeyChar({c:?})"),
            _ => write!(f, "KeyChar({:#x} {:?})", self.code(), self.modifiers()),
        }
    }
}

impl From<char> for KeyChar {
    fn from(c: char) -> Self {
        Self::from_char(c)
    }
}

// ---------------------------------------------------------------------------
// Control folding
// ---------------------------------------------------------------------------

/// Fold the control modifier into a character value.
///
/// ASCII characters in the `@`..`_` block map onto their control code; an
/// upper-case letter additionally keeps an explicit shift bit so that `C-a`
/// and `C-S-a` stay distinct. Lower-case letters map onto the same control
/// code without shift. Other printable characters and every non-ASCII value
/// keep an explicit control bit. Modifier bits already present on `c` are
/// preserved.
#[must_use]
pub fn make_ctrl_char(c: u32) -> u32 {
    let upper = c & !0o177;
    if c & CHAR_CODE_MASK >= 0x80 {
        return c | Modifiers::CTRL.bits();
    }

    let mut c = c & 0o177;
    if (0o100..0o140).contains(&c) {
        let oc = c;
        c &= !0o140;
        if (u32::from(b'A')..=u32::from(b'Z')).contains(&oc) {
            c |= Modifiers::SHIFT.bits();
        }
    } else if (u32::from(b'a')..=u32::from(b'z')).contains(&c) {
        c &= !0o140;
    } else if c >= u32::from(b' ') {
        c |= Modifiers::CTRL.bits();
    }

    c | (upper & !Modifiers::CTRL.bits())
}

/// Fold a raw keystroke (code plus held modifiers) into a [`KeyChar`].
///
/// Control goes through [`make_ctrl_char`]; meta, alt, hyper and super are
/// OR-ed in. Shift is dropped because the code already reflects it, except
/// on SPC, where `S-SPC` must stay distinct from `SPC`.
#[must_use]
pub fn fold_keystroke(code: u32, modifiers: Modifiers) -> KeyChar {
    let mut c = code & CHAR_CODE_MASK;
    if modifiers.contains(Modifiers::CTRL) {
        c = make_ctrl_char(c);
    }
    c |= (modifiers & (Modifiers::META | Modifiers::ALT | Modifiers::HYPER | Modifiers::SUPER))
        .bits();
    if code == u32::from(b' ') && modifiers.contains(Modifiers::SHIFT) {
        c |= Modifiers::SHIFT.bits();
    }
    KeyChar::from_raw(c)
}

// ---------------------------------------------------------------------------
// Symbol names
// ---------------------------------------------------------------------------

/// Modifier prefixes in canonical serialization order.
const CANONICAL_PREFIXES: [(Modifiers, &str); 11] = [
    (Modifiers::ALT, "A-"),
    (Modifiers::CTRL, "C-"),
    (Modifiers::HYPER, "H-"),
    (Modifiers::META, "M-"),
    (Modifiers::SHIFT, "S-"),
    (Modifiers::SUPER, "s-"),
    (Modifiers::DOUBLE, "double-"),
    (Modifiers::TRIPLE, "triple-"),
    (Modifiers::UP, "up-"),
    (Modifiers::DOWN, "down-"),
    (Modifiers::DRAG, "drag-"),
];

const WORD_MODIFIERS: [(&str, Modifiers); 5] = [
    ("drag", Modifiers::DRAG),
    ("down", Modifiers::DOWN),
    ("double", Modifiers::DOUBLE),
    ("triple", Modifiers::TRIPLE),
    ("up", Modifiers::UP),
];

fn single_letter_modifier(b: u8) -> Option<Modifiers> {
    match b {
        b'A' => Some(Modifiers::ALT),
        b'C' => Some(Modifiers::CTRL),
        b'H' => Some(Modifiers::HYPER),
        b'M' => Some(Modifiers::META),
        b'S' => Some(Modifiers::SHIFT),
        b's' => Some(Modifiers::SUPER),
        _ => None,
    }
}

/// Split a modifier-prefixed name without caching.
///
/// Returns the byte offset where the base name starts and the modifier set.
/// A prefix only counts when followed by `-` and when something remains
/// after it, so `C` and `C-` are plain names.
#[must_use]
pub fn split_modifiers(name: &str) -> (usize, Modifiers) {
    let bytes = name.as_bytes();
    let mut modifiers = Modifiers::empty();
    let mut i = 0;

    while i + 1 < bytes.len() {
        let found = single_letter_modifier(bytes[i])
            .map(|m| (i + 1, m))
            .or_else(|| {
                WORD_MODIFIERS
                    .iter()
                    .find(|(word, _)| name[i..].starts_with(word))
                    .map(|(word, m)| (i + word.len(), *m))
            });
        let Some((end, m)) = found else { break };
        if end + 1 >= bytes.len() || bytes[end] != b'-' {
            break;
        }
        modifiers |= m;
        i = end + 1;
    }

    (i, modifiers)
}

/// Compose a modifier-prefixed name without caching.
#[must_use]
pub fn compose_modifiers(modifiers: Modifiers, base: &str) -> String {
    let mut out = String::with_capacity(base.len() + 8);
    for (bit, prefix) in CANONICAL_PREFIXES {
        if modifiers.contains(bit) {
            out.push_str(prefix);
        }
    }
    out.push_str(base);
    out
}

/// Memoizing modifier parser/composer.
///
/// Owned by the single consumer; caches grow with the set of distinct key
/// names seen, which is small in practice.
#[derive(Debug, Clone, Default)]
pub struct ModifierAlgebra {
    parsed: AHashMap<Symbol, (Symbol, Modifiers)>,
    applied: AHashMap<Symbol, Vec<(Modifiers, Symbol)>>,
}

impl ModifierAlgebra {
    /// Create an empty algebra.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `symbol` into its base name and modifier set.
    pub fn parse_modifiers(&mut self, symbol: &Symbol) -> (Symbol, Modifiers) {
        if let Some(hit) = self.parsed.get(symbol) {
            return hit.clone();
        }
        let (offset, modifiers) = split_modifiers(symbol.as_str());
        let base = if offset == 0 {
            symbol.clone()
        } else {
            Symbol::new(&symbol.as_str()[offset..])
        };
        self.parsed
            .insert(symbol.clone(), (base.clone(), modifiers));
        (base, modifiers)
    }

    /// Compose `modifiers` onto `base`.
    ///
    /// `base` may itself carry modifiers; they are merged with `modifiers`
    /// and the result is spelled in canonical order.
    pub fn apply_modifiers(&mut self, modifiers: Modifiers, base: &Symbol) -> Symbol {
        let (base, existing) = self.parse_modifiers(base);
        let modifiers = modifiers | existing;
        if modifiers.is_empty() {
            return base;
        }

        let entries = self.applied.entry(base.clone()).or_default();
        if let Some((_, hit)) = entries.iter().find(|(m, _)| *m == modifiers) {
            return hit.clone();
        }
        let composed = Symbol::from(compose_modifiers(modifiers, base.as_str()));
        entries.push((modifiers, composed.clone()));
        self.parsed
            .insert(composed.clone(), (base, modifiers));
        composed
    }

    /// Respell `symbol` with its modifiers in canonical order.
    pub fn canonicalize(&mut self, symbol: &Symbol) -> Symbol {
        let (base, modifiers) = self.parse_modifiers(symbol);
        self.apply_modifiers(modifiers, &base)
    }

    /// Replace the modifiers of `symbol` with `modifiers`.
    pub fn with_modifiers(&mut self, symbol: &Symbol, modifiers: Modifiers) -> Symbol {
        let (base, _) = self.parse_modifiers(symbol);
        self.apply_modifiers(modifiers, &base)
    }

    /// Number of memoized parse entries.
    #[must_use]
    pub fn cached_symbols(&self) -> usize {
        self.parsed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_letter_folding() {
        assert_eq!(make_ctrl_char(u32::from(b'a')), 1);
        assert_eq!(
            make_ctrl_char(u32::from(b'A')),
            1 | Modifiers::SHIFT.bits()
        );
        assert_eq!(make_ctrl_char(u32::from(b'@')), 0);
        assert_eq!(make_ctrl_char(u32::from(b'[')), 27);
        assert_eq!(make_ctrl_char(u32::from(b'?')), u32::from(b'?') | Modifiers::CTRL.bits());
    }

    #[test]
    fn ctrl_keeps_other_modifiers() {
        let meta_a = u32::from(b'a') | Modifiers::META.bits();
        assert_eq!(make_ctrl_char(meta_a), 1 | Modifiers::META.bits());
        let ctrl_x = u32::from(b'x') | Modifiers::CTRL.bits();
        assert_eq!(make_ctrl_char(ctrl_x), 24);
        assert_eq!(make_ctrl_char(0xE9), 0xE9 | Modifiers::CTRL.bits());
    }

    #[test]
    fn fold_keystroke_meta_ctrl() {
        let k = fold_keystroke(u32::from(b'x'), Modifiers::CTRL | Modifiers::META);
        assert_eq!(k.code(), 24);
        assert_eq!(k.modifiers(), Modifiers::META);
    }

    #[test]
    fn fold_keystroke_shift_only_kept_on_space() {
        let a = fold_keystroke(u32::from(b'A'), Modifiers::SHIFT);
        assert_eq!(a, KeyChar::from_char('A'));
        let spc = fold_keystroke(u32::from(b' '), Modifiers::SHIFT);
        assert_eq!(spc.modifiers(), Modifiers::SHIFT);
    }

    #[test]
    fn unshifted_forms() {
        assert_eq!(
            KeyChar::from_char('A').unshifted(),
            Some(KeyChar::from_char('a'))
        );
        let c_s_a = KeyChar::from_raw(1 | Modifiers::SHIFT.bits());
        assert_eq!(c_s_a.unshifted(), Some(KeyChar::new(1)));
        assert_eq!(KeyChar::from_char('a').unshifted(), None);
        assert_eq!(KeyChar::from_char('1').unshifted(), None);
        let m_a = KeyChar::from_char('A').or_modifiers(Modifiers::META);
        assert_eq!(
            m_a.unshifted(),
            Some(KeyChar::from_char('a').with_modifiers(Modifiers::META))
        );
    }

    #[test]
    fn split_requires_dash_and_remainder() {
        assert_eq!(split_modifiers("C"), (0, Modifiers::empty()));
        assert_eq!(split_modifiers("C-"), (0, Modifiers::empty()));
        assert_eq!(split_modifiers("Cx"), (0, Modifiers::empty()));
        assert_eq!(split_modifiers("C-x"), (2, Modifiers::CTRL));
        assert_eq!(split_modifiers("up"), (0, Modifiers::empty()));
        assert_eq!(
            split_modifiers("double-down-mouse-1"),
            (12, Modifiers::DOUBLE | Modifiers::DOWN)
        );
        // "mouse" is not a modifier word, parsing stops there.
        assert_eq!(split_modifiers("mouse-1"), (0, Modifiers::empty()));
    }

    #[test]
    fn compose_is_canonical() {
        let mut alg = ModifierAlgebra::new();
        let sym = alg.apply_modifiers(
            Modifiers::DRAG | Modifiers::META | Modifiers::CTRL,
            &Symbol::new("mouse-1"),
        );
        assert_eq!(sym, "C-M-drag-mouse-1");
        let canon = alg.canonicalize(&Symbol::new("M-C-f1"));
        assert_eq!(canon, "C-M-f1");
    }

    #[test]
    fn apply_merges_existing_prefix() {
        let mut alg = ModifierAlgebra::new();
        let sym = alg.apply_modifiers(Modifiers::META, &Symbol::new("C-home"));
        assert_eq!(sym, "C-M-home");
    }

    #[test]
    fn apply_is_memoized_per_base() {
        let mut alg = ModifierAlgebra::new();
        let base = Symbol::new("f5");
        let a = alg.apply_modifiers(Modifiers::SHIFT, &base);
        let b = alg.apply_modifiers(Modifiers::SHIFT, &base);
        assert!(a.ptr_eq(&b));
        let (parsed_base, mods) = alg.parse_modifiers(&a);
        assert_eq!(parsed_base, base);
        assert_eq!(mods, Modifiers::SHIFT);
    }

    #[test]
    fn empty_modifiers_return_base() {
        let mut alg = ModifierAlgebra::new();
        let base = Symbol::new("prior");
        assert!(alg.apply_modifiers(Modifiers::empty(), &base).ptr_eq(&base));
    }
}
