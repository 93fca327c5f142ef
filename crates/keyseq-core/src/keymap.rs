#![forbid(unsafe_code)]

//! Keymaps: prefix-capable maps from keys to bindings.
//!
//! # Design
//!
//! A [`Keymap`] is a cheaply cloneable value (`Arc` inside) with
//! copy-on-write mutation. A keymap may have parents; a key unbound in the
//! map itself is looked up in each parent in order. A list of keymaps can be
//! *composed* into one keymap whose lookup consults each member in order.
//!
//! # Composition rule
//!
//! Looking `key` up across several maps collects every prefix binding found
//! until the first non-prefix binding. If any prefix maps were collected the
//! result is a prefix whose map composes them, so `C-x` bound as a prefix in
//! both a mode map and the global map continues into both. Otherwise the
//! first non-prefix binding wins and shadows the rest.
//!
//! # Meta characters
//!
//! A meta character is stored as ESC followed by the plain character, and
//! looked up the same way, so `M-x` and `ESC x` always agree.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::event::{InputEvent, Key};
use crate::kbd;
use crate::modifiers::{KeyChar, Modifiers};
use crate::symbol::Symbol;

/// Prefix character standing in for the meta modifier.
pub const META_PREFIX_CHAR: u32 = 27;

fn meta_base(key: &Key) -> Option<Key> {
    match key {
        Key::Char(c) if c.modifiers().contains(Modifiers::META) => {
            Some(Key::Char(c.with_modifiers(c.modifiers() - Modifiers::META)))
        }
        _ => None,
    }
}

fn meta_prefix() -> Key {
    Key::Char(KeyChar::new(META_PREFIX_CHAR))
}

/// Spell meta characters as ESC plus the plain character.
fn expand_meta(keys: &[Key]) -> Vec<Key> {
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        match meta_base(key) {
            Some(base) => {
                out.push(meta_prefix());
                out.push(base);
            }
            None => out.push(key.clone()),
        }
    }
    out
}

/// Head symbol of command remapping entries: `[remap CMD]`.
pub const REMAP_PREFIX: &str = "remap";

/// Argument passed to a remap function.
#[derive(Debug, Clone, Copy)]
pub struct RemapRequest<'a> {
    /// Prompt of the current read, if any.
    pub prompt: Option<&'a str>,
    /// The keys matched so far by the remap layer.
    pub matched: &'a [InputEvent],
}

type RemapFn = dyn Fn(&RemapRequest<'_>) -> Option<Binding> + Send + Sync;

/// A named user function producing a replacement sequence on demand.
#[derive(Clone)]
pub struct RemapFunction {
    name: Symbol,
    f: Arc<RemapFn>,
}

impl RemapFunction {
    /// Wrap `f` under `name`.
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&RemapRequest<'_>) -> Option<Binding> + Send + Sync + 'static,
    {
        Self {
            name: Symbol::new(name),
            f: Arc::new(f),
        }
    }

    /// The function's name, used in error reports.
    #[must_use]
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Invoke the function.
    #[must_use]
    pub fn call(&self, request: &RemapRequest<'_>) -> Option<Binding> {
        (self.f)(request)
    }
}

impl fmt::Debug for RemapFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemapFunction({})", self.name)
    }
}

impl PartialEq for RemapFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.f, &other.f)
    }
}

/// What a key is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A command name for the dispatcher.
    Command(Symbol),
    /// A prefix: more keys follow.
    Prefix(Keymap),
    /// A replacement key sequence (remap tables, keyboard macros).
    Keys(Vec<InputEvent>),
    /// A replacement string, one character event per char.
    Text(String),
    /// A function computing a replacement when the remap applies.
    Function(RemapFunction),
    /// Explicitly undefined; shadows lower maps but counts as unbound for
    /// function-key translation.
    Undefined,
}

impl Binding {
    /// Shorthand for a command binding.
    #[must_use]
    pub fn command(name: &str) -> Self {
        Self::Command(Symbol::new(name))
    }

    /// The prefix map, if this is a prefix.
    #[must_use]
    pub fn as_prefix(&self) -> Option<&Keymap> {
        match self {
            Self::Prefix(m) => Some(m),
            _ => None,
        }
    }

    /// Whether this binding is a prefix.
    #[must_use]
    pub fn is_prefix(&self) -> bool {
        matches!(self, Self::Prefix(_))
    }

    /// The replacement events of a `Keys` or `Text` binding.
    #[must_use]
    pub fn replacement(&self) -> Option<Vec<InputEvent>> {
        match self {
            Self::Keys(keys) => Some(keys.clone()),
            Self::Text(text) => Some(text.chars().map(InputEvent::char).collect()),
            _ => None,
        }
    }
}

/// Errors from keymap mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeymapError {
    /// `define_key` was given no keys.
    #[error("empty key sequence")]
    EmptySequence,
    /// An intermediate key is bound to something other than a prefix.
    #[error("key sequence {keys} starts with non-prefix key {prefix}")]
    NonPrefixKey { keys: String, prefix: String },
}

#[derive(Debug, Clone, Default)]
struct KeymapInner {
    name: Option<Symbol>,
    bindings: AHashMap<Key, Binding>,
    parents: Vec<Keymap>,
}

/// A keymap value.
#[derive(Clone, Default)]
pub struct Keymap {
    inner: Arc<KeymapInner>,
}

impl fmt::Debug for Keymap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keymap")
            .field("name", &self.inner.name)
            .field("bindings", &self.inner.bindings.len())
            .field("parents", &self.inner.parents.len())
            .finish()
    }
}

impl PartialEq for Keymap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Outcome of looking one key up in a composed map.
enum Found {
    /// Keep looking in later maps.
    Continue,
    /// A non-prefix binding ended the search.
    Stop(Option<Binding>),
}

impl Keymap {
    /// An empty, unnamed keymap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty keymap with a name for diagnostics.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            inner: Arc::new(KeymapInner {
                name: Some(Symbol::new(name)),
                ..KeymapInner::default()
            }),
        }
    }

    /// A keymap with no bindings whose lookup consults `maps` in order.
    #[must_use]
    pub fn compose(maps: Vec<Keymap>) -> Self {
        Self {
            inner: Arc::new(KeymapInner {
                name: None,
                bindings: AHashMap::new(),
                parents: maps,
            }),
        }
    }

    /// Set the parent keymaps.
    #[must_use]
    pub fn with_parent(mut self, parent: Keymap) -> Self {
        Arc::make_mut(&mut self.inner).parents = vec![parent];
        self
    }

    /// The keymap's name.
    #[must_use]
    pub fn name(&self) -> Option<&Symbol> {
        self.inner.name.as_ref()
    }

    /// Number of bindings in this map, excluding parents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.bindings.len()
    }

    /// Whether this map and all its parents are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.bindings.is_empty() && self.inner.parents.iter().all(Keymap::is_empty)
    }

    /// Iterate this map's own bindings.
    pub fn bindings(&self) -> impl Iterator<Item = (&Key, &Binding)> {
        self.inner.bindings.iter()
    }

    /// Bind `keys` to `binding`, creating intermediate prefix maps.
    ///
    /// # Errors
    ///
    /// Fails when `keys` is empty or an intermediate key is already bound
    /// to a non-prefix.
    pub fn define_key(&mut self, keys: &[Key], binding: Binding) -> Result<(), KeymapError> {
        let keys = expand_meta(keys);
        let Some((last, prefix)) = keys.split_last() else {
            return Err(KeymapError::EmptySequence);
        };
        self.define_in(&keys, prefix, last, binding, 0)
    }

    fn define_in(
        &mut self,
        all: &[Key],
        prefix: &[Key],
        last: &Key,
        binding: Binding,
        depth: usize,
    ) -> Result<(), KeymapError> {
        let inner = Arc::make_mut(&mut self.inner);
        let Some((head, rest)) = prefix.split_first() else {
            inner.bindings.insert(last.clone(), binding);
            return Ok(());
        };

        match inner.bindings.get_mut(head) {
            Some(Binding::Prefix(sub)) => sub.define_in(all, rest, last, binding, depth + 1),
            Some(_) => Err(KeymapError::NonPrefixKey {
                keys: kbd::describe_keys(all),
                prefix: kbd::describe_keys(&all[..=depth]),
            }),
            None => {
                let mut sub = Keymap::new();
                sub.define_in(all, rest, last, binding, depth + 1)?;
                inner.bindings.insert(head.clone(), Binding::Prefix(sub));
                Ok(())
            }
        }
    }

    /// Bind a key description (`"C-x C-f"`) to `binding`.
    ///
    /// # Errors
    ///
    /// Fails when the description does not parse or cannot be bound.
    pub fn bind(&mut self, description: &str, binding: Binding) -> Result<(), kbd::KbdError> {
        let keys = kbd::parse_keys(description)?;
        self.define_key(&keys, binding)?;
        Ok(())
    }

    /// Remove `keys`' binding from this map. Parents are untouched.
    pub fn undefine(&mut self, keys: &[Key]) {
        let keys = expand_meta(keys);
        self.undefine_expanded(&keys);
    }

    fn undefine_expanded(&mut self, keys: &[Key]) {
        let Some((last, prefix)) = keys.split_last() else {
            return;
        };
        let inner = Arc::make_mut(&mut self.inner);
        match prefix.split_first() {
            None => {
                inner.bindings.remove(last);
            }
            Some((head, _)) => {
                if let Some(Binding::Prefix(sub)) = inner.bindings.get_mut(head) {
                    sub.undefine_expanded(&keys[1..]);
                }
            }
        }
    }

    /// Binding of a single key, consulting parents.
    #[must_use]
    pub fn lookup_key(&self, key: &Key) -> Option<Binding> {
        follow_key(std::slice::from_ref(self), key)
    }

    /// Binding of a key sequence.
    ///
    /// Returns `None` when any proper prefix is unbound or bound to a
    /// non-prefix.
    #[must_use]
    pub fn lookup(&self, keys: &[Key]) -> Option<Binding> {
        let mut current = Binding::Prefix(self.clone());
        for key in keys {
            let map = current.as_prefix()?;
            current = map.lookup_key(key)?;
        }
        Some(current)
    }

    fn collect(&self, key: &Key, prefixes: &mut Vec<Keymap>) -> Found {
        match self.inner.bindings.get(key) {
            Some(Binding::Prefix(m)) => prefixes.push(m.clone()),
            Some(other) => {
                return Found::Stop(prefixes.is_empty().then(|| other.clone()));
            }
            None => {}
        }
        for parent in &self.inner.parents {
            if let Found::Stop(b) = parent.collect(key, prefixes) {
                return Found::Stop(b);
            }
        }
        Found::Continue
    }
}

/// Look `key` up across `maps`, treating them as one composed keymap.
#[must_use]
pub fn follow_key(maps: &[Keymap], key: &Key) -> Option<Binding> {
    if let Some(base) = meta_base(key) {
        return match follow_key(maps, &meta_prefix())? {
            Binding::Prefix(esc_map) => esc_map.lookup_key(&base),
            _ => None,
        };
    }
    let mut prefixes = Vec::new();
    for map in maps {
        if let Found::Stop(binding) = map.collect(key, &mut prefixes) {
            if binding.is_some() {
                return binding;
            }
            break;
        }
    }
    match prefixes.len() {
        0 => None,
        1 => prefixes.pop().map(Binding::Prefix),
        _ => Some(Binding::Prefix(Keymap::compose(prefixes))),
    }
}

/// The command `command` is remapped to in `maps`, if any.
#[must_use]
pub fn command_remapping(maps: &[Keymap], command: &Symbol) -> Option<Symbol> {
    let remap = follow_key(maps, &Key::symbol(REMAP_PREFIX))?;
    match remap.as_prefix()?.lookup_key(&Key::Symbol(command.clone()))? {
        Binding::Command(target) if target != *command => Some(target),
        _ => None,
    }
}
