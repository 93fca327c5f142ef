#![forbid(unsafe_code)]

//! The key-sequence state machine.
//!
//! # Design
//!
//! [`SequenceMachine`] holds everything a single read accumulates: the key
//! buffer, the read index `t`, the three remap cursors, and the binding
//! reached so far. It never blocks and never touches the queue; the
//! [`Reader`](crate::reader::Reader) feeds it one event per
//! [`step`](SequenceMachine::step) and acts on the returned [`Step`].
//!
//! A [`Step::Replay`] means the buffer changed under the keys already
//! consumed (a remap splice, a dropped mouse event, a pseudo prefix). The
//! reader then calls [`restart`](SequenceMachine::restart) with fresh maps
//! and feeds the buffered keys again from index 0 before reading anything
//! live. Remap cursors survive a replay; everything derived from lookup is
//! recomputed.
//!
//! ```text
//!   prepare ─► step ─┬─ Continue ──────────────► prepare
//!                    ├─ Replay ──── restart ───► prepare
//!                    ├─ SwitchContext ─ restart ► prepare
//!                    ├─ Accept ──── finish
//!                    └─ Reject
//! ```

use keyseq_core::event::{BufferId, InputEvent, Key, Position};
use keyseq_core::keymap::{Binding, Keymap, command_remapping};
use keyseq_core::modifiers::{KeyChar, ModifierAlgebra, Modifiers};
use keyseq_core::symbol::Symbol;
use tracing::trace;

use crate::config::InputConfig;
use crate::error::ReadError;
use crate::remap::{KeyBuffer, RemapCursor, RemapTables};

/// Head of pointer motion events, which never switch buffers or get a
/// pseudo prefix.
const MOUSE_MOVEMENT: &str = "mouse-movement";

/// Remapping target that marks a command as unbound.
const UNDEFINED_COMMAND: &str = "undefined";

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

/// Settings the machine consults while classifying keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Longest sequence, counting mock input.
    pub max_len: usize,
    /// Typed after a prefix, asks for the prefix's bindings.
    pub help_char: Option<KeyChar>,
    /// Command reported for a help request after a prefix.
    pub prefix_help_command: Option<Symbol>,
    /// Try the lower-case form of an unbound upper-case or shifted key.
    pub translate_upper_case: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::from_input(&InputConfig::default())
    }
}

impl MachineConfig {
    /// The machine settings of an input configuration.
    #[must_use]
    pub fn from_input(config: &InputConfig) -> Self {
        Self {
            max_len: config.max_sequence_len,
            help_char: config.help_char.map(KeyChar::from_raw),
            prefix_help_command: config.prefix_help_command.as_deref().map(Symbol::new),
            translate_upper_case: config.translate_upper_case,
        }
    }
}

/// What the reader should do after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Read the next key.
    Continue,
    /// The buffer changed; restart lookup at index 0 with `from` keys of
    /// mock input.
    Replay { from: usize },
    /// A click at sequence start landed in another buffer; make it current
    /// and replay.
    SwitchContext(BufferId),
    /// The sequence is complete.
    Accept,
    /// The read cannot continue.
    Reject(ReadError),
}

/// How a finished sequence resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A command to run.
    Command(Symbol),
    /// Some other binding: a replacement sequence or an explicit undefine.
    Binding(Binding),
    /// No binding at all.
    Unbound,
}

impl Resolution {
    /// The command, if the sequence resolved to one.
    #[must_use]
    pub fn command(&self) -> Option<&Symbol> {
        match self {
            Self::Command(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unbound(&self) -> bool {
        matches!(self, Self::Unbound)
    }
}

/// The machine's result once a step accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Finished {
    pub keys: Vec<InputEvent>,
    pub resolution: Resolution,
    /// Target of `[remap COMMAND]` in the active maps.
    pub remapped: Option<Symbol>,
    /// The last key was looked up in its lower-case form.
    pub shift_translated: bool,
}

// ---------------------------------------------------------------------------
// SequenceMachine
// ---------------------------------------------------------------------------

/// State of one key-sequence read.
#[derive(Debug, Clone)]
pub struct SequenceMachine {
    config: MachineConfig,
    keybuf: KeyBuffer,
    t: usize,
    roots: Vec<Keymap>,
    current: Option<Binding>,
    indec: RemapCursor,
    fkey: RemapCursor,
    keytran: RemapCursor,
    /// Index of the first key of a sequence known to be unbound.
    first_unbound: usize,
    /// Index of the first key that is not a pseudo prefix.
    last_real_key_start: usize,
    first_event_seen: bool,
    original_uppercase: Option<(usize, InputEvent)>,
    shift_translated: bool,
    prefix_help: bool,
    alg: ModifierAlgebra,
    prompt: Option<String>,
}

impl SequenceMachine {
    /// An idle machine with empty remap tables.
    #[must_use]
    pub fn new(config: MachineConfig) -> Self {
        let [indec, fkey, keytran] = RemapTables::new().cursors();
        Self {
            first_unbound: config.max_len + 1,
            config,
            keybuf: KeyBuffer::new(),
            t: 0,
            roots: Vec::new(),
            current: None,
            indec,
            fkey,
            keytran,
            last_real_key_start: 0,
            first_event_seen: false,
            original_uppercase: None,
            shift_translated: false,
            prefix_help: false,
            alg: ModifierAlgebra::new(),
            prompt: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Start a new sequence over `tables`, discarding all buffered keys.
    pub fn begin(&mut self, tables: &RemapTables, prompt: Option<&str>) {
        self.keybuf.clear();
        [self.indec, self.fkey, self.keytran] = tables.cursors();
        self.original_uppercase = None;
        self.shift_translated = false;
        self.prompt = prompt.map(str::to_owned);
        self.restart(Vec::new());
    }

    /// Go back to index 0 keeping the buffer as mock input.
    ///
    /// `maps` are the active keymaps, earliest first.
    pub fn restart(&mut self, maps: Vec<Keymap>) {
        self.t = 0;
        self.first_unbound = self.config.max_len + 1;
        self.last_real_key_start = 0;
        self.prefix_help = false;
        self.first_event_seen = !self.keybuf.is_empty();
        self.set_maps(maps);
    }

    fn set_maps(&mut self, maps: Vec<Keymap>) {
        self.current = Some(Binding::Prefix(Keymap::compose(maps.clone())));
        self.roots = maps;
    }

    /// The first two buffered keys, used to pick the active maps.
    #[must_use]
    pub fn replay_events(&self) -> (Option<&InputEvent>, Option<&InputEvent>) {
        (self.keybuf.get(0), self.keybuf.get(1))
    }

    /// Whether the maps were chosen before any key was known.
    #[must_use]
    pub fn needs_first_event(&self) -> bool {
        !self.first_event_seen
    }

    /// Replace the maps once the first key of a fresh sequence is known.
    pub fn set_first_event_maps(&mut self, maps: Vec<Keymap>) {
        self.first_event_seen = true;
        self.set_maps(maps);
    }

    /// Read index: keys below it are consumed.
    #[must_use]
    pub fn index(&self) -> usize {
        self.t
    }

    #[must_use]
    pub fn keys(&self) -> &KeyBuffer {
        &self.keybuf
    }

    /// The keys consumed so far.
    #[must_use]
    pub fn consumed(&self) -> Vec<InputEvent> {
        self.keybuf.events_in(0..self.t)
    }

    #[must_use]
    pub fn cursors(&self) -> [&RemapCursor; 3] {
        [&self.indec, &self.fkey, &self.keytran]
    }

    /// The next key of mock input, if any.
    #[must_use]
    pub fn buffered_key(&self) -> Option<InputEvent> {
        self.keybuf.get(self.t).cloned()
    }

    /// Append a live key without looking it up.
    pub fn append_key(&mut self, key: InputEvent) {
        self.keybuf.push(key);
    }

    /// Housekeeping before each key.
    ///
    /// Drops a leading sequence already known to be unbound once the
    /// translation layer is past it, and rejects an over-long sequence.
    pub fn prepare(&mut self) -> Step {
        if self.first_unbound < self.keytran.start {
            let n = self.first_unbound + 1;
            self.keybuf.remove(0..n);
            self.indec.drop_front(n);
            self.fkey.drop_front(n);
            self.keytran.drop_front(n);
            trace!(dropped = n, "unbound prefix pruned");
            return self.replay();
        }
        if self.t >= self.config.max_len {
            return Step::Reject(self.too_long());
        }
        self.last_real_key_start = self.t;
        Step::Continue
    }

    /// Consume `key` at the read index.
    ///
    /// `click_buffer` is the buffer shown in the window a pointer event
    /// landed in, when that differs from the current buffer.
    pub fn step(&mut self, mut key: InputEvent, click_buffer: Option<BufferId>) -> Step {
        let t = self.t;
        let from_buffer = t < self.keybuf.len();

        if let Some(pos) = click_position(&key) {
            let prefixed = from_buffer && self.keybuf.is_prefixed(t);
            if prefixed && t > 0 {
                self.last_real_key_start = t - 1;
            }
            if self.last_real_key_start == 0
                && let Some(buffer) = click_buffer
            {
                self.keybuf.put(t, key);
                return Step::SwitchContext(buffer);
            }
            if !prefixed && let Some(prefix) = pos.area.prefix_symbol() {
                if t + 2 > self.config.max_len {
                    return Step::Reject(self.too_long());
                }
                trace!(prefix, index = t, "pseudo prefix inserted");
                self.keybuf.insert_prefix(t, InputEvent::symbol(prefix), key);
                return Step::Continue;
            }
        } else if let InputEvent::Menu(menu) = &key {
            let prefix = menu.area.prefix_symbol().unwrap_or("menu-bar");
            let mut expansion = Vec::with_capacity(menu.path.len() + 1);
            expansion.push(InputEvent::symbol(prefix));
            expansion.extend(menu.path.iter().cloned().map(InputEvent::Symbol));
            if t + expansion.len() > self.config.max_len {
                return Step::Reject(self.too_long());
            }
            let end = if from_buffer { t + 1 } else { t };
            self.keybuf.splice(t..end, expansion);
            return self.replay();
        }

        let mut binding = self.follow(&key.head_key());
        if binding.is_some() {
            self.first_unbound = self.first_unbound.max(t + 1);
        } else {
            self.first_unbound = self.first_unbound.min(t);
            if key.is_mouse()
                && let Some(head) = key.head_symbol().cloned()
            {
                let (base, mut mods) = self.alg.parse_modifiers(&head);
                while mods.intersects(Modifiers::EVENT_KIND) {
                    if mods.contains(Modifiers::TRIPLE) {
                        mods ^= Modifiers::DOUBLE | Modifiers::TRIPLE;
                    } else if mods.contains(Modifiers::DOUBLE) {
                        mods -= Modifiers::DOUBLE;
                    } else if mods.contains(Modifiers::DRAG) {
                        mods -= Modifiers::DRAG;
                    } else {
                        return self.drop_pointer_key(from_buffer);
                    }
                    let reduced = key.with_head(self.alg.apply_modifiers(mods, &base));
                    if let Some(b) = self.follow(&reduced.head_key()) {
                        trace!(from = %head, to = ?reduced.head_symbol(), "mouse event reduced");
                        binding = Some(b);
                        key = reduced;
                        break;
                    }
                }
            }
        }

        self.current = binding;
        self.keybuf.put(t, key);
        self.t = t + 1;
        let t = self.t;

        if let Some(step) = self.run_remaps() {
            return step;
        }

        if self.current.is_none()
            && self.keytran.start >= t
            && self.config.translate_upper_case
            && let Some(InputEvent::Char(c)) = self.keybuf.get(t - 1).cloned()
            && let Some(lower) = c.unshifted()
        {
            return self.shift_translate(t - 1, InputEvent::Char(c), InputEvent::Char(lower));
        }

        if self.current.is_none()
            && t > 1
            && self.config.prefix_help_command.is_some()
            && self.config.help_char.is_some()
            && self.keybuf.get(t - 1).and_then(InputEvent::as_char) == self.config.help_char
        {
            self.prefix_help = true;
            return Step::Accept;
        }

        if self.current.is_none()
            && self.keytran.start >= t
            && self.config.translate_upper_case
            && let Some(InputEvent::Symbol(head)) = self.keybuf.get(t - 1).cloned()
        {
            let (base, mods) = self.alg.parse_modifiers(&head);
            if mods.contains(Modifiers::SHIFT) {
                let lower = self.alg.apply_modifiers(mods - Modifiers::SHIFT, &base);
                return self.shift_translate(
                    t - 1,
                    InputEvent::Symbol(head),
                    InputEvent::Symbol(lower),
                );
            }
        }

        match &self.current {
            Some(Binding::Prefix(_)) => Step::Continue,
            Some(_) => Step::Accept,
            None if self.keytran.start < t => Step::Continue,
            None => Step::Accept,
        }
    }

    /// Build the result of an accepted sequence.
    ///
    /// With `dont_downcase_last`, a final key that was looked up in its
    /// lower-case form is returned as typed.
    pub fn finish(&mut self, dont_downcase_last: bool) -> Finished {
        if let Some((pos, original)) = self.original_uppercase.take()
            && self.t > 0
            && pos == self.t - 1
            && (dont_downcase_last || self.current.is_none())
        {
            self.keybuf.set(pos, original);
            self.shift_translated = false;
        }

        let resolution = if self.prefix_help {
            match &self.config.prefix_help_command {
                Some(cmd) => Resolution::Command(cmd.clone()),
                None => Resolution::Unbound,
            }
        } else {
            match self.current.take() {
                Some(Binding::Command(cmd)) => Resolution::Command(cmd),
                Some(other) => Resolution::Binding(other),
                None => Resolution::Unbound,
            }
        };
        let remapped = resolution
            .command()
            .and_then(|cmd| command_remapping(&self.roots, cmd));
        Finished {
            keys: self.keybuf.to_events(),
            resolution,
            remapped,
            shift_translated: self.shift_translated,
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn follow(&self, key: &Key) -> Option<Binding> {
        match &self.current {
            Some(Binding::Prefix(map)) => map.lookup_key(key),
            _ => None,
        }
    }

    fn replay(&self) -> Step {
        Step::Replay {
            from: self.keybuf.len(),
        }
    }

    fn too_long(&self) -> ReadError {
        ReadError::SequenceTooLong {
            limit: self.config.max_len,
        }
    }

    /// Unbound, explicitly undefined, or remapped to `undefined`.
    fn is_undefined(&self, binding: Option<&Binding>) -> bool {
        match binding {
            None | Some(Binding::Undefined) => true,
            Some(Binding::Command(cmd)) => command_remapping(&self.roots, cmd)
                .is_some_and(|target| target == UNDEFINED_COMMAND),
            Some(_) => false,
        }
    }

    /// Run the three remap layers up to the read index.
    fn run_remaps(&mut self) -> Option<Step> {
        let t = self.t;
        let max_len = self.config.max_len;
        let prompt = self.prompt.as_deref();

        while self.indec.end < t {
            match self.indec.step(&mut self.keybuf, true, max_len, prompt) {
                Err(e) => return Some(Step::Reject(e)),
                Ok(Some(_)) => return Some(self.replay()),
                Ok(None) => {}
            }
        }

        let undefined = self.is_undefined(self.current.as_ref());
        let bound = !undefined && !self.current.as_ref().is_some_and(Binding::is_prefix);
        let prompt = self.prompt.as_deref();
        if bound && self.indec.start >= t {
            if self.fkey.start < t {
                self.fkey.reset_at(t);
            }
        } else {
            while self.fkey.end < self.indec.start {
                let doit = self.fkey.end + 1 == t && undefined;
                match self.fkey.step(&mut self.keybuf, doit, max_len, prompt) {
                    Err(e) => return Some(Step::Reject(e)),
                    Ok(Some(delta)) => {
                        self.indec.shift(delta);
                        return Some(self.replay());
                    }
                    Ok(None) => {}
                }
            }
        }

        while self.keytran.end < self.fkey.start {
            match self.keytran.step(&mut self.keybuf, true, max_len, prompt) {
                Err(e) => return Some(Step::Reject(e)),
                Ok(Some(delta)) => {
                    self.indec.shift(delta);
                    self.fkey.shift(delta);
                    return Some(self.replay());
                }
                Ok(None) => {}
            }
        }
        None
    }

    /// Forget an unbound press or release along with any pseudo prefix in
    /// front of it.
    fn drop_pointer_key(&mut self, from_buffer: bool) -> Step {
        let lrks = self.last_real_key_start;
        if self.indec.end > lrks {
            let at = lrks.min(self.indec.start);
            self.indec.reset_at(at);
            if self.fkey.end > lrks {
                let at = lrks.min(self.fkey.start);
                self.fkey.reset_at(at);
                if self.keytran.end > lrks {
                    let at = lrks.min(self.keytran.start);
                    self.keytran.reset_at(at);
                }
            }
        }
        let end = if from_buffer { self.t + 1 } else { self.t };
        trace!(from = lrks, to = end, "unbound pointer event dropped");
        self.keybuf.remove(lrks..end);
        self.replay()
    }

    fn shift_translate(&mut self, index: usize, original: InputEvent, lower: InputEvent) -> Step {
        trace!(?original, ?lower, "shift translation");
        self.original_uppercase = Some((index, original));
        self.keybuf.set(index, lower);
        self.fkey.reset_at(0);
        self.keytran.reset_at(0);
        self.shift_translated = true;
        self.replay()
    }
}

/// Where a pointer event that may need routing happened.
pub(crate) fn click_position(event: &InputEvent) -> Option<Position> {
    match event {
        InputEvent::Mouse(m) if m.head != MOUSE_MOVEMENT => Some(m.start),
        InputEvent::Wheel(w) => Some(w.position),
        _ => None,
    }
}
