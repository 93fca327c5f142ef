#![forbid(unsafe_code)]

//! The input session: one consumer end of the event queue plus everything
//! the reader keeps between reads.
//!
//! # Design
//!
//! A [`Session`] owns the consumer side of the [`EventQueue`], a decoder
//! and a side queue per keyboard, the shared translation table, pushed-back
//! ("unread") events, and an optional macro being played back. The reader
//! asks it for one event at a time; the session decides where that event
//! comes from, in this order:
//!
//! 1. a pending quit (returned as an error, never as an event)
//! 2. unread events
//! 3. a switch-frame deferred by the previous read
//! 4. macro playback
//! 5. the current keyboard's side queue
//! 6. at sequence start, another keyboard with queued events
//! 7. the raw queue, decoded and routed to the owning keyboard
//!
//! When nothing is available the session runs due timers and otherwise
//! parks in [`Waker::wait`] until the producer, a quit request, a timer or
//! the read deadline wakes it. This is the only place the reader blocks.
//!
//! # Keyboards
//!
//! Events are decoded by the decoder of the keyboard that produced them and
//! queued on that keyboard's side queue. An event from another keyboard
//! makes the reader switch to it; the keys read so far go back to the old
//! keyboard's side queue. In single-keyboard mode other keyboards' events
//! wait on their side queues and a quit typed on one of them is redirected
//! there instead of interrupting the current read.

use std::collections::VecDeque;
use std::sync::Arc;

use ahash::AHashMap;
use keyseq_core::decoder::{DecodeStatus, EventDecoder, MenuRegistry};
use keyseq_core::event::{FrameId, InputEvent, KeyboardId, RawEvent};
use keyseq_core::keymap::Keymap;
use keyseq_core::modifiers::{KeyChar, ModifierAlgebra};
use keyseq_core::queue::{EventQueue, QueueConsumer, QueueProducer};
use keyseq_core::quit::QuitState;
use keyseq_core::wake::{WakeReason, Waker};
use tracing::{debug, trace, warn};
use web_time::Instant;

use crate::config::{ConfigError, InputConfig};
use crate::context::InputContext;
use crate::error::Interrupt;
use crate::input_macro::{InputMacro, MacroPlayback};
use crate::remap::RemapTables;

/// An event waiting on a keyboard's side queue.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pending {
    pub(crate) event: InputEvent,
    /// Already reported to the sink by an earlier read.
    pub(crate) reported: bool,
}

/// What [`Session::next_event`] produced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fetched {
    /// An event; `live` when it has never been reported.
    Event { event: InputEvent, live: bool },
    /// A timer changed the current buffer.
    BufferChanged,
    /// Input arrived from another keyboard.
    KeyboardSwitch { to: KeyboardId },
    /// The queue is closed and drained, or a macro ran out.
    Exhausted,
    /// The read deadline passed.
    TimedOut,
    /// A pop-up menu closed without a choice.
    Rejected,
    /// The echo delay passed with a sequence in progress.
    EchoDue,
}

#[derive(Debug)]
struct KeyboardState {
    decoder: EventDecoder,
    side_queue: VecDeque<Pending>,
    /// Decode and function-key tables; the translation table is shared.
    tables: RemapTables,
}

impl KeyboardState {
    fn new(config: &InputConfig, tables: &RemapTables) -> Self {
        Self {
            decoder: EventDecoder::new(config.decoder_config()),
            side_queue: VecDeque::new(),
            tables: tables.clone(),
        }
    }
}

/// Consumer-side input state shared by successive reads.
#[derive(Debug)]
pub struct Session {
    consumer: QueueConsumer,
    producer: QueueProducer,
    quit: Arc<QuitState>,
    config: InputConfig,
    keyboards: AHashMap<KeyboardId, KeyboardState>,
    current: KeyboardId,
    single_keyboard: bool,
    default_tables: RemapTables,
    translation: Keymap,
    alg: ModifierAlgebra,
    menus: MenuRegistry,
    special_events: Keymap,
    unread: VecDeque<InputEvent>,
    unread_switch_frame: Option<InputEvent>,
    playback: Option<MacroPlayback>,
    recent: VecDeque<InputEvent>,
    decoded: Vec<InputEvent>,
}

impl Session {
    /// Create a session and its event queue.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the configuration fails validation or a remap
    /// table entry does not parse.
    pub fn new(config: &InputConfig) -> Result<Self, ConfigError> {
        config.check()?;
        let tables = RemapTables::from_config(&config.remap)?;
        let quit = Arc::new(
            QuitState::new(Arc::new(Waker::new()))
                .with_escalation_threshold(config.escalation_threshold)
                .with_escalation_patience(config.escalation_patience()),
        );
        let (producer, consumer) =
            EventQueue::new(config.queue_capacity, config.quit_char, Arc::clone(&quit));
        debug!(
            capacity = config.queue_capacity,
            max_sequence_len = config.max_sequence_len,
            "input session created"
        );
        Ok(Self {
            consumer,
            producer,
            quit,
            keyboards: AHashMap::new(),
            current: KeyboardId(0),
            single_keyboard: false,
            translation: tables.translation.clone(),
            default_tables: tables,
            alg: ModifierAlgebra::new(),
            menus: MenuRegistry::new(),
            special_events: Keymap::new(),
            unread: VecDeque::new(),
            unread_switch_frame: None,
            playback: None,
            recent: VecDeque::with_capacity(config.recent_keys.min(1024)),
            decoded: Vec::new(),
            config: config.clone(),
        })
    }

    /// A producer handle for a device backend.
    #[must_use]
    pub fn producer(&self) -> QueueProducer {
        self.producer.clone()
    }

    #[must_use]
    pub fn quit_state(&self) -> &Arc<QuitState> {
        &self.quit
    }

    #[must_use]
    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    /// The keyboard whose input is being read.
    #[must_use]
    pub fn current_keyboard(&self) -> KeyboardId {
        self.current
    }

    /// Whether input is locked onto the current keyboard.
    #[must_use]
    pub fn is_single_keyboard(&self) -> bool {
        self.single_keyboard
    }

    /// Lock input onto the current keyboard, or unlock.
    pub fn set_single_keyboard(&mut self, single: bool) {
        self.single_keyboard = single;
        self.consumer
            .set_current_keyboard(single.then_some(self.current));
        debug!(keyboard = self.current.0, single, "single-keyboard mode");
    }

    /// Replace the decode and function-key tables of `keyboard`.
    ///
    /// The translation table of `tables` is ignored; see
    /// [`set_translation_map`](Self::set_translation_map).
    pub fn set_remap_tables(&mut self, keyboard: KeyboardId, tables: RemapTables) {
        self.keyboard_mut(keyboard).tables = tables;
    }

    /// Replace the translation table shared by every keyboard.
    pub fn set_translation_map(&mut self, map: Keymap) {
        self.translation = map;
    }

    /// Events bound here are handed to
    /// [`InputContext::special_event`] as they arrive and never enter a
    /// key sequence.
    pub fn set_special_event_map(&mut self, map: Keymap) {
        self.special_events = map;
    }

    /// Menu items known to the decoders.
    pub fn menus_mut(&mut self) -> &mut MenuRegistry {
        &mut self.menus
    }

    /// Queue `events` to be read before any other input.
    pub fn push_unread(&mut self, events: impl IntoIterator<Item = InputEvent>) {
        self.unread.extend(events);
    }

    /// Start playing back `input_macro`.
    ///
    /// While it plays, reads take events from the macro only; the read
    /// after its last event reports exhaustion.
    pub fn execute_macro(&mut self, input_macro: InputMacro) {
        debug!(events = input_macro.len(), "macro playback started");
        self.playback = Some(MacroPlayback::new(input_macro));
    }

    /// Whether a macro is being played back.
    #[must_use]
    pub fn is_executing_macro(&self) -> bool {
        self.playback.is_some()
    }

    /// The most recent live keys, oldest first.
    pub fn recent_keys(&self) -> impl Iterator<Item = &InputEvent> {
        self.recent.iter()
    }

    /// Whether a read could start without waiting.
    #[must_use]
    pub fn input_pending(&self) -> bool {
        !self.unread.is_empty()
            || self.unread_switch_frame.is_some()
            || self.playback.is_some()
            || self
                .keyboards
                .get(&self.current)
                .is_some_and(|kb| !kb.side_queue.is_empty())
            || self.consumer.is_readable(true)
    }

    /// Block until input may be available, a quit is requested, or
    /// `deadline` passes.
    pub fn wait_for_input(&self, deadline: Option<Instant>) -> WakeReason {
        if self.input_pending() || self.quit.is_pending() {
            return WakeReason::Notified;
        }
        self.consumer.waker().wait(deadline)
    }

    // -----------------------------------------------------------------------
    // Reader interface
    // -----------------------------------------------------------------------

    /// Remap tables of the current keyboard.
    pub(crate) fn remap_tables(&mut self) -> RemapTables {
        let current = self.current;
        let mut tables = self.keyboard_mut(current).tables.clone();
        tables.translation = self.translation.clone();
        tables
    }

    pub(crate) fn switch_keyboard(&mut self, to: KeyboardId) {
        debug!(from = self.current.0, to = to.0, "keyboard switch");
        self.current = to;
        if self.single_keyboard {
            self.consumer.set_current_keyboard(Some(to));
        }
    }

    /// Return already-read keys to the front of `keyboard`'s side queue.
    pub(crate) fn push_back(&mut self, keyboard: KeyboardId, events: Vec<InputEvent>) {
        let queue = &mut self.keyboard_mut(keyboard).side_queue;
        for event in events.into_iter().rev() {
            queue.push_front(Pending {
                event,
                reported: true,
            });
        }
    }

    pub(crate) fn set_unread_switch_frame(&mut self, event: InputEvent) {
        self.unread_switch_frame = Some(event);
    }

    pub(crate) fn record_recent(&mut self, event: &InputEvent) {
        if self.config.recent_keys == 0 {
            return;
        }
        if self.recent.len() == self.config.recent_keys {
            self.recent.pop_front();
        }
        self.recent.push_back(event.clone());
    }

    /// Produce the next event for the reader.
    ///
    /// `echo_at` and `deadline` bound the idle wait; `at_start` is set when
    /// no key of the sequence has been read yet.
    pub(crate) fn next_event<C: InputContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        deadline: Option<Instant>,
        echo_at: Option<Instant>,
        at_start: bool,
    ) -> Result<Fetched, Interrupt> {
        loop {
            if let Err(quit) = self.quit.check() {
                self.discard_typed_ahead();
                return Err(quit.into());
            }

            if let Some(event) = self.unread.pop_front() {
                return Ok(Fetched::Event { event, live: false });
            }
            if let Some(event) = self.unread_switch_frame.take() {
                return Ok(Fetched::Event { event, live: true });
            }
            if let Some(playback) = &mut self.playback {
                return Ok(match playback.next_event() {
                    Some(event) => Fetched::Event { event, live: false },
                    None => {
                        self.playback = None;
                        debug!("macro playback finished");
                        Fetched::Exhausted
                    }
                });
            }

            let current = self.current;
            if let Some(p) = self.keyboard_mut(current).side_queue.pop_front() {
                return Ok(Fetched::Event {
                    event: p.event,
                    live: !p.reported,
                });
            }
            if at_start
                && !self.single_keyboard
                && let Some(to) = self.keyboard_with_input()
            {
                return Ok(Fetched::KeyboardSwitch { to });
            }

            if let Some(raw) = self.consumer.dequeue() {
                if let Some(fetched) = self.route(ctx, &raw) {
                    return Ok(fetched);
                }
                continue;
            }
            if self.consumer.is_exhausted() {
                return Ok(Fetched::Exhausted);
            }

            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return Ok(Fetched::TimedOut);
            }
            if echo_at.is_some_and(|d| now >= d) {
                return Ok(Fetched::EchoDue);
            }
            let timer = ctx.next_timer_deadline();
            if timer.is_some_and(|d| now >= d) {
                let before = ctx.current_buffer();
                ctx.run_timers(now);
                if ctx.current_buffer() != before {
                    return Ok(Fetched::BufferChanged);
                }
                continue;
            }
            let wake_at = [deadline, echo_at, timer].into_iter().flatten().min();
            trace!(?wake_at, "waiting for input");
            self.consumer.waker().wait(wake_at);
        }
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    fn keyboard_mut(&mut self, keyboard: KeyboardId) -> &mut KeyboardState {
        self.keyboards
            .entry(keyboard)
            .or_insert_with(|| KeyboardState::new(&self.config, &self.default_tables))
    }

    fn keyboard_with_input(&self) -> Option<KeyboardId> {
        self.keyboards
            .iter()
            .filter(|(id, kb)| **id != self.current && !kb.side_queue.is_empty())
            .map(|(id, _)| *id)
            .min()
    }

    /// Decode `raw` onto its keyboard's side queue.
    fn route<C: InputContext + ?Sized>(&mut self, ctx: &mut C, raw: &RawEvent) -> Option<Fetched> {
        let keyboard = raw.keyboard;
        let mut decoded = std::mem::take(&mut self.decoded);
        decoded.clear();
        let state = self
            .keyboards
            .entry(keyboard)
            .or_insert_with(|| KeyboardState::new(&self.config, &self.default_tables));
        let status = state
            .decoder
            .decode(raw, &mut self.alg, &self.menus, &mut decoded);

        let fetched = match status {
            DecodeStatus::Input => self.queue_decoded(ctx, keyboard, &mut decoded),
            DecodeStatus::Pending | DecodeStatus::Ignored => None,
            DecodeStatus::Skipped => {
                warn!(keyboard = keyboard.0, "malformed input skipped");
                None
            }
            DecodeStatus::Timer { id } => {
                let before = ctx.current_buffer();
                ctx.timer_fired(id);
                (ctx.current_buffer() != before).then_some(Fetched::BufferChanged)
            }
            DecodeStatus::Resize { width, height } => {
                ctx.frame_resized(raw.frame, width, height);
                None
            }
            DecodeStatus::MenuDismissed => Some(Fetched::Rejected),
            DecodeStatus::QuitRedirect => {
                self.redirect_quit(keyboard, raw.frame);
                None
            }
        };
        self.decoded = decoded;
        fetched
    }

    fn queue_decoded<C: InputContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        keyboard: KeyboardId,
        decoded: &mut Vec<InputEvent>,
    ) -> Option<Fetched> {
        let mut queued = false;
        for event in decoded.drain(..) {
            if !self.special_events.is_empty()
                && let Some(binding) = self.special_events.lookup_key(&event.head_key())
            {
                trace!(?event, "special event");
                ctx.special_event(&binding, &event);
                continue;
            }
            self.keyboard_mut(keyboard).side_queue.push_back(Pending {
                event,
                reported: false,
            });
            queued = true;
        }
        (queued && keyboard != self.current && !self.single_keyboard)
            .then_some(Fetched::KeyboardSwitch { to: keyboard })
    }

    /// Forget input typed before an honored quit: queued events stored
    /// ahead of the quit character, the current keyboard's side queue, and
    /// any macro being played back.
    fn discard_typed_ahead(&mut self) {
        let queued = self.consumer.discard_before_quit();
        let current = self.current;
        let side = {
            let queue = &mut self.keyboard_mut(current).side_queue;
            let n = queue.len();
            queue.clear();
            n
        };
        let macro_stopped = self.playback.take().is_some();
        if queued + side > 0 || macro_stopped {
            debug!(queued, side, macro_stopped, "input discarded by quit");
        }
    }

    /// Move a quit typed on a locked-out keyboard into its side queue.
    fn redirect_quit(&mut self, keyboard: KeyboardId, frame: FrameId) {
        let discarded = self.consumer.discard_keyboard(keyboard);
        let quit = InputEvent::Char(KeyChar::new(self.config.quit_char));
        let queue = &mut self.keyboard_mut(keyboard).side_queue;
        queue.clear();
        queue.push_back(Pending {
            event: InputEvent::SwitchFrame(frame),
            reported: false,
        });
        queue.push_back(Pending {
            event: quit,
            reported: false,
        });
        debug!(keyboard = keyboard.0, discarded, "quit redirected");
    }
}
