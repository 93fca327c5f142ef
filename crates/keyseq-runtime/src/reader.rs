#![forbid(unsafe_code)]

//! Reading one key sequence.
//!
//! [`Reader::read_key_sequence`] pulls events from a [`Session`], runs them
//! through the [`SequenceMachine`], and returns once the keys read form a
//! complete binding, are known to be unbound, or something ends the read
//! early (quit, timeout, exhausted input, a dismissed menu).
//!
//! # Replays
//!
//! Several things invalidate what has been looked up so far without
//! invalidating the keys themselves: a remap splice, a click that makes
//! another buffer current, a timer that switches buffers. The reader then
//! restarts lookup from the first key, taking keys from the machine's
//! buffer instead of the session, with the maps the context reports for
//! the new state. Replayed keys are neither re-read from the queue nor
//! reported to the sink again.
//!
//! An event from another keyboard restarts the read from scratch on that
//! keyboard; the keys already read are returned to the old keyboard's
//! side queue for its next read.
//!
//! # Example
//!
//! ```ignore
//! use keyseq_runtime::{InputConfig, MapContext, NullSink, ReadOptions, ReadOutcome, Reader, Session};
//!
//! let config = InputConfig::default();
//! let mut session = Session::new(&config)?;
//! let mut reader = Reader::new(&config);
//! let mut ctx = MapContext::new(global_map);
//! match reader.read_key_sequence(&mut session, &mut ctx, &mut NullSink, &ReadOptions::default())? {
//!     ReadOutcome::Sequence(seq) => dispatch(seq.command()),
//!     ReadOutcome::Quit { .. } => keyboard_quit(),
//!     _ => {}
//! }
//! ```

use keyseq_core::event::{BufferId, InputEvent, KeyboardId};
use keyseq_core::kbd;
use keyseq_core::symbol::Symbol;
use tracing::{debug, debug_span, info, trace};
use web_time::{Duration, Instant};

use crate::config::InputConfig;
use crate::context::{InputContext, InputSink};
use crate::error::{Interrupt, ReadError};
use crate::machine::{MachineConfig, Resolution, SequenceMachine, Step, click_position};
use crate::session::{Fetched, Session};

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

/// Per-read options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Passed to remap functions.
    pub prompt: Option<String>,
    /// Return a final key that was looked up in lower case as typed.
    pub dont_downcase_last: bool,
    /// A switch-frame at the start of a read may be returned as the
    /// sequence itself; otherwise it is deferred.
    pub can_return_switch_frame: bool,
    /// Overrides the configured read timeout.
    pub timeout: Option<Duration>,
}

impl ReadOptions {
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn with_dont_downcase_last(mut self, keep: bool) -> Self {
        self.dont_downcase_last = keep;
        self
    }

    #[must_use]
    pub fn with_can_return_switch_frame(mut self, allow: bool) -> Self {
        self.can_return_switch_frame = allow;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A complete key sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySequence {
    /// The keys after remapping.
    pub keys: Vec<InputEvent>,
    pub resolution: Resolution,
    /// Target of the command's `[remap COMMAND]` entry, if any.
    pub remapped: Option<Symbol>,
    /// The last key was looked up in its lower-case form.
    pub shift_translated: bool,
    /// A frame switch that arrived mid-sequence. It has also been queued
    /// to be read first by the next read.
    pub delayed_switch_frame: Option<InputEvent>,
    /// The keyboard the sequence was typed on.
    pub keyboard: KeyboardId,
}

impl KeySequence {
    /// The command to run: the remapped one if any.
    #[must_use]
    pub fn command(&self) -> Option<&Symbol> {
        self.remapped.as_ref().or_else(|| self.resolution.command())
    }

    /// The keys in key description syntax.
    #[must_use]
    pub fn describe(&self) -> String {
        kbd::describe_events(&self.keys)
    }
}

/// How a read ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Sequence(KeySequence),
    /// A pop-up menu was dismissed without a choice.
    Rejected,
    /// No more input: the queue closed or a macro ran out.
    Exhausted,
    /// The read deadline passed; any partial sequence is discarded.
    TimedOut,
    /// A quit request unwound the read.
    Quit { forced: bool },
}

impl ReadOutcome {
    /// The sequence, if the read produced one.
    #[must_use]
    pub fn sequence(&self) -> Option<&KeySequence> {
        match self {
            Self::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_sequence(self) -> Option<KeySequence> {
        match self {
            Self::Sequence(seq) => Some(seq),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reads key sequences; holds the machine and timing settings.
#[derive(Debug, Clone)]
pub struct Reader {
    machine: SequenceMachine,
    echo_delay: Option<Duration>,
    timeout: Option<Duration>,
}

impl Reader {
    #[must_use]
    pub fn new(config: &InputConfig) -> Self {
        Self {
            machine: SequenceMachine::new(MachineConfig::from_input(config)),
            echo_delay: config.echo_delay(),
            timeout: config.read_timeout(),
        }
    }

    /// Read one key sequence.
    ///
    /// Keys the reader accepts from live input are passed to `sink` exactly
    /// once. A buffer made current by a click is current only for the
    /// duration of the read.
    ///
    /// # Errors
    ///
    /// [`ReadError::InvalidRemapResult`] when a remap function misbehaves,
    /// [`ReadError::SequenceTooLong`] when the sequence outgrows the
    /// configured limit. Partial input is discarded in both cases.
    pub fn read_key_sequence<C, S>(
        &mut self,
        session: &mut Session,
        ctx: &mut C,
        sink: &mut S,
        opts: &ReadOptions,
    ) -> Result<ReadOutcome, ReadError>
    where
        C: InputContext + ?Sized,
        S: InputSink + ?Sized,
    {
        let _span = debug_span!("read_key_sequence", keyboard = session.current_keyboard().0)
            .entered();
        let mut restore = None;
        let result = self.run(session, ctx, sink, opts, &mut restore);
        if let Some(buffer) = restore {
            ctx.set_buffer(buffer);
        }
        match result {
            Ok(outcome) => Ok(outcome),
            Err(Interrupt::Quit { forced }) => {
                debug!(forced, "read unwound by quit");
                Ok(ReadOutcome::Quit { forced })
            }
            Err(Interrupt::Error(err)) => {
                debug!(%err, "read rejected");
                Err(err)
            }
        }
    }

    fn run<C, S>(
        &mut self,
        session: &mut Session,
        ctx: &mut C,
        sink: &mut S,
        opts: &ReadOptions,
        restore: &mut Option<BufferId>,
    ) -> Result<ReadOutcome, Interrupt>
    where
        C: InputContext + ?Sized,
        S: InputSink + ?Sized,
    {
        let deadline = opts.timeout.or(self.timeout).map(|d| Instant::now() + d);
        let starting_buffer = ctx.current_buffer();
        let quit_char = session.config().quit_char;
        let mut delayed_switch_frame = None;
        let mut echoed = self.echo_delay.is_none();
        let mut last_key_at = Instant::now();

        'entirely: loop {
            let tables = session.remap_tables();
            self.machine.begin(&tables, opts.prompt.as_deref());
            let maps = ctx.active_maps(None, None);
            self.machine.restart(maps);

            loop {
                match self.machine.prepare() {
                    Step::Replay { from } => {
                        trace!(from, "replay after prune");
                        self.replay(ctx);
                        continue;
                    }
                    Step::Reject(err) => return Err(err.into()),
                    _ => {}
                }

                let t = self.machine.index();
                let (key, live) = match self.machine.buffered_key() {
                    Some(key) => (key, false),
                    None => {
                        let echo_at = match self.echo_delay {
                            Some(delay) if !echoed && t > 0 => Some(last_key_at + delay),
                            _ => None,
                        };
                        match session.next_event(ctx, deadline, echo_at, t == 0)? {
                            Fetched::Event { event, live } => (event, live),
                            Fetched::BufferChanged => {
                                let selected = ctx.selected_window_buffer();
                                ctx.set_buffer(selected);
                                self.replay(ctx);
                                continue;
                            }
                            Fetched::KeyboardSwitch { to } => {
                                let from = session.current_keyboard();
                                session.push_back(from, self.machine.consumed());
                                session.switch_keyboard(to);
                                continue 'entirely;
                            }
                            Fetched::EchoDue => {
                                sink.echo_prefix(&self.machine.consumed());
                                echoed = true;
                                continue;
                            }
                            Fetched::Exhausted => return Ok(ReadOutcome::Exhausted),
                            Fetched::TimedOut => return Ok(ReadOutcome::TimedOut),
                            Fetched::Rejected => return Ok(ReadOutcome::Rejected),
                        }
                    }
                };

                if matches!(key, InputEvent::SwitchFrame(_))
                    && (t > 0 || !opts.can_return_switch_frame)
                {
                    trace!(?key, "switch-frame deferred");
                    delayed_switch_frame = Some(key);
                    continue;
                }

                if live {
                    sink.key_read(&key);
                    session.record_recent(&key);
                    last_key_at = Instant::now();
                }

                if key.as_char().is_some_and(|c| c.raw() == quit_char)
                    && ctx.current_buffer() != starting_buffer
                {
                    self.machine.append_key(key);
                    self.replay(ctx);
                    continue;
                }

                if self.machine.needs_first_event() {
                    let maps = ctx.active_maps(Some(&key), None);
                    self.machine.set_first_event_maps(maps);
                }

                let current = ctx.current_buffer();
                let click_buffer = click_position(&key)
                    .and_then(|pos| pos.window)
                    .and_then(|window| ctx.window_buffer(window))
                    .filter(|buffer| *buffer != current);

                match self.machine.step(key, click_buffer) {
                    Step::Continue => {}
                    Step::Replay { from } => {
                        trace!(from, "replay");
                        self.replay(ctx);
                    }
                    Step::SwitchContext(buffer) => {
                        restore.get_or_insert(current);
                        ctx.set_buffer(buffer);
                        info!(buffer = buffer.0, "click switched buffer");
                        self.replay(ctx);
                    }
                    Step::Accept => break,
                    Step::Reject(err) => return Err(err.into()),
                }
            }

            let done = self.machine.finish(opts.dont_downcase_last);
            if let Some(event) = &delayed_switch_frame {
                session.set_unread_switch_frame(event.clone());
            }
            let seq = KeySequence {
                keys: done.keys,
                resolution: done.resolution,
                remapped: done.remapped,
                shift_translated: done.shift_translated,
                delayed_switch_frame,
                keyboard: session.current_keyboard(),
            };
            debug!(
                keys = %seq.describe(),
                command = ?seq.command(),
                shift_translated = seq.shift_translated,
                "key sequence read"
            );
            return Ok(ReadOutcome::Sequence(seq));
        }
    }

    /// Restart lookup with maps chosen for the buffered keys.
    fn replay<C: InputContext + ?Sized>(&mut self, ctx: &mut C) {
        let (first, second) = self.machine.replay_events();
        let maps = ctx.active_maps(first, second);
        self.machine.restart(maps);
    }
}
