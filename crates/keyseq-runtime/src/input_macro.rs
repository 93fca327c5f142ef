#![forbid(unsafe_code)]

//! Keyboard macro recording and playback.
//!
//! A [`MacroRecorder`] is an [`InputSink`]: hand it to
//! [`Reader::read_key_sequence`](crate::reader::Reader::read_key_sequence)
//! and every live key the reader accepts is recorded with its delay from
//! the previous one. [`Session::execute_macro`](crate::session::Session::execute_macro)
//! feeds a finished [`InputMacro`] back through the reader ahead of the
//! event queue; played-back keys are not live, so a recorder never records
//! its own playback.
//!
//! # Example
//!
//! ```ignore
//! use keyseq_runtime::input_macro::MacroRecorder;
//!
//! let mut recorder = MacroRecorder::new("swap-words");
//! recorder.start();
//! let seq = reader.read_key_sequence(&mut session, &mut ctx, &mut recorder, &opts)?;
//! // ... more reads ...
//! let recorded = recorder.finish();
//! session.execute_macro(recorded);
//! ```

use keyseq_core::event::InputEvent;
use keyseq_core::kbd;
use tracing::{debug, info};
use web_time::{Duration, Instant};

use crate::context::InputSink;

/// A recorded event with its delay from the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub event: InputEvent,
    /// Delay from the previous event, or from recording start for the
    /// first.
    pub delay: Duration,
}

impl TimedEvent {
    #[must_use]
    pub fn new(event: InputEvent, delay: Duration) -> Self {
        Self { event, delay }
    }

    /// A timed event with zero delay.
    #[must_use]
    pub fn immediate(event: InputEvent) -> Self {
        Self {
            event,
            delay: Duration::ZERO,
        }
    }
}

/// Metadata about a recorded macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroMetadata {
    pub name: String,
    /// Time from recording start to the last event.
    pub total_duration: Duration,
}

/// A recorded key sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct InputMacro {
    events: Vec<TimedEvent>,
    metadata: MacroMetadata,
}

impl InputMacro {
    #[must_use]
    pub fn new(events: Vec<TimedEvent>, metadata: MacroMetadata) -> Self {
        Self { events, metadata }
    }

    /// A macro from bare events, all with zero delay.
    #[must_use]
    pub fn from_events(name: impl Into<String>, events: Vec<InputEvent>) -> Self {
        Self {
            events: events.into_iter().map(TimedEvent::immediate).collect(),
            metadata: MacroMetadata {
                name: name.into(),
                total_duration: Duration::ZERO,
            },
        }
    }

    #[must_use]
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    #[must_use]
    pub fn metadata(&self) -> &MacroMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.metadata.total_duration
    }

    /// The events without timing, in order.
    #[must_use]
    pub fn bare_events(&self) -> Vec<InputEvent> {
        self.events.iter().map(|e| e.event.clone()).collect()
    }

    /// The events in key description syntax, e.g. `C-x C-f`.
    #[must_use]
    pub fn describe(&self) -> String {
        kbd::describe_events(&self.bare_events())
    }
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

/// Recorder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Paused,
}

/// Records the keys a reader accepts into an [`InputMacro`].
#[derive(Debug, Clone)]
pub struct MacroRecorder {
    name: String,
    state: RecordingState,
    events: Vec<TimedEvent>,
    start_time: Instant,
    last_event_time: Instant,
}

impl MacroRecorder {
    /// An idle recorder; call [`start`](Self::start) to begin.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            name: name.into(),
            state: RecordingState::Idle,
            events: Vec::new(),
            start_time: now,
            last_event_time: now,
        }
    }

    pub fn start(&mut self) {
        let now = Instant::now();
        self.start_time = now;
        self.last_event_time = now;
        self.state = RecordingState::Recording;
        info!(name = %self.name, "macro recording started");
    }

    pub fn pause(&mut self) {
        if self.state == RecordingState::Recording {
            self.state = RecordingState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == RecordingState::Paused {
            self.state = RecordingState::Recording;
            self.last_event_time = Instant::now();
        }
    }

    #[must_use]
    pub fn state(&self) -> RecordingState {
        self.state
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Record an event now, if recording.
    pub fn record_event(&mut self, event: &InputEvent) {
        if !self.is_recording() {
            return;
        }
        let now = Instant::now();
        let delay = now.duration_since(self.last_event_time);
        debug!(?event, ?delay, "macro record event");
        self.events.push(TimedEvent::new(event.clone(), delay));
        self.last_event_time = now;
    }

    /// Record an event with an explicit delay, regardless of state.
    pub fn record_event_with_delay(&mut self, event: InputEvent, delay: Duration) {
        self.events.push(TimedEvent::new(event, delay));
        self.last_event_time += delay;
    }

    /// Forget the last `n` events, e.g. the keys that ended the recording.
    pub fn drop_last(&mut self, n: usize) {
        let keep = self.events.len().saturating_sub(n);
        self.events.truncate(keep);
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Stop recording and produce the macro.
    #[must_use]
    pub fn finish(self) -> InputMacro {
        let total_duration = self.last_event_time.duration_since(self.start_time);
        info!(
            name = %self.name,
            events = self.events.len(),
            duration_ms = total_duration.as_millis() as u64,
            "macro recording finished"
        );
        InputMacro {
            events: self.events,
            metadata: MacroMetadata {
                name: self.name,
                total_duration,
            },
        }
    }
}

impl InputSink for MacroRecorder {
    fn key_read(&mut self, event: &InputEvent) {
        self.record_event(event);
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// Feeds a macro's events to a session, optionally several times.
///
/// Playback is instant; recorded delays are informational.
#[derive(Debug, Clone)]
pub struct MacroPlayback {
    input_macro: InputMacro,
    position: usize,
    remaining_runs: usize,
}

impl MacroPlayback {
    /// Play `input_macro` once.
    #[must_use]
    pub fn new(input_macro: InputMacro) -> Self {
        Self {
            input_macro,
            position: 0,
            remaining_runs: 1,
        }
    }

    /// Play the macro `count` times; 0 is treated as 1.
    #[must_use]
    pub fn with_repeat(mut self, count: usize) -> Self {
        self.remaining_runs = count.max(1);
        self
    }

    /// Current event index within the run.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.input_macro.is_empty()
            || (self.remaining_runs <= 1 && self.position >= self.input_macro.len())
    }

    /// The next event, or `None` once every run is complete.
    pub fn next_event(&mut self) -> Option<InputEvent> {
        if self.input_macro.is_empty() {
            return None;
        }
        if self.position >= self.input_macro.len() {
            if self.remaining_runs <= 1 {
                return None;
            }
            self.remaining_runs -= 1;
            self.position = 0;
        }
        let event = self.input_macro.events[self.position].event.clone();
        self.position += 1;
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(desc: &str) -> Vec<InputEvent> {
        kbd::parse_events(desc).unwrap()
    }

    #[test]
    fn from_events_has_zero_delays() {
        let m = InputMacro::from_events("t", events("a b"));
        assert_eq!(m.len(), 2);
        assert!(m.events().iter().all(|e| e.delay == Duration::ZERO));
        assert_eq!(m.describe(), "a b");
        assert_eq!(m.metadata().name, "t");
    }

    #[test]
    fn recorder_only_records_while_recording() {
        let mut rec = MacroRecorder::new("r");
        rec.key_read(&InputEvent::char('a'));
        assert_eq!(rec.event_count(), 0);
        rec.start();
        rec.key_read(&InputEvent::char('b'));
        rec.pause();
        rec.key_read(&InputEvent::char('c'));
        rec.resume();
        rec.key_read(&InputEvent::char('d'));
        assert_eq!(rec.finish().bare_events(), events("b d"));
    }

    #[test]
    fn explicit_delays_accumulate() {
        let mut rec = MacroRecorder::new("r");
        rec.record_event_with_delay(InputEvent::char('a'), Duration::from_millis(10));
        rec.record_event_with_delay(InputEvent::char('b'), Duration::from_millis(30));
        let m = rec.finish();
        assert_eq!(m.total_duration(), Duration::from_millis(40));
        assert_eq!(m.events()[1].delay, Duration::from_millis(30));
    }

    #[test]
    fn drop_last_trims_the_tail() {
        let mut rec = MacroRecorder::new("r");
        for ev in events("a C-x )") {
            rec.record_event_with_delay(ev, Duration::ZERO);
        }
        rec.drop_last(2);
        assert_eq!(rec.finish().bare_events(), events("a"));
    }

    #[test]
    fn playback_repeats_then_ends() {
        let mut p = MacroPlayback::new(InputMacro::from_events("p", events("x y"))).with_repeat(2);
        let played: Vec<_> = std::iter::from_fn(|| p.next_event()).collect();
        assert_eq!(played, events("x y x y"));
        assert!(p.is_done());
        assert_eq!(p.next_event(), None);
    }

    #[test]
    fn empty_macro_is_done_at_once() {
        let mut p = MacroPlayback::new(InputMacro::from_events("e", Vec::new()));
        assert!(p.is_done());
        assert_eq!(p.next_event(), None);
    }
}
