#![forbid(unsafe_code)]

//! Runtime: remap engine, key-sequence reader, and input session.
//!
//! # Key Components
//!
//! - [`Session`] - Consumer end of the event queue, per-keyboard decoders
//!   and side queues, unread events, macro playback
//! - [`Reader`] - Reads one key sequence against the active keymaps
//! - [`SequenceMachine`] - The non-blocking state machine behind the reader
//! - [`RemapTables`] / [`RemapCursor`] - Decode, function-key, and
//!   translation layers
//! - [`InputContext`] / [`InputSink`] - What the embedding editor provides
//!   and what it is told
//! - [`MacroRecorder`] / [`InputMacro`] - Keyboard macros
//! - [`InputConfig`] - Limits, timings, and remap table configuration
//!
//! # Role in keyseq
//! `keyseq-runtime` sits between device backends and command dispatch. It
//! drains the queue filled by `keyseq-core` producers, rewrites device
//! encodings into keys, and resolves key sequences into commands.
//!
//! # How it fits in the system
//! A backend thread enqueues [`RawEvent`](keyseq_core::RawEvent)s through a
//! producer handle obtained from [`Session::producer`]. The editor's command
//! loop calls [`Reader::read_key_sequence`] and dispatches the returned
//! [`KeySequence`].

pub mod config;
pub mod context;
pub mod error;
pub mod input_macro;
pub mod machine;
pub mod reader;
pub mod remap;
pub mod session;
#[cfg(unix)]
pub mod signals;

pub use config::{ConfigError, InputConfig, RemapTableConfig};
pub use context::{InputContext, InputSink, MapContext, NullSink};
pub use error::ReadError;
pub use input_macro::{InputMacro, MacroPlayback, MacroRecorder, RecordingState, TimedEvent};
pub use machine::{MachineConfig, Resolution, SequenceMachine, Step};
pub use reader::{KeySequence, ReadOptions, ReadOutcome, Reader};
pub use remap::{KeyBuffer, RemapCursor, RemapLayer, RemapTables};
pub use session::Session;
#[cfg(unix)]
pub use signals::SignalGuard;
