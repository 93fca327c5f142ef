#![cfg_attr(not(test), forbid(unsafe_code))]
#![cfg_attr(test, deny(unsafe_code))]

//! Core: event queue, quit bridge, decoding, modifiers, and keymaps.
//!
//! # Role in keyseq
//! `keyseq-core` is the device-facing layer. It owns everything that exists
//! below a key sequence: raw events and their bounded queue, the quit
//! request shared with signal handlers, per-keyboard decoding into
//! canonical events, the modifier algebra, and keymap values.
//!
//! # Primary responsibilities
//! - **EventQueue**: bounded ring buffer, producer flow control, quit-char
//!   detection at enqueue time.
//! - **QuitState**: async-safe quit request with inhibition and escalation.
//! - **EventDecoder**: multi-byte decoding, click counting, frame switches.
//! - **ModifierAlgebra**: splitting and composing modifier-prefixed names.
//! - **Keymap**: copy-on-write prefix maps and key descriptions.
//!
//! # How it fits in the system
//! `keyseq-runtime` drains the queue, decodes events, and assembles key
//! sequences against keymaps supplied by the embedding editor.

pub mod decoder;
pub mod event;
pub mod kbd;
pub mod keymap;
pub mod keysym;
pub mod logging;
pub mod modifiers;
pub mod queue;
pub mod quit;
pub mod symbol;
pub mod wake;

pub use decoder::{DecodeStatus, DecoderConfig, EventDecoder, MenuRegistry, TerminalCoding};
pub use event::{
    Area, BufferId, FocusEvent, FrameId, InputEvent, Key, KeyboardId, MenuEvent, MouseEvent,
    Position, RawEvent, RawEventKind, UserSignal, WheelDirection, WheelEvent, WindowId,
};
pub use kbd::{KbdError, describe_events, describe_keys, parse_events, parse_keys};
pub use keymap::{Binding, Keymap, KeymapError, RemapFunction, RemapRequest};
pub use modifiers::{KeyChar, ModifierAlgebra, Modifiers};
pub use queue::{EnqueueOutcome, EventQueue, QueueConsumer, QueueProducer};
pub use quit::{Quit, QuitInhibitGuard, QuitState};
pub use symbol::Symbol;
pub use wake::{WakeReason, Waker};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};
