#![forbid(unsafe_code)]

//! keyseq public facade crate.
//!
//! This crate provides the stable surface for embedders. It re-exports the
//! common types of `keyseq-core` and `keyseq-runtime`, bundles a session and
//! a reader into [`Pipeline`], and offers a prelude for day-to-day use.
//!
//! # Example
//!
//! ```ignore
//! use keyseq::prelude::*;
//!
//! let mut global = Keymap::named("global");
//! global.bind("C-x C-f", Binding::command("find-file"))?;
//! let mut pipeline = Pipeline::new(&InputConfig::default())?;
//! let mut ctx = MapContext::new(global);
//!
//! let producer = pipeline.producer();
//! std::thread::spawn(move || {
//!     for b in [0x18, 0x06] {
//!         producer.enqueue(RawEvent::byte(b));
//!     }
//! });
//! if let ReadOutcome::Sequence(seq) = pipeline.read(&mut ctx, &mut NullSink, &ReadOptions::default())? {
//!     println!("{} runs {:?}", seq.describe(), seq.command());
//! }
//! ```

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use keyseq_core::decoder::{DecoderConfig, MenuRegistry, TerminalCoding};
pub use keyseq_core::event::{
    Area, BufferId, FrameId, InputEvent, Key, KeyboardId, MouseEvent, Position, RawEvent,
    RawEventKind, UserSignal, WheelDirection, WindowId,
};
pub use keyseq_core::kbd::{KbdError, describe_events, parse_events, parse_keys};
pub use keyseq_core::keymap::{Binding, Keymap, KeymapError, RemapFunction, RemapRequest};
pub use keyseq_core::modifiers::{KeyChar, Modifiers};
pub use keyseq_core::queue::{EnqueueOutcome, QueueProducer};
pub use keyseq_core::quit::{QuitInhibitGuard, QuitState};
pub use keyseq_core::symbol::Symbol;

#[cfg(feature = "tracing-json")]
pub use keyseq_core::logging::init_json_logging;

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use keyseq_runtime::{
    ConfigError, InputConfig, InputContext, InputMacro, InputSink, KeySequence, MacroRecorder,
    MapContext, NullSink, ReadError, ReadOptions, ReadOutcome, Reader, RemapTableConfig,
    Resolution, Session,
};
#[cfg(all(feature = "runtime", unix))]
pub use keyseq_runtime::SignalGuard;

// --- Errors ---------------------------------------------------------------

/// Top-level error type for keyseq embedders.
#[derive(Debug)]
pub enum Error {
    /// A key description did not parse.
    Kbd(KbdError),
    /// A keymap could not be modified.
    Keymap(KeymapError),
    /// Configuration was rejected.
    #[cfg(feature = "runtime")]
    Config(ConfigError),
    /// A read was aborted.
    #[cfg(feature = "runtime")]
    Read(ReadError),
    /// Signal handlers could not be installed.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kbd(err) => write!(f, "{err}"),
            Self::Keymap(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Config(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Read(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Kbd(err) => Some(err),
            Self::Keymap(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Config(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Read(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<KbdError> for Error {
    fn from(err: KbdError) -> Self {
        Self::Kbd(err)
    }
}

impl From<KeymapError> for Error {
    fn from(err: KeymapError) -> Self {
        Self::Keymap(err)
    }
}

#[cfg(feature = "runtime")]
impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

#[cfg(feature = "runtime")]
impl From<ReadError> for Error {
    fn from(err: ReadError) -> Self {
        Self::Read(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Standard result type for keyseq APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Pipeline -------------------------------------------------------------

/// A session and a reader built from one configuration.
///
/// Hand [`producer`](Self::producer) handles to device backends and call
/// [`read`](Self::read) from the command loop.
#[cfg(feature = "runtime")]
#[derive(Debug)]
pub struct Pipeline {
    session: Session,
    reader: Reader,
}

#[cfg(feature = "runtime")]
impl Pipeline {
    /// Build a pipeline from `config`.
    ///
    /// # Errors
    ///
    /// Fails when the configuration does not validate or a remap table
    /// entry does not parse.
    pub fn new(config: &InputConfig) -> Result<Self> {
        Ok(Self {
            session: Session::new(config)?,
            reader: Reader::new(config),
        })
    }

    /// A producer handle for a backend thread.
    #[must_use]
    pub fn producer(&self) -> QueueProducer {
        self.session.producer()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Forward `SIGINT` and the user signals into this pipeline.
    ///
    /// # Errors
    ///
    /// Fails when the handlers cannot be registered.
    #[cfg(unix)]
    pub fn install_signals(&self) -> Result<SignalGuard> {
        let quit = std::sync::Arc::clone(self.session.quit_state());
        Ok(SignalGuard::install(self.session.producer(), quit)?)
    }

    /// Read one key sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] when a remap function misbehaves or the
    /// sequence outgrows the configured limit.
    pub fn read<C, S>(
        &mut self,
        ctx: &mut C,
        sink: &mut S,
        opts: &ReadOptions,
    ) -> Result<ReadOutcome>
    where
        C: InputContext + ?Sized,
        S: InputSink + ?Sized,
    {
        Ok(self
            .reader
            .read_key_sequence(&mut self.session, ctx, sink, opts)?)
    }
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Binding, Error, InputEvent, Key, KeyChar, Keymap, Modifiers, RawEvent, RawEventKind,
        Result, Symbol,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{
        InputConfig, InputContext, InputSink, KeySequence, MapContext, NullSink, Pipeline,
        ReadOptions, ReadOutcome, Resolution,
    };

    pub use crate::core;
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use keyseq_core as core;
#[cfg(feature = "runtime")]
pub use keyseq_runtime as runtime;
