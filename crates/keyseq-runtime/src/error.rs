#![forbid(unsafe_code)]

//! Errors that abort a single key-sequence read.
//!
//! Everything else the reader can run into is either transient (dropped
//! events, malformed bytes, unbound keys) and reported through a value, or a
//! quit, which is a [`ReadOutcome`](crate::reader::ReadOutcome) rather than an
//! error.

use keyseq_core::symbol::Symbol;

use crate::remap::RemapLayer;

/// A protocol violation detected while reading a key sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// A remap function returned something other than nothing, a key
    /// vector, or a string.
    #[error("function {function} in {layer} returned an invalid key sequence")]
    InvalidRemapResult { layer: RemapLayer, function: Symbol },
    /// The sequence, or a replacement spliced into it, exceeds the
    /// configured maximum length.
    #[error("key sequence too long (limit {limit})")]
    SequenceTooLong { limit: usize },
}

/// Result alias for reader operations.
pub type Result<T, E = ReadError> = std::result::Result<T, E>;

/// Non-local exit from deep inside a read.
///
/// Propagated with `?` through the session and reader, then turned into
/// [`ReadOutcome::Quit`](crate::reader::ReadOutcome::Quit) at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Quit { forced: bool },
    Error(ReadError),
}

impl From<keyseq_core::quit::Quit> for Interrupt {
    fn from(q: keyseq_core::quit::Quit) -> Self {
        Self::Quit { forced: q.forced }
    }
}

impl From<ReadError> for Interrupt {
    fn from(e: ReadError) -> Self {
        Self::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_culprit() {
        let err = ReadError::InvalidRemapResult {
            layer: RemapLayer::Translation,
            function: Symbol::new("my-translator"),
        };
        assert_eq!(
            err.to_string(),
            "function my-translator in key-translation-map returned an invalid key sequence"
        );
        assert_eq!(
            ReadError::SequenceTooLong { limit: 30 }.to_string(),
            "key sequence too long (limit 30)"
        );
    }

    #[test]
    fn quit_converts_to_interrupt() {
        let i: Interrupt = keyseq_core::quit::Quit { forced: true }.into();
        assert_eq!(i, Interrupt::Quit { forced: true });
    }
}
