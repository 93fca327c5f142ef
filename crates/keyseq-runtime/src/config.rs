#![forbid(unsafe_code)]

//! Reader configuration.
//!
//! [`InputConfig`] gathers every tunable of the input pipeline: queue
//! capacity, quit character and escalation, click timing, echo delay, the
//! help character, and the remap tables. Defaults match the behavior users
//! expect from an unconfigured editor.
//!
//! # Loading
//!
//! ```toml
//! # keyseq.toml
//! quit_char = 7
//! echo_delay_ms = 1000
//! coding = "utf-8"
//!
//! [remap]
//! xterm_defaults = true
//!
//! [remap.translation]
//! "C-c <f5>" = "C-c r"
//! ```
//!
//! ```rust,ignore
//! let config = InputConfig::from_toml_file("keyseq.toml")?.validated();
//! ```
//!
//! # Environment
//!
//! [`InputConfig::from_env`] overlays `KEYSEQ_*` variables on the defaults.

use std::collections::BTreeMap;
#[cfg(feature = "config-file")]
use std::path::Path;

#[cfg(feature = "config-file")]
use serde::{Deserialize, Serialize};

use keyseq_core::decoder::{
    DEFAULT_DOUBLE_CLICK_FUZZ, DEFAULT_DOUBLE_CLICK_TIME, DecoderConfig, TerminalCoding,
};
use keyseq_core::kbd::KbdError;
use keyseq_core::quit::{DEFAULT_ESCALATION_PATIENCE, DEFAULT_ESCALATION_THRESHOLD};
use web_time::Duration;

/// Default maximum number of events in one key sequence.
pub const DEFAULT_MAX_SEQUENCE_LEN: usize = 30;
/// Default queue capacity in slots.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;
/// C-g.
pub const DEFAULT_QUIT_CHAR: u32 = 7;
/// C-h.
pub const DEFAULT_HELP_CHAR: u32 = 8;
/// Command run when the help character follows a prefix.
pub const DEFAULT_PREFIX_HELP_COMMAND: &str = "describe-prefix-bindings";
/// Default idle time before a partial sequence is echoed.
pub const DEFAULT_ECHO_DELAY_MS: u64 = 1000;
/// Default size of the recent-keys ring.
pub const DEFAULT_RECENT_KEYS: usize = 300;

const MIN_MAX_SEQUENCE_LEN: usize = 4;
const MAX_MAX_SEQUENCE_LEN: usize = 1024;
const MIN_QUEUE_CAPACITY: usize = 16;
const MAX_QUEUE_CAPACITY: usize = 1 << 20;
const MAX_DOUBLE_CLICK_MS: u64 = 10_000;
const MAX_ECHO_DELAY_MS: u64 = 60_000;
const MAX_RECENT_KEYS: usize = 100_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from loading or applying configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config-file")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config-file")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// A remap table entry does not parse as a key description.
    #[error("remap entry {entry:?}: {source}")]
    Keys {
        entry: String,
        #[source]
        source: KbdError,
    },
    /// Validation errors.
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ---------------------------------------------------------------------------
// Remap tables
// ---------------------------------------------------------------------------

/// Remap tables as key-description pairs.
///
/// Each entry maps a matched sequence to its replacement, both written the
/// way [`keyseq_core::kbd::parse_keys`] reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct RemapTableConfig {
    /// Seed the decode and function-key tables with the xterm set.
    pub xterm_defaults: bool,
    /// Device encodings, applied first.
    pub decode: BTreeMap<String, String>,
    /// Function-key translations, applied only to unbound suffixes.
    pub function_key: BTreeMap<String, String>,
    /// User translations, applied last and unconditionally.
    pub translation: BTreeMap<String, String>,
}

impl RemapTableConfig {
    /// Tables seeded with the xterm defaults.
    #[must_use]
    pub fn xterm() -> Self {
        Self {
            xterm_defaults: true,
            ..Self::default()
        }
    }

    /// Add a translation entry.
    #[must_use]
    pub fn with_translation(mut self, from: &str, to: &str) -> Self {
        self.translation.insert(from.into(), to.into());
        self
    }

    /// Add a decode entry.
    #[must_use]
    pub fn with_decode(mut self, from: &str, to: &str) -> Self {
        self.decode.insert(from.into(), to.into());
        self
    }

    /// Add a function-key entry.
    #[must_use]
    pub fn with_function_key(mut self, from: &str, to: &str) -> Self {
        self.function_key.insert(from.into(), to.into());
        self
    }
}

// ---------------------------------------------------------------------------
// InputConfig
// ---------------------------------------------------------------------------

/// Configuration of the whole input pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct InputConfig {
    /// Longest key sequence the reader accepts.
    pub max_sequence_len: usize,
    /// Queue slots; one is kept free.
    pub queue_capacity: usize,
    /// Character that raises a quit request when typed.
    pub quit_char: u32,
    /// Pending quit requests that force a quit through inhibition.
    pub escalation_threshold: u32,
    /// A repeated quit request forces the quit once the first has been
    /// pending this long; `None` escalates by count only.
    pub escalation_patience_ms: Option<u64>,
    /// Character that asks for help after a prefix; `None` disables.
    pub help_char: Option<u32>,
    /// Command reported when the help character follows a prefix.
    pub prefix_help_command: Option<String>,
    /// Multi-click window; `None` disables click bursts.
    pub double_click_time_ms: Option<u64>,
    /// Pointer travel, in cells, still counted as the same click.
    pub double_click_fuzz: i32,
    /// Idle time before a partial sequence is echoed; `None` disables.
    pub echo_delay_ms: Option<u64>,
    /// Give up on a read after this long without input.
    pub read_timeout_ms: Option<u64>,
    /// Retry unbound upper-case and shifted keys unshifted.
    pub translate_upper_case: bool,
    /// Terminal byte coding name: `utf-8`, `latin-1` or `meta`.
    pub coding: String,
    /// Report pointer motion.
    pub track_mouse: bool,
    /// Size of the recent-keys ring.
    pub recent_keys: usize,
    /// Remap tables.
    pub remap: RemapTableConfig,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_sequence_len: DEFAULT_MAX_SEQUENCE_LEN,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            quit_char: DEFAULT_QUIT_CHAR,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            escalation_patience_ms: Some(DEFAULT_ESCALATION_PATIENCE.as_millis() as u64),
            help_char: Some(DEFAULT_HELP_CHAR),
            prefix_help_command: Some(DEFAULT_PREFIX_HELP_COMMAND.into()),
            double_click_time_ms: Some(DEFAULT_DOUBLE_CLICK_TIME.as_millis() as u64),
            double_click_fuzz: DEFAULT_DOUBLE_CLICK_FUZZ,
            echo_delay_ms: Some(DEFAULT_ECHO_DELAY_MS),
            read_timeout_ms: None,
            translate_upper_case: true,
            coding: "utf-8".into(),
            track_mouse: false,
            recent_keys: DEFAULT_RECENT_KEYS,
            remap: RemapTableConfig::default(),
        }
    }
}

impl InputConfig {
    /// Set the maximum sequence length.
    #[must_use]
    pub fn with_max_sequence_len(mut self, len: usize) -> Self {
        self.max_sequence_len = len;
        self
    }

    /// Set the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the quit character.
    #[must_use]
    pub fn with_quit_char(mut self, c: u32) -> Self {
        self.quit_char = c;
        self
    }

    /// Set the help character.
    #[must_use]
    pub fn with_help_char(mut self, c: Option<u32>) -> Self {
        self.help_char = c;
        self
    }

    /// Set the multi-click window.
    #[must_use]
    pub fn with_double_click_time(mut self, time: Option<Duration>) -> Self {
        self.double_click_time_ms = time.map(|t| t.as_millis() as u64);
        self
    }

    /// Set how long a quit request may stay pending before a repeat forces
    /// it.
    #[must_use]
    pub fn with_escalation_patience(mut self, patience: Option<Duration>) -> Self {
        self.escalation_patience_ms = patience.map(|d| d.as_millis() as u64);
        self
    }

    /// Set the echo delay.
    #[must_use]
    pub fn with_echo_delay(mut self, delay: Option<Duration>) -> Self {
        self.echo_delay_ms = delay.map(|d| d.as_millis() as u64);
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Enable or disable upper-case fallback.
    #[must_use]
    pub fn with_translate_upper_case(mut self, enabled: bool) -> Self {
        self.translate_upper_case = enabled;
        self
    }

    /// Set the terminal coding by name.
    #[must_use]
    pub fn with_coding(mut self, coding: &str) -> Self {
        self.coding = coding.into();
        self
    }

    /// Set the remap tables.
    #[must_use]
    pub fn with_remap(mut self, remap: RemapTableConfig) -> Self {
        self.remap = remap;
        self
    }

    /// Quit escalation patience as a [`Duration`].
    #[must_use]
    pub fn escalation_patience(&self) -> Option<Duration> {
        self.escalation_patience_ms.map(Duration::from_millis)
    }

    /// The idle echo delay.
    #[must_use]
    pub fn echo_delay(&self) -> Option<Duration> {
        self.echo_delay_ms.map(Duration::from_millis)
    }

    /// The read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Decoder settings derived from this config.
    ///
    /// An unknown coding name falls back to UTF-8.
    #[must_use]
    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            coding: TerminalCoding::from_name(&self.coding).unwrap_or_default(),
            double_click_time: self.double_click_time_ms.map(Duration::from_millis),
            double_click_fuzz: self.double_click_fuzz,
            track_mouse: self.track_mouse,
        }
    }

    /// Create config from environment variables.
    ///
    /// Reads:
    /// - `KEYSEQ_MAX_SEQUENCE_LEN`
    /// - `KEYSEQ_QUEUE_CAPACITY`
    /// - `KEYSEQ_QUIT_CHAR`: a character code
    /// - `KEYSEQ_ESCALATION`: pending quits that force a quit
    /// - `KEYSEQ_DOUBLE_CLICK_MS`: `0` disables click bursts
    /// - `KEYSEQ_ECHO_DELAY_MS`: `0` disables idle echo
    /// - `KEYSEQ_READ_TIMEOUT_MS`
    /// - `KEYSEQ_CODING`: `utf-8`, `latin-1` or `meta`
    /// - `KEYSEQ_TRACK_MOUSE`: "1" or "true"
    /// - `KEYSEQ_XTERM`: "1" or "true" seeds the xterm remap tables
    ///
    /// Values are automatically clamped to valid ranges.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable lookup.
    #[must_use]
    pub fn from_env_with(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = get("KEYSEQ_MAX_SEQUENCE_LEN")
            && let Ok(n) = val.parse::<usize>()
        {
            config.max_sequence_len = n;
        }

        if let Some(val) = get("KEYSEQ_QUEUE_CAPACITY")
            && let Ok(n) = val.parse::<usize>()
        {
            config.queue_capacity = n;
        }

        if let Some(val) = get("KEYSEQ_QUIT_CHAR")
            && let Ok(c) = val.parse::<u32>()
        {
            config.quit_char = c;
        }

        if let Some(val) = get("KEYSEQ_ESCALATION")
            && let Ok(n) = val.parse::<u32>()
        {
            config.escalation_threshold = n;
        }

        if let Some(val) = get("KEYSEQ_ESCALATION_PATIENCE_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.escalation_patience_ms = (ms > 0).then_some(ms);
        }

        if let Some(val) = get("KEYSEQ_DOUBLE_CLICK_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.double_click_time_ms = (ms > 0).then_some(ms);
        }

        if let Some(val) = get("KEYSEQ_ECHO_DELAY_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.echo_delay_ms = (ms > 0).then_some(ms);
        }

        if let Some(val) = get("KEYSEQ_READ_TIMEOUT_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.read_timeout_ms = Some(ms);
        }

        if let Some(val) = get("KEYSEQ_CODING")
            && TerminalCoding::from_name(&val).is_some()
        {
            config.coding = val;
        }

        if let Some(val) = get("KEYSEQ_TRACK_MOUSE") {
            config.track_mouse = val == "1" || val.eq_ignore_ascii_case("true");
        }

        if let Some(val) = get("KEYSEQ_XTERM") {
            config.remap.xterm_defaults = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config.validated()
    }

    /// Validate and clamp values to safe ranges.
    ///
    /// Returns a new config with:
    /// - `max_sequence_len` clamped to 4-1024
    /// - `queue_capacity` clamped to 16-1M slots
    /// - `escalation_threshold` at least 1
    /// - click, echo and recent-keys settings capped
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.max_sequence_len = self
            .max_sequence_len
            .clamp(MIN_MAX_SEQUENCE_LEN, MAX_MAX_SEQUENCE_LEN);
        self.queue_capacity = self
            .queue_capacity
            .clamp(MIN_QUEUE_CAPACITY, MAX_QUEUE_CAPACITY);
        self.escalation_threshold = self.escalation_threshold.max(1);
        self.double_click_time_ms = self
            .double_click_time_ms
            .map(|ms| ms.min(MAX_DOUBLE_CLICK_MS));
        self.double_click_fuzz = self.double_click_fuzz.max(0);
        self.echo_delay_ms = self.echo_delay_ms.map(|ms| ms.min(MAX_ECHO_DELAY_MS));
        self.recent_keys = self.recent_keys.min(MAX_RECENT_KEYS);
        self
    }

    /// Check all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(MIN_MAX_SEQUENCE_LEN..=MAX_MAX_SEQUENCE_LEN).contains(&self.max_sequence_len) {
            errors.push(format!(
                "max_sequence_len must be in [{MIN_MAX_SEQUENCE_LEN}, {MAX_MAX_SEQUENCE_LEN}], got {}",
                self.max_sequence_len
            ));
        }

        if !(MIN_QUEUE_CAPACITY..=MAX_QUEUE_CAPACITY).contains(&self.queue_capacity) {
            errors.push(format!(
                "queue_capacity must be in [{MIN_QUEUE_CAPACITY}, {MAX_QUEUE_CAPACITY}], got {}",
                self.queue_capacity
            ));
        }

        if self.escalation_threshold == 0 {
            errors.push("escalation_threshold must be > 0".into());
        }

        if self.help_char.is_some() && self.help_char == Some(self.quit_char) {
            errors.push(format!(
                "help_char and quit_char must differ, both are {}",
                self.quit_char
            ));
        }

        if self.double_click_fuzz < 0 {
            errors.push(format!(
                "double_click_fuzz must be >= 0, got {}",
                self.double_click_fuzz
            ));
        }

        if TerminalCoding::from_name(&self.coding).is_none() {
            errors.push(format!("unknown coding {:?}", self.coding));
        }

        errors
    }

    /// Fail with [`ConfigError::Validation`] unless [`validate`](Self::validate)
    /// is clean.
    ///
    /// # Errors
    ///
    /// Returns every validation failure at once.
    pub fn check(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load from a TOML string.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }
}
