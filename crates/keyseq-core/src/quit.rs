#![forbid(unsafe_code)]

//! Cooperative cancellation shared between producers and the consumer.
//!
//! A quit request is a flag. Producers (the signal thread, the queue when it
//! sees the quit character) raise it with [`QuitState::request_quit`]; the
//! consumer observes it at safe points with [`QuitState::check`] and unwinds
//! the current read with `?`.
//!
//! # Inhibition and escalation
//!
//! Code that must not be interrupted holds a [`QuitInhibitGuard`]. A request
//! raised while inhibited is kept pending and honored at the first check
//! after the last guard drops. Each further request that arrives while one
//! is already pending bumps a counter. The request is *forced*, and
//! [`check`](QuitState::check) honors it even inside an inhibition scope,
//! once the counter reaches the escalation threshold, or when a repeated
//! request finds the first one pending for longer than the escalation
//! patience.
//!
//! # Producer contract
//!
//! `request_quit` touches only atomics and the lock-free [`Waker`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use web_time::{Duration, Instant};

use crate::wake::Waker;

/// Default number of pending requests that force a quit.
pub const DEFAULT_ESCALATION_THRESHOLD: u32 = 3;

/// Default time a request may stay pending before a repeat forces it.
pub const DEFAULT_ESCALATION_PATIENCE: Duration = Duration::from_secs(1);

/// A quit request was honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quit {
    /// Whether the quit overrode an inhibition scope.
    pub forced: bool,
}

impl fmt::Display for Quit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.forced {
            f.write_str("quit (forced)")
        } else {
            f.write_str("quit")
        }
    }
}

impl std::error::Error for Quit {}

/// Process-wide quit flag.
#[derive(Debug)]
pub struct QuitState {
    requested: AtomicBool,
    forced: AtomicBool,
    count: AtomicU32,
    inhibit_depth: AtomicU32,
    threshold: AtomicU32,
    /// Milliseconds a request may stay pending before a repeat forces it;
    /// zero disables.
    patience_ms: AtomicU64,
    /// Milliseconds since `epoch` of the first pending request, plus one.
    requested_at: AtomicU64,
    epoch: Instant,
    waker: Arc<Waker>,
}

impl Default for QuitState {
    fn default() -> Self {
        Self::new(Arc::new(Waker::new()))
    }
}

impl QuitState {
    /// Create a quit state that wakes `waker` on each request.
    #[must_use]
    pub fn new(waker: Arc<Waker>) -> Self {
        Self {
            requested: AtomicBool::new(false),
            forced: AtomicBool::new(false),
            count: AtomicU32::new(0),
            inhibit_depth: AtomicU32::new(0),
            threshold: AtomicU32::new(DEFAULT_ESCALATION_THRESHOLD),
            patience_ms: AtomicU64::new(DEFAULT_ESCALATION_PATIENCE.as_millis() as u64),
            requested_at: AtomicU64::new(0),
            epoch: Instant::now(),
            waker,
        }
    }

    /// Set how many pending requests force a quit. Clamped to at least 1.
    #[must_use]
    pub fn with_escalation_threshold(self, threshold: u32) -> Self {
        self.threshold.store(threshold.max(1), Ordering::Relaxed);
        self
    }

    /// Set how long a request may stay pending before a repeated request
    /// forces it. `None` leaves escalation to the request count alone.
    #[must_use]
    pub fn with_escalation_patience(self, patience: Option<Duration>) -> Self {
        let ms = patience.map_or(0, |p| (p.as_millis() as u64).max(1));
        self.patience_ms.store(ms, Ordering::Relaxed);
        self
    }

    /// The waker notified on each request.
    #[must_use]
    pub fn waker(&self) -> &Arc<Waker> {
        &self.waker
    }

    /// Raise a quit request.
    ///
    /// Callable from any producer context.
    pub fn request_quit(&self) {
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        let now = self.epoch.elapsed().as_millis() as u64;
        let overdue = if self.requested.swap(true, Ordering::AcqRel) {
            let patience = self.patience_ms.load(Ordering::Relaxed);
            let at = self.requested_at.load(Ordering::Acquire);
            patience > 0 && at > 0 && now.saturating_sub(at - 1) >= patience
        } else {
            self.requested_at.store(now + 1, Ordering::Release);
            false
        };
        if overdue || count >= self.threshold.load(Ordering::Relaxed) {
            self.forced.store(true, Ordering::Release);
        }
        self.waker.wake();
    }

    /// Whether a request is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Whether the pending request has escalated.
    #[must_use]
    pub fn is_forced(&self) -> bool {
        self.forced.load(Ordering::Acquire)
    }

    /// Whether an inhibition scope is active.
    #[must_use]
    pub fn is_inhibited(&self) -> bool {
        self.inhibit_depth.load(Ordering::Acquire) > 0
    }

    /// How long the current request has been pending.
    #[must_use]
    pub fn pending_for(&self) -> Option<Duration> {
        match self.requested_at.load(Ordering::Acquire) {
            0 => None,
            at => {
                let now = self.epoch.elapsed().as_millis() as u64;
                Some(Duration::from_millis(now.saturating_sub(at - 1)))
            }
        }
    }

    /// Safe point: honor a pending request.
    ///
    /// # Errors
    ///
    /// Returns [`Quit`] when a request is pending and either no inhibition
    /// scope is active or the request was forced. The request is consumed.
    pub fn check(&self) -> Result<(), Quit> {
        if !self.is_pending() {
            return Ok(());
        }
        let forced = self.is_forced();
        if self.is_inhibited() && !forced {
            return Ok(());
        }
        self.clear();
        #[cfg(feature = "tracing")]
        tracing::debug!(forced, "quit honored");
        Err(Quit { forced })
    }

    /// Discard any pending request.
    pub fn clear(&self) {
        self.requested.store(false, Ordering::Release);
        self.forced.store(false, Ordering::Release);
        self.count.store(0, Ordering::Release);
        self.requested_at.store(0, Ordering::Release);
    }

    /// Enter an inhibition scope.
    #[must_use = "inhibition ends when the guard drops"]
    pub fn inhibit(self: &Arc<Self>) -> QuitInhibitGuard {
        self.inhibit_depth.fetch_add(1, Ordering::AcqRel);
        QuitInhibitGuard {
            state: Arc::clone(self),
        }
    }
}

/// RAII inhibition scope; see [`QuitState::inhibit`].
#[derive(Debug)]
pub struct QuitInhibitGuard {
    state: Arc<QuitState>,
}

impl Drop for QuitInhibitGuard {
    fn drop(&mut self) {
        self.state.inhibit_depth.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_consumes_request() {
        let q = QuitState::default();
        assert!(q.check().is_ok());
        q.request_quit();
        assert!(q.is_pending());
        assert_eq!(q.check(), Err(Quit { forced: false }));
        assert!(q.check().is_ok());
    }

    #[test]
    fn inhibited_request_waits_for_guard_drop() {
        let q = Arc::new(QuitState::default());
        let guard = q.inhibit();
        q.request_quit();
        assert!(q.check().is_ok());
        assert!(q.check().is_ok());
        drop(guard);
        assert_eq!(q.check(), Err(Quit { forced: false }));
        assert!(q.check().is_ok());
    }

    #[test]
    fn nested_guards() {
        let q = Arc::new(QuitState::default());
        let outer = q.inhibit();
        let inner = q.inhibit();
        q.request_quit();
        drop(inner);
        assert!(q.check().is_ok());
        drop(outer);
        assert!(q.check().is_err());
    }

    #[test]
    fn escalation_overrides_inhibition() {
        let q = Arc::new(QuitState::default());
        let _guard = q.inhibit();
        q.request_quit();
        q.request_quit();
        assert!(q.check().is_ok());
        q.request_quit();
        assert_eq!(q.check(), Err(Quit { forced: true }));
        assert!(!q.is_forced());
    }

    #[test]
    fn custom_threshold() {
        let q = Arc::new(QuitState::default().with_escalation_threshold(1));
        let _guard = q.inhibit();
        q.request_quit();
        assert_eq!(q.check(), Err(Quit { forced: true }));
    }

    #[test]
    fn repeat_after_patience_forces() {
        let q = Arc::new(
            QuitState::default().with_escalation_patience(Some(Duration::from_millis(5))),
        );
        let _guard = q.inhibit();
        q.request_quit();
        assert!(q.check().is_ok());
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(q.pending_for().is_some_and(|d| d >= Duration::from_millis(5)));
        q.request_quit();
        assert_eq!(q.check(), Err(Quit { forced: true }));
    }

    #[test]
    fn quick_repeat_does_not_force() {
        let q = Arc::new(QuitState::default());
        let _guard = q.inhibit();
        q.request_quit();
        q.request_quit();
        assert!(!q.is_forced());
        assert!(q.check().is_ok());
    }

    #[test]
    fn without_patience_only_the_count_escalates() {
        let q = Arc::new(QuitState::default().with_escalation_patience(None));
        let _guard = q.inhibit();
        q.request_quit();
        std::thread::sleep(std::time::Duration::from_millis(5));
        q.request_quit();
        assert!(!q.is_forced());
        q.request_quit();
        assert!(q.is_forced());
    }

    #[test]
    fn request_wakes_consumer() {
        let q = QuitState::default();
        q.request_quit();
        assert!(q.waker().take());
        assert!(q.pending_for().is_some());
        q.clear();
        assert!(q.pending_for().is_none());
    }
}
