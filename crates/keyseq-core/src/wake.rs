#![forbid(unsafe_code)]

//! Consumer wakeup slot shared by the event queue and the quit bridge.
//!
//! The consumer registers its thread once; producers publish a notification
//! flag and unpark that thread. The registered thread lives in an
//! [`arc_swap::ArcSwapOption`], so the producer path is a lock-free load
//! plus an unpark and never allocates.
//!
//! # Constraints
//!
//! - `#![forbid(unsafe_code)]`; the unsafe lives inside `arc-swap`.
//! - A notification raised before the consumer waits is never lost: the flag
//!   is checked before parking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Thread};

use arc_swap::ArcSwapOption;
use web_time::{Duration, Instant};

/// Why [`Waker::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// A producer called [`Waker::wake`].
    Notified,
    /// The deadline passed first.
    TimedOut,
}

/// Single-consumer wakeup slot.
#[derive(Debug, Default)]
pub struct Waker {
    thread: ArcSwapOption<Thread>,
    notified: AtomicBool,
}

impl Waker {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the calling thread as the consumer.
    pub fn register_current(&self) {
        let current = thread::current();
        let same = self
            .thread
            .load()
            .as_ref()
            .is_some_and(|t| t.id() == current.id());
        if !same {
            self.thread.store(Some(Arc::new(current)));
        }
    }

    /// Raise the notification and unpark the consumer, if registered.
    pub fn wake(&self) {
        self.notified.store(true, Ordering::Release);
        if let Some(t) = self.thread.load().as_ref() {
            t.unpark();
        }
    }

    /// Whether a notification is pending.
    #[must_use]
    pub fn is_notified(&self) -> bool {
        self.notified.load(Ordering::Acquire)
    }

    /// Consume a pending notification without waiting.
    pub fn take(&self) -> bool {
        self.notified.swap(false, Ordering::AcqRel)
    }

    /// Block until notified or until `deadline` passes.
    ///
    /// `None` waits without a deadline. Spurious unparks are absorbed.
    pub fn wait(&self, deadline: Option<Instant>) -> WakeReason {
        self.register_current();
        loop {
            if self.take() {
                return WakeReason::Notified;
            }
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WakeReason::TimedOut;
                    }
                    thread::park_timeout(deadline - now);
                }
                None => thread::park(),
            }
        }
    }

    /// Block for at most `timeout`.
    pub fn wait_for(&self, timeout: Duration) -> WakeReason {
        self.wait(Some(Instant::now() + timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_before_wait_is_kept() {
        let w = Waker::new();
        w.wake();
        assert_eq!(w.wait_for(Duration::from_secs(5)), WakeReason::Notified);
        assert!(!w.is_notified());
    }

    #[test]
    fn wait_times_out() {
        let w = Waker::new();
        assert_eq!(w.wait_for(Duration::from_millis(5)), WakeReason::TimedOut);
    }

    #[test]
    fn cross_thread_wake() {
        let w = Arc::new(Waker::new());
        w.register_current();
        let remote = Arc::clone(&w);
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(10));
            remote.wake();
        });
        assert_eq!(w.wait_for(Duration::from_secs(5)), WakeReason::Notified);
        handle.join().unwrap();
    }
}
