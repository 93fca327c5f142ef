#![forbid(unsafe_code)]

//! Process signals as input.
//!
//! [`SignalGuard`] forwards `SIGINT` to the quit flag and `SIGUSR1`/`SIGUSR2`
//! into the event queue as `sigusr1`/`sigusr2` events, from a dedicated
//! thread so nothing runs in signal-handler context. Dropping the guard
//! stops the thread and restores the previous dispositions.

use std::io;
use std::sync::Arc;

use keyseq_core::event::{FrameId, KeyboardId, RawEvent, RawEventKind, UserSignal};
use keyseq_core::queue::QueueProducer;
use keyseq_core::quit::QuitState;
use signal_hook::consts::signal::{SIGINT, SIGUSR1, SIGUSR2};
use signal_hook::iterator::Signals;

/// Keeps the signal forwarding thread alive.
#[derive(Debug)]
pub struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SignalGuard {
    /// Install handlers forwarding to `producer` and `quit`.
    ///
    /// # Errors
    ///
    /// Fails when the handlers cannot be registered.
    pub fn install(producer: QueueProducer, quit: Arc<QuitState>) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGUSR1, SIGUSR2]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("keyseq-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    let user = match signal {
                        SIGINT => {
                            tracing::debug!("SIGINT received");
                            quit.request_quit();
                            continue;
                        }
                        SIGUSR1 => UserSignal::Usr1,
                        SIGUSR2 => UserSignal::Usr2,
                        _ => continue,
                    };
                    let outcome = producer.enqueue(RawEvent::new(
                        RawEventKind::Signal(user),
                        KeyboardId(0),
                        FrameId(0),
                    ));
                    tracing::debug!(signal = user.symbol_name(), ?outcome, "signal forwarded");
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyseq_core::queue::EventQueue;
    use keyseq_core::wake::Waker;

    #[test]
    fn install_and_drop_join_the_thread() {
        let quit = Arc::new(QuitState::new(Arc::new(Waker::new())));
        let (producer, consumer) = EventQueue::new(16, 7, Arc::clone(&quit));
        let guard = SignalGuard::install(producer, Arc::clone(&quit)).unwrap();
        assert!(guard.thread.is_some());
        drop(guard);
        assert!(consumer.is_empty());
        assert!(!quit.is_pending());
    }
}
