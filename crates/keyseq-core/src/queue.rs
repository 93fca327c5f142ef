#![forbid(unsafe_code)]

//! Bounded raw event queue between device backends and the reader.
//!
//! # Design
//!
//! A fixed ring of `capacity` slots. Each slot stores a packed [`RawEvent`]
//! in four `AtomicU64` words plus a sequence number that says whether the
//! slot is free or published. Producers claim a position by bumping the
//! store cursor with a CAS, write the words, and publish with a release
//! store of the sequence; the single consumer reads published slots in
//! order and hands them back.
//!
//! One slot is always left unused: at most `capacity - 1` events are queued,
//! so `fetch == store` always means empty.
//!
//! # Producer path
//!
//! [`QueueProducer::enqueue`] never blocks, never allocates and never calls
//! back into reader logic. When the ring is full the event is dropped and
//! [`EnqueueOutcome::Dropped`] tells the backend. Past half capacity the
//! queue raises a hold flag the backend should treat as backpressure; the
//! consumer lowers it again once it drains below a quarter (or empties).
//!
//! The quit character is never stored. It raises the quit flag, unless the
//! consumer is locked onto a different keyboard; in that case a
//! [`RawEventKind::QuitRedirect`] marker is stored so the consumer can move
//! the quit into that keyboard's private queue. A raised quit also marks the
//! store position: everything typed before it is dropped by
//! [`QueueConsumer::discard_before_quit`] when the quit is honored.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use keyseq_core::event::RawEvent;
//! use keyseq_core::modifiers::Modifiers;
//! use keyseq_core::queue::{EnqueueOutcome, EventQueue};
//! use keyseq_core::quit::QuitState;
//!
//! let quit = Arc::new(QuitState::default());
//! let (producer, mut consumer) = EventQueue::new(4, 7, Arc::clone(&quit));
//! assert_eq!(producer.enqueue(RawEvent::char('a', Modifiers::empty())), EnqueueOutcome::Stored);
//! assert_eq!(consumer.dequeue().map(|e| e.kind), Some(RawEvent::char('a', Modifiers::empty()).kind));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::event::{KeyboardId, RawEvent, RawEventKind};
use crate::modifiers::fold_keystroke;
use crate::quit::QuitState;
use crate::wake::Waker;

/// Smallest usable ring (one event plus the unused slot).
pub const MIN_CAPACITY: usize = 2;

const NO_KEYBOARD: u32 = u32::MAX;

/// Result of [`QueueProducer::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Stored.
    Stored,
    /// Stored, and the queue is now on hold; the backend should pause.
    Held,
    /// Queue full; the event was lost.
    Dropped,
    /// The quit character raised the quit flag instead of being stored.
    Quit,
    /// The quit character was redirected to another keyboard.
    Redirected,
}

#[derive(Debug)]
struct Slot {
    seq: AtomicUsize,
    words: [AtomicU64; 4],
}

impl Slot {
    fn new(seq: usize) -> Self {
        Self {
            seq: AtomicUsize::new(seq),
            words: Default::default(),
        }
    }

    fn write(&self, ev: &RawEvent) {
        for (w, v) in self.words.iter().zip(ev.pack()) {
            w.store(v, Ordering::Relaxed);
        }
    }

    fn read(&self) -> RawEvent {
        RawEvent::unpack([
            self.words[0].load(Ordering::Relaxed),
            self.words[1].load(Ordering::Relaxed),
            self.words[2].load(Ordering::Relaxed),
            self.words[3].load(Ordering::Relaxed),
        ])
    }
}

#[derive(Debug)]
struct Shared {
    slots: Box<[Slot]>,
    fetch: AtomicUsize,
    store: AtomicUsize,
    hold: AtomicBool,
    closed: AtomicBool,
    current_keyboard: AtomicU32,
    quit_char: u32,
    dropped: AtomicU64,
    /// Store position when the quit character was last typed.
    quit_mark: AtomicUsize,
    quit: Arc<QuitState>,
    waker: Arc<Waker>,
}

impl Shared {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, pos: usize) -> &Slot {
        &self.slots[pos % self.slots.len()]
    }

    fn is_quit_char(&self, ev: &RawEvent) -> bool {
        match ev.kind {
            RawEventKind::Byte(b) => u32::from(b) == self.quit_char,
            RawEventKind::Char { code, modifiers } => {
                fold_keystroke(code, modifiers).raw() == self.quit_char
            }
            _ => false,
        }
    }

    fn raise_quit(&self) {
        self.quit_mark
            .fetch_max(self.store.load(Ordering::Acquire), Ordering::AcqRel);
        self.quit.request_quit();
    }
}

/// Queue constructor namespace.
#[derive(Debug)]
pub struct EventQueue;

impl EventQueue {
    /// Create a queue with `capacity` slots (`capacity - 1` usable).
    ///
    /// `quit_char` is compared against bytes and folded keystrokes. The
    /// queue wakes the quit state's waker on every store.
    #[must_use]
    pub fn new(
        capacity: usize,
        quit_char: u32,
        quit: Arc<QuitState>,
    ) -> (QueueProducer, QueueConsumer) {
        let capacity = capacity.max(MIN_CAPACITY);
        let slots = (0..capacity).map(Slot::new).collect::<Vec<_>>();
        let waker = Arc::clone(quit.waker());
        let shared = Arc::new(Shared {
            slots: slots.into_boxed_slice(),
            fetch: AtomicUsize::new(0),
            store: AtomicUsize::new(0),
            hold: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            current_keyboard: AtomicU32::new(NO_KEYBOARD),
            quit_char,
            dropped: AtomicU64::new(0),
            quit_mark: AtomicUsize::new(0),
            quit,
            waker,
        });
        (
            QueueProducer {
                shared: Arc::clone(&shared),
            },
            QueueConsumer { shared },
        )
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// Producer handle. Cloneable; every clone funnels into the same ring.
#[derive(Debug, Clone)]
pub struct QueueProducer {
    shared: Arc<Shared>,
}

impl QueueProducer {
    /// Store `ev`, or handle it as a quit request.
    pub fn enqueue(&self, ev: RawEvent) -> EnqueueOutcome {
        let s = &*self.shared;
        if s.closed.load(Ordering::Acquire) {
            return EnqueueOutcome::Dropped;
        }

        if s.is_quit_char(&ev) {
            let current = s.current_keyboard.load(Ordering::Acquire);
            if current == NO_KEYBOARD || current == u32::from(ev.keyboard.0) {
                s.raise_quit();
                return EnqueueOutcome::Quit;
            }
            let marker = RawEvent {
                kind: RawEventKind::QuitRedirect,
                ..ev
            };
            return match self.store(marker) {
                EnqueueOutcome::Dropped => {
                    // No room for the marker; quit the current read instead.
                    s.raise_quit();
                    EnqueueOutcome::Quit
                }
                _ => EnqueueOutcome::Redirected,
            };
        }

        self.store(ev)
    }

    fn store(&self, ev: RawEvent) -> EnqueueOutcome {
        let s = &*self.shared;
        let capacity = s.capacity();
        let mut pos = s.store.load(Ordering::Relaxed);
        loop {
            let fetch = s.fetch.load(Ordering::Acquire);
            if pos < fetch {
                pos = s.store.load(Ordering::Relaxed);
                continue;
            }
            if pos - fetch >= capacity - 1 {
                s.dropped.fetch_add(1, Ordering::Relaxed);
                s.hold.store(true, Ordering::Release);
                return EnqueueOutcome::Dropped;
            }
            if s.slot(pos).seq.load(Ordering::Acquire) != pos {
                // Slot not yet recycled by the consumer.
                pos = s.store.load(Ordering::Relaxed);
                std::hint::spin_loop();
                continue;
            }
            match s
                .store
                .compare_exchange_weak(pos, pos + 1, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => pos = actual,
            }
        }

        let slot = s.slot(pos);
        slot.write(&ev);
        slot.seq.store(pos + 1, Ordering::Release);

        let used = (pos + 1).wrapping_sub(s.fetch.load(Ordering::Acquire));
        let outcome = if used > capacity / 2 {
            s.hold.store(true, Ordering::Release);
            EnqueueOutcome::Held
        } else {
            EnqueueOutcome::Stored
        };
        s.waker.wake();
        outcome
    }

    /// Whether the backend should pause reading.
    #[must_use]
    pub fn is_on_hold(&self) -> bool {
        self.shared.hold.load(Ordering::Acquire)
    }

    /// Events dropped because the ring was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting events; the consumer sees input exhausted once drained.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.waker.wake();
    }

    /// The quit state this queue reports to.
    #[must_use]
    pub fn quit_state(&self) -> &Arc<QuitState> {
        &self.shared.quit
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Consumer handle. Exactly one exists per queue.
#[derive(Debug)]
pub struct QueueConsumer {
    shared: Arc<Shared>,
}

impl QueueConsumer {
    /// Take the oldest published event, skipping discarded slots.
    pub fn dequeue(&mut self) -> Option<RawEvent> {
        let s = &*self.shared;
        loop {
            let pos = s.fetch.load(Ordering::Relaxed);
            let slot = s.slot(pos);
            if slot.seq.load(Ordering::Acquire) != pos + 1 {
                return None;
            }
            let ev = slot.read();
            slot.seq.store(pos + s.capacity(), Ordering::Release);
            s.fetch.store(pos + 1, Ordering::Release);
            self.release_hold();
            if ev.kind != RawEventKind::Discarded {
                return Some(ev);
            }
        }
    }

    /// Drop every event stored before the quit character was typed.
    ///
    /// Called when a quit is honored. Events stored after the quit survive.
    /// Returns how many events were dropped.
    pub fn discard_before_quit(&mut self) -> usize {
        let mark = self.shared.quit_mark.load(Ordering::Acquire);
        let mut n = 0;
        while self.shared.fetch.load(Ordering::Relaxed) < mark {
            let s = &*self.shared;
            let pos = s.fetch.load(Ordering::Relaxed);
            let slot = s.slot(pos);
            if slot.seq.load(Ordering::Acquire) != pos + 1 {
                break;
            }
            let ev = slot.read();
            slot.seq.store(pos + s.capacity(), Ordering::Release);
            s.fetch.store(pos + 1, Ordering::Release);
            if ev.kind != RawEventKind::Discarded {
                n += 1;
            }
        }
        self.release_hold();
        n
    }

    fn release_hold(&self) {
        let s = &*self.shared;
        let len = self.len();
        if s.hold.load(Ordering::Relaxed) && (len == 0 || len < s.capacity() / 4) {
            s.hold.store(false, Ordering::Release);
        }
    }

    /// Claimed slots, including ones still being written.
    #[must_use]
    pub fn len(&self) -> usize {
        let s = &*self.shared;
        s.store
            .load(Ordering::Acquire)
            .wrapping_sub(s.fetch.load(Ordering::Acquire))
    }

    /// Whether no slot is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots in the ring; one fewer event fits.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    fn for_each_published(&self, mut f: impl FnMut(&Slot) -> bool) {
        let s = &*self.shared;
        let fetch = s.fetch.load(Ordering::Relaxed);
        let store = s.store.load(Ordering::Acquire);
        let mut pos = fetch;
        while pos != store {
            let slot = s.slot(pos);
            if slot.seq.load(Ordering::Acquire) != pos + 1 || !f(slot) {
                break;
            }
            pos += 1;
        }
    }

    /// Published events waiting, optionally ignoring squeezable ones.
    #[must_use]
    pub fn pending(&self, ignore_squeezable: bool) -> usize {
        let mut n = 0;
        self.for_each_published(|slot| {
            let ev = slot.read();
            if ev.kind != RawEventKind::Discarded && !(ignore_squeezable && ev.is_squeezable()) {
                n += 1;
            }
            true
        });
        n
    }

    /// Whether [`dequeue`](Self::dequeue) would return an event that counts.
    #[must_use]
    pub fn is_readable(&self, ignore_squeezable: bool) -> bool {
        let mut found = false;
        self.for_each_published(|slot| {
            let ev = slot.read();
            found = ev.kind != RawEventKind::Discarded
                && !(ignore_squeezable && ev.is_squeezable());
            !found
        });
        found
    }

    /// Mark every published event from `keyboard` discarded.
    ///
    /// Returns how many were discarded.
    pub fn discard_keyboard(&mut self, keyboard: KeyboardId) -> usize {
        let mut n = 0;
        self.for_each_published(|slot| {
            let ev = slot.read();
            if ev.keyboard == keyboard && ev.kind != RawEventKind::Discarded {
                slot.write(&RawEvent {
                    kind: RawEventKind::Discarded,
                    ..ev
                });
                n += 1;
            }
            true
        });
        n
    }

    /// Lock the producer's quit handling onto `keyboard`.
    ///
    /// While locked, a quit character from any other keyboard is redirected
    /// instead of raising the quit flag. `None` unlocks.
    pub fn set_current_keyboard(&self, keyboard: Option<KeyboardId>) {
        let v = keyboard.map_or(NO_KEYBOARD, |k| u32::from(k.0));
        self.shared.current_keyboard.store(v, Ordering::Release);
    }

    /// The keyboard quit handling is locked onto.
    #[must_use]
    pub fn current_keyboard(&self) -> Option<KeyboardId> {
        match self.shared.current_keyboard.load(Ordering::Acquire) {
            NO_KEYBOARD => None,
            v => Some(KeyboardId(v as u8)),
        }
    }

    /// Whether the producer side closed the queue.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Whether the queue is closed and drained.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.is_closed() && self.is_empty()
    }

    /// Whether the hold flag is raised.
    #[must_use]
    pub fn is_on_hold(&self) -> bool {
        self.shared.hold.load(Ordering::Acquire)
    }

    /// The shared waker.
    #[must_use]
    pub fn waker(&self) -> &Arc<Waker> {
        &self.shared.waker
    }

    /// The shared quit state.
    #[must_use]
    pub fn quit_state(&self) -> &Arc<QuitState> {
        &self.shared.quit
    }

    /// The configured quit character.
    #[must_use]
    pub fn quit_char(&self) -> u32 {
        self.shared.quit_char
    }
}
