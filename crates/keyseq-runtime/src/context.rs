#![forbid(unsafe_code)]

//! What the reader needs from the editor, and what it tells it.
//!
//! # Design
//!
//! The reader owns no editor state. Buffers, windows, keymaps and timers are
//! reached through [`InputContext`]; key and echo notifications go to an
//! [`InputSink`]. Both are plain traits with default methods for everything
//! an embedding may not care about, so a test context is a few lines.
//!
//! [`MapContext`] is a small concrete context: one global keymap, optional
//! per-buffer local maps, and a window-to-buffer table.

use ahash::AHashMap;
use keyseq_core::event::{BufferId, FrameId, InputEvent, WindowId};
use keyseq_core::keymap::{Binding, Keymap};
use web_time::Instant;

/// Editor state consulted while reading a key sequence.
pub trait InputContext {
    /// The keymaps active for a sequence starting with `first`, `second`.
    ///
    /// Called at the start of each read pass; the events are the first two
    /// keys already known, if any. Earlier maps take precedence.
    fn active_maps(
        &mut self,
        first: Option<&InputEvent>,
        second: Option<&InputEvent>,
    ) -> Vec<Keymap>;

    /// The buffer whose local maps apply.
    fn current_buffer(&self) -> BufferId;

    /// Make `buffer` current.
    fn set_buffer(&mut self, buffer: BufferId);

    /// The buffer shown in `window`.
    fn window_buffer(&self, window: WindowId) -> Option<BufferId>;

    /// The buffer of the selected window.
    fn selected_window_buffer(&self) -> BufferId {
        self.current_buffer()
    }

    /// When the next timer becomes due.
    fn next_timer_deadline(&self) -> Option<Instant> {
        None
    }

    /// Run every timer due at `now`.
    fn run_timers(&mut self, _now: Instant) {}

    /// A backend timer identified by `id` fired.
    fn timer_fired(&mut self, _id: u64) {}

    /// Handle an event bound in the special-event map.
    fn special_event(&mut self, _binding: &Binding, _event: &InputEvent) {}

    /// A frame changed size.
    fn frame_resized(&mut self, _frame: FrameId, _width: u16, _height: u16) {}
}

/// Receiver of keys as they are read.
pub trait InputSink {
    /// A live event was accepted into a key sequence.
    ///
    /// Called exactly once per event; replayed, unread, and macro events
    /// are not reported.
    fn key_read(&mut self, event: &InputEvent);

    /// Input stalled in the middle of a sequence; show what was typed.
    fn echo_prefix(&mut self, _keys: &[InputEvent]) {}
}

/// A sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl InputSink for NullSink {
    fn key_read(&mut self, _event: &InputEvent) {}
}

impl<S: InputSink + ?Sized> InputSink for &mut S {
    fn key_read(&mut self, event: &InputEvent) {
        (**self).key_read(event);
    }

    fn echo_prefix(&mut self, keys: &[InputEvent]) {
        (**self).echo_prefix(keys);
    }
}

impl<A: InputSink, B: InputSink> InputSink for (A, B) {
    fn key_read(&mut self, event: &InputEvent) {
        self.0.key_read(event);
        self.1.key_read(event);
    }

    fn echo_prefix(&mut self, keys: &[InputEvent]) {
        self.0.echo_prefix(keys);
        self.1.echo_prefix(keys);
    }
}

// ---------------------------------------------------------------------------
// MapContext
// ---------------------------------------------------------------------------

/// A context backed by plain tables.
#[derive(Debug, Clone)]
pub struct MapContext {
    global: Keymap,
    local: AHashMap<BufferId, Keymap>,
    windows: AHashMap<WindowId, BufferId>,
    current: BufferId,
    selected: BufferId,
    buffer_switches: usize,
}

impl MapContext {
    /// A context with `global` as the only map and buffer 0 current.
    #[must_use]
    pub fn new(global: Keymap) -> Self {
        Self {
            global,
            local: AHashMap::new(),
            windows: AHashMap::new(),
            current: BufferId(0),
            selected: BufferId(0),
            buffer_switches: 0,
        }
    }

    /// Give `buffer` a local map.
    #[must_use]
    pub fn with_local_map(mut self, buffer: BufferId, map: Keymap) -> Self {
        self.local.insert(buffer, map);
        self
    }

    /// Show `buffer` in `window`.
    #[must_use]
    pub fn with_window(mut self, window: WindowId, buffer: BufferId) -> Self {
        self.windows.insert(window, buffer);
        self
    }

    /// Replace the global map.
    pub fn set_global_map(&mut self, global: Keymap) {
        self.global = global;
    }

    /// Select the window showing `buffer`.
    pub fn select_buffer(&mut self, buffer: BufferId) {
        self.selected = buffer;
    }

    /// How many times [`set_buffer`](InputContext::set_buffer) changed the
    /// current buffer.
    #[must_use]
    pub fn buffer_switches(&self) -> usize {
        self.buffer_switches
    }
}

impl InputContext for MapContext {
    fn active_maps(
        &mut self,
        _first: Option<&InputEvent>,
        _second: Option<&InputEvent>,
    ) -> Vec<Keymap> {
        let mut maps = Vec::with_capacity(2);
        if let Some(local) = self.local.get(&self.current) {
            maps.push(local.clone());
        }
        maps.push(self.global.clone());
        maps
    }

    fn current_buffer(&self) -> BufferId {
        self.current
    }

    fn set_buffer(&mut self, buffer: BufferId) {
        if buffer != self.current {
            self.buffer_switches += 1;
        }
        self.current = buffer;
    }

    fn window_buffer(&self, window: WindowId) -> Option<BufferId> {
        self.windows.get(&window).copied()
    }

    fn selected_window_buffer(&self) -> BufferId {
        self.selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_map_precedes_global() {
        let mut local = Keymap::named("local");
        local.bind("a", Binding::command("local-a")).unwrap();
        let mut ctx = MapContext::new(Keymap::named("global"))
            .with_local_map(BufferId(1), local.clone())
            .with_window(WindowId(3), BufferId(1));

        assert_eq!(ctx.active_maps(None, None).len(), 1);
        ctx.set_buffer(BufferId(1));
        let maps = ctx.active_maps(None, None);
        assert_eq!(maps[0], local);
        assert_eq!(ctx.window_buffer(WindowId(3)), Some(BufferId(1)));
        assert_eq!(ctx.window_buffer(WindowId(4)), None);
        assert_eq!(ctx.buffer_switches(), 1);
    }

    #[test]
    fn tuple_sink_reports_to_both() {
        #[derive(Default)]
        struct Count(usize, usize);
        impl InputSink for Count {
            fn key_read(&mut self, _event: &InputEvent) {
                self.0 += 1;
            }
            fn echo_prefix(&mut self, _keys: &[InputEvent]) {
                self.1 += 1;
            }
        }
        let mut sink = (Count::default(), Count::default());
        sink.key_read(&InputEvent::char('a'));
        sink.echo_prefix(&[]);
        assert_eq!((sink.0.0, sink.0.1, sink.1.0, sink.1.1), (1, 1, 1, 1));
        NullSink.key_read(&InputEvent::char('a'));
    }
}
