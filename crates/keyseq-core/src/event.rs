#![forbid(unsafe_code)]

//! Raw device events and canonical input events.
//!
//! # Design
//!
//! Two layers of event types exist:
//!
//! - [`RawEvent`] is what a backend hands to the queue. It is `Copy`, holds no
//!   heap data, and packs into four machine words so the producer path can
//!   store it with plain atomic writes.
//! - [`InputEvent`] is the canonical post-decode form the reader assembles
//!   into key sequences. Every variant exposes a lookup head ([`Key`]) so the
//!   keymap code never needs to inspect event parameters.

use std::fmt;

use crate::modifiers::{KeyChar, Modifiers};
use crate::symbol::Symbol;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A logical keyboard (terminal or display connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct KeyboardId(pub u8);

/// A frame (top-level window) that can own input focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FrameId(pub u32);

/// A window inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

/// A buffer whose local keymaps contribute to lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// The part of a frame a pointer event landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Area {
    /// Window text area.
    #[default]
    Text = 0,
    ModeLine = 1,
    HeaderLine = 2,
    TabLine = 3,
    VerticalScrollBar = 4,
    HorizontalScrollBar = 5,
    LeftFringe = 6,
    RightFringe = 7,
    LeftMargin = 8,
    RightMargin = 9,
    /// Divider between side-by-side windows.
    VerticalLine = 10,
    MenuBar = 11,
    ToolBar = 12,
    TabBar = 13,
}

impl Area {
    /// Name of the pseudo prefix key inserted before events in this area.
    ///
    /// Text-area events are looked up unprefixed.
    #[must_use]
    pub const fn prefix_symbol(self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::ModeLine => Some("mode-line"),
            Self::HeaderLine => Some("header-line"),
            Self::TabLine => Some("tab-line"),
            Self::VerticalScrollBar => Some("vertical-scroll-bar"),
            Self::HorizontalScrollBar => Some("horizontal-scroll-bar"),
            Self::LeftFringe => Some("left-fringe"),
            Self::RightFringe => Some("right-fringe"),
            Self::LeftMargin => Some("left-margin"),
            Self::RightMargin => Some("right-margin"),
            Self::VerticalLine => Some("vertical-line"),
            Self::MenuBar => Some("menu-bar"),
            Self::ToolBar => Some("tool-bar"),
            Self::TabBar => Some("tab-bar"),
        }
    }

    /// Whether this area is a frame-level bar rather than part of a window.
    #[must_use]
    pub const fn is_frame_bar(self) -> bool {
        matches!(self, Self::MenuBar | Self::ToolBar | Self::TabBar)
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::ModeLine,
            2 => Self::HeaderLine,
            3 => Self::TabLine,
            4 => Self::VerticalScrollBar,
            5 => Self::HorizontalScrollBar,
            6 => Self::LeftFringe,
            7 => Self::RightFringe,
            8 => Self::LeftMargin,
            9 => Self::RightMargin,
            10 => Self::VerticalLine,
            11 => Self::MenuBar,
            12 => Self::ToolBar,
            13 => Self::TabBar,
            _ => Self::Text,
        }
    }
}

/// Where a pointer event happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// The window under the pointer, if any.
    pub window: Option<WindowId>,
    /// The part of the window or frame under the pointer.
    pub area: Area,
    /// Column or pixel x, backend-defined.
    pub x: i32,
    /// Row or pixel y, backend-defined.
    pub y: i32,
}

impl Position {
    /// A position in the text area of `window`.
    #[must_use]
    pub const fn in_window(window: WindowId, x: i32, y: i32) -> Self {
        Self {
            window: Some(window),
            area: Area::Text,
            x,
            y,
        }
    }

    /// Same position in a different area.
    #[must_use]
    pub const fn with_area(mut self, area: Area) -> Self {
        self.area = area;
        self
    }
}

/// Wheel rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WheelDirection {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl WheelDirection {
    /// Base symbol name of the wheel event.
    #[must_use]
    pub const fn symbol_name(self) -> &'static str {
        match self {
            Self::Up => "wheel-up",
            Self::Down => "wheel-down",
            Self::Left => "wheel-left",
            Self::Right => "wheel-right",
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Down,
            2 => Self::Left,
            3 => Self::Right,
            _ => Self::Up,
        }
    }
}

/// User-defined signal numbers the bridge forwards as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UserSignal {
    Usr1 = 1,
    Usr2 = 2,
}

impl UserSignal {
    /// Symbol name of the signal event.
    #[must_use]
    pub const fn symbol_name(self) -> &'static str {
        match self {
            Self::Usr1 => "sigusr1",
            Self::Usr2 => "sigusr2",
        }
    }
}

// ---------------------------------------------------------------------------
// RawEvent
// ---------------------------------------------------------------------------

/// An event as delivered by a device backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    /// What happened.
    pub kind: RawEventKind,
    /// The keyboard that produced the event.
    pub keyboard: KeyboardId,
    /// The frame that had focus.
    pub frame: FrameId,
    /// Milliseconds on the backend's monotonic clock.
    pub timestamp_ms: u64,
}

/// Raw event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    /// One byte from a terminal; decoded according to the terminal coding.
    Byte(u8),
    /// A character from a window system with the modifiers held.
    Char { code: u32, modifiers: Modifiers },
    /// A non-character key identified by its keysym.
    FunctionKey { keysym: u32, modifiers: Modifiers },
    /// Button press or release.
    MouseButton {
        button: u8,
        pressed: bool,
        position: Position,
        modifiers: Modifiers,
    },
    /// Pointer motion.
    MouseMotion { position: Position },
    /// Wheel rotation.
    Wheel {
        direction: WheelDirection,
        position: Position,
        modifiers: Modifiers,
    },
    FocusIn,
    FocusOut,
    Resize { width: u16, height: u16 },
    /// A menu, tool-bar, or tab-bar item was chosen.
    MenuSelection { item: u32, area: Area },
    /// A pop-up menu closed without a choice.
    MenuDismissed,
    TimerFired { id: u64 },
    Signal(UserSignal),
    /// Quit typed on a keyboard that does not currently own input.
    QuitRedirect,
    /// Slot invalidated after enqueue.
    Discarded,
}

impl RawEvent {
    /// Construct a raw event.
    #[must_use]
    pub const fn new(kind: RawEventKind, keyboard: KeyboardId, frame: FrameId) -> Self {
        Self {
            kind,
            keyboard,
            frame,
            timestamp_ms: 0,
        }
    }

    /// Set the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// A terminal byte on keyboard 0, frame 0.
    #[must_use]
    pub const fn byte(b: u8) -> Self {
        Self::new(RawEventKind::Byte(b), KeyboardId(0), FrameId(0))
    }

    /// A window-system character on keyboard 0, frame 0.
    #[must_use]
    pub const fn char(c: char, modifiers: Modifiers) -> Self {
        Self::new(
            RawEventKind::Char {
                code: c as u32,
                modifiers,
            },
            KeyboardId(0),
            FrameId(0),
        )
    }

    /// Move the event to another keyboard.
    #[must_use]
    pub const fn on_keyboard(mut self, keyboard: KeyboardId) -> Self {
        self.keyboard = keyboard;
        self
    }

    /// Move the event to another frame.
    #[must_use]
    pub const fn on_frame(mut self, frame: FrameId) -> Self {
        self.frame = frame;
        self
    }

    /// Whether the event may be ignored by pending-input checks.
    #[must_use]
    pub const fn is_squeezable(&self) -> bool {
        matches!(self.kind, RawEventKind::MouseMotion { .. })
    }

    /// Pack into four words for atomic slot storage.
    ///
    /// Layout: word 0 holds tag, keyboard, two small fields and the frame;
    /// word 1 the timestamp; words 2 and 3 the variant payload.
    pub(crate) fn pack(&self) -> [u64; 4] {
        let (tag, a, b, p2, p3): (u8, u8, u8, u64, u64) = match self.kind {
            RawEventKind::Byte(byte) => (1, byte, 0, 0, 0),
            RawEventKind::Char { code, modifiers } => {
                (2, pack_mods(modifiers), 0, u64::from(code), 0)
            }
            RawEventKind::FunctionKey { keysym, modifiers } => {
                (3, pack_mods(modifiers), 0, u64::from(keysym), 0)
            }
            RawEventKind::MouseButton {
                button,
                pressed,
                position,
                modifiers,
            } => {
                let (p2, p3) = pack_position(position);
                (4, pack_mods(modifiers), button, p2 | (u64::from(pressed) << 48), p3)
            }
            RawEventKind::MouseMotion { position } => {
                let (p2, p3) = pack_position(position);
                (5, 0, 0, p2, p3)
            }
            RawEventKind::Wheel {
                direction,
                position,
                modifiers,
            } => {
                let (p2, p3) = pack_position(position);
                (6, pack_mods(modifiers), direction as u8, p2, p3)
            }
            RawEventKind::FocusIn => (7, 0, 0, 0, 0),
            RawEventKind::FocusOut => (8, 0, 0, 0, 0),
            RawEventKind::Resize { width, height } => {
                (9, 0, 0, u64::from(width) | (u64::from(height) << 16), 0)
            }
            RawEventKind::MenuSelection { item, area } => (10, 0, area as u8, u64::from(item), 0),
            RawEventKind::MenuDismissed => (11, 0, 0, 0, 0),
            RawEventKind::TimerFired { id } => (12, 0, 0, id, 0),
            RawEventKind::Signal(sig) => (13, 0, sig as u8, 0, 0),
            RawEventKind::QuitRedirect => (14, 0, 0, 0, 0),
            RawEventKind::Discarded => (0, 0, 0, 0, 0),
        };
        let w0 = u64::from(tag)
            | (u64::from(self.keyboard.0) << 8)
            | (u64::from(a) << 16)
            | (u64::from(b) << 24)
            | (u64::from(self.frame.0) << 32);
        [w0, self.timestamp_ms, p2, p3]
    }

    /// Inverse of [`pack`](Self::pack). Unknown tags yield `Discarded`.
    pub(crate) fn unpack(words: [u64; 4]) -> Self {
        let [w0, timestamp_ms, p2, p3] = words;
        let tag = (w0 & 0xFF) as u8;
        let keyboard = KeyboardId(((w0 >> 8) & 0xFF) as u8);
        let a = ((w0 >> 16) & 0xFF) as u8;
        let b = ((w0 >> 24) & 0xFF) as u8;
        let frame = FrameId((w0 >> 32) as u32);

        let kind = match tag {
            1 => RawEventKind::Byte(a),
            2 => RawEventKind::Char {
                code: p2 as u32,
                modifiers: unpack_mods(a),
            },
            3 => RawEventKind::FunctionKey {
                keysym: p2 as u32,
                modifiers: unpack_mods(a),
            },
            4 => RawEventKind::MouseButton {
                button: b,
                pressed: (p2 >> 48) & 1 == 1,
                position: unpack_position(p2, p3),
                modifiers: unpack_mods(a),
            },
            5 => RawEventKind::MouseMotion {
                position: unpack_position(p2, p3),
            },
            6 => RawEventKind::Wheel {
                direction: WheelDirection::from_u8(b),
                position: unpack_position(p2, p3),
                modifiers: unpack_mods(a),
            },
            7 => RawEventKind::FocusIn,
            8 => RawEventKind::FocusOut,
            9 => RawEventKind::Resize {
                width: (p2 & 0xFFFF) as u16,
                height: ((p2 >> 16) & 0xFFFF) as u16,
            },
            10 => RawEventKind::MenuSelection {
                item: p2 as u32,
                area: Area::from_u8(b),
            },
            11 => RawEventKind::MenuDismissed,
            12 => RawEventKind::TimerFired { id: p2 },
            13 => RawEventKind::Signal(if b == 2 {
                UserSignal::Usr2
            } else {
                UserSignal::Usr1
            }),
            14 => RawEventKind::QuitRedirect,
            _ => RawEventKind::Discarded,
        };
        Self {
            kind,
            keyboard,
            frame,
            timestamp_ms,
        }
    }
}

fn pack_mods(m: Modifiers) -> u8 {
    ((m & Modifiers::KEY_MASK).bits() >> 22) as u8
}

fn unpack_mods(v: u8) -> Modifiers {
    Modifiers::from_bits_truncate(u32::from(v) << 22)
}

fn pack_position(p: Position) -> (u64, u64) {
    let (present, window) = match p.window {
        Some(w) => (1u64, u64::from(w.0)),
        None => (0, 0),
    };
    let p2 = window | (u64::from(p.area as u8) << 32) | (present << 40);
    let p3 = u64::from(p.x as u32) | (u64::from(p.y as u32) << 32);
    (p2, p3)
}

fn unpack_position(p2: u64, p3: u64) -> Position {
    let window = ((p2 >> 40) & 1 == 1).then_some(WindowId(p2 as u32));
    Position {
        window,
        area: Area::from_u8(((p2 >> 32) & 0xFF) as u8),
        x: p3 as u32 as i32,
        y: (p3 >> 32) as u32 as i32,
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// The lookup head of an input event.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Char(KeyChar),
    Symbol(Symbol),
}

impl Key {
    /// Key for a plain character.
    #[must_use]
    pub fn char(c: char) -> Self {
        Self::Char(KeyChar::from_char(c))
    }

    /// Key for a symbol name.
    #[must_use]
    pub fn symbol(name: &str) -> Self {
        Self::Symbol(Symbol::new(name))
    }

    /// The symbol, if this is a symbol key.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Symbol(s) => Some(s),
            Self::Char(_) => None,
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => c.fmt(f),
            Self::Symbol(s) => s.fmt(f),
        }
    }
}

impl From<char> for Key {
    fn from(c: char) -> Self {
        Self::char(c)
    }
}

impl From<KeyChar> for Key {
    fn from(c: KeyChar) -> Self {
        Self::Char(c)
    }
}

impl From<Symbol> for Key {
    fn from(s: Symbol) -> Self {
        Self::Symbol(s)
    }
}

// ---------------------------------------------------------------------------
// InputEvent
// ---------------------------------------------------------------------------

/// A decoded mouse button or motion event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MouseEvent {
    /// `mouse-1`, `down-mouse-2`, `C-drag-mouse-1`, `mouse-movement`, ...
    pub head: Symbol,
    /// Where the press (or motion) happened.
    pub start: Position,
    /// Where the release happened, for drags.
    pub end: Option<Position>,
    /// Clicks in the current burst; 0 for motion.
    pub click_count: u8,
    /// Milliseconds on the backend clock.
    pub timestamp_ms: u64,
}

/// A decoded wheel event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WheelEvent {
    /// `wheel-up`, `C-wheel-down`, `double-wheel-up`, ...
    pub head: Symbol,
    pub position: Position,
    pub timestamp_ms: u64,
}

/// Focus gained or lost by a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FocusEvent {
    /// `focus-in` or `focus-out`.
    pub head: Symbol,
    pub frame: FrameId,
}

/// A menu, tool-bar, or tab-bar selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MenuEvent {
    /// The bar the item belongs to.
    pub area: Area,
    /// Item path below the bar's pseudo prefix key.
    pub path: Vec<Symbol>,
    pub frame: FrameId,
}

/// A canonical input event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputEvent {
    /// A character with folded modifiers.
    Char(KeyChar),
    /// A function key or pseudo key.
    Symbol(Symbol),
    Mouse(MouseEvent),
    Wheel(WheelEvent),
    Focus(FocusEvent),
    /// Input focus moved to another frame.
    SwitchFrame(FrameId),
    Menu(MenuEvent),
}

/// Head symbol name for frame switches.
pub const SWITCH_FRAME: &str = "switch-frame";

impl InputEvent {
    /// A plain character event.
    #[must_use]
    pub fn char(c: char) -> Self {
        Self::Char(KeyChar::from_char(c))
    }

    /// A symbol event.
    #[must_use]
    pub fn symbol(name: &str) -> Self {
        Self::Symbol(Symbol::new(name))
    }

    /// The key used for keymap lookup.
    #[must_use]
    pub fn head_key(&self) -> Key {
        match self {
            Self::Char(c) => Key::Char(*c),
            Self::Symbol(s) => Key::Symbol(s.clone()),
            Self::Mouse(m) => Key::Symbol(m.head.clone()),
            Self::Wheel(w) => Key::Symbol(w.head.clone()),
            Self::Focus(f) => Key::Symbol(f.head.clone()),
            Self::SwitchFrame(_) => Key::symbol(SWITCH_FRAME),
            Self::Menu(m) => Key::symbol(m.area.prefix_symbol().unwrap_or("menu-bar")),
        }
    }

    /// The head symbol of a compound or symbol event.
    #[must_use]
    pub fn head_symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Symbol(s) => Some(s),
            Self::Mouse(m) => Some(&m.head),
            Self::Wheel(w) => Some(&w.head),
            Self::Focus(f) => Some(&f.head),
            Self::Char(_) | Self::SwitchFrame(_) | Self::Menu(_) => None,
        }
    }

    /// The same event with a different head; parameters are kept.
    ///
    /// Characters and frame switches have no head to replace and are
    /// returned as a symbol event.
    #[must_use]
    pub fn with_head(&self, head: Symbol) -> Self {
        match self {
            Self::Mouse(m) => Self::Mouse(MouseEvent {
                head,
                ..m.clone()
            }),
            Self::Wheel(w) => Self::Wheel(WheelEvent {
                head,
                ..w.clone()
            }),
            Self::Focus(f) => Self::Focus(FocusEvent {
                head,
                frame: f.frame,
            }),
            _ => Self::Symbol(head),
        }
    }

    /// Where a pointer event happened.
    #[must_use]
    pub fn position(&self) -> Option<&Position> {
        match self {
            Self::Mouse(m) => Some(m.end.as_ref().unwrap_or(&m.start)),
            Self::Wheel(w) => Some(&w.position),
            _ => None,
        }
    }

    /// Whether this is a pointer event.
    #[must_use]
    pub fn is_mouse(&self) -> bool {
        matches!(self, Self::Mouse(_) | Self::Wheel(_))
    }

    /// Character value, if this is a character event.
    #[must_use]
    pub fn as_char(&self) -> Option<KeyChar> {
        match self {
            Self::Char(c) => Some(*c),
            _ => None,
        }
    }
}

impl From<char> for InputEvent {
    fn from(c: char) -> Self {
        Self::char(c)
    }
}

impl From<KeyChar> for InputEvent {
    fn from(c: KeyChar) -> Self {
        Self::Char(c)
    }
}

impl From<Key> for InputEvent {
    fn from(k: Key) -> Self {
        match k {
            Key::Char(c) => Self::Char(c),
            Key::Symbol(s) => Self::Symbol(s),
        }
    }
}
