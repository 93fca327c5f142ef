#![no_main]

use arbitrary::Arbitrary;
use keyseq_core::decoder::{DecoderConfig, EventDecoder, MenuRegistry};
use keyseq_core::event::{
    Area, FrameId, InputEvent, KeyboardId, Position, RawEvent, RawEventKind, WheelDirection,
    WindowId,
};
use keyseq_core::modifiers::{ModifierAlgebra, Modifiers};
use keyseq_core::symbol::Symbol;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum FuzzEvent {
    Byte(u8),
    Char { code: u32, mods: u32 },
    FunctionKey { keysym: u32, mods: u32 },
    Button { button: u8, pressed: bool, window: u8, area: u8, x: i8, y: i8, mods: u32 },
    Motion { x: i8, y: i8 },
    Wheel { down: bool, x: i8, y: i8, mods: u32 },
    Focus(bool),
    Menu { item: u8, area: u8 },
    Dismissed,
}

#[derive(Debug, Arbitrary)]
struct Step {
    event: FuzzEvent,
    frame: u8,
    delay_ms: u16,
}

const AREAS: [Area; 6] = [
    Area::Text,
    Area::ModeLine,
    Area::HeaderLine,
    Area::LeftFringe,
    Area::MenuBar,
    Area::ToolBar,
];

fn pick_area(v: u8) -> Area {
    AREAS[usize::from(v) % AREAS.len()]
}

fn position(window: u8, area_id: u8, x: i8, y: i8) -> Position {
    Position::in_window(WindowId(u32::from(window % 4)), i32::from(x), i32::from(y))
        .with_area(pick_area(area_id))
}

fuzz_target!(|steps: Vec<Step>| {
    let mut decoder = EventDecoder::new(DecoderConfig::default().with_track_mouse(true));
    let mut alg = ModifierAlgebra::new();
    let mut menus = MenuRegistry::new();
    menus.register(Area::MenuBar, 1, vec![Symbol::new("file"), Symbol::new("open")]);
    let mut out = Vec::new();
    let mut now = 0u64;

    for step in steps.iter().take(512) {
        now += u64::from(step.delay_ms);
        let kind = match step.event {
            FuzzEvent::Byte(b) => RawEventKind::Byte(b),
            FuzzEvent::Char { code, mods } => RawEventKind::Char {
                code: code % 0x11_0000,
                modifiers: Modifiers::from_bits_truncate(mods),
            },
            FuzzEvent::FunctionKey { keysym, mods } => RawEventKind::FunctionKey {
                keysym,
                modifiers: Modifiers::from_bits_truncate(mods),
            },
            FuzzEvent::Button { button, pressed, window, area, x, y, mods } => {
                RawEventKind::MouseButton {
                    button: button % 8 + 1,
                    pressed,
                    position: position(window, area, x, y),
                    modifiers: Modifiers::from_bits_truncate(mods),
                }
            }
            FuzzEvent::Motion { x, y } => RawEventKind::MouseMotion {
                position: position(0, 0, x, y),
            },
            FuzzEvent::Wheel { down, x, y, mods } => RawEventKind::Wheel {
                direction: if down { WheelDirection::Down } else { WheelDirection::Up },
                position: position(0, 0, x, y),
                modifiers: Modifiers::from_bits_truncate(mods),
            },
            FuzzEvent::Focus(true) => RawEventKind::FocusIn,
            FuzzEvent::Focus(false) => RawEventKind::FocusOut,
            FuzzEvent::Menu { item, area } => RawEventKind::MenuSelection {
                item: u32::from(item % 3),
                area: pick_area(area),
            },
            FuzzEvent::Dismissed => RawEventKind::MenuDismissed,
        };
        let raw = RawEvent::new(kind, KeyboardId(0), FrameId(u32::from(step.frame % 3))).at(now);
        out.clear();
        let _ = decoder.decode(&raw, &mut alg, &menus, &mut out);

        // A frame switch only ever leads an event.
        if let Some(pos) = out.iter().position(|ev| matches!(ev, InputEvent::SwitchFrame(_))) {
            assert_eq!(pos, 0);
            assert!(out.len() >= 2);
        }
        for ev in &out {
            // Decoded heads always split back into a base and modifiers
            // that recompose to the same symbol.
            if let Some(head) = ev.head_symbol() {
                let (base, mods) = alg.parse_modifiers(head);
                assert_eq!(&alg.apply_modifiers(mods, &base), head);
            }
        }
    }
});
