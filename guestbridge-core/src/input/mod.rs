//! Input forwarding.
//!
//! Responsibilities:
//! - Translate host input events (pointer, wheel, key) into calls of fixed guest exports.
//! - Make pointer coordinates relative to the tracked element rectangle.
//! - Normalize wheel deltas to pixels.
//!
//! Notes:
//! - The forwarder holds no state besides the rectangle and the set of event kinds whose export
//!   was already reported missing. A guest without a given export keeps running; the first
//!   event of that kind is logged and the rest are dropped quietly.

use crate::abi::guest_exports;
use crate::bridge::{Arg, GuestCall};
use std::collections::HashSet;

/// Pixels per line in line-mode wheel events.
pub const LINE_HEIGHT_PX: f32 = 16.0;
/// Fraction of the element extent scrolled by one page-mode wheel step.
pub const PAGE_FRACTION: f32 = 0.8;

/// Position and size of the tracked element, in host client coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WheelMode {
    Pixel,
    Line,
    Page,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InputEvent {
    MouseMove { x: f32, y: f32 },
    MouseButton { button: u32, down: bool, x: f32, y: f32 },
    Wheel { dx: f32, dy: f32, mode: WheelMode },
    Key { keycode: u32, down: bool },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    MouseMove,
    MouseButton,
    MouseWheel,
    Key,
}

impl EventKind {
    pub fn export(self) -> &'static str {
        match self {
            EventKind::MouseMove => guest_exports::ON_MOUSE_MOVE,
            EventKind::MouseButton => guest_exports::ON_MOUSE_BUTTON,
            EventKind::MouseWheel => guest_exports::ON_MOUSE_WHEEL,
            EventKind::Key => guest_exports::ON_KEY_EVENT,
        }
    }
}

impl InputEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InputEvent::MouseMove { .. } => EventKind::MouseMove,
            InputEvent::MouseButton { .. } => EventKind::MouseButton,
            InputEvent::Wheel { .. } => EventKind::MouseWheel,
            InputEvent::Key { .. } => EventKind::Key,
        }
    }
}

#[derive(Debug, Default)]
pub struct InputForwarder {
    rect: Rect,
    reported_missing: HashSet<EventKind>,
}

impl InputForwarder {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            reported_missing: HashSet::new(),
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Track a moved or resized element.
    pub fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    /// The export call for `event`, regardless of whether the guest defines it.
    pub fn translate(&self, event: &InputEvent) -> GuestCall {
        let export = event.kind().export();
        let args = match *event {
            InputEvent::MouseMove { x, y } => {
                let (x, y) = self.relative(x, y);
                vec![Arg::F32(x), Arg::F32(y)]
            }
            InputEvent::MouseButton { button, down, x, y } => {
                let (x, y) = self.relative(x, y);
                vec![
                    Arg::U32(button),
                    Arg::U32(down as u32),
                    Arg::F32(x),
                    Arg::F32(y),
                ]
            }
            InputEvent::Wheel { dx, dy, mode } => {
                let (dx, dy) = self.wheel_pixels(dx, dy, mode);
                vec![Arg::F32(dx), Arg::F32(dy)]
            }
            InputEvent::Key { keycode, down } => vec![Arg::U32(keycode), Arg::U32(down as u32)],
        };
        GuestCall::new(export, args)
    }

    /// Translate `event` if the guest exports its handler; `None` otherwise.
    pub fn forward(
        &mut self,
        event: &InputEvent,
        has_export: impl Fn(&str) -> bool,
    ) -> Option<GuestCall> {
        let kind = event.kind();
        if !has_export(kind.export()) {
            if self.reported_missing.insert(kind) {
                log::error!(
                    "guest does not export `{}`; dropping {kind:?} events",
                    kind.export()
                );
            }
            return None;
        }
        Some(self.translate(event))
    }

    /// Event kinds dropped so far for lack of an export.
    pub fn missing(&self) -> usize {
        self.reported_missing.len()
    }

    fn relative(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.rect.x, y - self.rect.y)
    }

    fn wheel_pixels(&self, dx: f32, dy: f32, mode: WheelMode) -> (f32, f32) {
        match mode {
            WheelMode::Pixel => (dx, dy),
            WheelMode::Line => (dx * LINE_HEIGHT_PX, dy * LINE_HEIGHT_PX),
            WheelMode::Page => (
                dx * self.rect.width * PAGE_FRACTION,
                dy * self.rect.height * PAGE_FRACTION,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder() -> InputForwarder {
        InputForwarder::new(Rect::new(10.0, 20.0, 800.0, 600.0))
    }

    #[test]
    fn pointer_coordinates_are_element_relative() {
        let f = forwarder();
        assert_eq!(
            f.translate(&InputEvent::MouseMove { x: 15.0, y: 70.5 }),
            GuestCall::new(
                guest_exports::ON_MOUSE_MOVE,
                vec![Arg::F32(5.0), Arg::F32(50.5)]
            )
        );
        assert_eq!(
            f.translate(&InputEvent::MouseButton {
                button: 2,
                down: true,
                x: 0.0,
                y: 0.0
            })
            .args,
            vec![Arg::U32(2), Arg::U32(1), Arg::F32(-10.0), Arg::F32(-20.0)]
        );
    }

    #[test]
    fn wheel_deltas_are_normalized_to_pixels() {
        let f = forwarder();
        let wheel = |mode| {
            f.translate(&InputEvent::Wheel {
                dx: 1.0,
                dy: -2.0,
                mode,
            })
            .args
        };
        assert_eq!(wheel(WheelMode::Pixel), vec![Arg::F32(1.0), Arg::F32(-2.0)]);
        assert_eq!(wheel(WheelMode::Line), vec![Arg::F32(16.0), Arg::F32(-32.0)]);
        assert_eq!(
            wheel(WheelMode::Page),
            vec![Arg::F32(800.0 * 0.8), Arg::F32(-2.0 * 600.0 * 0.8)]
        );
    }

    #[test]
    fn key_events_carry_code_and_state() {
        let call = forwarder().translate(&InputEvent::Key {
            keycode: 65,
            down: false,
        });
        assert_eq!(call.export, guest_exports::ON_KEY_EVENT);
        assert_eq!(call.args, vec![Arg::U32(65), Arg::U32(0)]);
    }

    #[test]
    fn missing_exports_are_reported_once_per_kind() {
        let mut f = forwarder();
        let only_keys = |name: &str| name == guest_exports::ON_KEY_EVENT;

        for _ in 0..3 {
            assert!(
                f.forward(&InputEvent::MouseMove { x: 1.0, y: 1.0 }, only_keys)
                    .is_none()
            );
        }
        assert_eq!(f.missing(), 1);

        let wheel = InputEvent::Wheel {
            dx: 0.0,
            dy: 1.0,
            mode: WheelMode::Pixel,
        };
        assert!(f.forward(&wheel, only_keys).is_none());
        assert_eq!(f.missing(), 2);

        let key = InputEvent::Key {
            keycode: 1,
            down: true,
        };
        assert!(f.forward(&key, only_keys).is_some());
        assert_eq!(f.missing(), 2);
    }

    #[test]
    fn moved_element_changes_origin() {
        let mut f = forwarder();
        f.set_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(
            f.translate(&InputEvent::MouseMove { x: 15.0, y: 70.0 }).args,
            vec![Arg::F32(15.0), Arg::F32(70.0)]
        );
    }
}
