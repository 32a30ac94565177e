//! evdev event translation and frame assembly - no device I/O, fully testable.
//!
//! This module sits between raw `evdev::InputEvent`s and the gesture
//! classifier: it picks the trigger buttons and pointer motion out of the
//! stream, folds each `SYN_REPORT` frame of motion into a single
//! [`PointerEvent::Move`], decides what gets forwarded to the virtual device,
//! and translates synthetic events back into evdev events.

use evdev::{EventType, InputEvent, InputEventKind, Key, RelativeAxisType, Synchronization};

use crate::classifier::{
    CursorController, EventHandler, Point, PointerEvent, SyntheticEvent, SyntheticInputSink,
    SyntheticKind, WHEEL_DELTA, dispatch,
};

// -- RawInput -------------------------------------------------

/// What a single evdev event means to the scroll pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    TriggerDown,
    TriggerUp,
    MotionX(i32),
    MotionY(i32),
    SynReport,
    /// Unrelated key or relative-axis event, forwarded untouched.
    Passthrough,
    /// Dropped: autorepeat, MSC scancodes, non-report SYN events.
    Ignored,
}

/// Classify a single `evdev::InputEvent` relative to the trigger buttons.
pub fn classify_event(event: &InputEvent, triggers: &[Key]) -> RawInput {
    match event.kind() {
        InputEventKind::Key(key) if triggers.contains(&key) => match event.value() {
            1 => RawInput::TriggerDown,
            0 => RawInput::TriggerUp,
            _ => RawInput::Ignored,
        },
        InputEventKind::Key(_) => RawInput::Passthrough,
        InputEventKind::RelAxis(axis) => match axis {
            RelativeAxisType::REL_X => RawInput::MotionX(event.value()),
            RelativeAxisType::REL_Y => RawInput::MotionY(event.value()),
            _ => RawInput::Passthrough,
        },
        InputEventKind::Synchronization(Synchronization::SYN_REPORT) => RawInput::SynReport,
        _ => RawInput::Ignored,
    }
}

// -- PointerTracker -------------------------------------------

/// Motion gathered during one frame, not yet delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMove {
    pub dx: i32,
    pub dy: i32,
    pub target: Point,
}

impl PendingMove {
    pub fn event(&self) -> PointerEvent {
        PointerEvent::Move(self.target)
    }

    /// The relative-motion events that reproduce this move.
    pub fn to_evdev_events(&self) -> Vec<InputEvent> {
        let mut out = Vec::with_capacity(2);
        if self.dx != 0 {
            out.push(InputEvent::new(
                EventType::RELATIVE,
                RelativeAxisType::REL_X.0,
                self.dx,
            ));
        }
        if self.dy != 0 {
            out.push(InputEvent::new(
                EventType::RELATIVE,
                RelativeAxisType::REL_Y.0,
                self.dy,
            ));
        }
        out
    }
}

/// Logical cursor position of a relative pointer.
///
/// The grabbed device only reports deltas; the tracker integrates the deltas
/// that actually reach the system, which gives the classifier absolute
/// positions to pin and compare against.
#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    cursor: Point,
    pending_dx: i32,
    pending_dy: i32,
}

impl PointerTracker {
    pub fn new(start: Point) -> Self {
        Self {
            cursor: start,
            ..Default::default()
        }
    }

    pub fn cursor(&self) -> Point {
        self.cursor
    }

    /// Buffer relative motion until `SYN_REPORT`.
    pub fn add_motion(&mut self, dx: i32, dy: i32) {
        self.pending_dx = self.pending_dx.saturating_add(dx);
        self.pending_dy = self.pending_dy.saturating_add(dy);
    }

    /// Take the motion buffered for the current frame, if any.
    pub fn take_move(&mut self) -> Option<PendingMove> {
        let (dx, dy) = (
            std::mem::take(&mut self.pending_dx),
            std::mem::take(&mut self.pending_dy),
        );
        if dx == 0 && dy == 0 {
            return None;
        }
        Some(PendingMove {
            dx,
            dy,
            target: Point::new(
                self.cursor.x.saturating_add(dx),
                self.cursor.y.saturating_add(dy),
            ),
        })
    }

    /// Record that `pending` was forwarded, so the cursor really moved.
    pub fn commit(&mut self, pending: &PendingMove) {
        self.cursor = pending.target;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.cursor);
    }
}

impl CursorController for PointerTracker {
    fn set_position(&mut self, position: Point) {
        self.cursor = position;
    }
}

// -- EventRouter ----------------------------------------------

/// Routes a grabbed device's events through the classifier and collects
/// the frame to forward to the virtual device.
///
/// Within one `SYN_REPORT` frame the motion is delivered before any trigger
/// edge, so ball jitter reported together with a press never counts as
/// post-press movement.
#[derive(Debug)]
pub struct EventRouter {
    triggers: Vec<Key>,
    tracker: PointerTracker,
    edges: Vec<InputEvent>,
    frame: Vec<InputEvent>,
}

impl EventRouter {
    pub fn new(triggers: &[Key]) -> Self {
        Self {
            triggers: triggers.to_vec(),
            tracker: PointerTracker::default(),
            edges: Vec::new(),
            frame: Vec::new(),
        }
    }

    pub fn tracker(&self) -> &PointerTracker {
        &self.tracker
    }

    /// Discard a half-assembled frame, e.g. after the device reconnects.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.edges.clear();
        self.frame.clear();
    }

    /// Feed one raw event.  Returns the events to forward once a frame is
    /// complete and something in it survived suppression.
    pub fn feed<H, S>(&mut self, event: &InputEvent, handler: &mut H, sink: &mut S) -> Option<Vec<InputEvent>>
    where
        H: EventHandler + ?Sized,
        S: SyntheticInputSink + ?Sized,
    {
        match classify_event(event, &self.triggers) {
            RawInput::TriggerDown | RawInput::TriggerUp => self.edges.push(event.clone()),
            RawInput::MotionX(dx) => self.tracker.add_motion(dx, 0),
            RawInput::MotionY(dy) => self.tracker.add_motion(0, dy),
            RawInput::Passthrough => self.frame.push(event.clone()),
            RawInput::Ignored => {}
            RawInput::SynReport => {
                if let Some(pending) = self.tracker.take_move() {
                    if !dispatch(&mut *handler, pending.event(), &mut *sink, &mut self.tracker) {
                        self.tracker.commit(&pending);
                        self.frame.extend(pending.to_evdev_events());
                    }
                }
                for edge in std::mem::take(&mut self.edges) {
                    let pos = self.tracker.cursor();
                    let pointer_event = if edge.value() == 1 {
                        PointerEvent::ButtonDown(pos)
                    } else {
                        PointerEvent::ButtonUp(pos)
                    };
                    if !dispatch(&mut *handler, pointer_event, &mut *sink, &mut self.tracker) {
                        self.frame.push(edge);
                    }
                }
                if !self.frame.is_empty() {
                    return Some(std::mem::take(&mut self.frame));
                }
            }
        }
        None
    }
}

// -- Synthetic output -----------------------------------------

fn syn_report() -> InputEvent {
    InputEvent::new(EventType::SYNCHRONIZATION, Synchronization::SYN_REPORT.0, 0)
}

/// Translate synthetic events into evdev events for one uinput write.
///
/// Each synthetic event gets its own frame so that a press and release, or
/// consecutive wheel ticks, are not merged by the consumer.  The trailing
/// `SYN_REPORT` is left to the writer.
pub fn to_evdev_events(events: &[SyntheticEvent]) -> Vec<InputEvent> {
    let mut out = Vec::with_capacity(events.len() * 2);
    for (i, ev) in events.iter().enumerate() {
        if i > 0 {
            out.push(syn_report());
        }
        out.push(match ev.kind {
            SyntheticKind::MiddleButtonDown => {
                InputEvent::new(EventType::KEY, Key::BTN_MIDDLE.code(), 1)
            }
            SyntheticKind::MiddleButtonUp => {
                InputEvent::new(EventType::KEY, Key::BTN_MIDDLE.code(), 0)
            }
            SyntheticKind::Wheel(delta) => InputEvent::new(
                EventType::RELATIVE,
                RelativeAxisType::REL_WHEEL.0,
                delta / WHEEL_DELTA,
            ),
            SyntheticKind::HWheel(delta) => InputEvent::new(
                EventType::RELATIVE,
                RelativeAxisType::REL_HWHEEL.0,
                delta / WHEEL_DELTA,
            ),
        });
    }
    out
}

// -- Helpers --------------------------------------------------

/// Parse a USB vendor:product ID string into `(vendor, product)`.
///
/// Accepts formats like `"046d:c408"` or `"USB:046d:c408"` (case-insensitive).
pub fn parse_usb_id(raw: &str) -> Option<(u16, u16)> {
    let cleaned = raw.to_lowercase().replace("usb:", "");
    let (vendor_str, product_str) = cleaned.split_once(':')?;
    let vendor = u16::from_str_radix(vendor_str, 16).ok()?;
    let product = u16::from_str_radix(product_str, 16).ok()?;
    Some((vendor, product))
}
