//! Gesture classifier: turns "hold the auxiliary button and roll the ball"
//! into wheel ticks, and a plain click of that button into a middle click.
//!
//! Everything here is deterministic and free of I/O.  [`transition`] is the
//! pure state function; [`GestureClassifier`] owns the state and exposes it
//! through the [`EventHandler`] seam that the evdev adapter drives.
use log::debug;
use strum::IntoStaticStr;

use crate::config::ScrollSettings;

/// One standard wheel detent.
pub const WHEEL_DELTA: i32 = 120;

/// Integer screen position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Pointer input already filtered down to the trigger button and motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    ButtonDown(Point),
    ButtonUp(Point),
    Move(Point),
}

impl PointerEvent {
    pub fn position(&self) -> Point {
        match *self {
            PointerEvent::ButtonDown(p) | PointerEvent::ButtonUp(p) | PointerEvent::Move(p) => p,
        }
    }
}

/// Kinds of input the classifier asks the sink to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticKind {
    MiddleButtonDown,
    MiddleButtonUp,
    /// Vertical wheel, in units of [`WHEEL_DELTA`]. Positive scrolls up.
    Wheel(i32),
    /// Horizontal wheel, in units of [`WHEEL_DELTA`]. Positive scrolls right.
    HWheel(i32),
}

/// A synthetic input event tagged with the screen position it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticEvent {
    pub kind: SyntheticKind,
    pub position: Point,
}

/// Outcome of classifying a single event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
    /// Swallow the original event instead of forwarding it.
    pub suppress: bool,
    /// Synthetic events to inject, in order.
    pub emit: Vec<SyntheticEvent>,
    /// Move the cursor here before anything else happens.
    pub reposition: Option<Point>,
}

impl Verdict {
    fn pass() -> Self {
        Self::default()
    }

    fn suppress() -> Self {
        Self {
            suppress: true,
            ..Self::default()
        }
    }

    fn with_emit(mut self, emit: Vec<SyntheticEvent>) -> Self {
        self.emit = emit;
        self
    }

    fn with_reposition(mut self, position: Point) -> Self {
        self.reposition = Some(position);
        self
    }
}

/// Displacement collected while scrolling, relative to the pinned origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Accumulator {
    pub x: i32,
    pub y: i32,
}

/// Classifier state.  The origin and accumulator only exist in the states
/// where they mean something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum GestureState {
    #[default]
    Idle,
    Pressed {
        origin: Point,
    },
    Scrolling {
        origin: Point,
        accumulator: Accumulator,
    },
}

/// Apply one event to `state`.
///
/// Pure: the same state, settings and event always produce the same result.
pub fn transition(
    state: GestureState,
    event: PointerEvent,
    settings: &ScrollSettings,
) -> (GestureState, Verdict) {
    use GestureState::*;
    use PointerEvent::*;

    match (state, event) {
        (Idle, ButtonDown(pos)) => (Pressed { origin: pos }, Verdict::suppress()),
        (Idle, ButtonUp(_) | Move(_)) => (Idle, Verdict::pass()),

        (Pressed { .. }, ButtonUp(pos)) => {
            let verdict = if settings.emulate_middle_button {
                Verdict::suppress().with_emit(middle_click(pos))
            } else {
                Verdict::suppress()
            };
            (Idle, verdict)
        }
        (Pressed { origin }, Move(_)) => (
            Scrolling {
                origin,
                accumulator: Accumulator::default(),
            },
            Verdict::suppress().with_reposition(origin),
        ),
        // Out of order; the source is trusted but not guaranteed well-formed.
        (Pressed { .. }, ButtonDown(_)) => (state, Verdict::suppress()),

        // A release after dragging ends the gesture without a click.
        (Scrolling { .. }, ButtonUp(_)) => (Idle, Verdict::suppress()),
        (Scrolling { origin, accumulator }, Move(pos)) => {
            let (accumulator, emit) = scroll(origin, accumulator, pos, settings);
            (
                Scrolling {
                    origin,
                    accumulator,
                },
                Verdict::suppress()
                    .with_reposition(origin)
                    .with_emit(emit),
            )
        }
        (Scrolling { .. }, ButtonDown(_)) => (state, Verdict::suppress()),
    }
}

fn middle_click(position: Point) -> Vec<SyntheticEvent> {
    vec![
        SyntheticEvent {
            kind: SyntheticKind::MiddleButtonDown,
            position,
        },
        SyntheticEvent {
            kind: SyntheticKind::MiddleButtonUp,
            position,
        },
    ]
}

/// Accumulate displacement from `origin` and drain it into wheel ticks once
/// it strictly exceeds the threshold.
fn scroll(
    origin: Point,
    mut acc: Accumulator,
    pos: Point,
    settings: &ScrollSettings,
) -> (Accumulator, Vec<SyntheticEvent>) {
    // Saturating, so a large threshold never wraps the sum around.
    acc.y = acc.y.saturating_add(pos.y.saturating_sub(origin.y));
    if settings.horizontal_scroll {
        acc.x = acc.x.saturating_add(pos.x.saturating_sub(origin.x));
    }

    let exceeds = |v: i32| v < -settings.threshold || v > settings.threshold;
    let fire_y = exceeds(acc.y);
    // Vertical wins when both axes fire and only one axis is wanted.
    let fire_x =
        settings.horizontal_scroll && exceeds(acc.x) && !(fire_y && settings.prefer_axis);

    let mut emit = Vec::new();

    if fire_x {
        let delta = if acc.x > 0 { WHEEL_DELTA } else { -WHEEL_DELTA };
        let delta = if settings.reverse_horizontal { -delta } else { delta };
        emit.extend(ticks(SyntheticKind::HWheel(delta), pos, settings.wheel_factor));
        acc.x = 0;
        if settings.prefer_axis {
            acc.y = 0;
        }
    }

    if fire_y {
        // Moving down scrolls down, which is a negative wheel delta.
        let delta = if acc.y > 0 { -WHEEL_DELTA } else { WHEEL_DELTA };
        let delta = if settings.reverse_vertical { -delta } else { delta };
        emit.extend(ticks(SyntheticKind::Wheel(delta), pos, settings.wheel_factor));
        acc.y = 0;
        if settings.prefer_axis {
            acc.x = 0;
        }
    }

    (acc, emit)
}

fn ticks(kind: SyntheticKind, position: Point, count: u32) -> impl Iterator<Item = SyntheticEvent> {
    (0..count).map(move |_| SyntheticEvent { kind, position })
}

// -- Collaborator seams ---------------------------------------

/// Anything that turns pointer events into verdicts.
pub trait EventHandler {
    fn handle(&mut self, event: PointerEvent) -> Verdict;
}

/// Injects synthetic input into the system.  Best effort: failures are the
/// sink's business and are not reported back.
pub trait SyntheticInputSink {
    fn inject(&mut self, events: &[SyntheticEvent]);
}

/// Sets the absolute cursor position.
pub trait CursorController {
    fn set_position(&mut self, position: Point);
}

/// Run `event` through `handler` and carry out the verdict: reposition the
/// cursor first, then hand any synthetic events to `sink` as one request.
///
/// Returns `true` if the original event must be suppressed.
pub fn dispatch<H, S, C>(handler: &mut H, event: PointerEvent, sink: &mut S, cursor: &mut C) -> bool
where
    H: EventHandler + ?Sized,
    S: SyntheticInputSink + ?Sized,
    C: CursorController + ?Sized,
{
    let verdict = handler.handle(event);
    if let Some(position) = verdict.reposition {
        cursor.set_position(position);
    }
    if !verdict.emit.is_empty() {
        sink.inject(&verdict.emit);
    }
    verdict.suppress
}

// -- GestureClassifier ----------------------------------------

/// Owns the gesture state for one pointer device.
#[derive(Debug, Default)]
pub struct GestureClassifier {
    settings: ScrollSettings,
    state: GestureState,
}

impl GestureClassifier {
    pub fn new(settings: ScrollSettings) -> Self {
        Self {
            settings,
            state: GestureState::Idle,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Drop any gesture in progress, e.g. after the device reconnects.
    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
    }
}

impl EventHandler for GestureClassifier {
    fn handle(&mut self, event: PointerEvent) -> Verdict {
        let (next, verdict) = transition(self.state, event, &self.settings);

        if std::mem::discriminant(&next) != std::mem::discriminant(&self.state) {
            let from: &'static str = self.state.into();
            let to: &'static str = next.into();
            debug!("gesture {from} -> {to} at {:?}", event.position());
        }

        self.state = next;
        verdict
    }
}
