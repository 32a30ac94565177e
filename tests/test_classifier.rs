//! Tests for `trackscroll::classifier` - the transition table, the wheel
//! emission rule, optional axes, and the `dispatch` bridge.
use trackscroll::classifier::{
    Accumulator, CursorController, EventHandler, GestureClassifier, GestureState, Point,
    PointerEvent, SyntheticEvent, SyntheticInputSink, SyntheticKind, Verdict, WHEEL_DELTA,
    dispatch, transition,
};
use trackscroll::config::ScrollSettings;

const ORIGIN: Point = Point::new(100, 200);

fn down() -> PointerEvent {
    PointerEvent::ButtonDown(ORIGIN)
}

fn up() -> PointerEvent {
    PointerEvent::ButtonUp(ORIGIN)
}

/// A move displaced from the origin by `(dx, dy)`.
fn moved(dx: i32, dy: i32) -> PointerEvent {
    PointerEvent::Move(Point::new(ORIGIN.x + dx, ORIGIN.y + dy))
}

fn make_classifier(settings: Option<ScrollSettings>) -> GestureClassifier {
    GestureClassifier::new(settings.unwrap_or_default())
}

/// Feed events, return the verdict of each one.
fn feed(classifier: &mut GestureClassifier, events: &[PointerEvent]) -> Vec<Verdict> {
    events.iter().map(|e| classifier.handle(*e)).collect()
}

/// Press and make the entry move, leaving the classifier in `Scrolling`.
fn start_scrolling(classifier: &mut GestureClassifier) {
    feed(classifier, &[down(), moved(3, 3)]);
    assert!(matches!(classifier.state(), GestureState::Scrolling { .. }));
}

fn wheel_ticks(verdicts: &[Verdict]) -> Vec<SyntheticKind> {
    verdicts
        .iter()
        .flat_map(|v| v.emit.iter().map(|e| e.kind))
        .collect()
}

fn accumulator(classifier: &GestureClassifier) -> Accumulator {
    match classifier.state() {
        GestureState::Scrolling { accumulator, .. } => accumulator,
        other => panic!("not scrolling: {other:?}"),
    }
}

// -- Idle -------------------------------------------------

#[test]
fn test_starts_idle() {
    assert_eq!(make_classifier(None).state(), GestureState::Idle);
}

#[test]
fn test_idle_button_down_pins_origin() {
    let mut c = make_classifier(None);
    let v = c.handle(down());
    assert!(v.suppress);
    assert!(v.emit.is_empty());
    assert_eq!(v.reposition, None);
    assert_eq!(c.state(), GestureState::Pressed { origin: ORIGIN });
}

#[test]
fn test_idle_move_and_up_pass_through() {
    let mut c = make_classifier(None);
    for event in [moved(5, 5), up(), moved(-40, 12)] {
        let v = c.handle(event);
        assert_eq!(v, Verdict::default());
        assert!(!v.suppress);
        assert_eq!(c.state(), GestureState::Idle);
    }
}

// -- Pressed ----------------------------------------------

#[test]
fn test_click_emits_middle_click() {
    let mut c = make_classifier(None);
    let at = Point::new(7, 9);
    let verdicts = feed(
        &mut c,
        &[PointerEvent::ButtonDown(at), PointerEvent::ButtonUp(at)],
    );
    let release = &verdicts[1];
    assert!(release.suppress);
    assert_eq!(
        release.emit,
        vec![
            SyntheticEvent {
                kind: SyntheticKind::MiddleButtonDown,
                position: at
            },
            SyntheticEvent {
                kind: SyntheticKind::MiddleButtonUp,
                position: at
            },
        ]
    );
    assert_eq!(c.state(), GestureState::Idle);
}

#[test]
fn test_click_without_middle_emulation() {
    let settings = ScrollSettings {
        emulate_middle_button: false,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    let verdicts = feed(&mut c, &[down(), up()]);
    assert!(verdicts[1].suppress);
    assert!(verdicts[1].emit.is_empty());
    assert_eq!(c.state(), GestureState::Idle);
}

#[test]
fn test_first_move_enters_scrolling() {
    let mut c = make_classifier(None);
    c.handle(down());
    let v = c.handle(moved(50, 80));
    assert!(v.suppress);
    assert!(v.emit.is_empty());
    assert_eq!(v.reposition, Some(ORIGIN));
    assert_eq!(
        c.state(),
        GestureState::Scrolling {
            origin: ORIGIN,
            accumulator: Accumulator::default()
        }
    );
}

#[test]
fn test_repeated_button_down_while_pressed_is_noop() {
    let mut c = make_classifier(None);
    c.handle(down());
    let v = c.handle(PointerEvent::ButtonDown(Point::new(1, 1)));
    assert!(v.suppress);
    assert!(v.emit.is_empty());
    assert_eq!(c.state(), GestureState::Pressed { origin: ORIGIN });
}

// -- Scrolling --------------------------------------------

#[test]
fn test_move_down_past_threshold_scrolls_down() {
    let mut c = make_classifier(None);
    start_scrolling(&mut c);
    let v = c.handle(moved(0, 15));
    assert!(v.suppress);
    assert_eq!(v.reposition, Some(ORIGIN));
    assert_eq!(
        v.emit,
        vec![SyntheticEvent {
            kind: SyntheticKind::Wheel(-WHEEL_DELTA),
            position: Point::new(ORIGIN.x, ORIGIN.y + 15),
        }]
    );
    assert_eq!(accumulator(&c).y, 0);
}

#[test]
fn test_move_up_past_threshold_scrolls_up() {
    let mut c = make_classifier(None);
    start_scrolling(&mut c);
    let v = c.handle(moved(0, -11));
    assert_eq!(wheel_ticks(&[v]), vec![SyntheticKind::Wheel(WHEEL_DELTA)]);
}

#[test]
fn test_sub_threshold_moves_accumulate() {
    let mut c = make_classifier(None);
    start_scrolling(&mut c);

    let v = c.handle(moved(0, 5));
    assert!(v.emit.is_empty());
    assert_eq!(v.reposition, Some(ORIGIN));
    assert_eq!(accumulator(&c).y, 5);

    // Exactly at the threshold does not fire.
    let v = c.handle(moved(0, 5));
    assert!(v.emit.is_empty());
    assert_eq!(accumulator(&c).y, 10);

    let v = c.handle(moved(0, 1));
    assert_eq!(wheel_ticks(&[v]), vec![SyntheticKind::Wheel(-WHEEL_DELTA)]);
    assert_eq!(accumulator(&c).y, 0);
}

#[test]
fn test_opposite_moves_cancel_out() {
    let mut c = make_classifier(None);
    start_scrolling(&mut c);
    let verdicts = feed(&mut c, &[moved(0, 8), moved(0, -8), moved(0, 8)]);
    assert!(wheel_ticks(&verdicts).is_empty());
    assert_eq!(accumulator(&c).y, 8);
}

#[test]
fn test_horizontal_motion_ignored_by_default() {
    let mut c = make_classifier(None);
    start_scrolling(&mut c);
    let verdicts = feed(&mut c, &[moved(50, 0), moved(-50, 0)]);
    assert!(wheel_ticks(&verdicts).is_empty());
    assert_eq!(accumulator(&c), Accumulator::default());
}

#[test]
fn test_release_after_scrolling_does_not_click() {
    let mut c = make_classifier(None);
    start_scrolling(&mut c);
    let verdicts = feed(&mut c, &[moved(0, 20), moved(0, 20), up()]);
    let release = verdicts.last().unwrap();
    assert!(release.suppress);
    assert!(release.emit.is_empty());
    assert!(
        !wheel_ticks(&verdicts)
            .iter()
            .any(|k| matches!(k, SyntheticKind::MiddleButtonDown | SyntheticKind::MiddleButtonUp))
    );
    assert_eq!(c.state(), GestureState::Idle);
}

#[test]
fn test_release_after_entry_move_does_not_click() {
    let mut c = make_classifier(None);
    let verdicts = feed(&mut c, &[down(), moved(1, 0), up()]);
    assert!(wheel_ticks(&verdicts).is_empty());
    assert_eq!(c.state(), GestureState::Idle);
}

#[test]
fn test_button_down_while_scrolling_is_noop() {
    let mut c = make_classifier(None);
    start_scrolling(&mut c);
    c.handle(moved(0, 4));
    let before = c.state();
    let v = c.handle(PointerEvent::ButtonDown(Point::new(0, 0)));
    assert!(v.suppress);
    assert!(v.emit.is_empty());
    assert_eq!(c.state(), before);
}

#[test]
fn test_new_gesture_pins_new_origin() {
    let mut c = make_classifier(None);
    start_scrolling(&mut c);
    c.handle(moved(0, 7));
    c.handle(up());
    let second = Point::new(400, 400);
    c.handle(PointerEvent::ButtonDown(second));
    c.handle(PointerEvent::Move(Point::new(400, 430)));
    assert_eq!(
        c.state(),
        GestureState::Scrolling {
            origin: second,
            accumulator: Accumulator::default()
        }
    );
}

// -- Settings ---------------------------------------------

#[test]
fn test_wheel_factor_repeats_ticks() {
    let settings = ScrollSettings {
        wheel_factor: 3,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    start_scrolling(&mut c);
    let v = c.handle(moved(0, 20));
    assert_eq!(
        wheel_ticks(&[v]),
        vec![SyntheticKind::Wheel(-WHEEL_DELTA); 3]
    );
}

#[test]
fn test_reverse_vertical() {
    let settings = ScrollSettings {
        reverse_vertical: true,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    start_scrolling(&mut c);
    let v = c.handle(moved(0, 20));
    assert_eq!(wheel_ticks(&[v]), vec![SyntheticKind::Wheel(WHEEL_DELTA)]);
}

#[test]
fn test_custom_threshold() {
    let settings = ScrollSettings {
        threshold: 30,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    start_scrolling(&mut c);
    assert!(c.handle(moved(0, 20)).emit.is_empty());
    assert_eq!(
        wheel_ticks(&[c.handle(moved(0, 11))]),
        vec![SyntheticKind::Wheel(-WHEEL_DELTA)]
    );
}

#[test]
fn test_huge_threshold_saturates_accumulator() {
    let settings = ScrollSettings {
        threshold: i32::MAX,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    start_scrolling(&mut c);
    for _ in 0..4 {
        assert!(c.handle(moved(0, 1_000_000_000)).emit.is_empty());
    }
    assert_eq!(accumulator(&c).y, i32::MAX);
    // Never strictly past i32::MAX, so still no tick.
    assert!(c.handle(moved(0, 1)).emit.is_empty());
}

#[test]
fn test_far_away_move_does_not_overflow() {
    let mut c = make_classifier(None);
    feed(&mut c, &[PointerEvent::ButtonDown(Point::new(i32::MIN, i32::MIN))]);
    c.handle(PointerEvent::Move(Point::new(0, 0)));
    let v = c.handle(PointerEvent::Move(Point::new(i32::MAX, i32::MAX)));
    // The displacement clamps to i32::MAX instead of wrapping negative.
    assert_eq!(wheel_ticks(&[v]), vec![SyntheticKind::Wheel(-WHEEL_DELTA)]);
}

#[test]
fn test_horizontal_scroll() {
    let settings = ScrollSettings {
        horizontal_scroll: true,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    start_scrolling(&mut c);
    assert_eq!(
        wheel_ticks(&[c.handle(moved(12, 0))]),
        vec![SyntheticKind::HWheel(WHEEL_DELTA)]
    );
    assert_eq!(
        wheel_ticks(&[c.handle(moved(-12, 0))]),
        vec![SyntheticKind::HWheel(-WHEEL_DELTA)]
    );
}

#[test]
fn test_reverse_horizontal() {
    let settings = ScrollSettings {
        horizontal_scroll: true,
        reverse_horizontal: true,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    start_scrolling(&mut c);
    assert_eq!(
        wheel_ticks(&[c.handle(moved(12, 0))]),
        vec![SyntheticKind::HWheel(-WHEEL_DELTA)]
    );
}

#[test]
fn test_both_axes_fire_horizontal_first() {
    let settings = ScrollSettings {
        horizontal_scroll: true,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    start_scrolling(&mut c);
    assert_eq!(
        wheel_ticks(&[c.handle(moved(15, 15))]),
        vec![
            SyntheticKind::HWheel(WHEEL_DELTA),
            SyntheticKind::Wheel(-WHEEL_DELTA)
        ]
    );
    assert_eq!(accumulator(&c), Accumulator::default());
}

#[test]
fn test_prefer_axis_vertical_wins() {
    let settings = ScrollSettings {
        horizontal_scroll: true,
        prefer_axis: true,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    start_scrolling(&mut c);
    assert_eq!(
        wheel_ticks(&[c.handle(moved(15, 15))]),
        vec![SyntheticKind::Wheel(-WHEEL_DELTA)]
    );
    assert_eq!(accumulator(&c), Accumulator::default());
}

#[test]
fn test_prefer_axis_resets_other_axis() {
    let settings = ScrollSettings {
        horizontal_scroll: true,
        prefer_axis: true,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    start_scrolling(&mut c);
    c.handle(moved(0, 8));
    let v = c.handle(moved(12, 0));
    assert_eq!(wheel_ticks(&[v]), vec![SyntheticKind::HWheel(WHEEL_DELTA)]);
    assert_eq!(accumulator(&c), Accumulator::default());
}

#[test]
fn test_without_prefer_axis_other_axis_keeps_accruing() {
    let settings = ScrollSettings {
        horizontal_scroll: true,
        ..Default::default()
    };
    let mut c = make_classifier(Some(settings));
    start_scrolling(&mut c);
    c.handle(moved(0, 8));
    c.handle(moved(12, 0));
    assert_eq!(accumulator(&c), Accumulator { x: 0, y: 8 });
}

// -- Purity -----------------------------------------------

#[test]
fn test_transition_is_deterministic() {
    let settings = ScrollSettings::default();
    let states = [
        GestureState::Idle,
        GestureState::Pressed { origin: ORIGIN },
        GestureState::Scrolling {
            origin: ORIGIN,
            accumulator: Accumulator { x: 0, y: 9 },
        },
    ];
    let events = [down(), up(), moved(0, 4), moved(0, -30)];
    for state in states {
        for event in events {
            assert_eq!(
                transition(state, event, &settings),
                transition(state, event, &settings)
            );
        }
    }
}

#[test]
fn test_transition_table_next_states() {
    let settings = ScrollSettings::default();
    let pressed = GestureState::Pressed { origin: ORIGIN };
    let scrolling = GestureState::Scrolling {
        origin: ORIGIN,
        accumulator: Accumulator::default(),
    };

    assert_eq!(transition(GestureState::Idle, down(), &settings).0, pressed);
    assert_eq!(transition(GestureState::Idle, up(), &settings).0, GestureState::Idle);
    assert_eq!(transition(pressed, up(), &settings).0, GestureState::Idle);
    assert_eq!(transition(pressed, moved(9, 9), &settings).0, scrolling);
    assert_eq!(transition(pressed, down(), &settings).0, pressed);
    assert_eq!(transition(scrolling, up(), &settings).0, GestureState::Idle);
    assert_eq!(transition(scrolling, down(), &settings).0, scrolling);
    assert!(matches!(
        transition(scrolling, moved(0, 1), &settings).0,
        GestureState::Scrolling { .. }
    ));
}

#[test]
fn test_reset_returns_to_idle() {
    let mut c = make_classifier(None);
    start_scrolling(&mut c);
    c.reset();
    assert_eq!(c.state(), GestureState::Idle);
}

// -- dispatch ---------------------------------------------

#[derive(Default)]
struct RecordingSink {
    requests: Vec<Vec<SyntheticEvent>>,
}

impl SyntheticInputSink for RecordingSink {
    fn inject(&mut self, events: &[SyntheticEvent]) {
        self.requests.push(events.to_vec());
    }
}

#[derive(Default)]
struct RecordingCursor {
    positions: Vec<Point>,
}

impl CursorController for RecordingCursor {
    fn set_position(&mut self, position: Point) {
        self.positions.push(position);
    }
}

#[test]
fn test_dispatch_pass_through_touches_nothing() {
    let mut c = make_classifier(None);
    let mut sink = RecordingSink::default();
    let mut cursor = RecordingCursor::default();
    assert!(!dispatch(&mut c, moved(1, 1), &mut sink, &mut cursor));
    assert!(sink.requests.is_empty());
    assert!(cursor.positions.is_empty());
}

#[test]
fn test_dispatch_click_is_one_request() {
    let mut c = make_classifier(None);
    let mut sink = RecordingSink::default();
    let mut cursor = RecordingCursor::default();
    assert!(dispatch(&mut c, down(), &mut sink, &mut cursor));
    assert!(dispatch(&mut c, up(), &mut sink, &mut cursor));
    assert_eq!(sink.requests.len(), 1);
    assert_eq!(sink.requests[0].len(), 2);
    assert!(cursor.positions.is_empty());
}

#[test]
fn test_dispatch_scroll_repositions_and_injects() {
    let mut c = make_classifier(None);
    let mut sink = RecordingSink::default();
    let mut cursor = RecordingCursor::default();
    for event in [down(), moved(0, 2), moved(0, 6), moved(0, 6)] {
        assert!(dispatch(&mut c, event, &mut sink, &mut cursor));
    }
    assert_eq!(cursor.positions, vec![ORIGIN; 3]);
    assert_eq!(sink.requests.len(), 1);
    assert_eq!(sink.requests[0][0].kind, SyntheticKind::Wheel(-WHEEL_DELTA));
}
