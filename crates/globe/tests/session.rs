use std::rc::Rc;
use std::sync::Arc;

use camera::{CameraMode, InputEvent, Key};
use foundation::math::GeoPosition;
use foundation::time::{ManualClock, Time};
use globe::{GlobeConfig, GlobeEvent, GlobeSession, UiEvent};
use pretty_assertions::assert_eq;
use scene::entity::{EntityId, EntityRef};
use scene::instancing::InstanceShape;
use scene::lod::DetailLevel;
use scene::records::AircraftRecord;
use streaming::SnapshotPayload;

type Session = GlobeSession<Rc<ManualClock>>;

fn assert_close(a: f64, b: f64, eps: f64) {
    let diff = (a - b).abs();
    assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
}

fn session_with(config: GlobeConfig) -> (Rc<ManualClock>, Session) {
    let clock = Rc::new(ManualClock::new(Time(0.0)));
    let session = GlobeSession::new(Rc::clone(&clock), config);
    (clock, session)
}

fn session() -> (Rc<ManualClock>, Session) {
    session_with(GlobeConfig::default())
}

/// A parked aircraft (zero speed) so positions stay put between ticks.
fn parked(id: &str, lat: f64, lon: f64, timestamp: f64) -> AircraftRecord {
    AircraftRecord {
        id: EntityId::new(id),
        callsign: id.to_uppercase(),
        position: GeoPosition::new(lat, lon, 30_000.0),
        heading_deg: 90.0,
        ground_speed_knots: 0.0,
        vertical_rate_fpm: 0.0,
        on_ground: false,
        server_timestamp_s: timestamp,
    }
}

/// Advance the clock and tick every `step_s` for `seconds`, collecting events.
fn run(clock: &ManualClock, session: &mut Session, seconds: f64, step_s: f64) -> Vec<GlobeEvent> {
    let steps = (seconds / step_s).round() as usize;
    let mut events = Vec::new();
    for _ in 0..steps {
        clock.advance(step_s);
        session.tick();
        events.extend(session.drain_events().into_iter().map(|e| e.payload));
    }
    events
}

// Default camera looks down at (39.8, -98.6); this is the far side.
const FAR_LAT: f64 = -39.8;
const FAR_LON: f64 = 81.4;

#[test]
fn selecting_then_deselecting_restores_the_camera() {
    let (clock, mut s) = session();
    s.submit_records(vec![parked("n1", 41.0, -97.0, 100.0)]);
    run(&clock, &mut s, 0.5, 0.05);
    let before = s.camera().pose();

    s.handle(UiEvent::Select(Some(EntityRef::aircraft("n1"))));
    let events = run(&clock, &mut s, 3.0, 0.05);
    assert_eq!(s.camera().mode(), CameraMode::Chase);
    assert!(events.contains(&GlobeEvent::CameraModeChanged(CameraMode::Chase)));
    assert!(events.contains(&GlobeEvent::Selected(Some(EntityRef::aircraft("n1")))));
    assert!(s.camera().pose().position.distance(before.position) > 0.5);

    s.handle(UiEvent::Select(None));
    let events = run(&clock, &mut s, 3.0, 0.05);
    assert!(events.contains(&GlobeEvent::CameraModeChanged(CameraMode::Free)));
    assert_eq!(s.camera().mode(), CameraMode::Free);
    assert_eq!(s.focus().selected, None);

    let after = s.camera().pose();
    assert_close(after.position.distance(before.position), 0.0, 1e-9);
    assert_close(after.target.distance(before.target), 0.0, 1e-9);
}

#[test]
fn empty_snapshot_keeps_existing_entities() {
    let (clock, mut s) = session();
    s.submit_records(vec![
        parked("a", 40.0, -100.0, 100.0),
        parked("b", 42.0, -95.0, 100.0),
        parked("c", 38.0, -90.0, 100.0),
    ]);
    run(&clock, &mut s, 0.1, 0.05);
    let a = Arc::clone(s.store().aircraft(&EntityId::new("a")).expect("stored"));

    let rejected = s.submit_snapshot(SnapshotPayload::default());
    assert_eq!(rejected, 0);
    let events = run(&clock, &mut s, 0.1, 0.05);

    assert_eq!(s.store().aircraft_count(), 3);
    assert!(Arc::ptr_eq(
        &a,
        s.store().aircraft(&EntityId::new("a")).expect("still stored")
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        GlobeEvent::SnapshotApplied(summary) if summary.inserted == 0 && summary.pruned == 0
    )));
}

#[test]
fn repeated_focus_request_starts_no_new_animation() {
    let (clock, mut s) = session();
    let focus = UiEvent::FocusLocation {
        lat: 48.8566,
        lon: 2.3522,
        altitude_ft: None,
    };
    s.handle(focus.clone());
    assert_eq!(s.camera().mode(), CameraMode::DirectTransit);
    run(&clock, &mut s, 0.5, 0.05);
    let progress = s.camera().transition().map(|t| t.progress()).expect("in flight");

    s.handle(UiEvent::FocusLocation {
        lat: 48.85661,
        lon: 2.35219,
        altitude_ft: None,
    });
    assert!(s.drain_events().is_empty());
    let still = s.camera().transition().map(|t| t.progress()).expect("in flight");
    assert_eq!(still, progress);

    run(&clock, &mut s, 3.0, 0.05);
    assert_eq!(s.camera().mode(), CameraMode::Free);
    s.handle(focus);
    assert_eq!(s.camera().mode(), CameraMode::Free);
    assert!(s.camera().transition().is_none());
}

#[test]
fn out_of_view_aircraft_is_deloaded_exactly_once() {
    let mut config = GlobeConfig::default();
    config.lifecycle.deload_grace_s = 5.0;
    let (clock, mut s) = session_with(config);
    s.submit_records(vec![
        parked("far", FAR_LAT, FAR_LON, 100.0),
        parked("near", 39.8, -98.6, 100.0),
    ]);

    let events = run(&clock, &mut s, 4.0, 0.1);
    assert!(s.store().contains(&EntityRef::aircraft("far")), "inside grace period");
    assert!(!events.iter().any(|e| matches!(e, GlobeEvent::Deloaded(_))));

    let events = run(&clock, &mut s, 10.0, 0.1);
    let deloads: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, GlobeEvent::Deloaded(_)))
        .collect();
    assert_eq!(deloads, vec![&GlobeEvent::Deloaded(EntityRef::aircraft("far"))]);
    assert!(!s.store().contains(&EntityRef::aircraft("far")));
    assert!(s.store().contains(&EntityRef::aircraft("near")));
    assert!(s.lifecycle().entry(&EntityRef::aircraft("far")).is_none());
}

#[test]
fn selected_aircraft_is_never_deloaded() {
    let mut config = GlobeConfig::default();
    config.lifecycle.deload_grace_s = 2.0;
    let (clock, mut s) = session_with(config);
    s.submit_records(vec![parked("far", FAR_LAT, FAR_LON, 100.0)]);
    run(&clock, &mut s, 0.1, 0.1);

    s.handle(UiEvent::Select(Some(EntityRef::aircraft("far"))));
    let events = run(&clock, &mut s, 20.0, 0.1);
    assert!(s.store().contains(&EntityRef::aircraft("far")));
    assert!(!events.iter().any(|e| matches!(e, GlobeEvent::Deloaded(_))));

    // Once released and back out of view, it goes after the grace period.
    s.handle(UiEvent::Select(None));
    let events = run(&clock, &mut s, 10.0, 0.1);
    let deloads = events
        .iter()
        .filter(|e| matches!(e, GlobeEvent::Deloaded(_)))
        .count();
    assert_eq!(deloads, 1);
    assert!(!s.store().contains(&EntityRef::aircraft("far")));
}

#[test]
fn hovered_aircraft_is_never_deloaded() {
    let mut config = GlobeConfig::default();
    config.lifecycle.deload_grace_s = 2.0;
    let (clock, mut s) = session_with(config);
    s.submit_records(vec![parked("far", FAR_LAT, FAR_LON, 100.0)]);
    s.handle(UiEvent::Hover(Some(EntityRef::aircraft("far"))));
    run(&clock, &mut s, 10.0, 0.1);
    assert!(s.store().contains(&EntityRef::aircraft("far")));
    assert_eq!(s.camera().mode(), CameraMode::Free);
}

#[test]
fn selection_made_during_a_fetch_survives_the_merge() {
    let (clock, mut s) = session();
    s.submit_records(vec![
        parked("picked", 40.0, -99.0, 1_000.0),
        parked("other", 40.5, -98.0, 1_000.0),
    ]);
    run(&clock, &mut s, 0.1, 0.05);

    let request = s.next_fetch().expect("initial fetch");
    // The user picks an aircraft while the request is outstanding.
    s.handle(UiEvent::Select(Some(EntityRef::aircraft("picked"))));

    let payload = SnapshotPayload::from_json(
        br#"{"time": 2000, "aircraft": [{"id": "fresh", "lat": 41.0, "lon": -97.0}]}"#,
    )
    .expect("payload");
    s.complete_fetch(request.id, Ok(payload));
    run(&clock, &mut s, 0.1, 0.05);

    assert!(s.store().contains(&EntityRef::aircraft("fresh")));
    assert!(s.store().contains(&EntityRef::aircraft("picked")));
    assert!(!s.store().contains(&EntityRef::aircraft("other")), "stale and unfocused");
}

#[test]
fn snapshot_mid_transit_does_not_reset_the_animation() {
    let (clock, mut s) = session();
    s.handle(UiEvent::FocusLocation {
        lat: 35.0,
        lon: -80.0,
        altitude_ft: None,
    });
    run(&clock, &mut s, 0.5, 0.05);
    let progress = s.camera().transition().map(|t| t.progress()).expect("in flight");

    s.submit_records(vec![parked("late", 35.0, -80.0, 100.0)]);
    run(&clock, &mut s, 0.1, 0.05);
    let later = s.camera().transition().map(|t| t.progress()).expect("in flight");
    assert!(later > progress);
    assert_eq!(s.camera().mode(), CameraMode::DirectTransit);
    assert!(s.store().contains(&EntityRef::aircraft("late")));
}

#[test]
fn arrow_release_snaps_to_nearby_aircraft() {
    let (clock, mut s) = session();
    s.submit_records(vec![
        parked("close", 41.0, -97.0, 100.0),
        parked("distant", 10.0, -60.0, 100.0),
    ]);
    run(&clock, &mut s, 0.5, 0.05);

    s.handle(UiEvent::Input(InputEvent::KeyDown(Key::Left)));
    s.handle(UiEvent::Input(InputEvent::KeyUp(Key::Left)));
    assert_eq!(s.focus().selected, Some(EntityRef::aircraft("close")));
    assert_eq!(s.camera().mode(), CameraMode::Chase);
}

#[test]
fn crowded_view_switches_to_simple_shapes() {
    let mut config = GlobeConfig::default();
    config.lod.threshold = 5;
    config.lod.hysteresis_ratio = 0.0;
    let (clock, mut s) = session_with(config);
    let records = (0..8)
        .map(|i| parked(&format!("ac{i}"), 38.0 + i as f64 * 0.5, -98.0, 100.0))
        .collect();
    s.submit_records(records);

    let events = run(&clock, &mut s, 3.0, 0.05);
    assert!(events.contains(&GlobeEvent::DetailLevelChanged(DetailLevel::Simple)));
    assert_eq!(s.detail_level(), DetailLevel::Simple);
    assert_eq!(s.instances().len(), 8);
    assert!(
        s.instances()
            .iter()
            .all(|i| i.shape == InstanceShape::AircraftSimple)
    );
}

#[test]
fn aircraft_behind_the_globe_do_not_count_toward_detail_level() {
    let mut config = GlobeConfig::default();
    config.lod.threshold = 5;
    config.lod.hysteresis_ratio = 0.0;
    let (clock, mut s) = session_with(config);
    let mut records: Vec<_> = (0..8)
        .map(|i| parked(&format!("far{i}"), FAR_LAT + i as f64 * 0.5, FAR_LON, 100.0))
        .collect();
    records.push(parked("near0", 39.8, -98.6, 100.0));
    records.push(parked("near1", 40.5, -97.0, 100.0));
    s.submit_records(records);

    let events = run(&clock, &mut s, 3.0, 0.05);
    assert_eq!(s.store().aircraft_count(), 10);
    assert!(!events.iter().any(|e| matches!(e, GlobeEvent::DetailLevelChanged(_))));
    assert_eq!(s.detail_level(), DetailLevel::Detailed);
}

#[test]
fn clearing_an_empty_selection_keeps_the_free_camera() {
    let (clock, mut s) = session();
    s.handle(UiEvent::Input(InputEvent::KeyDown(Key::ZoomIn)));
    run(&clock, &mut s, 1.0, 0.05);
    s.handle(UiEvent::Input(InputEvent::KeyUp(Key::ZoomIn)));
    run(&clock, &mut s, 2.0, 0.05);
    let before = s.camera().pose();
    assert!(before.distance() < GlobeConfig::default().camera.default_distance);

    s.handle(UiEvent::Select(None));
    assert_eq!(s.camera().mode(), CameraMode::Free);
    assert!(s.camera().transition().is_none());
    assert!(s.drain_events().is_empty());

    run(&clock, &mut s, 1.0, 0.05);
    assert_close(s.camera().pose().distance(), before.distance(), 1e-3);

    // An explicit restore still animates back to the default view.
    s.handle(UiEvent::RestoreCamera);
    assert_eq!(s.camera().mode(), CameraMode::DirectTransit);
}
