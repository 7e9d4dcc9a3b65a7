mod common;

use common::{new_log, still, video, Call, RecordingBackend, RecordingHost};
use glam::Vec2;
use pixel_particles::camera::Viewport;
use pixel_particles::config::EngineConfig;
use pixel_particles::engine::ParticleEngine;
use pixel_particles::error::EngineError;
use pixel_particles::lifecycle::{teardown, Phase};

fn engine() -> ParticleEngine<RecordingBackend> {
    ParticleEngine::new(EngineConfig::default(), Viewport::new(800.0, 600.0))
}

#[test]
fn still_source_becomes_ready_with_full_grid() {
    let log = new_log();
    let mut engine = engine();
    assert_eq!(engine.phase(), Phase::Uninitialized);
    let ticket = engine.begin_load();
    assert_eq!(engine.phase(), Phase::Loading);

    assert_eq!(engine.complete_load(&ticket, Ok(still(&log, None))), Phase::Ready);
    assert_eq!(*log.borrow(), vec![Call::UploadField(250 * 145)]);
    assert_eq!(engine.field().unwrap().len(), 36_250);
    let source = engine.source().unwrap();
    assert_eq!((source.width, source.height, source.is_motion), (500, 290, false));
}

#[test]
fn frame_steps_trail_before_drawing() {
    let log = new_log();
    let mut engine = engine();
    let ticket = engine.begin_load();
    engine.complete_load(&ticket, Ok(still(&log, None)));
    log.borrow_mut().clear();

    engine.frame(1000.0);
    engine.frame(1016.0);
    assert_eq!(
        *log.borrow(),
        vec![
            Call::UploadTrail { size: 80, lit: 0 },
            Call::Draw { time: 0.0 },
            Call::UploadTrail { size: 80, lit: 0 },
            Call::Draw { time: 0.016 },
        ]
    );
    assert_eq!(engine.frames(), 2);
}

#[test]
fn motion_source_is_refreshed_every_frame() {
    let log = new_log();
    let mut engine = engine();
    let ticket = engine.begin_load();
    engine.complete_load(&ticket, Ok(video(&log)));
    assert_eq!(log.borrow()[0], Call::UploadField(36_250 / 2));
    log.borrow_mut().clear();

    engine.frame(0.0);
    assert_eq!(
        *log.borrow(),
        vec![
            Call::UploadTrail { size: 80, lit: 0 },
            Call::RefreshSource,
            Call::Draw { time: 0.0 },
        ]
    );
}

#[test]
fn failed_load_renders_empty_scene() {
    let log = new_log();
    let mut engine = engine();
    let ticket = engine.begin_load();
    let phase = engine.complete_load(&ticket, Err(EngineError::load("404")));
    assert_eq!(phase, Phase::ReadyEmpty);
    assert!(phase.is_ready());
    assert!(engine.source().is_none());

    assert_eq!(engine.frame(0.0), None);
    assert_eq!(engine.pointer_move(Vec2::new(400.0, 300.0), Vec2::ZERO), None);
    assert!(log.borrow().is_empty());
    assert!(engine.field().is_none());
}

#[test]
fn failed_field_upload_releases_backend() {
    let log = new_log();
    let mut engine = engine();
    let ticket = engine.begin_load();
    let mut loaded = still(&log, None);
    loaded.backend.fail_upload = true;

    assert_eq!(engine.complete_load(&ticket, Ok(loaded)), Phase::ReadyEmpty);
    assert_eq!(*log.borrow(), vec![Call::Release]);
}

#[test]
fn teardown_runs_in_order() {
    let log = new_log();
    let mut engine = engine();
    let ticket = engine.begin_load();
    engine.complete_load(&ticket, Ok(still(&log, None)));
    log.borrow_mut().clear();

    let mut host = RecordingHost { log: log.clone() };
    teardown(&mut host, &mut engine);
    assert_eq!(
        *log.borrow(),
        vec![
            Call::CancelFrame,
            Call::RemoveListeners,
            Call::DetachSurface,
            Call::Release,
        ]
    );
    assert_eq!(engine.phase(), Phase::Disposed);

    teardown(&mut host, &mut engine);
    assert_eq!(log.borrow().len(), 4);
    drop(engine);
    assert_eq!(log.borrow().len(), 4);
}

#[test]
fn load_resolving_after_unmount_is_dropped() {
    let log = new_log();
    let mut engine = engine();
    let ticket = engine.begin_load();

    let mut host = RecordingHost { log: log.clone() };
    teardown(&mut host, &mut engine);
    log.borrow_mut().clear();

    let phase = engine.complete_load(&ticket, Ok(still(&log, None)));
    assert_eq!(phase, Phase::Disposed);
    assert!(engine.field().is_none());
    assert_eq!(engine.frames(), 0);
    // The orphaned backend is freed; nothing was uploaded.
    assert_eq!(*log.borrow(), vec![Call::Release]);

    engine.frame(16.0);
    assert_eq!(*log.borrow(), vec![Call::Release]);
}

#[test]
fn late_error_after_unmount_is_silent() {
    let mut engine = engine();
    let ticket = engine.begin_load();
    engine.unmount();
    assert!(!engine.is_mounted());
    assert_eq!(
        engine.complete_load(&ticket, Err(EngineError::load("timeout"))),
        Phase::Loading
    );
}

#[test]
fn pointer_builds_trail_only_when_ready() {
    let log = new_log();
    let mut engine = engine();
    let ticket = engine.begin_load();
    assert_eq!(engine.pointer_move(Vec2::new(400.0, 300.0), Vec2::ZERO), None);
    engine.complete_load(&ticket, Ok(still(&log, None)));

    assert_eq!(engine.pointer_move(Vec2::new(400.0, 300.0), Vec2::ZERO), Some(0.0));
    let force = engine
        .pointer_move(Vec2::new(440.0, 300.0), Vec2::ZERO)
        .unwrap();
    assert_eq!(force, 1.0);
    assert_eq!(engine.trail().len(), 2);
    assert_ne!(engine.camera().tilt(), Vec2::ZERO);

    log.borrow_mut().clear();
    for i in 0..21 {
        engine.frame(i as f64 * 16.0);
    }
    let lit = log.borrow().iter().rev().find_map(|c| match c {
        Call::UploadTrail { lit, .. } => Some(*lit),
        _ => None,
    });
    assert!(lit.unwrap() > 0);
}

#[test]
fn pointer_off_the_plate_only_tilts() {
    let log = new_log();
    let mut engine = engine();
    let ticket = engine.begin_load();
    engine.complete_load(&ticket, Ok(still(&log, None)));

    assert_eq!(engine.pointer_move(Vec2::new(0.0, 0.0), Vec2::ZERO), None);
    assert!(engine.trail().is_empty());
    assert_ne!(engine.camera().tilt(), Vec2::ZERO);
}

#[test]
fn resize_is_debounced() {
    let mut engine = engine();
    let before = engine.camera().aspect();
    engine.request_resize(0.0, Viewport::new(1000.0, 500.0));
    engine.request_resize(20.0, Viewport::new(1200.0, 400.0));

    assert_eq!(engine.frame(40.0), None);
    assert_eq!(engine.camera().aspect(), before);
    assert_eq!(engine.frame(70.0), Some(Viewport::new(1200.0, 400.0)));
    assert_eq!(engine.camera().aspect(), 3.0);
}

#[test]
fn zero_height_resize_keeps_last_aspect() {
    let mut engine = engine();
    let aspect = engine.camera().aspect();
    let scale = engine.camera().field_scale();

    engine.request_resize(0.0, Viewport::new(800.0, 0.0));
    assert_eq!(engine.frame(100.0), None);
    assert!(!engine.resize_now(Viewport::new(0.0, 0.0)));
    assert_eq!(engine.camera().aspect(), aspect);
    assert_eq!(engine.camera().field_scale(), scale);
}

#[test]
fn oversized_grid_is_clamped_before_allocation() {
    let log = new_log();
    let mut config = EngineConfig::default();
    config.grid.width = 4000;
    config.grid.height = 3000;
    config.grid.max_points = 10_000;
    let mut engine = ParticleEngine::new(config, Viewport::new(800.0, 600.0));
    assert!(engine.grid().total() <= 10_000);

    let ticket = engine.begin_load();
    engine.complete_load(&ticket, Ok(still(&log, None)));
    match log.borrow()[0] {
        Call::UploadField(n) => assert!(n <= 10_000),
        ref other => panic!("unexpected {other:?}"),
    };
}

#[test]
fn still_pixels_yield_visible_count() {
    let log = new_log();
    let mut config = EngineConfig::default();
    config.grid.width = 10;
    config.grid.height = 10;
    let mut engine = ParticleEngine::new(config, Viewport::new(800.0, 600.0));
    let ticket = engine.begin_load();

    let mut rgba = vec![255u8; 10 * 10 * 4];
    for px in rgba.chunks_exact_mut(4).take(40) {
        px[..3].fill(0);
    }
    engine.complete_load(&ticket, Ok(still(&log, Some(rgba))));
    assert_eq!(engine.field().unwrap().visible_count(), Some(60));
}

#[test]
fn zero_size_mount_ignores_pointer_until_first_resize() {
    let log = new_log();
    let mut engine = ParticleEngine::new(EngineConfig::default(), Viewport::new(0.0, 0.0));
    let ticket = engine.begin_load();
    engine.complete_load(&ticket, Ok(still(&log, None)));
    assert!(engine.phase().is_ready());
    assert!(engine.camera().viewport().is_empty());

    assert_eq!(engine.pointer_move(Vec2::new(0.5, 0.5), Vec2::ZERO), None);
    assert!(engine.trail().is_empty());
    assert_eq!(engine.camera().tilt(), Vec2::ZERO);

    engine.request_resize(0.0, Viewport::new(800.0, 600.0));
    assert_eq!(engine.frame(60.0), Some(Viewport::new(800.0, 600.0)));
    assert_eq!(engine.pointer_move(Vec2::new(400.0, 300.0), Vec2::ZERO), Some(0.0));
    assert_eq!(engine.trail().len(), 1);
}
