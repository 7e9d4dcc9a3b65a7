use glam::Vec2;
use pixel_particles::camera::{Camera, Viewport};
use pixel_particles::config::CameraConfig;
use pixel_particles::field::GridSize;

fn camera(res: (f32, f32)) -> Camera {
    Camera::new(
        CameraConfig::default(),
        GridSize::new(250, 145),
        Viewport::new(res.0, res.1),
    )
}

fn approx_eq2(a: Vec2, b: Vec2, eps: f32) -> bool {
    (a.x - b.x).abs() < eps && (a.y - b.y).abs() < eps
}

#[test]
fn picking_is_aspect_invariant() {
    // Two different aspect ratios
    let wide = camera((1920.0, 1080.0));
    let tall = camera((1080.0, 1920.0));

    let samples = [
        Vec2::new(0.5, 0.5),
        Vec2::new(0.6, 0.5),
        Vec2::new(0.5, 0.6),
        Vec2::new(0.2, 0.8),
        Vec2::new(0.8, 0.2),
    ];

    for cam in [&wide, &tall] {
        for &uv in &samples {
            let ndc = cam.plate_to_ndc(uv);
            let back = cam.raycast(ndc).unwrap();
            assert!(approx_eq2(back, uv, 1e-3), "uv={uv:?} back={back:?}");
        }
    }
}

#[test]
fn wide_containers_get_the_larger_fudge() {
    let narrow = camera((1000.0, 500.0));
    let wide = camera((3000.0, 1000.0));
    assert!((wide.field_scale() - narrow.field_scale() - 0.3).abs() < 1e-5);
}

#[test]
fn empty_resize_keeps_previous_framing() {
    let mut cam = camera((1280.0, 720.0));
    let (aspect, scale) = (cam.aspect(), cam.field_scale());

    assert!(!cam.resize(Viewport::new(1280.0, 0.0)));
    assert!(!cam.resize(Viewport::new(0.0, 720.0)));
    assert_eq!(cam.aspect(), aspect);
    assert_eq!(cam.field_scale(), scale);
    assert!(cam.aspect().is_finite());

    assert!(cam.resize(Viewport::new(720.0, 720.0)));
    assert_eq!(cam.aspect(), 1.0);
}

#[test]
fn mounting_into_empty_container_stays_finite() {
    let cam = camera((0.0, 0.0));
    assert_eq!(cam.aspect(), 1.0);
    assert!(cam.projection().is_finite());
    assert!(cam.field_scale().is_finite());
}

#[test]
fn rays_outside_the_plate_miss() {
    let cam = camera((800.0, 600.0));
    assert!(cam.raycast(Vec2::new(0.0, 0.99)).is_none());
    assert!(cam.raycast(Vec2::new(0.0, 0.0)).is_some());
}
