//! Perspective camera, field scaling and pointer picking.

use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

use crate::config::CameraConfig;
use crate::field::GridSize;

/// Container size in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero (or not a usable number).
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn aspect(&self) -> Option<f32> {
        (!self.is_empty()).then(|| self.width / self.height)
    }
}

/// Aspect used while the container has no area.
const FALLBACK_ASPECT: f32 = 1.0;

#[derive(Clone, Debug)]
pub struct Camera {
    config: CameraConfig,
    grid: GridSize,
    viewport: Viewport,
    aspect: f32,
    field_scale: f32,
    tilt: Vec2,
}

impl Camera {
    /// A camera framing `grid`.
    ///
    /// An empty initial viewport is kept as is, so [`Camera::viewport`]
    /// reports it empty; projection uses a square aspect until the first
    /// usable resize.
    pub fn new(config: CameraConfig, grid: GridSize, viewport: Viewport) -> Self {
        let mut camera = Self {
            config,
            grid,
            viewport,
            aspect: FALLBACK_ASPECT,
            field_scale: 1.0,
            tilt: Vec2::ZERO,
        };
        camera.field_scale = camera.scale_for(FALLBACK_ASPECT);
        camera.resize(viewport);
        camera
    }

    /// Refit to a new container size.
    ///
    /// Returns `false`, leaving aspect and scale untouched, when the
    /// container has no area.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        let Some(aspect) = viewport.aspect() else {
            log::debug!("skipping resize to empty viewport {viewport:?}");
            return false;
        };
        self.viewport = viewport;
        self.aspect = aspect;
        self.field_scale = self.scale_for(aspect);
        true
    }

    /// Scale at which the grid's height fills the visible frustum height,
    /// plus the aspect-dependent fudge term.
    fn scale_for(&self, aspect: f32) -> f32 {
        let fov = self.config.fov_degrees.to_radians();
        let visible_height = 2.0 * (fov / 2.0).tan() * self.config.distance;
        visible_height / self.grid.height as f32 + self.config.fudge.for_aspect(aspect)
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn field_scale(&self) -> f32 {
        self.field_scale
    }

    pub fn tilt(&self) -> Vec2 {
        self.tilt
    }

    /// Rotate the field by the pointer position (x about y, y about x).
    pub fn set_tilt(&mut self, ndc: Vec2) {
        let d = self.config.tilt_divisor;
        self.tilt = Vec2::new(-ndc.y / d, ndc.x / d);
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.config.fov_degrees.to_radians(),
            self.aspect,
            self.config.near,
            self.config.far,
        )
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.config.distance))
    }

    /// Particle mesh transform: tilt, then non-uniform field scale.
    pub fn model(&self) -> Mat4 {
        Mat4::from_rotation_x(self.tilt.x)
            * Mat4::from_rotation_y(self.tilt.y)
            * Mat4::from_scale(Vec3::new(self.field_scale, self.field_scale, 1.0))
    }

    pub fn model_view(&self) -> Mat4 {
        self.view() * self.model()
    }

    /// Client coordinates to normalised device coordinates.
    ///
    /// `origin` is the top-left corner of the surface in client space.
    pub fn pointer_ndc(&self, client: Vec2, origin: Vec2) -> Vec2 {
        let local = client - origin;
        Vec2::new(
            local.x / self.viewport.width * 2.0 - 1.0,
            -(local.y / self.viewport.height) * 2.0 + 1.0,
        )
    }

    /// Cast from the eye through `ndc` onto the hover plate.
    ///
    /// The plate spans the grid at z = 0, scaled like the field but never
    /// tilted. Returns its UV (origin bottom-left) on a hit.
    pub fn raycast(&self, ndc: Vec2) -> Option<Vec2> {
        let inverse = (self.projection() * self.view()).inverse();
        let unproject = |z: f32| {
            let p = inverse * ndc.extend(z).extend(1.0);
            p.xyz() / p.w
        };
        let near = unproject(-1.0);
        let far = unproject(1.0);
        let dir = far - near;
        if dir.z.abs() < f32::EPSILON {
            return None;
        }
        let t = -near.z / dir.z;
        if t < 0.0 {
            return None;
        }
        let hit = near + dir * t;

        let plate = Vec2::new(
            self.grid.width as f32 * self.field_scale,
            self.grid.height as f32 * self.field_scale,
        );
        let uv = Vec2::new(hit.x / plate.x + 0.5, hit.y / plate.y + 0.5);
        ((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y)).then_some(uv)
    }

    /// Project a plate UV back to NDC; the inverse of [`Camera::raycast`].
    pub fn plate_to_ndc(&self, uv: Vec2) -> Vec2 {
        let world = Vec3::new(
            (uv.x - 0.5) * self.grid.width as f32 * self.field_scale,
            (uv.y - 0.5) * self.grid.height as f32 * self.field_scale,
            0.0,
        );
        let clip = self.projection() * self.view() * world.extend(1.0);
        clip.xy() / clip.w
    }
}
