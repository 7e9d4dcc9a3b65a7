//! Construction-time options.
//!
//! The engine is configured once per mount. Every value is clamped by
//! [`EngineConfig::validated`] before anything is allocated, so an oversized
//! grid is caught here and never at draw time.

use serde::Deserialize;

use crate::error::EngineResult;

/// Hard ceiling on instances, whatever the host asks for.
pub const MAX_POINTS_CEILING: u32 = 1 << 20;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub trail: TrailConfig,
    pub particles: ParticleConfig,
    pub camera: CameraConfig,
    pub resize_debounce_ms: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
    /// Upper bound on `width * height`.
    pub max_points: u32,
    /// Luminance cut-off on the 0..=255 scale.
    pub threshold: f32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    /// Side of the square heat bitmap, in texels.
    pub size: u32,
    /// Frames a pointer sample survives.
    pub max_age: u32,
    /// Gradient radius as a fraction of `size`.
    pub radius: f32,
    /// Fraction of `max_age` spent ramping up.
    pub peak: f32,
    pub force_scale: f32,
}

/// Fragment mask style, fixed for the lifetime of a mount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeMode {
    #[default]
    Circle,
    Square,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub random: f32,
    pub depth: f32,
    pub size: f32,
    pub shape: ShapeMode,
    pub alpha_circle: f32,
    pub alpha_square: f32,
    /// Seed for the per-particle push angles.
    pub seed: u64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub distance: f32,
    pub tilt_divisor: f32,
    pub fudge: AspectFudge,
}

/// Additive correction to the field scale, picked by viewport aspect.
///
/// Below `threshold` the `narrow` term applies, otherwise `wide`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AspectFudge {
    pub threshold: f32,
    pub narrow: f32,
    pub wide: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            trail: TrailConfig::default(),
            particles: ParticleConfig::default(),
            camera: CameraConfig::default(),
            resize_debounce_ms: 50.0,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 250,
            height: 145,
            max_points: 1 << 16,
            threshold: 30.0,
        }
    }
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            size: 80,
            max_age: 70,
            radius: 0.08,
            peak: 0.3,
            force_scale: 10_000.0,
        }
    }
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            random: 3.0,
            depth: 30.0,
            size: 1.5,
            shape: ShapeMode::Circle,
            alpha_circle: 0.0,
            alpha_square: 0.0,
            seed: 0x5eed_0f_da7,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 50.0,
            near: 0.1,
            far: 10_000.0,
            distance: 180.0,
            tilt_divisor: 8.0,
            fudge: AspectFudge::default(),
        }
    }
}

impl Default for AspectFudge {
    fn default() -> Self {
        Self {
            threshold: 2.8,
            narrow: -0.2,
            wide: 0.1,
        }
    }
}

impl AspectFudge {
    pub fn for_aspect(&self, aspect: f32) -> f32 {
        if aspect < self.threshold {
            self.narrow
        } else {
            self.wide
        }
    }
}

impl EngineConfig {
    /// Parse host options; missing keys fall back to defaults.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default().validated());
        }
        let cfg: Self = serde_json::from_str(json)?;
        Ok(cfg.validated())
    }

    /// Clamp every value into a range the engine can allocate and draw.
    pub fn validated(mut self) -> Self {
        self.grid.max_points = self.grid.max_points.clamp(1, MAX_POINTS_CEILING);
        self.grid.width = self.grid.width.max(1);
        self.grid.height = self.grid.height.max(1);
        self.grid.threshold = self.grid.threshold.clamp(0.0, 255.0);

        self.trail.size = self.trail.size.clamp(1, 1024);
        self.trail.max_age = self.trail.max_age.max(1);
        self.trail.peak = self.trail.peak.clamp(0.01, 0.99);
        self.trail.radius = self.trail.radius.max(0.0);
        self.trail.force_scale = self.trail.force_scale.max(0.0);

        self.particles.alpha_circle = self.particles.alpha_circle.clamp(0.0, 1.0);
        self.particles.alpha_square = self.particles.alpha_square.clamp(0.0, 1.0);

        if !(self.camera.fov_degrees > 1.0 && self.camera.fov_degrees < 179.0) {
            self.camera.fov_degrees = CameraConfig::default().fov_degrees;
        }
        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            self.camera.near = CameraConfig::default().near;
            self.camera.far = CameraConfig::default().far;
        }
        if self.camera.tilt_divisor == 0.0 {
            self.camera.tilt_divisor = CameraConfig::default().tilt_divisor;
        }
        self.resize_debounce_ms = self.resize_debounce_ms.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_look() {
        let cfg = EngineConfig::default();
        assert_eq!((cfg.grid.width, cfg.grid.height), (250, 145));
        assert_eq!(cfg.trail.max_age, 70);
        assert_eq!(cfg.trail.size, 80);
        assert_eq!(cfg.camera.fudge.for_aspect(1.5), -0.2);
        assert_eq!(cfg.camera.fudge.for_aspect(3.0), 0.1);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json(r#"{"trail":{"max_age":10},"particles":{"shape":"square"}}"#)
            .unwrap();
        assert_eq!(cfg.trail.max_age, 10);
        assert_eq!(cfg.trail.size, 80);
        assert_eq!(cfg.particles.shape, ShapeMode::Square);
        assert_eq!(cfg.grid, GridConfig::default());
    }

    #[test]
    fn empty_options_are_defaults() {
        assert_eq!(EngineConfig::from_json("  ").unwrap(), EngineConfig::default());
    }

    #[test]
    fn validation_repairs_degenerate_values() {
        let mut cfg = EngineConfig::default();
        cfg.trail.max_age = 0;
        cfg.grid.max_points = u32::MAX;
        cfg.camera.far = 0.0;
        let cfg = cfg.validated();
        assert_eq!(cfg.trail.max_age, 1);
        assert_eq!(cfg.grid.max_points, MAX_POINTS_CEILING);
        assert!(cfg.camera.far > cfg.camera.near);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(EngineConfig::from_json("{grid:").is_err());
    }
}
