//! Pointer trail: an aging FIFO of samples rasterised into a heat texture.
//!
//! Pointer events only append to the list. The frame tick ages, prunes and
//! rasterises, so input rate never drives render cost.

use std::collections::VecDeque;
use std::f64::consts::FRAC_PI_2;

use glam::Vec2;

use crate::config::TrailConfig;

/// Samples kept between two frames, whatever the pointer rate.
pub const MAX_TRAIL_POINTS: usize = 1024;

/// Gradient stops of one trail splat.
const INNER_STOP: f32 = 0.25;
const STOP_ALPHA: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailPoint {
    pub u: f32,
    pub v: f32,
    /// Frames since the sample was taken.
    pub age: u32,
    pub force: f32,
}

/// Robert Penner's ease-out-sine: `c * sin(t / d * π/2) + b`.
pub fn ease_out_sine(t: f64, b: f64, c: f64, d: f64) -> f64 {
    c * (t / d * FRAC_PI_2).sin() + b
}

/// Brightness multiplier of a sample at `age`.
///
/// Rises over the first `peak` fraction of `max_age`, reaching exactly 1.0,
/// then falls to exactly 0.0 at `max_age`.
pub fn envelope(age: u32, max_age: u32, peak: f32) -> f32 {
    let rise = (max_age as f32 * peak) as f64;
    let fall = max_age as f64 - rise;
    let age = age as f64;
    let value = if age < rise {
        ease_out_sine(age / rise, 0.0, 1.0, 1.0)
    } else {
        ease_out_sine(1.0 - (age - rise) / fall, 0.0, 1.0, 1.0)
    };
    value.max(0.0) as f32
}

/// Force of a new sample given the previous one.
///
/// Large jumps between samples produce low force so a teleporting pointer
/// does not leave a spike; the first sample has no predecessor and no force.
pub fn force_between(previous: Option<Vec2>, uv: Vec2, scale: f32) -> f32 {
    match previous {
        Some(prev) => (prev.distance_squared(uv) * scale).min(1.0),
        None => 0.0,
    }
}

/// Single-channel heat bitmap, rows stored bottom-up to match texture space.
#[derive(Clone, Debug)]
pub struct HeatMap {
    size: u32,
    data: Vec<f32>,
}

impl HeatMap {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            data: vec![0.0; (size * size) as usize],
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.size + x) as usize]
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }

    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&h| h == 0.0)
    }

    /// Source-over a radial gradient centred at `center` (texel units).
    ///
    /// Opaque-ish white inside `INNER_STOP * radius`, linear fall-off to
    /// transparent at `radius`.
    pub fn splat(&mut self, center: Vec2, radius: f32) {
        if radius <= 0.0 {
            return;
        }
        let inner = radius * INNER_STOP;
        let max = self.size as f32 - 1.0;
        let x0 = (center.x - radius).floor().clamp(0.0, max) as u32;
        let x1 = (center.x + radius).ceil().clamp(0.0, max) as u32;
        let y0 = (center.y - radius).floor().clamp(0.0, max) as u32;
        let y1 = (center.y + radius).ceil().clamp(0.0, max) as u32;

        for y in y0..=y1 {
            for x in x0..=x1 {
                let px = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let d = px.distance(center);
                if d >= radius {
                    continue;
                }
                let t = ((d - inner) / (radius - inner)).clamp(0.0, 1.0);
                let alpha = STOP_ALPHA * (1.0 - t);
                let cell = &mut self.data[(y * self.size + x) as usize];
                *cell = alpha + *cell * (1.0 - alpha);
            }
        }
    }

    /// Quantise into `out` as R8 texels.
    pub fn write_r8(&self, out: &mut Vec<u8>) {
        out.clear();
        out.extend(
            self.data
                .iter()
                .map(|h| (h.clamp(0.0, 1.0) * 255.0).round() as u8),
        );
    }
}

/// Owns the trail list and its heat bitmap.
#[derive(Clone, Debug)]
pub struct TrailSimulator {
    config: TrailConfig,
    points: VecDeque<TrailPoint>,
    heat: HeatMap,
    texels: Vec<u8>,
}

impl TrailSimulator {
    pub fn new(config: TrailConfig) -> Self {
        let heat = HeatMap::new(config.size);
        Self {
            texels: Vec::with_capacity((config.size * config.size) as usize),
            config,
            points: VecDeque::new(),
            heat,
        }
    }

    pub fn config(&self) -> &TrailConfig {
        &self.config
    }

    /// Append a sample at texture coordinate `uv`; returns its force.
    pub fn push(&mut self, uv: Vec2) -> f32 {
        let previous = self.points.back().map(|p| Vec2::new(p.u, p.v));
        let force = force_between(previous, uv, self.config.force_scale);
        if self.points.len() == MAX_TRAIL_POINTS {
            self.points.pop_front();
        }
        self.points.push_back(TrailPoint {
            u: uv.x,
            v: uv.y,
            age: 0,
            force,
        });
        force
    }

    /// Age every sample by one frame and drop those past `max_age`.
    pub fn step(&mut self) {
        let max_age = self.config.max_age;
        for p in self.points.iter_mut() {
            p.age += 1;
        }
        self.points.retain(|p| p.age <= max_age);
    }

    /// Redraw the heat bitmap from the surviving samples.
    ///
    /// The bitmap is cleared even when the list is empty, so an emptied trail
    /// never leaves stale heat behind.
    pub fn rasterize(&mut self) -> &HeatMap {
        self.heat.clear();
        let size = self.config.size as f32;
        for p in &self.points {
            let intensity = envelope(p.age, self.config.max_age, self.config.peak) * p.force;
            let radius = size * self.config.radius * intensity;
            self.heat.splat(Vec2::new(p.u * size, p.v * size), radius);
        }
        &self.heat
    }

    /// One frame: age, prune, rasterise. Returns R8 texels ready to upload.
    pub fn advance(&mut self) -> &[u8] {
        self.step();
        self.rasterize();
        self.heat.write_r8(&mut self.texels);
        &self.texels
    }

    pub fn heat(&self) -> &HeatMap {
        &self.heat
    }

    pub fn points(&self) -> impl Iterator<Item = &TrailPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}
