//! Particle field construction.
//!
//! One instanced quad per sampled grid cell. Per-instance data is kept as
//! parallel typed arrays (struct-of-arrays) so each one uploads as a single
//! contiguous vertex buffer.

use std::f32::consts::PI;

use crate::noise::grey;

/// Corner positions of the unit quad, xyz per vertex.
pub const QUAD_POSITIONS: [f32; 12] = [
    -0.5, 0.5, 0.0, //
    0.5, 0.5, 0.0, //
    -0.5, -0.5, 0.0, //
    0.5, -0.5, 0.0,
];

/// Texture coordinates of the unit quad, uv per vertex.
pub const QUAD_UVS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];

pub const QUAD_INDICES: [u16; 6] = [0, 2, 1, 2, 3, 1];

/// Logical sampling grid laid over the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Cell count, saturating at `u32::MAX`. Clamp before building a field.
    pub fn total(&self) -> u32 {
        self.width.saturating_mul(self.height)
    }

    /// Shrink the grid, keeping its aspect, until it fits under `max_points`.
    ///
    /// Returns the grid unchanged when it already fits.
    pub fn clamped(self, max_points: u32) -> Self {
        let max_points = max_points.max(1);
        let width = self.width.max(1);
        let height = self.height.max(1);
        let total = width as u64 * height as u64;
        if total <= max_points as u64 {
            return Self { width, height };
        }

        let factor = (max_points as f64 / total as f64).sqrt();
        let mut w = ((width as f64 * factor).floor() as u32).max(1);
        let mut h = ((height as f64 * factor).floor() as u32).max(1);
        // Float rounding or a degenerate aspect can still overshoot; trim the
        // longer side to whatever the shorter one leaves room for.
        if (w as u64) * (h as u64) > max_points as u64 {
            if w >= h {
                w = (max_points / h).max(1);
            } else {
                h = (max_points / w).max(1);
            }
        }
        Self {
            width: w.max(1),
            height: h.max(1),
        }
    }
}

/// Read-only view of one instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub grid_x: u32,
    pub grid_y: u32,
    /// Flat cell index, `grid_y * width + grid_x`.
    pub index: u32,
    pub angle: f32,
}

/// Instanced geometry for one sampled source.
#[derive(Clone, Debug)]
pub struct ParticleField {
    grid: GridSize,
    stride: u32,
    offsets: Vec<f32>,
    indices: Vec<f32>,
    angles: Vec<f32>,
    visible: Option<u32>,
}

impl ParticleField {
    /// Lay out instances over `grid`.
    ///
    /// Motion sources keep every other cell (stride 2). Angles come from a
    /// seeded generator, so the same inputs always produce the same field.
    pub fn build(grid: GridSize, is_motion: bool, seed: u64) -> Self {
        let stride = if is_motion { 2 } else { 1 };
        let total = grid.total();
        let capacity = total.div_ceil(stride) as usize;

        let mut offsets = Vec::with_capacity(capacity * 3);
        let mut indices = Vec::with_capacity(capacity);
        let mut angles = Vec::with_capacity(capacity);
        let mut rng = fastrand::Rng::with_seed(seed);

        for i in (0..total).step_by(stride as usize) {
            offsets.push((i % grid.width) as f32);
            offsets.push((i / grid.width) as f32);
            offsets.push(0.0);
            indices.push(i as f32);

            let angle = rng.f32() * PI;
            angles.push(if angle >= PI { 0.0 } else { angle });
        }

        Self {
            grid,
            stride,
            offsets,
            indices,
            angles,
            visible: None,
        }
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// xyz cell offsets, three floats per instance.
    pub fn offsets(&self) -> &[f32] {
        &self.offsets
    }

    pub fn indices(&self) -> &[f32] {
        &self.indices
    }

    pub fn angles(&self) -> &[f32] {
        &self.angles
    }

    pub fn particle(&self, slot: usize) -> Option<Particle> {
        let index = *self.indices.get(slot)? as u32;
        Some(Particle {
            grid_x: self.offsets[slot * 3] as u32,
            grid_y: self.offsets[slot * 3 + 1] as u32,
            index,
            angle: self.angles[slot],
        })
    }

    pub fn particles(&self) -> impl Iterator<Item = Particle> + '_ {
        (0..self.len()).filter_map(|slot| self.particle(slot))
    }

    /// Cells above the luminance threshold; only known for still sources.
    pub fn visible_count(&self) -> Option<u32> {
        self.visible
    }

    pub fn set_visible_count(&mut self, count: u32) {
        self.visible = Some(count);
    }
}

/// Count cells of a grid-resolution RGBA buffer whose luminance exceeds
/// `threshold` (0..=255 scale).
///
/// Short buffers only count the cells they contain.
pub fn visible_point_count(rgba: &[u8], grid: GridSize, threshold: f32) -> u32 {
    rgba.chunks_exact(4)
        .take(grid.total() as usize)
        .filter(|px| grey([px[0] as f32, px[1] as f32, px[2] as f32]) > threshold)
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_indices_cover_two_triangles() {
        assert_eq!(QUAD_INDICES.len(), 6);
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < QUAD_POSITIONS.len() / 3));
    }

    #[test]
    fn clamp_keeps_small_grids() {
        assert_eq!(GridSize::new(250, 145).clamped(1 << 16), GridSize::new(250, 145));
    }

    #[test]
    fn clamp_preserves_aspect_roughly() {
        let g = GridSize::new(4000, 2000).clamped(20_000);
        assert!(g.total() <= 20_000);
        let aspect = g.width as f32 / g.height as f32;
        assert!((aspect - 2.0).abs() < 0.05, "aspect {aspect}");
    }

    #[test]
    fn clamp_handles_extreme_strips() {
        let g = GridSize::new(1_000_000, 1).clamped(100);
        assert!(g.total() <= 100);
        assert!(g.width >= 1 && g.height >= 1);
    }

    #[test]
    fn clamp_trims_single_cell_strips_in_one_step() {
        assert_eq!(
            GridSize::new(u32::MAX, 1).clamped(1 << 20),
            GridSize::new(1 << 20, 1)
        );
        assert_eq!(
            GridSize::new(1, u32::MAX).clamped(1 << 20),
            GridSize::new(1, 1 << 20)
        );
    }

    #[test]
    fn total_saturates() {
        assert_eq!(GridSize::new(u32::MAX, 2).total(), u32::MAX);
        assert_eq!(GridSize::new(70_000, 70_000).total(), u32::MAX);
        assert_eq!(GridSize::new(250, 145).total(), 36_250);
    }

    #[test]
    fn visible_count_thresholds_luminance() {
        let grid = GridSize::new(2, 2);
        let rgba = [
            255, 255, 255, 255, //
            0, 0, 0, 255, //
            10, 10, 10, 255, //
            200, 0, 0, 255,
        ];
        // grey(200,0,0) = 42 > 30; grey(10,10,10) = 9.9
        assert_eq!(visible_point_count(&rgba, grid, 30.0), 2);
    }

    #[test]
    fn angles_stay_in_half_turn() {
        let field = ParticleField::build(GridSize::new(64, 64), false, 7);
        assert!(field.angles().iter().all(|a| (0.0..PI).contains(a)));
    }
}
