//! CPU rendition of the particle program's math.
//!
//! These functions follow the GLSL in [`crate::shader`] operation for
//! operation. They take no random source and no clock, so the same
//! `(index, time)` input always yields bit-identical output; golden-frame
//! checks and diagnostics are built on them.

use glam::{Vec2, Vec3};

use crate::config::ShapeMode;
use crate::shader::{Uniforms, DIM_ALPHA, MASK_BORDER, PUSH_STRENGTH};

/// Rec. 709-ish luminance weights used for the luminance-to-mass mapping.
pub fn grey(rgb: [f32; 3]) -> f32 {
    rgb[0] * 0.21 + rgb[1] * 0.71 + rgb[2] * 0.07
}

/// GLSL `fract`: `x - floor(x)`, always in `[0, 1)`.
fn fract(x: f32) -> f32 {
    x - x.floor()
}

fn fract3(v: Vec3) -> Vec3 {
    v - v.floor()
}

fn mod289(v: Vec3) -> Vec3 {
    v - (v * (1.0 / 289.0)).floor() * 289.0
}

fn mod289_2(v: Vec2) -> Vec2 {
    v - (v * (1.0 / 289.0)).floor() * 289.0
}

fn permute(v: Vec3) -> Vec3 {
    mod289(((v * 34.0) + 1.0) * v)
}

/// Hash of a scalar into `[0, 1)`.
pub fn random(n: f32) -> f32 {
    fract(n.sin() * 43758.547)
}

/// 2D simplex noise, roughly in `[-1, 1]`.
pub fn snoise(v: Vec2) -> f32 {
    const C: [f32; 4] = [
        0.211_324_87,
        0.366_025_4,
        -0.577_350_26,
        0.024_390_243,
    ];

    let mut i = (v + v.dot(Vec2::splat(C[1]))).floor();
    let x0 = v - i + i.dot(Vec2::splat(C[0]));

    let i1 = if x0.x > x0.y {
        Vec2::new(1.0, 0.0)
    } else {
        Vec2::new(0.0, 1.0)
    };
    let x12_xy = x0 + Vec2::splat(C[0]) - i1;
    let x12_zw = x0 + Vec2::splat(C[2]);

    i = mod289_2(i);
    let p = permute(
        permute(Vec3::splat(i.y) + Vec3::new(0.0, i1.y, 1.0))
            + Vec3::splat(i.x)
            + Vec3::new(0.0, i1.x, 1.0),
    );

    let mut m = (Vec3::splat(0.5)
        - Vec3::new(x0.dot(x0), x12_xy.dot(x12_xy), x12_zw.dot(x12_zw)))
    .max(Vec3::ZERO);
    m = m * m;
    m = m * m;

    let x = 2.0 * fract3(p * C[3]) - 1.0;
    let h = x.abs() - 0.5;
    let ox = (x + 0.5).floor();
    let a0 = x - ox;
    m *= Vec3::splat(1.792_842_9) - 0.853_734_7 * (a0 * a0 + h * h);

    let g = Vec3::new(
        a0.x * x0.x + h.x * x0.y,
        a0.y * x12_xy.x + h.y * x12_xy.y,
        a0.z * x12_zw.x + h.z * x12_zw.y,
    );
    130.0 * m.dot(g)
}

/// GLSL `smoothstep`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Per-instance inputs of the vertex stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexInput {
    /// Grid cell, `z` is always zero.
    pub offset: Vec3,
    pub index: f32,
    pub angle: f32,
    /// Source colour at the particle's cell.
    pub color: [f32; 3],
    /// Trail heat at the particle's cell, `0..=1`.
    pub touch: f32,
}

/// Object-space centre and point size of one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexOutput {
    pub position: Vec3,
    pub size: f32,
}

/// Grid-cell UV the program samples both textures at.
pub fn particle_uv(offset: Vec3, texture_size: Vec2) -> Vec2 {
    Vec2::new(offset.x, offset.y) / texture_size
}

/// Stable in-plane jitter, seeded by particle index only.
pub fn jitter(offset: Vec3, index: f32, magnitude: f32) -> Vec2 {
    Vec2::new(random(index) - 0.5, random(offset.x + index) - 0.5) * magnitude
}

/// Depth noise driving the breathing motion and scaling the trail push.
pub fn depth_noise(index: f32, time: f32) -> f32 {
    random(index) + snoise(Vec2::new(index * 0.1, time * 0.1))
}

pub fn vertex_stage(input: &VertexInput, uniforms: &Uniforms) -> VertexOutput {
    let mut displaced = input.offset;
    let j = jitter(input.offset, input.index, uniforms.random);
    displaced.x += j.x;
    displaced.y += j.y;

    let rndz = depth_noise(input.index, uniforms.time);
    displaced.z += rndz * (random(input.index) * 2.0 * uniforms.depth);
    displaced.x -= uniforms.texture_size.x * 0.5;
    displaced.y -= uniforms.texture_size.y * 0.5;

    let t = input.touch;
    displaced.z += t * -PUSH_STRENGTH * rndz;
    displaced.x += input.angle.cos() * t * PUSH_STRENGTH * rndz;
    displaced.y += input.angle.sin() * t * PUSH_STRENGTH * rndz;

    let mut size = snoise(Vec2::new(uniforms.time, input.index) * 0.5) + 2.0;
    size *= grey(input.color).max(0.2);
    size *= uniforms.size;

    VertexOutput {
        position: displaced,
        size,
    }
}

/// Alpha the fragment stage writes at quad coordinate `uv`.
pub fn fragment_alpha(uv: Vec2, color: [f32; 3], uniforms: &Uniforms) -> f32 {
    let d = (uv - Vec2::splat(0.5)).abs();
    let dist = 0.5
        - match uniforms.shape {
            ShapeMode::Circle => d.length(),
            ShapeMode::Square => d.x.max(d.y),
        };
    let t = smoothstep(0.0, MASK_BORDER, dist);
    let lit = if grey(color) > uniforms.threshold {
        1.0
    } else {
        DIM_ALPHA
    };
    (t - uniforms.fade()) * lit
}
