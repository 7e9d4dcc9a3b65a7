//! GLSL ES 3.00 program for the particle field and its typed bindings.
//!
//! Uniforms and attributes are addressed through [`Uniform`] and
//! [`Attribute`] rather than raw strings; the backend resolves every
//! `Uniform` once at link time.

use glam::Vec2;

use crate::config::{EngineConfig, ShapeMode};
use crate::field::GridSize;

/// Displacement applied at full trail heat, in grid cells.
pub const PUSH_STRENGTH: f32 = 40.0;
/// Alpha multiplier for cells under the luminance threshold.
pub const DIM_ALPHA: f32 = 0.02;
/// Inner edge of the soft mask, as a distance from the quad rim.
pub const MASK_BORDER: f32 = 0.3;

pub const SOURCE_TEXTURE_UNIT: u32 = 0;
pub const TOUCH_TEXTURE_UNIT: u32 = 1;

pub const VERTEX_SHADER: &str = r#"#version 300 es
precision highp float;

in vec3 position;
in vec2 uv;
in vec3 offset;
in float angle;
in float pindex;

uniform mat4 modelViewMatrix;
uniform mat4 projectionMatrix;
uniform float uTime;
uniform float uRandom;
uniform float uDepth;
uniform float uSize;
uniform vec2 uTextureSize;
uniform sampler2D uTexture;
uniform sampler2D uTouch;

out vec2 vPUv;
out vec2 vUv;

const float PUSH = 40.0;

vec3 mod289(vec3 x) {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

vec2 mod289(vec2 x) {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

vec3 permute(vec3 x) {
    return mod289(((x * 34.0) + 1.0) * x);
}

float snoise(vec2 v) {
    const vec4 C = vec4(0.211324865405187,
                        0.366025403784439,
                       -0.577350269189626,
                        0.024390243902439);
    vec2 i  = floor(v + dot(v, C.yy));
    vec2 x0 = v - i + dot(i, C.xx);

    vec2 i1 = (x0.x > x0.y) ? vec2(1.0, 0.0) : vec2(0.0, 1.0);
    vec4 x12 = x0.xyxy + C.xxzz;
    x12.xy -= i1;

    i = mod289(i);
    vec3 p = permute(permute(i.y + vec3(0.0, i1.y, 1.0)) + i.x + vec3(0.0, i1.x, 1.0));

    vec3 m = max(0.5 - vec3(dot(x0, x0), dot(x12.xy, x12.xy), dot(x12.zw, x12.zw)), 0.0);
    m = m * m;
    m = m * m;

    vec3 x = 2.0 * fract(p * C.www) - 1.0;
    vec3 h = abs(x) - 0.5;
    vec3 ox = floor(x + 0.5);
    vec3 a0 = x - ox;
    m *= 1.79284291400159 - 0.85373472095314 * (a0 * a0 + h * h);

    vec3 g;
    g.x  = a0.x  * x0.x   + h.x  * x0.y;
    g.yz = a0.yz * x12.xz + h.yz * x12.yw;
    return 130.0 * dot(m, g);
}

float random(float n) {
    return fract(sin(n) * 43758.5453123);
}

void main() {
    vUv = uv;

    vec2 puv = offset.xy / uTextureSize;
    vPUv = puv;

    vec4 colA = texture(uTexture, puv);
    float grey = colA.r * 0.21 + colA.g * 0.71 + colA.b * 0.07;

    vec3 displaced = offset;
    displaced.xy += vec2(random(pindex) - 0.5, random(offset.x + pindex) - 0.5) * uRandom;
    float rndz = random(pindex) + snoise(vec2(pindex * 0.1, uTime * 0.1));
    displaced.z += rndz * (random(pindex) * 2.0 * uDepth);
    displaced.xy -= uTextureSize * 0.5;

    float t = texture(uTouch, puv).r;
    displaced.z += t * -PUSH * rndz;
    displaced.x += cos(angle) * t * PUSH * rndz;
    displaced.y += sin(angle) * t * PUSH * rndz;

    float psize = snoise(vec2(uTime, pindex) * 0.5) + 2.0;
    psize *= max(grey, 0.2);
    psize *= uSize;

    vec4 mvPosition = modelViewMatrix * vec4(displaced, 1.0);
    mvPosition.xyz += position * psize;
    gl_Position = projectionMatrix * mvPosition;
}
"#;

pub const FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;

uniform sampler2D uTexture;
uniform float uAlphaCircle;
uniform float uAlphaSquare;
uniform float uCircleORsquare;
uniform float uThreshold;

in vec2 vPUv;
in vec2 vUv;

out vec4 fragColor;

const float BORDER = 0.3;
const float RADIUS = 0.5;
const float DIM = 0.02;

void main() {
    vec4 colA = texture(uTexture, vPUv);
    float grey = colA.r * 0.21 + colA.g * 0.71 + colA.b * 0.07;

    vec2 d = abs(vUv - vec2(0.5));
    float round_ = length(d);
    float box = max(d.x, d.y);
    float dist = RADIUS - mix(round_, box, uCircleORsquare);
    float t = smoothstep(0.0, BORDER, dist);

    float fade = mix(uAlphaCircle, uAlphaSquare, uCircleORsquare);
    float lit = mix(DIM, 1.0, 1.0 - step(grey, uThreshold));
    fragColor = vec4(colA.rgb, (t - fade) * lit);
}
"#;

/// Named uniform bindings of the particle program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Uniform {
    ModelView,
    Projection,
    Time,
    Random,
    Depth,
    Size,
    TextureSize,
    Texture,
    Touch,
    AlphaCircle,
    AlphaSquare,
    CircleOrSquare,
    Threshold,
}

impl Uniform {
    pub const ALL: [Uniform; 13] = [
        Uniform::ModelView,
        Uniform::Projection,
        Uniform::Time,
        Uniform::Random,
        Uniform::Depth,
        Uniform::Size,
        Uniform::TextureSize,
        Uniform::Texture,
        Uniform::Touch,
        Uniform::AlphaCircle,
        Uniform::AlphaSquare,
        Uniform::CircleOrSquare,
        Uniform::Threshold,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Uniform::ModelView => "modelViewMatrix",
            Uniform::Projection => "projectionMatrix",
            Uniform::Time => "uTime",
            Uniform::Random => "uRandom",
            Uniform::Depth => "uDepth",
            Uniform::Size => "uSize",
            Uniform::TextureSize => "uTextureSize",
            Uniform::Texture => "uTexture",
            Uniform::Touch => "uTouch",
            Uniform::AlphaCircle => "uAlphaCircle",
            Uniform::AlphaSquare => "uAlphaSquare",
            Uniform::CircleOrSquare => "uCircleORsquare",
            Uniform::Threshold => "uThreshold",
        }
    }

    /// Position in [`Uniform::ALL`], used to index location tables.
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// Vertex inputs with the locations bound before linking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attribute {
    Position,
    Uv,
    Offset,
    Angle,
    Index,
}

impl Attribute {
    pub const ALL: [Attribute; 5] = [
        Attribute::Position,
        Attribute::Uv,
        Attribute::Offset,
        Attribute::Angle,
        Attribute::Index,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Attribute::Position => "position",
            Attribute::Uv => "uv",
            Attribute::Offset => "offset",
            Attribute::Angle => "angle",
            Attribute::Index => "pindex",
        }
    }

    pub fn location(self) -> u32 {
        self as u32
    }

    pub fn components(self) -> i32 {
        match self {
            Attribute::Position | Attribute::Offset => 3,
            Attribute::Uv => 2,
            Attribute::Angle | Attribute::Index => 1,
        }
    }

    /// Instanced attributes advance once per particle.
    pub fn divisor(self) -> u32 {
        match self {
            Attribute::Position | Attribute::Uv => 0,
            Attribute::Offset | Attribute::Angle | Attribute::Index => 1,
        }
    }
}

/// Scalar uniform values, mutated once per frame by the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Uniforms {
    pub time: f32,
    pub random: f32,
    pub depth: f32,
    pub size: f32,
    pub texture_size: Vec2,
    pub shape: ShapeMode,
    pub alpha_circle: f32,
    pub alpha_square: f32,
    /// Normalised luminance cut-off; negative disables dimming.
    pub threshold: f32,
}

impl Uniforms {
    pub fn new(config: &EngineConfig, grid: GridSize, is_motion: bool) -> Self {
        let p = &config.particles;
        Self {
            time: 0.0,
            random: p.random,
            depth: p.depth,
            size: p.size,
            texture_size: Vec2::new(grid.width as f32, grid.height as f32),
            shape: p.shape,
            alpha_circle: p.alpha_circle,
            alpha_square: p.alpha_square,
            threshold: if is_motion {
                -1.0
            } else {
                config.grid.threshold / 255.0
            },
        }
    }

    /// Value of the `uCircleORsquare` switch.
    pub fn circle_or_square(&self) -> f32 {
        match self.shape {
            ShapeMode::Circle => 0.0,
            ShapeMode::Square => 1.0,
        }
    }

    /// Global fade for the active shape.
    pub fn fade(&self) -> f32 {
        match self.shape {
            ShapeMode::Circle => self.alpha_circle,
            ShapeMode::Square => self.alpha_square,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declares(src: &str, name: &str) -> bool {
        src.lines().any(|line| {
            let line = line.trim();
            line.starts_with("uniform ") && line.trim_end_matches(';').ends_with(name)
        })
    }

    #[test]
    fn every_uniform_is_declared() {
        for u in Uniform::ALL {
            assert!(
                declares(VERTEX_SHADER, u.name()) || declares(FRAGMENT_SHADER, u.name()),
                "{} missing from program",
                u.name()
            );
        }
    }

    #[test]
    fn every_attribute_is_declared() {
        for a in Attribute::ALL {
            let decl = format!(" {};", a.name());
            assert!(
                VERTEX_SHADER
                    .lines()
                    .any(|l| l.trim_start().starts_with("in ") && l.ends_with(&decl)),
                "{} missing from vertex stage",
                a.name()
            );
        }
    }

    #[test]
    fn slots_and_locations_are_dense() {
        for (i, u) in Uniform::ALL.iter().enumerate() {
            assert_eq!(u.slot(), i);
        }
        for (i, a) in Attribute::ALL.iter().enumerate() {
            assert_eq!(a.location() as usize, i);
        }
    }

    #[test]
    fn glsl_constants_match_rust() {
        assert!(VERTEX_SHADER.contains(&format!("PUSH = {PUSH_STRENGTH:.1};")));
        assert!(FRAGMENT_SHADER.contains(&format!("BORDER = {MASK_BORDER:.1};")));
        assert!(FRAGMENT_SHADER.contains(&format!("DIM = {DIM_ALPHA:.2};")));
    }

    #[test]
    fn motion_disables_threshold() {
        let cfg = EngineConfig::default();
        let u = Uniforms::new(&cfg, GridSize::new(10, 10), true);
        assert!(u.threshold < 0.0);
        let u = Uniforms::new(&cfg, GridSize::new(10, 10), false);
        assert!((u.threshold - 30.0 / 255.0).abs() < 1e-6);
    }
}
