//! The render loop's owned context.
//!
//! [`ParticleEngine`] is the single owner of everything a mount creates:
//! camera, trail, particle field, uniforms and the GPU backend. Setup,
//! per-frame work and teardown all go through `&mut self`; nothing lives in
//! globals. The GPU itself sits behind [`RenderBackend`] so the loop's
//! ordering and lifecycle run the same under WebGL2 and in host tests.

use glam::{Mat4, Vec2};

use crate::camera::{Camera, Viewport};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::field::{visible_point_count, GridSize, ParticleField};
use crate::lifecycle::{Debouncer, FrameClock, LoadTicket, MountFlag, Phase};
use crate::shader::Uniforms;
use crate::trail::TrailSimulator;

/// What the engine knows about a loaded source; the texture itself stays
/// inside the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceTexture {
    pub width: u32,
    pub height: u32,
    /// Video rather than a still; re-uploaded every frame.
    pub is_motion: bool,
}

/// Result of a finished source load.
pub struct LoadedSource<B> {
    /// Backend with the source texture already created.
    pub backend: B,
    pub source: SourceTexture,
    /// Grid-resolution RGBA of a still source, rows bottom-up.
    pub pixels: Option<Vec<u8>>,
}

/// GPU side of the engine.
pub trait RenderBackend {
    /// Create the instanced geometry for `field`.
    fn upload_field(&mut self, field: &ParticleField) -> EngineResult<()>;

    /// Replace the trail heat texture with `size x size` R8 texels.
    fn upload_trail(&mut self, size: u32, texels: &[u8]);

    /// Re-upload the current frame of a motion source.
    fn refresh_source(&mut self);

    fn draw(&mut self, uniforms: &Uniforms, model_view: Mat4, projection: Mat4);

    /// Free every GPU handle. Must tolerate being called twice.
    fn release(&mut self);
}

struct Scene<B> {
    backend: B,
    field: ParticleField,
    source: SourceTexture,
    uniforms: Uniforms,
}

pub struct ParticleEngine<B: RenderBackend> {
    config: EngineConfig,
    grid: GridSize,
    phase: Phase,
    mounted: MountFlag,
    camera: Camera,
    trail: TrailSimulator,
    clock: FrameClock,
    resize: Debouncer<Viewport>,
    scene: Option<Scene<B>>,
    frames: u64,
}

impl<B: RenderBackend> ParticleEngine<B> {
    /// Validate `config`, clamp the grid and frame the camera on `viewport`.
    pub fn new(config: EngineConfig, viewport: Viewport) -> Self {
        let config = config.validated();
        let requested = GridSize::new(config.grid.width, config.grid.height);
        let grid = requested.clamped(config.grid.max_points);
        if grid != requested {
            log::warn!(
                "grid {}x{} exceeds {} points, clamped to {}x{}",
                requested.width,
                requested.height,
                config.grid.max_points,
                grid.width,
                grid.height
            );
        }

        Self {
            camera: Camera::new(config.camera.clone(), grid, viewport),
            trail: TrailSimulator::new(config.trail.clone()),
            resize: Debouncer::new(config.resize_debounce_ms),
            clock: FrameClock::new(),
            mounted: MountFlag::new(),
            phase: Phase::Uninitialized,
            scene: None,
            frames: 0,
            grid,
            config,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Grid after clamping.
    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn trail(&self) -> &TrailSimulator {
        &self.trail
    }

    pub fn field(&self) -> Option<&ParticleField> {
        self.scene.as_ref().map(|s| &s.field)
    }

    pub fn uniforms(&self) -> Option<&Uniforms> {
        self.scene.as_ref().map(|s| &s.uniforms)
    }

    pub fn source(&self) -> Option<SourceTexture> {
        self.scene.as_ref().map(|s| s.source)
    }

    pub fn backend(&self) -> Option<&B> {
        self.scene.as_ref().map(|s| &s.backend)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_mounted()
    }

    /// Frames drawn since the scene became ready.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Enter `Loading` and hand out the ticket the load task must present.
    pub fn begin_load(&mut self) -> LoadTicket {
        if self.phase == Phase::Uninitialized {
            self.phase = Phase::Loading;
        }
        self.mounted.ticket()
    }

    /// Accept the outcome of the source load.
    ///
    /// A load that resolves after unmount is released and otherwise ignored.
    /// A failed load leaves the engine in `ReadyEmpty`, never in an error.
    pub fn complete_load(
        &mut self,
        ticket: &LoadTicket,
        loaded: EngineResult<LoadedSource<B>>,
    ) -> Phase {
        if !ticket.is_live() || self.phase != Phase::Loading {
            log::debug!("ignoring source load in phase {:?}", self.phase);
            if let Ok(mut orphan) = loaded {
                orphan.backend.release();
            }
            return self.phase;
        }

        let scene = loaded.and_then(|l| self.build_scene(l));
        match scene {
            Ok(scene) => {
                log::info!(
                    "particle field ready: {} instances on {}x{} grid from {}x{} {}, {} visible",
                    scene.field.len(),
                    self.grid.width,
                    self.grid.height,
                    scene.source.width,
                    scene.source.height,
                    if scene.source.is_motion { "video" } else { "image" },
                    scene
                        .field
                        .visible_count()
                        .map_or_else(|| "n/a".to_string(), |v| v.to_string())
                );
                self.scene = Some(scene);
                self.phase = Phase::Ready;
            }
            Err(err) => {
                log::warn!("particle source unavailable, rendering empty scene: {err}");
                self.phase = Phase::ReadyEmpty;
            }
        }
        self.phase
    }

    fn build_scene(&self, loaded: LoadedSource<B>) -> EngineResult<Scene<B>> {
        let LoadedSource {
            mut backend,
            source,
            pixels,
        } = loaded;

        let mut field = ParticleField::build(self.grid, source.is_motion, self.config.particles.seed);
        if let (false, Some(rgba)) = (source.is_motion, pixels.as_deref()) {
            field.set_visible_count(visible_point_count(
                rgba,
                self.grid,
                self.config.grid.threshold,
            ));
        }

        if let Err(err) = backend.upload_field(&field) {
            backend.release();
            return Err(err);
        }

        Ok(Scene {
            uniforms: Uniforms::new(&self.config, self.grid, source.is_motion),
            backend,
            field,
            source,
        })
    }

    /// Queue a container resize; applied by the first frame after the
    /// debounce delay.
    pub fn request_resize(&mut self, now_ms: f64, viewport: Viewport) {
        self.resize.schedule(now_ms, viewport);
    }

    /// Apply a resize immediately. Empty viewports are ignored.
    pub fn resize_now(&mut self, viewport: Viewport) -> bool {
        self.camera.resize(viewport)
    }

    /// Handle a pointer move at client position `client`.
    ///
    /// Tilts the field and appends a trail sample when the ray hits the
    /// hover plate. Returns the sample's force. Ignored unless `Ready`.
    pub fn pointer_move(&mut self, client: Vec2, origin: Vec2) -> Option<f32> {
        if self.phase != Phase::Ready || self.camera.viewport().is_empty() {
            return None;
        }
        let ndc = self.camera.pointer_ndc(client, origin);
        self.camera.set_tilt(ndc);
        let uv = self.camera.raycast(ndc)?;
        Some(self.trail.push(uv))
    }

    /// Run one frame at host timestamp `now_ms`.
    ///
    /// Order: advance time, step and upload the trail, refresh a motion
    /// source, draw. Returns the viewport if a pending resize was applied so
    /// the host can size its drawing buffer.
    pub fn frame(&mut self, now_ms: f64) -> Option<Viewport> {
        let dt = self.clock.tick(now_ms);
        let resized = self
            .resize
            .poll(now_ms)
            .filter(|viewport| self.camera.resize(*viewport));

        if self.phase != Phase::Ready {
            return resized;
        }
        let Some(scene) = self.scene.as_mut() else {
            return resized;
        };

        scene.uniforms.time += dt;

        let size = self.trail.config().size;
        let texels = self.trail.advance();
        scene.backend.upload_trail(size, texels);

        if scene.source.is_motion {
            scene.backend.refresh_source();
        }

        scene.backend.draw(
            &scene.uniforms,
            self.camera.model_view(),
            self.camera.projection(),
        );
        self.frames += 1;
        resized
    }

    /// Clear the mounted flag so an in-flight load is discarded on arrival.
    pub fn unmount(&mut self) {
        self.mounted.unmount();
    }

    /// Release every GPU handle and enter `Disposed`.
    pub fn dispose(&mut self) {
        self.mounted.unmount();
        if let Some(mut scene) = self.scene.take() {
            scene.backend.release();
        }
        self.trail.clear();
        self.resize.cancel();
        self.phase = Phase::Disposed;
    }
}

impl<B: RenderBackend> Drop for ParticleEngine<B> {
    fn drop(&mut self) {
        if self.phase != Phase::Disposed {
            self.dispose();
        }
    }
}
