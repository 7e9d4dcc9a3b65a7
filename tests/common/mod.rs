#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use glam::Mat4;
use pixel_particles::engine::{LoadedSource, RenderBackend, SourceTexture};
use pixel_particles::error::{EngineError, EngineResult};
use pixel_particles::field::ParticleField;
use pixel_particles::shader::Uniforms;

/// Calls observed by a [`RecordingBackend`], shared with the test body.
pub type Log = Rc<RefCell<Vec<Call>>>;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    UploadField(usize),
    UploadTrail { size: u32, lit: usize },
    RefreshSource,
    Draw { time: f32 },
    Release,
    // Host-side teardown steps, recorded by `RecordingHost`.
    CancelFrame,
    RemoveListeners,
    DetachSurface,
}

pub struct RecordingBackend {
    pub log: Log,
    pub fail_upload: bool,
}

impl RecordingBackend {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            fail_upload: false,
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn upload_field(&mut self, field: &ParticleField) -> EngineResult<()> {
        if self.fail_upload {
            return Err(EngineError::context("out of memory"));
        }
        self.log.borrow_mut().push(Call::UploadField(field.len()));
        Ok(())
    }

    fn upload_trail(&mut self, size: u32, texels: &[u8]) {
        let lit = texels.iter().filter(|&&t| t > 0).count();
        self.log.borrow_mut().push(Call::UploadTrail { size, lit });
    }

    fn refresh_source(&mut self) {
        self.log.borrow_mut().push(Call::RefreshSource);
    }

    fn draw(&mut self, uniforms: &Uniforms, _model_view: Mat4, _projection: Mat4) {
        self.log.borrow_mut().push(Call::Draw {
            time: uniforms.time,
        });
    }

    fn release(&mut self) {
        self.log.borrow_mut().push(Call::Release);
    }
}

pub struct RecordingHost {
    pub log: Log,
}

impl pixel_particles::lifecycle::HostSurface for RecordingHost {
    fn cancel_frame(&mut self) {
        self.log.borrow_mut().push(Call::CancelFrame);
    }

    fn remove_listeners(&mut self) {
        self.log.borrow_mut().push(Call::RemoveListeners);
    }

    fn detach_surface(&mut self) {
        self.log.borrow_mut().push(Call::DetachSurface);
    }
}

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn still(log: &Log, pixels: Option<Vec<u8>>) -> LoadedSource<RecordingBackend> {
    LoadedSource {
        backend: RecordingBackend::new(log),
        source: SourceTexture {
            width: 500,
            height: 290,
            is_motion: false,
        },
        pixels,
    }
}

pub fn video(log: &Log) -> LoadedSource<RecordingBackend> {
    LoadedSource {
        backend: RecordingBackend::new(log),
        source: SourceTexture {
            width: 640,
            height: 360,
            is_motion: true,
        },
        pixels: None,
    }
}
