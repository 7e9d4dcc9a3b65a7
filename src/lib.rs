//! Pixel-driven particle animation for the browser.
//!
//! A still image or video is sampled on a fixed grid and drawn as one
//! instanced quad per cell. Particles breathe with procedural noise and are
//! pushed away by a pointer trail rasterised into a heat texture each frame.
//!
//! Everything outside `wasm` is target-independent and tested on the host;
//! the `wasm` module binds it to WebGL2 and the DOM.

pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod lifecycle;
pub mod noise;
pub mod shader;
pub mod trail;

pub use camera::{Camera, Viewport};
pub use config::{EngineConfig, ShapeMode};
pub use engine::{LoadedSource, ParticleEngine, RenderBackend, SourceTexture};
pub use error::{EngineError, EngineResult};
pub use field::{GridSize, ParticleField};
pub use lifecycle::Phase;
pub use trail::TrailSimulator;

// Only compile wasm-specific code when targeting wasm32.
#[cfg(target_arch = "wasm32")]
mod wasm {
    use wasm_bindgen::prelude::*;

    mod render;
    mod source;
    mod view;

    pub use view::ParticleView;

    #[wasm_bindgen(start)]
    pub fn main() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).ok();
        log::info!("pixel_particles loaded");
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm::ParticleView;
