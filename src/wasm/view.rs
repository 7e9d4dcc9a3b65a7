//! `ParticleView`: the mountable surface exported to JavaScript.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::Vec2;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{closure::Closure, JsCast};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    window, HtmlCanvasElement, HtmlElement, MouseEvent, ResizeObserver,
    WebGl2RenderingContext as GL,
};

use super::render::WebGlBackend;
use super::source::{self, SourceElement};
use crate::camera::Viewport;
use crate::config::EngineConfig;
use crate::engine::{LoadedSource, ParticleEngine, SourceTexture};
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{teardown, HostSurface, LoadTicket, Phase};

type Engine = Rc<RefCell<ParticleEngine<WebGlBackend>>>;
type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Construction parameters; changing any of them means a rebuild.
#[derive(Clone, Debug)]
struct MountParams {
    texture_url: String,
    is_motion: bool,
    quote_text: Option<String>,
}

/// Particle animation mounted into a host container.
#[wasm_bindgen]
pub struct ParticleView {
    container: HtmlElement,
    config: EngineConfig,
    mount: Option<Mount>,
}

#[wasm_bindgen]
impl ParticleView {
    /// Mount into `container`. `options` is an optional JSON object of
    /// engine settings; missing keys take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(
        container: HtmlElement,
        texture_url: String,
        is_motion: bool,
        quote_text: Option<String>,
        options: Option<String>,
    ) -> Result<ParticleView, JsValue> {
        let config = EngineConfig::from_json(options.as_deref().unwrap_or_default())
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let params = MountParams {
            texture_url,
            is_motion,
            quote_text,
        };
        let mount = Mount::start(&container, config.clone(), params).map_err(to_js)?;
        Ok(ParticleView {
            container,
            config,
            mount: Some(mount),
        })
    }

    /// Tear the pipeline down and mount a fresh one for the new source.
    pub fn rebuild(
        &mut self,
        texture_url: String,
        is_motion: bool,
        quote_text: Option<String>,
    ) -> Result<(), JsValue> {
        self.dispose();
        let params = MountParams {
            texture_url,
            is_motion,
            quote_text,
        };
        self.mount = Some(Mount::start(&self.container, self.config.clone(), params).map_err(to_js)?);
        Ok(())
    }

    /// Cancel the frame loop, drop listeners, detach the canvas and free
    /// GPU resources. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(mut mount) = self.mount.take() {
            let engine = mount.engine.clone();
            teardown(&mut mount, &mut engine.borrow_mut());
        }
    }

    /// Current lifecycle phase, for diagnostics.
    pub fn phase(&self) -> String {
        match &self.mount {
            Some(mount) => format!("{:?}", mount.engine.borrow().phase()),
            None => format!("{:?}", Phase::Disposed),
        }
    }

    /// True once the source load has settled, with or without particles.
    #[wasm_bindgen(js_name = isReady)]
    pub fn is_ready(&self) -> bool {
        self.mount
            .as_ref()
            .is_some_and(|m| m.engine.borrow().phase().is_ready())
    }

    #[wasm_bindgen(js_name = particleCount)]
    pub fn particle_count(&self) -> u32 {
        self.mount
            .as_ref()
            .and_then(|m| m.engine.borrow().field().map(|f| f.len() as u32))
            .unwrap_or(0)
    }

    #[wasm_bindgen(js_name = visibleCount)]
    pub fn visible_count(&self) -> Option<u32> {
        self.mount
            .as_ref()
            .and_then(|m| m.engine.borrow().field().and_then(|f| f.visible_count()))
    }
}

impl Drop for ParticleView {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Everything one mount attaches to the page.
struct Mount {
    container: HtmlElement,
    canvas: HtmlCanvasElement,
    overlay: HtmlElement,
    engine: Engine,
    raf_id: Rc<Cell<Option<i32>>>,
    frame: FrameCallback,
    resize_observer: Option<ResizeObserver>,
    on_resize: Option<Closure<dyn FnMut()>>,
    on_pointer: Option<Closure<dyn FnMut(MouseEvent)>>,
}

impl Mount {
    fn start(container: &HtmlElement, config: EngineConfig, params: MountParams) -> EngineResult<Self> {
        let window = window().ok_or_else(|| EngineError::context("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| EngineError::context("no document"))?;

        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(EngineError::js)?
            .dyn_into()
            .map_err(EngineError::js)?;
        let style = canvas.style();
        style.set_property("display", "block").map_err(EngineError::js)?;
        style.set_property("width", "100%").map_err(EngineError::js)?;
        style.set_property("height", "100%").map_err(EngineError::js)?;

        let overlay: HtmlElement = document
            .create_element("div")
            .map_err(EngineError::js)?
            .dyn_into()
            .map_err(EngineError::js)?;
        overlay.set_class_name("particle-quote");

        container.append_child(&canvas).map_err(EngineError::js)?;
        container.append_child(&overlay).map_err(EngineError::js)?;

        let gl: GL = match canvas.get_context("webgl2") {
            Ok(Some(ctx)) => ctx.dyn_into().map_err(EngineError::js)?,
            Ok(None) => {
                container.remove_child(&canvas).ok();
                container.remove_child(&overlay).ok();
                return Err(EngineError::context("WebGL2 not supported"));
            }
            Err(e) => {
                container.remove_child(&canvas).ok();
                container.remove_child(&overlay).ok();
                return Err(EngineError::js(e));
            }
        };

        let viewport = container_viewport(container);
        let engine: Engine = Rc::new(RefCell::new(ParticleEngine::new(config, viewport)));
        size_drawing_buffer(&canvas, viewport);
        let ticket = engine.borrow_mut().begin_load();
        log::info!("mounting particle view for {}", params.texture_url);

        let mut mount = Mount {
            container: container.clone(),
            canvas,
            overlay,
            engine,
            raf_id: Rc::new(Cell::new(None)),
            frame: Rc::new(RefCell::new(None)),
            resize_observer: None,
            on_resize: None,
            on_pointer: None,
        };
        if let Err(err) = mount
            .install_listeners()
            .and_then(|_| mount.start_frame_loop())
        {
            let engine = mount.engine.clone();
            teardown(&mut mount, &mut engine.borrow_mut());
            return Err(err);
        }
        mount.spawn_load(gl, params, ticket);
        Ok(mount)
    }

    fn install_listeners(&mut self) -> EngineResult<()> {
        let window = window().ok_or_else(|| EngineError::context("no window"))?;

        // Fires for window resizes and layout changes alike, and once on
        // observe, which picks up a container that was empty at mount.
        let on_resize = {
            let engine = self.engine.clone();
            let container = self.container.clone();
            Closure::wrap(Box::new(move || {
                engine
                    .borrow_mut()
                    .request_resize(now_ms(), container_viewport(&container));
            }) as Box<dyn FnMut()>)
        };
        let observer =
            ResizeObserver::new(on_resize.as_ref().unchecked_ref()).map_err(EngineError::js)?;
        observer.observe(&self.container);
        self.resize_observer = Some(observer);
        self.on_resize = Some(on_resize);

        let on_pointer = {
            let engine = self.engine.clone();
            let canvas = self.canvas.clone();
            Closure::wrap(Box::new(move |event: MouseEvent| {
                let rect = canvas.get_bounding_client_rect();
                engine.borrow_mut().pointer_move(
                    Vec2::new(event.client_x() as f32, event.client_y() as f32),
                    Vec2::new(rect.left() as f32, rect.top() as f32),
                );
            }) as Box<dyn FnMut(MouseEvent)>)
        };
        window
            .add_event_listener_with_callback("pointermove", on_pointer.as_ref().unchecked_ref())
            .map_err(EngineError::js)?;
        self.on_pointer = Some(on_pointer);
        Ok(())
    }

    fn start_frame_loop(&mut self) -> EngineResult<()> {
        // `frame` holds the animation-frame closure so it can re-request
        // itself; teardown takes it out, which breaks the cycle.
        let f = self.frame.clone();
        let engine = self.engine.clone();
        let canvas = self.canvas.clone();
        let raf_id = self.raf_id.clone();
        *self.frame.borrow_mut() = Some(Closure::wrap(Box::new(move |now: f64| {
            if let Some(viewport) = engine.borrow_mut().frame(now) {
                size_drawing_buffer(&canvas, viewport);
            }

            let next = f
                .borrow()
                .as_ref()
                .and_then(|cb| window()?.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
            raf_id.set(next);
        }) as Box<dyn FnMut(f64)>));

        let id = window()
            .ok_or_else(|| EngineError::context("no window"))?
            .request_animation_frame(
                self.frame
                    .borrow()
                    .as_ref()
                    .ok_or_else(|| EngineError::context("frame callback missing"))?
                    .as_ref()
                    .unchecked_ref(),
            )
            .map_err(EngineError::js)?;
        self.raf_id.set(Some(id));
        Ok(())
    }

    fn spawn_load(&self, gl: GL, params: MountParams, ticket: LoadTicket) {
        let engine = self.engine.clone();
        let overlay = self.overlay.clone();
        spawn_local(async move {
            let media = source::load(&params.texture_url, params.is_motion).await;
            if !ticket.is_live() {
                if let Ok(element) = &media {
                    element.discard();
                }
                log::debug!("source resolved after unmount, dropped");
                return;
            }

            let grid = engine.borrow().grid();
            let loaded = media.and_then(|element| {
                let (width, height) = element.size();
                let pixels = match &element {
                    SourceElement::Image(img) => match source::extract_pixels(img, grid) {
                        Ok(rgba) => Some(rgba),
                        Err(e) => {
                            log::warn!("pixel extraction skipped: {e}");
                            None
                        }
                    },
                    SourceElement::Video(_) => None,
                };
                let source = SourceTexture {
                    width,
                    height,
                    is_motion: element.is_motion(),
                };
                WebGlBackend::new(gl, element).map(|backend| LoadedSource {
                    backend,
                    source,
                    pixels,
                })
            });

            let phase = engine.borrow_mut().complete_load(&ticket, loaded);
            if phase == Phase::Ready {
                if let Some(quote) = params.quote_text.as_deref() {
                    overlay.set_text_content(Some(quote));
                }
            }
        });
    }
}

impl HostSurface for Mount {
    fn cancel_frame(&mut self) {
        if let (Some(id), Some(window)) = (self.raf_id.take(), window()) {
            window.cancel_animation_frame(id).ok();
        }
        self.frame.borrow_mut().take();
    }

    fn remove_listeners(&mut self) {
        if let Some(observer) = self.resize_observer.take() {
            observer.disconnect();
        }
        self.on_resize.take();
        let Some(window) = window() else {
            return;
        };
        if let Some(cb) = self.on_pointer.take() {
            window
                .remove_event_listener_with_callback("pointermove", cb.as_ref().unchecked_ref())
                .ok();
        }
    }

    fn detach_surface(&mut self) {
        self.container.remove_child(&self.canvas).ok();
        self.container.remove_child(&self.overlay).ok();
    }
}

fn container_viewport(container: &HtmlElement) -> Viewport {
    Viewport::new(container.client_width() as f32, container.client_height() as f32)
}

fn size_drawing_buffer(canvas: &HtmlCanvasElement, viewport: Viewport) {
    if viewport.is_empty() {
        return;
    }
    let ratio = window().map_or(1.0, |w| w.device_pixel_ratio()) as f32;
    canvas.set_width((viewport.width * ratio).round() as u32);
    canvas.set_height((viewport.height * ratio).round() as u32);
}

fn now_ms() -> f64 {
    window()
        .and_then(|w| w.performance())
        .map_or(0.0, |p| p.now())
}

fn to_js(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
