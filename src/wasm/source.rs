//! Texture source: image and video elements, loaded as awaitable tasks.

use js_sys::{Function, Promise};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{window, CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement, HtmlVideoElement};

use crate::error::{EngineError, EngineResult};
use crate::field::GridSize;

/// A decoded media element ready to be uploaded as a texture.
pub enum SourceElement {
    Image(HtmlImageElement),
    /// Playing, muted and looping.
    Video(HtmlVideoElement),
}

impl SourceElement {
    pub fn is_motion(&self) -> bool {
        matches!(self, SourceElement::Video(_))
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            SourceElement::Image(img) => (img.natural_width(), img.natural_height()),
            SourceElement::Video(video) => (video.video_width(), video.video_height()),
        }
    }

    /// Stop a video and drop its network resource.
    pub fn discard(&self) {
        if let SourceElement::Video(video) = self {
            video.pause().ok();
            video.remove_attribute("src").ok();
            video.load();
        }
    }
}

pub async fn load(url: &str, is_motion: bool) -> EngineResult<SourceElement> {
    log::info!("loading {} source {url}", if is_motion { "video" } else { "image" });
    if is_motion {
        load_video(url).await.map(SourceElement::Video)
    } else {
        load_image(url).await.map(SourceElement::Image)
    }
}

async fn load_image(url: &str) -> EngineResult<HtmlImageElement> {
    let img = HtmlImageElement::new().map_err(EngineError::js)?;
    img.set_cross_origin(Some("anonymous"));
    img.set_src(url);
    JsFuture::from(img.decode())
        .await
        .map_err(|e| EngineError::load(format!("{url}: {e:?}")))?;
    Ok(img)
}

async fn load_video(url: &str) -> EngineResult<HtmlVideoElement> {
    let document = window()
        .and_then(|w| w.document())
        .ok_or_else(|| EngineError::context("no document"))?;
    let video: HtmlVideoElement = document
        .create_element("video")
        .map_err(EngineError::js)?
        .dyn_into()
        .map_err(EngineError::js)?;
    video.set_muted(true);
    video.set_loop(true);
    video.set_attribute("playsinline", "").map_err(EngineError::js)?;
    video.set_cross_origin(Some("anonymous"));

    let loaded = Promise::new(&mut |resolve: Function, reject: Function| {
        video.set_onloadeddata(Some(&resolve));
        video.set_onerror(Some(&reject));
    });
    video.set_src(url);
    let result = JsFuture::from(loaded).await;
    video.set_onloadeddata(None);
    video.set_onerror(None);
    result.map_err(|e| EngineError::load(format!("{url}: {e:?}")))?;

    // Autoplay can still be refused; the first frame uploads either way.
    match video.play() {
        Ok(playing) => {
            if let Err(e) = JsFuture::from(playing).await {
                log::warn!("video playback refused: {e:?}");
            }
        }
        Err(e) => log::warn!("video playback refused: {e:?}"),
    }
    Ok(video)
}

/// Rasterise `image` at grid resolution and read it back as RGBA.
///
/// Drawn flipped so row 0 is the bottom of the image, matching the grid's
/// `gridY` axis.
pub fn extract_pixels(image: &HtmlImageElement, grid: GridSize) -> EngineResult<Vec<u8>> {
    let document = window()
        .and_then(|w| w.document())
        .ok_or_else(|| EngineError::context("no document"))?;
    let canvas: HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(EngineError::js)?
        .dyn_into()
        .map_err(EngineError::js)?;
    canvas.set_width(grid.width);
    canvas.set_height(grid.height);

    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")
        .map_err(EngineError::js)?
        .ok_or_else(|| EngineError::context("2d context unavailable"))?
        .dyn_into()
        .map_err(EngineError::js)?;

    let (w, h) = (grid.width as f64, grid.height as f64);
    ctx.scale(1.0, -1.0).map_err(EngineError::js)?;
    ctx.draw_image_with_html_image_element_and_dw_and_dh(image, 0.0, 0.0, w, -h)
        .map_err(EngineError::js)?;
    // Cross-origin images without CORS headers taint the canvas here.
    let data = ctx.get_image_data(0.0, 0.0, w, h).map_err(EngineError::js)?;
    Ok(data.data().0)
}
