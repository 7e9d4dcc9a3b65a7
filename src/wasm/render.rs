//! WebGL2 implementation of [`RenderBackend`].

use glam::Mat4;
use js_sys::{Float32Array, Uint16Array};
use web_sys::{
    WebGl2RenderingContext as GL, WebGlBuffer, WebGlProgram, WebGlShader, WebGlTexture,
    WebGlUniformLocation, WebGlVertexArrayObject,
};

use super::source::SourceElement;
use crate::engine::RenderBackend;
use crate::error::{EngineError, EngineResult};
use crate::field::{ParticleField, QUAD_INDICES, QUAD_POSITIONS, QUAD_UVS};
use crate::shader::{
    Attribute, Uniform, Uniforms, FRAGMENT_SHADER, SOURCE_TEXTURE_UNIT, TOUCH_TEXTURE_UNIT,
    VERTEX_SHADER,
};

pub struct WebGlBackend {
    gl: GL,
    source: SourceElement,
    program: Option<WebGlProgram>,
    locations: Vec<Option<WebGlUniformLocation>>,
    source_texture: Option<WebGlTexture>,
    touch_texture: Option<WebGlTexture>,
    vao: Option<WebGlVertexArrayObject>,
    buffers: Vec<WebGlBuffer>,
    instances: i32,
    source_error_logged: bool,
    released: bool,
}

impl WebGlBackend {
    /// Link the particle program and upload `source` as the source texture.
    pub fn new(gl: GL, source: SourceElement) -> EngineResult<Self> {
        let mut backend = Self {
            gl,
            source,
            program: None,
            locations: Vec::with_capacity(Uniform::ALL.len()),
            source_texture: None,
            touch_texture: None,
            vao: None,
            buffers: Vec::new(),
            instances: 0,
            source_error_logged: false,
            released: false,
        };
        if let Err(err) = backend.init() {
            backend.release();
            return Err(err);
        }
        Ok(backend)
    }

    fn init(&mut self) -> EngineResult<()> {
        let program = link_program(&self.gl, VERTEX_SHADER, FRAGMENT_SHADER)?;
        for u in Uniform::ALL {
            let loc = self.gl.get_uniform_location(&program, u.name());
            if loc.is_none() {
                // Drivers strip uniforms that do not reach the output.
                log::debug!("uniform {} is not active", u.name());
            }
            self.locations.push(loc);
        }
        self.program = Some(program);

        self.source_texture = Some(create_texture(&self.gl)?);
        self.touch_texture = Some(create_texture(&self.gl)?);
        self.upload_source()
    }

    fn location(&self, u: Uniform) -> Option<&WebGlUniformLocation> {
        self.locations.get(u.slot()).and_then(Option::as_ref)
    }

    fn upload_source(&mut self) -> EngineResult<()> {
        let gl = &self.gl;
        gl.active_texture(GL::TEXTURE0 + SOURCE_TEXTURE_UNIT);
        gl.bind_texture(GL::TEXTURE_2D, self.source_texture.as_ref());
        gl.pixel_storei(GL::UNPACK_FLIP_Y_WEBGL, 1);
        let uploaded = match &self.source {
            SourceElement::Image(img) => gl.tex_image_2d_with_u32_and_u32_and_html_image_element(
                GL::TEXTURE_2D,
                0,
                GL::RGBA as i32,
                GL::RGBA,
                GL::UNSIGNED_BYTE,
                img,
            ),
            SourceElement::Video(video) => gl.tex_image_2d_with_u32_and_u32_and_html_video_element(
                GL::TEXTURE_2D,
                0,
                GL::RGBA as i32,
                GL::RGBA,
                GL::UNSIGNED_BYTE,
                video,
            ),
        };
        gl.pixel_storei(GL::UNPACK_FLIP_Y_WEBGL, 0);
        uploaded.map_err(|e| EngineError::load(format!("source upload: {e:?}")))
    }

    fn array_buffer(&mut self, data: &[f32], attr: Attribute) -> EngineResult<()> {
        let gl = &self.gl;
        let buffer = gl
            .create_buffer()
            .ok_or_else(|| EngineError::context("failed to create buffer"))?;
        gl.bind_buffer(GL::ARRAY_BUFFER, Some(&buffer));
        gl.buffer_data_with_array_buffer_view(
            GL::ARRAY_BUFFER,
            &Float32Array::from(data),
            GL::STATIC_DRAW,
        );
        let loc = attr.location();
        gl.enable_vertex_attrib_array(loc);
        gl.vertex_attrib_pointer_with_i32(loc, attr.components(), GL::FLOAT, false, 0, 0);
        gl.vertex_attrib_divisor(loc, attr.divisor());
        self.buffers.push(buffer);
        Ok(())
    }
}

impl RenderBackend for WebGlBackend {
    fn upload_field(&mut self, field: &ParticleField) -> EngineResult<()> {
        let vao = self
            .gl
            .create_vertex_array()
            .ok_or_else(|| EngineError::context("failed to create vertex array"))?;
        self.gl.bind_vertex_array(Some(&vao));
        self.vao = Some(vao);

        self.array_buffer(&QUAD_POSITIONS, Attribute::Position)?;
        self.array_buffer(&QUAD_UVS, Attribute::Uv)?;
        self.array_buffer(field.offsets(), Attribute::Offset)?;
        self.array_buffer(field.angles(), Attribute::Angle)?;
        self.array_buffer(field.indices(), Attribute::Index)?;

        let index = self
            .gl
            .create_buffer()
            .ok_or_else(|| EngineError::context("failed to create index buffer"))?;
        self.gl.bind_buffer(GL::ELEMENT_ARRAY_BUFFER, Some(&index));
        self.gl.buffer_data_with_array_buffer_view(
            GL::ELEMENT_ARRAY_BUFFER,
            &Uint16Array::from(&QUAD_INDICES[..]),
            GL::STATIC_DRAW,
        );
        self.buffers.push(index);

        self.gl.bind_vertex_array(None);
        self.instances = field.len() as i32;
        Ok(())
    }

    fn upload_trail(&mut self, size: u32, texels: &[u8]) {
        let gl = &self.gl;
        gl.active_texture(GL::TEXTURE0 + TOUCH_TEXTURE_UNIT);
        gl.bind_texture(GL::TEXTURE_2D, self.touch_texture.as_ref());
        gl.pixel_storei(GL::UNPACK_ALIGNMENT, 1);
        let result = gl.tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
            GL::TEXTURE_2D,
            0,
            GL::R8 as i32,
            size as i32,
            size as i32,
            0,
            GL::RED,
            GL::UNSIGNED_BYTE,
            Some(texels),
        );
        gl.pixel_storei(GL::UNPACK_ALIGNMENT, 4);
        if let Err(e) = result {
            log::warn!("trail upload failed: {e:?}");
        }
    }

    fn refresh_source(&mut self) {
        if let Err(err) = self.upload_source() {
            if !self.source_error_logged {
                log::warn!("{err}");
                self.source_error_logged = true;
            }
        }
    }

    fn draw(&mut self, uniforms: &Uniforms, model_view: Mat4, projection: Mat4) {
        let gl = &self.gl;
        gl.viewport(0, 0, gl.drawing_buffer_width(), gl.drawing_buffer_height());
        gl.clear_color(0.0, 0.0, 0.0, 0.0);
        gl.clear(GL::COLOR_BUFFER_BIT);
        if self.instances == 0 || self.released {
            return;
        }

        gl.use_program(self.program.as_ref());
        gl.disable(GL::DEPTH_TEST);
        gl.enable(GL::BLEND);
        gl.blend_func(GL::SRC_ALPHA, GL::ONE_MINUS_SRC_ALPHA);

        gl.uniform_matrix4fv_with_f32_array(
            self.location(Uniform::ModelView),
            false,
            &model_view.to_cols_array(),
        );
        gl.uniform_matrix4fv_with_f32_array(
            self.location(Uniform::Projection),
            false,
            &projection.to_cols_array(),
        );
        gl.uniform1f(self.location(Uniform::Time), uniforms.time);
        gl.uniform1f(self.location(Uniform::Random), uniforms.random);
        gl.uniform1f(self.location(Uniform::Depth), uniforms.depth);
        gl.uniform1f(self.location(Uniform::Size), uniforms.size);
        gl.uniform2f(
            self.location(Uniform::TextureSize),
            uniforms.texture_size.x,
            uniforms.texture_size.y,
        );
        gl.uniform1f(self.location(Uniform::AlphaCircle), uniforms.alpha_circle);
        gl.uniform1f(self.location(Uniform::AlphaSquare), uniforms.alpha_square);
        gl.uniform1f(self.location(Uniform::CircleOrSquare), uniforms.circle_or_square());
        gl.uniform1f(self.location(Uniform::Threshold), uniforms.threshold);

        gl.active_texture(GL::TEXTURE0 + SOURCE_TEXTURE_UNIT);
        gl.bind_texture(GL::TEXTURE_2D, self.source_texture.as_ref());
        gl.uniform1i(self.location(Uniform::Texture), SOURCE_TEXTURE_UNIT as i32);
        gl.active_texture(GL::TEXTURE0 + TOUCH_TEXTURE_UNIT);
        gl.bind_texture(GL::TEXTURE_2D, self.touch_texture.as_ref());
        gl.uniform1i(self.location(Uniform::Touch), TOUCH_TEXTURE_UNIT as i32);

        gl.bind_vertex_array(self.vao.as_ref());
        gl.draw_elements_instanced_with_i32(
            GL::TRIANGLES,
            QUAD_INDICES.len() as i32,
            GL::UNSIGNED_SHORT,
            0,
            self.instances,
        );
        gl.bind_vertex_array(None);
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        let gl = &self.gl;
        for buffer in self.buffers.drain(..) {
            gl.delete_buffer(Some(&buffer));
        }
        gl.delete_vertex_array(self.vao.take().as_ref());
        gl.delete_texture(self.source_texture.take().as_ref());
        gl.delete_texture(self.touch_texture.take().as_ref());
        gl.delete_program(self.program.take().as_ref());
        self.locations.clear();
        self.instances = 0;
        self.source.discard();
        self.released = true;
    }
}

fn create_texture(gl: &GL) -> EngineResult<WebGlTexture> {
    let texture = gl
        .create_texture()
        .ok_or_else(|| EngineError::context("failed to create texture"))?;
    gl.bind_texture(GL::TEXTURE_2D, Some(&texture));
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MIN_FILTER, GL::LINEAR as i32);
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MAG_FILTER, GL::LINEAR as i32);
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_S, GL::CLAMP_TO_EDGE as i32);
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_T, GL::CLAMP_TO_EDGE as i32);
    Ok(texture)
}

fn link_program(gl: &GL, vertex_src: &str, fragment_src: &str) -> EngineResult<WebGlProgram> {
    let vertex = compile_shader(gl, GL::VERTEX_SHADER, vertex_src)?;
    let fragment = match compile_shader(gl, GL::FRAGMENT_SHADER, fragment_src) {
        Ok(shader) => shader,
        Err(err) => {
            gl.delete_shader(Some(&vertex));
            return Err(err);
        }
    };
    let program = gl
        .create_program()
        .ok_or_else(|| EngineError::context("failed to create program"))?;
    gl.attach_shader(&program, &vertex);
    gl.attach_shader(&program, &fragment);
    for attr in Attribute::ALL {
        gl.bind_attrib_location(&program, attr.location(), attr.name());
    }
    gl.link_program(&program);

    gl.detach_shader(&program, &vertex);
    gl.detach_shader(&program, &fragment);
    gl.delete_shader(Some(&vertex));
    gl.delete_shader(Some(&fragment));

    let linked = gl
        .get_program_parameter(&program, GL::LINK_STATUS)
        .as_bool()
        .unwrap_or(false);
    if linked {
        Ok(program)
    } else {
        let info = gl
            .get_program_info_log(&program)
            .unwrap_or_else(|| "unknown link error".to_string());
        gl.delete_program(Some(&program));
        Err(EngineError::shader("link", info))
    }
}

fn compile_shader(gl: &GL, kind: u32, source: &str) -> EngineResult<WebGlShader> {
    let stage = if kind == GL::VERTEX_SHADER {
        "vertex"
    } else {
        "fragment"
    };
    let shader = gl
        .create_shader(kind)
        .ok_or_else(|| EngineError::context("failed to create shader"))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);
    let compiled = gl
        .get_shader_parameter(&shader, GL::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false);
    if compiled {
        Ok(shader)
    } else {
        let info = gl
            .get_shader_info_log(&shader)
            .unwrap_or_else(|| "unknown compile error".to_string());
        gl.delete_shader(Some(&shader));
        Err(EngineError::shader(stage, info))
    }
}
