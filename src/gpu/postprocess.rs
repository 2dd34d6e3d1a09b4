//! Full-screen post-processing stage
//!
//! A single optional pass that runs a user-supplied fragment shader over the
//! composited frame before presentation. The user supplies only a
//! `mainImage(out vec4 color, vec2 fragCoord)` body; the surrounding
//! uniforms and entry point are fixed protocol constants.

use anyhow::Result;
use glow::HasContext;
use log::info;

use crate::gpu::shader::ProgramBuilder;
use crate::gpu::surface::Surface;
use crate::gpu::texture::{FilterMode, Texture};

/// Vertex shader: one oversized triangle covering the viewport, no buffers
const POST_VERTEX_SHADER: &str = r#"#version 300 es
precision highp float;

// Single triangle large enough to cover clip space
const vec2 positions[3] = vec2[](
    vec2(-1.0, -1.0),
    vec2( 3.0, -1.0),
    vec2(-1.0,  3.0)
);

void main() {
    gl_Position = vec4(positions[gl_VertexID], 0.0, 1.0);
}
"#;

/// Fixed fragment prelude: the uniforms guaranteed to the user body.
/// `inputFrame` samples the composited frame, `resolution` carries the
/// output size in xy (z unused), `elapsedTime` is seconds since startup.
const POST_FRAGMENT_HEADER: &str = r#"#version 300 es
precision highp float;

uniform sampler2D inputFrame;
uniform vec3 resolution;
uniform float elapsedTime;

out vec4 frag_color;

"#;

/// Fixed entry point: invokes the user's mainImage and forces opaque output
const POST_FRAGMENT_MAIN: &str = r#"
void main() {
    vec4 color = vec4(0.0);
    mainImage(color, gl_FragCoord.xy);
    color.a = 1.0;
    frag_color = color;
}
"#;

/// Identity pass-through used when no body is supplied; rendering through it
/// is pixel-identical to not post-processing at all.
const POST_DEFAULT_BODY: &str = r#"void mainImage(out vec4 color, vec2 fragCoord) {
    color = texture(inputFrame, fragCoord / resolution.xy);
}
"#;

/// Wrap a user shader body with the fixed header and entry point.
pub fn assemble_fragment_shader(body: Option<&str>) -> String {
    let body = body.unwrap_or(POST_DEFAULT_BODY);
    let mut source =
        String::with_capacity(POST_FRAGMENT_HEADER.len() + body.len() + POST_FRAGMENT_MAIN.len());
    source.push_str(POST_FRAGMENT_HEADER);
    source.push_str(body);
    source.push_str(POST_FRAGMENT_MAIN);
    source
}

/// The post-processing pass. At most one is configured per renderer, for
/// the process lifetime.
pub struct PostProcess {
    program: glow::Program,
    u_frame: Option<glow::UniformLocation>,
    u_resolution: Option<glow::UniformLocation>,
    u_time: Option<glow::UniformLocation>,
    vao: glow::VertexArray,
    /// Base surface the batch output (and overlay) are composited onto
    compose: Surface,
    /// Optional externally drawn layer composited on top, cleared after use
    overlay: Option<Surface>,
    /// Scratch texture refreshed from the composited image every frame
    scratch: Texture,
}

impl PostProcess {
    pub fn new(
        gl: &glow::Context,
        width: u32,
        height: u32,
        body: Option<&str>,
        include_overlay: bool,
        strict_shaders: bool,
    ) -> Result<Self> {
        let fragment_src = assemble_fragment_shader(body);
        let program = ProgramBuilder::new()
            .strict(strict_shaders)
            .link(gl, POST_VERTEX_SHADER, &fragment_src)?;

        let (u_frame, u_resolution, u_time, vao) = unsafe {
            (
                gl.get_uniform_location(program, "inputFrame"),
                gl.get_uniform_location(program, "resolution"),
                gl.get_uniform_location(program, "elapsedTime"),
                gl.create_vertex_array()
                    .map_err(|e| anyhow::anyhow!("Failed to create post VAO: {}", e))?,
            )
        };

        let compose = Surface::new(gl, width, height)?;
        let overlay = if include_overlay {
            Some(Surface::new(gl, width, height)?)
        } else {
            None
        };
        let scratch = Texture::new(gl, width, height, None, FilterMode::Linear)?;

        info!(
            "Post-process stage configured ({}, overlay: {})",
            if body.is_some() { "custom shader" } else { "pass-through" },
            include_overlay
        );

        Ok(Self {
            program,
            u_frame,
            u_resolution,
            u_time,
            vao,
            compose,
            overlay,
            scratch,
        })
    }

    /// The overlay layer surface, when one was requested.
    pub fn overlay(&self) -> Option<&Surface> {
        self.overlay.as_ref()
    }

    fn resize(&mut self, gl: &glow::Context, width: u32, height: u32) {
        if self.compose.size() == (width, height) {
            return;
        }
        self.compose.resize(gl, width, height);
        if let Some(overlay) = &mut self.overlay {
            overlay.resize(gl, width, height);
        }
        self.scratch.allocate(gl, width, height);
    }

    /// Composite the frame and run the shader over it, into the default
    /// framebuffer. The caller has already flushed the batch.
    pub fn render(
        &mut self,
        gl: &glow::Context,
        batch_surface: &Surface,
        width: u32,
        height: u32,
        elapsed: f32,
    ) {
        self.resize(gl, width, height);

        // Composite: batch output over the base surface, then the overlay
        // layer, which never persists across frames
        self.compose.clear(gl, 0.0, 0.0, 0.0, 1.0);
        batch_surface.blit_onto(gl, &self.compose);
        if let Some(overlay) = &self.overlay {
            overlay.blit_onto(gl, &self.compose);
            overlay.clear(gl, 0.0, 0.0, 0.0, 0.0);
        }

        // Refresh the scratch texture from the composited image
        unsafe {
            self.compose.bind(gl);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.scratch.raw()));
            gl.copy_tex_sub_image_2d(glow::TEXTURE_2D, 0, 0, 0, 0, 0, width as i32, height as i32);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }

        // Full-screen pass to the default framebuffer, blending disabled
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, width as i32, height as i32);
            gl.disable(glow::BLEND);

            gl.use_program(Some(self.program));
            self.scratch.bind(gl, 0);
            gl.uniform_1_i32(self.u_frame.as_ref(), 0);
            gl.uniform_3_f32(self.u_resolution.as_ref(), width as f32, height as f32, 0.0);
            gl.uniform_1_f32(self.u_time.as_ref(), elapsed);

            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLES, 0, 3);
            gl.bind_vertex_array(None);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.program);
            gl.delete_vertex_array(self.vao);
        }
        self.compose.destroy(gl);
        if let Some(overlay) = &self.overlay {
            overlay.destroy(gl);
        }
        self.scratch.destroy(gl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_body_is_passthrough() {
        let src = assemble_fragment_shader(None);
        assert!(src.contains("texture(inputFrame, fragCoord / resolution.xy)"));
    }

    #[test]
    fn test_protocol_uniforms_present() {
        let src = assemble_fragment_shader(None);
        assert!(src.contains("uniform sampler2D inputFrame;"));
        assert!(src.contains("uniform vec3 resolution;"));
        assert!(src.contains("uniform float elapsedTime;"));
    }

    #[test]
    fn test_user_body_is_wrapped() {
        let body = "void mainImage(out vec4 color, vec2 fragCoord) { color = vec4(1.0); }";
        let src = assemble_fragment_shader(Some(body));
        let header_at = src.find("uniform sampler2D inputFrame;").unwrap();
        let body_at = src.find(body).unwrap();
        let main_at = src.find("void main()").unwrap();
        assert!(header_at < body_at && body_at < main_at);
        // Output alpha is forced opaque after the user body runs
        assert!(src.contains("color.a = 1.0;"));
    }
}
