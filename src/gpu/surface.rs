//! Offscreen render surfaces
//!
//! A `Surface` is a framebuffer object with an RGBA color texture. The batch
//! renders into one, the post-process stage composites several, and the
//! final result is either blitted to the default framebuffer or read back to
//! the CPU.

use anyhow::{anyhow, Result};
use glow::HasContext;
use log::info;

/// Vertex shader for surface blits (full screen quad)
const BLIT_VERTEX_SHADER: &str = r#"#version 300 es
precision mediump float;

// Full screen quad vertices (clip space)
const vec2 positions[4] = vec2[](
    vec2(-1.0, -1.0),
    vec2( 1.0, -1.0),
    vec2( 1.0,  1.0),
    vec2(-1.0,  1.0)
);

const vec2 texcoords[4] = vec2[](
    vec2(0.0, 0.0),
    vec2(1.0, 0.0),
    vec2(1.0, 1.0),
    vec2(0.0, 1.0)
);

out vec2 v_uv;

void main() {
    gl_Position = vec4(positions[gl_VertexID], 0.0, 1.0);
    v_uv = texcoords[gl_VertexID];
}
"#;

/// Fragment shader for surface blits
const BLIT_FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;

in vec2 v_uv;
uniform sampler2D u_texture;
out vec4 frag_color;

void main() {
    frag_color = texture(u_texture, v_uv);
}
"#;

/// An offscreen framebuffer with an RGBA color attachment.
pub struct Surface {
    framebuffer: glow::Framebuffer,
    texture: glow::Texture,
    width: u32,
    height: u32,
    blit_program: glow::Program,
    blit_vao: glow::VertexArray,
    u_texture: glow::UniformLocation,
}

impl Surface {
    /// Create a surface with the given size.
    pub fn new(gl: &glow::Context, width: u32, height: u32) -> Result<Self> {
        unsafe {
            // Color attachment texture
            let texture = gl
                .create_texture()
                .map_err(|e| anyhow!("Failed to create surface texture: {}", e))?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                None,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            // Framebuffer
            let framebuffer = gl
                .create_framebuffer()
                .map_err(|e| anyhow!("Failed to create surface FBO: {}", e))?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(framebuffer);
                gl.delete_texture(texture);
                return Err(anyhow!("Surface FBO incomplete: status={}", status));
            }
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);

            // Blit shader program
            let blit_program = compile_blit_program(gl)?;
            let u_texture = gl
                .get_uniform_location(blit_program, "u_texture")
                .ok_or_else(|| anyhow!("u_texture uniform not found"))?;

            // Empty VAO for vertex-less rendering
            let blit_vao = gl
                .create_vertex_array()
                .map_err(|e| anyhow!("Failed to create blit VAO: {}", e))?;

            info!("Surface created: {}x{}", width, height);

            Ok(Self {
                framebuffer,
                texture,
                width,
                height,
                blit_program,
                blit_vao,
                u_texture,
            })
        }
    }

    /// Bind for rendering and set the viewport to cover it.
    pub fn bind(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffer));
            gl.viewport(0, 0, self.width as i32, self.height as i32);
        }
    }

    /// Unbind (return to default framebuffer).
    pub fn unbind(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    /// Fill with a solid color.
    pub fn clear(&self, gl: &glow::Context, r: f32, g: f32, b: f32, a: f32) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffer));
            gl.clear_color(r, g, b, a);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    /// Resize the color attachment. No-op when the size is unchanged.
    pub fn resize(&mut self, gl: &glow::Context, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }

        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                None,
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
        }

        self.width = width;
        self.height = height;
        info!("Surface resized: {}x{}", width, height);
    }

    /// Draw this surface onto the default framebuffer.
    pub fn blit_to_screen(&self, gl: &glow::Context, screen_width: u32, screen_height: u32) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, screen_width as i32, screen_height as i32);
            self.draw_blit(gl);
        }
    }

    /// Composite this surface onto another with standard alpha blending.
    pub fn blit_onto(&self, gl: &glow::Context, target: &Surface) {
        unsafe {
            target.bind(gl);
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            self.draw_blit(gl);
            gl.disable(glow::BLEND);
        }
    }

    unsafe fn draw_blit(&self, gl: &glow::Context) {
        gl.use_program(Some(self.blit_program));
        gl.uniform_1_i32(Some(&self.u_texture), 0);

        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(glow::TEXTURE_2D, Some(self.texture));

        gl.bind_vertex_array(Some(self.blit_vao));
        gl.draw_arrays(glow::TRIANGLE_FAN, 0, 4);

        gl.bind_vertex_array(None);
        gl.bind_texture(glow::TEXTURE_2D, None);
    }

    /// Read the surface contents back to the CPU as top-down RGBA8 rows.
    pub fn read_pixels(&self, gl: &glow::Context, out: &mut Vec<u8>) {
        let row_bytes = self.width as usize * 4;
        out.resize(row_bytes * self.height as usize, 0);
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffer));
            gl.read_pixels(
                0,
                0,
                self.width as i32,
                self.height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(out.as_mut_slice()),
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        // GL rows come back bottom-up; flip to image order
        let half = self.height as usize / 2;
        for row in 0..half {
            let top = row * row_bytes;
            let bottom = (self.height as usize - 1 - row) * row_bytes;
            for i in 0..row_bytes {
                out.swap(top + i, bottom + i);
            }
        }
    }

    /// Upload top-down RGBA8 rows into the surface's color texture.
    ///
    /// The rows are flipped to the GL orientation so that a later composite
    /// lines up with batch-rendered content.
    pub fn upload_pixels(&self, gl: &glow::Context, width: u32, height: u32, pixels: &[u8]) {
        if width != self.width || height != self.height {
            return;
        }
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);

        let row_bytes = width as usize * 4;
        let mut flipped = Vec::with_capacity(pixels.len());
        for row in (0..height as usize).rev() {
            flipped.extend_from_slice(&pixels[row * row_bytes..(row + 1) * row_bytes]);
        }

        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture));
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(&flipped),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    /// The color attachment texture.
    pub fn texture(&self) -> glow::Texture {
        self.texture
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_framebuffer(self.framebuffer);
            gl.delete_texture(self.texture);
            gl.delete_program(self.blit_program);
            gl.delete_vertex_array(self.blit_vao);
        }
    }
}

/// Compile the blit shader program
fn compile_blit_program(gl: &glow::Context) -> Result<glow::Program> {
    use crate::gpu::shader::{ProgramBuilder, ShaderError};

    // Blit shaders are internal constants; a failure here means the context
    // is unusable, so they always build strictly.
    let program: Result<glow::Program, ShaderError> = ProgramBuilder::new()
        .strict(true)
        .link(gl, BLIT_VERTEX_SHADER, BLIT_FRAGMENT_SHADER);
    Ok(program?)
}
