//! Shader management
//!
//! GLSL ES 3.00 shader compilation and linking for the batch pipeline.
//! Programs are built once at setup time and never recompiled per frame.

use glow::HasContext;
use log::{info, warn};
use thiserror::Error;

/// Batch vertex shader (GLSL ES 3.00)
///
/// Input:
///   a_pos:       Vertex position (world pixels)
///   a_uv:        Texture coordinates
///   a_color:     Multiplicative tint (RGBA, normalized from packed bytes)
///   a_add_color: Additive color (RGBA, normalized from packed bytes)
/// Uniform:
///   u_transform: Camera transform matrix, recomputed once per frame
pub const BATCH_VERTEX_SHADER: &str = r#"#version 300 es
precision highp float;

layout(location = 0) in vec2 a_pos;
layout(location = 1) in vec2 a_uv;
layout(location = 2) in vec4 a_color;
layout(location = 3) in vec4 a_add_color;

uniform mat4 u_transform;

out vec2 v_uv;
out vec4 v_color;
out vec4 v_add_color;

void main() {
    gl_Position = u_transform * vec4(a_pos, 0.0, 1.0);
    v_uv = a_uv;
    v_color = a_color;
    v_add_color = a_add_color;
}
"#;

/// Batch fragment shader
///
/// The blend formula `texture * color + additive` is a fixed protocol
/// constant: flat-color polygons are emitted with `color = 0` so the texture
/// term vanishes and the additive channel alone carries the fill.
pub const BATCH_FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;

in vec2 v_uv;
in vec4 v_color;
in vec4 v_add_color;

uniform sampler2D u_texture;

out vec4 frag_color;

void main() {
    frag_color = texture(u_texture, v_uv) * v_color + v_add_color;
}
"#;

/// Shader pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn gl_type(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

/// Shader build failure, carrying the driver's error log.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to create {stage} shader object: {msg}")]
    CreateShader { stage: &'static str, msg: String },
    #[error("failed to create program object: {0}")]
    CreateProgram(String),
    #[error("{stage} shader compile failed: {log}")]
    Compile { stage: &'static str, log: String },
    #[error("program link failed: {log}")]
    Link { log: String },
}

/// Compiles and links shader programs with an explicit diagnostic policy.
///
/// In strict mode a compile or link failure is surfaced as a hard error with
/// the driver's log. Otherwise the failure is logged and the (possibly
/// broken) handle is returned anyway: broken visuals over a dead process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgramBuilder {
    strict: bool,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self { strict: false }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Compile one shader stage.
    pub fn compile_shader(
        &self,
        gl: &glow::Context,
        stage: ShaderStage,
        source: &str,
    ) -> Result<glow::Shader, ShaderError> {
        unsafe {
            let shader = gl
                .create_shader(stage.gl_type())
                .map_err(|msg| ShaderError::CreateShader {
                    stage: stage.name(),
                    msg,
                })?;

            gl.shader_source(shader, source);
            gl.compile_shader(shader);

            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                if self.strict {
                    gl.delete_shader(shader);
                    return Err(ShaderError::Compile {
                        stage: stage.name(),
                        log,
                    });
                }
                warn!("{} shader compile failed (tolerated): {}", stage.name(), log);
            }

            Ok(shader)
        }
    }

    /// Compile both stages and link them into a program.
    pub fn link(
        &self,
        gl: &glow::Context,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<glow::Program, ShaderError> {
        unsafe {
            let vs = self.compile_shader(gl, ShaderStage::Vertex, vertex_src)?;
            let fs = match self.compile_shader(gl, ShaderStage::Fragment, fragment_src) {
                Ok(fs) => fs,
                Err(e) => {
                    gl.delete_shader(vs);
                    return Err(e);
                }
            };

            let program = match gl.create_program() {
                Ok(p) => p,
                Err(msg) => {
                    gl.delete_shader(vs);
                    gl.delete_shader(fs);
                    return Err(ShaderError::CreateProgram(msg));
                }
            };

            gl.attach_shader(program, vs);
            gl.attach_shader(program, fs);
            gl.link_program(program);

            // Shader objects no longer needed after linking
            gl.delete_shader(vs);
            gl.delete_shader(fs);

            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                if self.strict {
                    gl.delete_program(program);
                    return Err(ShaderError::Link { log });
                }
                warn!("program link failed (tolerated): {}", log);
                return Ok(program);
            }

            info!("shader program linked");
            Ok(program)
        }
    }
}

/// Generate the per-frame camera transform matrix (top-left origin, y-down).
///
/// Maps world coordinates to NDC so that `(cam_x, cam_y)` lands at the
/// top-left of the output and one world unit covers `zoom` output pixels.
/// Column-major (OpenGL convention).
pub fn camera_transform(width: f32, height: f32, cam_x: f32, cam_y: f32, zoom: f32) -> [f32; 16] {
    [
        2.0 * zoom / width,
        0.0,
        0.0,
        0.0,
        0.0,
        -2.0 * zoom / height,
        0.0,
        0.0,
        0.0,
        0.0,
        -1.0,
        0.0,
        -2.0 * zoom * cam_x / width - 1.0,
        2.0 * zoom * cam_y / height + 1.0,
        0.0,
        1.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    // Column-major mat4 * (x, y, 0, 1)
    fn apply(m: &[f32; 16], x: f32, y: f32) -> (f32, f32) {
        (m[0] * x + m[4] * y + m[12], m[1] * x + m[5] * y + m[13])
    }

    #[test]
    fn test_identity_camera_maps_surface_corners() {
        let m = camera_transform(800.0, 600.0, 0.0, 0.0, 1.0);
        assert_eq!(apply(&m, 0.0, 0.0), (-1.0, 1.0));
        assert_eq!(apply(&m, 800.0, 600.0), (1.0, -1.0));
        assert_eq!(apply(&m, 400.0, 300.0), (0.0, 0.0));
    }

    #[test]
    fn test_camera_offset_and_zoom() {
        let m = camera_transform(800.0, 600.0, 10.0, 20.0, 2.0);
        // The camera position lands at the top-left corner
        assert_eq!(apply(&m, 10.0, 20.0), (-1.0, 1.0));
        // Half the surface in world units fills it at zoom 2
        let (x, y) = apply(&m, 10.0 + 400.0, 20.0 + 300.0);
        assert!((x - 1.0).abs() < 1e-6);
        assert!((y + 1.0).abs() < 1e-6);
    }
}
