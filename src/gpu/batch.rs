//! Sprite batch accumulation and submission
//!
//! The batch buffer is the renderer's core state machine: a fixed-capacity
//! interleaved vertex buffer plus the blend/texture state that decides when
//! accumulated geometry must be submitted. Shapes are strip-encoded with
//! degenerate connector triangles so an entire batch is one draw call, and
//! insertion order is render order: visibility is painter's algorithm, not
//! depth testing.
//!
//! `BatchBuffer` is pure CPU state so the flush policy can be tested without
//! a GL context; `SpriteRenderer` wraps it with the actual GL objects and
//! submission.

use anyhow::Result;
use glow::HasContext;
use log::info;

use crate::drawing::geometry::{rotated_quad_corners, strip_with_degenerates};
use crate::gpu::cast_slice;
use crate::gpu::shader::{self, ProgramBuilder};
use crate::gpu::texture::Texture;

/// Maximum vertices per batch. The CPU vector and the GL buffer are both
/// sized to this once at init and never reallocated.
pub const MAX_BATCH_VERTICES: usize = 4096;

/// Vertices a quad contributes to the strip (4 corners + 2 duplicates).
pub const QUAD_VERTICES: usize = 6;

/// One interleaved vertex: 16 bytes of float geometry followed by two packed
/// colors, 24 bytes total. Every emitter writes this same layout, so a flush
/// is a single upload of the populated prefix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
    /// Multiplicative tint, packed 0xAABBGGRR
    pub color: u32,
    /// Additive color, packed 0xAABBGGRR
    pub additive: u32,
}

pub const VERTEX_STRIDE: usize = std::mem::size_of::<Vertex>();

/// Pure-CPU batch state: vertex accumulation plus blend and texture
/// tracking. All transitions are driven by the owning renderer in
/// check-then-flush-then-append order, so a shape is never split across two
/// draw calls and a batch is always blend-homogeneous.
pub struct BatchBuffer {
    vertices: Vec<Vertex>,
    /// Blend mode requested by the caller; takes effect at the next batch
    requested_additive: bool,
    /// Blend mode the in-flight batch was opened with
    committed_additive: bool,
    /// Texture the in-flight batch samples through
    texture: Option<glow::Texture>,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self {
            vertices: Vec::with_capacity(MAX_BATCH_VERTICES),
            requested_additive: false,
            committed_additive: false,
            texture: None,
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn requested_additive(&self) -> bool {
        self.requested_additive
    }

    pub fn committed_additive(&self) -> bool {
        self.committed_additive
    }

    /// Request a blend mode. Does not flush by itself; the next append or
    /// flush reconciles the change.
    pub fn set_blend_mode(&mut self, additive: bool) {
        self.requested_additive = additive;
    }

    pub fn texture(&self) -> Option<glow::Texture> {
        self.texture
    }

    /// Record the texture the following geometry samples through. The owner
    /// must have flushed already if it differed.
    pub fn record_texture(&mut self, texture: glow::Texture) {
        self.texture = Some(texture);
    }

    /// Whether the in-flight batch must be submitted before appending
    /// `incoming` more vertices: either they would not fit, or the requested
    /// blend mode no longer matches the one the batch was opened with.
    pub fn must_flush_before(&self, incoming: usize) -> bool {
        if self.vertices.len() + incoming > MAX_BATCH_VERTICES {
            return true;
        }
        !self.vertices.is_empty() && self.requested_additive != self.committed_additive
    }

    /// Clear the accumulated vertices and open the next batch under the
    /// currently requested blend mode.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.committed_additive = self.requested_additive;
    }

    /// Append a strip-encoded quad: center `(x, y)`, size `(w, h)`, rotated
    /// by `angle` radians, textured with the UV rect `uv0`..`uv1`. Exactly
    /// `QUAD_VERTICES` vertices.
    pub fn append_quad(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        angle: f32,
        uv0: [f32; 2],
        uv1: [f32; 2],
        color: u32,
        additive: u32,
    ) {
        debug_assert!(!self.must_flush_before(QUAD_VERTICES));
        self.adopt_blend_if_empty();

        let corners = rotated_quad_corners(x, y, w, h, angle);
        let uvs = [
            [uv0[0], uv0[1]],
            [uv1[0], uv0[1]],
            [uv1[0], uv1[1]],
            [uv0[0], uv1[1]],
        ];
        for i in strip_with_degenerates(4) {
            self.vertices.push(Vertex {
                x: corners[i][0],
                y: corners[i][1],
                u: uvs[i][0],
                v: uvs[i][1],
                color,
                additive,
            });
        }
    }

    /// Append a flat-filled convex polygon: `points.len() + 2` vertices.
    ///
    /// The fill color rides entirely in the additive channel with the
    /// primary color forced to zero, so `texture * color + additive`
    /// collapses to the flat tint no matter which texture is bound.
    /// Textured, colored polygons are deliberately unsupported under this
    /// scheme.
    pub fn append_polygon(&mut self, points: &[[f32; 2]], color: u32) {
        debug_assert!(points.len() >= 3, "a polygon needs at least 3 points");
        debug_assert!(
            points.len() + 2 <= MAX_BATCH_VERTICES,
            "polygon exceeds batch capacity"
        );
        debug_assert!(!self.must_flush_before(points.len() + 2));
        self.adopt_blend_if_empty();

        for i in strip_with_degenerates(points.len()) {
            self.vertices.push(Vertex {
                x: points[i][0],
                y: points[i][1],
                u: 0.0,
                v: 0.0,
                color: 0,
                additive: color,
            });
        }
    }

    /// An empty buffer has no batch to be homogeneous with: the first shape
    /// opens the batch under the requested mode. (Flush on an empty buffer
    /// is a strict no-op, so the commit has to happen here.)
    fn adopt_blend_if_empty(&mut self) {
        if self.vertices.is_empty() {
            self.committed_additive = self.requested_additive;
        }
    }
}

impl Default for BatchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// GL-side sprite batch renderer: owns the batch program, vertex buffer and
/// attribute layout, and submits `BatchBuffer` contents in flush order.
pub struct SpriteRenderer {
    program: glow::Program,
    u_transform: Option<glow::UniformLocation>,
    u_texture: Option<glow::UniformLocation>,
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    buffer: BatchBuffer,
    /// Draw calls issued since the last begin_frame
    draw_calls: u32,
}

impl SpriteRenderer {
    /// Compile the batch program and allocate the vertex buffer. Called once
    /// at renderer construction; the buffer is never resized afterwards.
    pub fn new(gl: &glow::Context, strict_shaders: bool) -> Result<Self> {
        let program = ProgramBuilder::new().strict(strict_shaders).link(
            gl,
            shader::BATCH_VERTEX_SHADER,
            shader::BATCH_FRAGMENT_SHADER,
        )?;

        unsafe {
            // Uniform locations are absent on a tolerated-broken program;
            // passing None to the uniform calls keeps them inert.
            let u_transform = gl.get_uniform_location(program, "u_transform");
            let u_texture = gl.get_uniform_location(program, "u_texture");

            let vao = gl
                .create_vertex_array()
                .map_err(|e| anyhow::anyhow!("Failed to create batch VAO: {}", e))?;
            gl.bind_vertex_array(Some(vao));

            let vbo = gl
                .create_buffer()
                .map_err(|e| anyhow::anyhow!("Failed to create batch VBO: {}", e))?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_size(
                glow::ARRAY_BUFFER,
                (MAX_BATCH_VERTICES * VERTEX_STRIDE) as i32,
                glow::DYNAMIC_DRAW,
            );

            Self::bind_vertex_layout(gl);

            gl.bind_vertex_array(None);

            info!(
                "Sprite renderer initialized (capacity {} vertices)",
                MAX_BATCH_VERTICES
            );

            Ok(Self {
                program,
                u_transform,
                u_texture,
                vao,
                vbo,
                buffer: BatchBuffer::new(),
                draw_calls: 0,
            })
        }
    }

    /// Set the interleaved vertex attribute layout on the bound VAO/VBO:
    /// position + uv as 4 floats, the two packed colors as 4 normalized
    /// unsigned bytes each, fixed 24-byte stride.
    fn bind_vertex_layout(gl: &glow::Context) {
        let stride = VERTEX_STRIDE as i32;
        unsafe {
            // a_pos: location=0, vec2 (offset 0)
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, 0);

            // a_uv: location=1, vec2 (offset 8)
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, 8);

            // a_color: location=2, 4 x normalized u8 (offset 16)
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 4, glow::UNSIGNED_BYTE, true, stride, 16);

            // a_add_color: location=3, 4 x normalized u8 (offset 20)
            gl.enable_vertex_attrib_array(3);
            gl.vertex_attrib_pointer_f32(3, 4, glow::UNSIGNED_BYTE, true, stride, 20);
        }
    }

    /// Per-frame GPU state setup: bind the batch program and texture unit,
    /// rebind the vertex buffer and re-assert its layout, upload the frame
    /// transform, and reset the batch to empty.
    pub fn begin_frame(&mut self, gl: &glow::Context, transform: &[f32; 16]) {
        unsafe {
            gl.use_program(Some(self.program));
            gl.uniform_1_i32(self.u_texture.as_ref(), 0);
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, self.buffer.texture());

            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            Self::bind_vertex_layout(gl);

            gl.uniform_matrix_4_f32_slice(self.u_transform.as_ref(), false, transform);
        }
        self.buffer.reset();
        self.draw_calls = 0;
    }

    /// Emit a textured, tinted, rotated quad centered at `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn emit_quad(
        &mut self,
        gl: &glow::Context,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        angle: f32,
        uv0: [f32; 2],
        uv1: [f32; 2],
        color: u32,
        additive: u32,
    ) {
        if self.buffer.must_flush_before(QUAD_VERTICES) {
            self.flush(gl);
        }
        self.buffer
            .append_quad(x, y, w, h, angle, uv0, uv1, color, additive);
    }

    /// Emit a flat-colored convex polygon (see [`BatchBuffer::append_polygon`]).
    pub fn emit_polygon(&mut self, gl: &glow::Context, points: &[[f32; 2]], color: u32) {
        if self.buffer.must_flush_before(points.len() + 2) {
            self.flush(gl);
        }
        self.buffer.append_polygon(points, color);
    }

    /// Bind a texture for subsequent geometry. A no-op when already bound;
    /// otherwise the pending batch is submitted first. Texture switches are
    /// never deferred.
    pub fn set_texture(&mut self, gl: &glow::Context, texture: &Texture) {
        if self.buffer.texture() == Some(texture.raw()) {
            return;
        }
        self.flush(gl);
        self.buffer.record_texture(texture.raw());
        texture.bind(gl, 0);
    }

    /// Request a blend mode for subsequent geometry; reconciled lazily.
    pub fn set_blend_mode(&mut self, additive: bool) {
        self.buffer.set_blend_mode(additive);
    }

    /// Submit the accumulated batch: one upload of the populated prefix and
    /// one triangle-strip draw, under the blend mode the batch was opened
    /// with. No-op when empty.
    pub fn flush(&mut self, gl: &glow::Context) {
        if self.buffer.is_empty() {
            return;
        }

        let dst_factor = if self.buffer.committed_additive() {
            glow::ONE
        } else {
            glow::ONE_MINUS_SRC_ALPHA
        };

        unsafe {
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, dst_factor);

            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, cast_slice(self.buffer.vertices()));

            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, self.buffer.len() as i32);
        }

        self.draw_calls += 1;
        self.buffer.reset();
    }

    /// Draw calls issued since the last `begin_frame`.
    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    pub fn buffer(&self) -> &BatchBuffer {
        &self.buffer
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.program);
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::color::Rgba;

    // Mirrors SpriteRenderer's submission logic without a GL context:
    // records (vertex count, committed blend) per simulated draw call.
    fn flush_sim(buf: &mut BatchBuffer, draws: &mut Vec<(usize, bool)>) {
        if buf.is_empty() {
            return;
        }
        draws.push((buf.len(), buf.committed_additive()));
        buf.reset();
    }

    fn quad_sim(buf: &mut BatchBuffer, draws: &mut Vec<(usize, bool)>) {
        if buf.must_flush_before(QUAD_VERTICES) {
            flush_sim(buf, draws);
        }
        buf.append_quad(0.0, 0.0, 2.0, 2.0, 0.0, [0.0, 0.0], [1.0, 1.0], 0xFFFFFFFF, 0);
    }

    #[test]
    fn test_quads_accumulate_into_one_draw() {
        let mut buf = BatchBuffer::new();
        let mut draws = Vec::new();
        for _ in 0..10 {
            quad_sim(&mut buf, &mut draws);
        }
        assert!(draws.is_empty());
        flush_sim(&mut buf, &mut draws);
        assert_eq!(draws, vec![(60, false)]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_capacity_overflow_flushes_first() {
        let mut buf = BatchBuffer::new();
        let mut draws = Vec::new();
        let full_quads = MAX_BATCH_VERTICES / QUAD_VERTICES; // 682 -> 4092 vertices
        for _ in 0..full_quads {
            quad_sim(&mut buf, &mut draws);
        }
        assert!(draws.is_empty());
        assert_eq!(buf.len(), full_quads * QUAD_VERTICES);

        // The next quad no longer fits: the batch is submitted first and the
        // new shape alone opens the next one.
        quad_sim(&mut buf, &mut draws);
        assert_eq!(draws, vec![(full_quads * QUAD_VERTICES, false)]);
        assert_eq!(buf.len(), QUAD_VERTICES);
        assert!(buf.len() <= MAX_BATCH_VERTICES);
    }

    #[test]
    fn test_blend_change_splits_batches() {
        let mut buf = BatchBuffer::new();
        let mut draws = Vec::new();

        quad_sim(&mut buf, &mut draws);
        buf.set_blend_mode(true);
        quad_sim(&mut buf, &mut draws);

        // The first batch went out under the mode it was opened with
        assert_eq!(draws, vec![(QUAD_VERTICES, false)]);
        // The second quad landed in a fresh additive batch
        assert_eq!(buf.len(), QUAD_VERTICES);
        assert!(buf.committed_additive());

        flush_sim(&mut buf, &mut draws);
        assert_eq!(draws[1], (QUAD_VERTICES, true));
    }

    #[test]
    fn test_blend_change_on_empty_buffer_adopts_without_flush() {
        let mut buf = BatchBuffer::new();
        let mut draws = Vec::new();

        buf.set_blend_mode(true);
        quad_sim(&mut buf, &mut draws);

        assert!(draws.is_empty());
        assert!(buf.committed_additive());
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let mut buf = BatchBuffer::new();
        let mut draws = Vec::new();
        buf.set_blend_mode(true);

        flush_sim(&mut buf, &mut draws);
        assert!(draws.is_empty());
        assert_eq!(buf.len(), 0);
        // Untouched: still requesting additive, still committed standard
        assert!(buf.requested_additive());
        assert!(!buf.committed_additive());
    }

    #[test]
    fn test_texture_switch_flushes_once() {
        let tex_a = glow::NativeTexture(std::num::NonZeroU32::new(1).unwrap());
        let tex_b = glow::NativeTexture(std::num::NonZeroU32::new(2).unwrap());

        let mut buf = BatchBuffer::new();
        let mut draws = Vec::new();
        buf.record_texture(tex_a);
        quad_sim(&mut buf, &mut draws);

        // Same texture: no flush
        if buf.texture() != Some(tex_a) {
            flush_sim(&mut buf, &mut draws);
            buf.record_texture(tex_a);
        }
        assert!(draws.is_empty());

        // Different texture: exactly one flush
        if buf.texture() != Some(tex_b) {
            flush_sim(&mut buf, &mut draws);
            buf.record_texture(tex_b);
        }
        assert_eq!(draws.len(), 1);
        assert_eq!(buf.texture(), Some(tex_b));
    }

    #[test]
    fn test_polygon_rides_additive_channel() {
        let mut buf = BatchBuffer::new();
        let tint = Rgba::new(10, 200, 30, 255).pack();
        buf.append_polygon(&[[0.0, 0.0], [4.0, 0.0], [2.0, 3.0]], tint);

        assert_eq!(buf.len(), 5);
        for v in buf.vertices() {
            assert_eq!((v.u, v.v), (0.0, 0.0));
            assert_eq!(v.color, 0);
            assert_eq!(v.additive, tint);
        }
    }

    #[test]
    fn test_quad_strip_shape() {
        let mut buf = BatchBuffer::new();
        buf.append_quad(
            1.0,
            2.0,
            2.0,
            4.0,
            0.0,
            [0.1, 0.2],
            [0.9, 0.8],
            Rgba::WHITE.pack(),
            0,
        );
        let v = buf.vertices();
        assert_eq!(v.len(), QUAD_VERTICES);
        // Leading and trailing duplicates frame the 4 corners
        assert_eq!((v[0].x, v[0].y), (v[1].x, v[1].y));
        assert_eq!((v[4].x, v[4].y), (v[5].x, v[5].y));
        // Strip zigzag: top-left, top-right, bottom-left, bottom-right
        assert_eq!((v[1].x, v[1].y), (0.0, 0.0));
        assert_eq!((v[2].x, v[2].y), (2.0, 0.0));
        assert_eq!((v[3].x, v[3].y), (0.0, 4.0));
        assert_eq!((v[4].x, v[4].y), (2.0, 4.0));
        // UV rect follows the corners
        assert_eq!((v[1].u, v[1].v), (0.1, 0.2));
        assert_eq!((v[2].u, v[2].v), (0.9, 0.2));
        assert_eq!((v[3].u, v[3].v), (0.1, 0.8));
        assert_eq!((v[4].u, v[4].v), (0.9, 0.8));
    }

    #[test]
    fn test_vertex_stride() {
        assert_eq!(VERTEX_STRIDE, 24);
    }
}
