//! Pipeline behavior tests that need no GL context
//!
//! Drives the pure batch state machine the way the renderer does (check,
//! flush, append) and verifies the frame-level guarantees: batch splits,
//! vertex counts, blend commits, and the fixed shader protocol.

use spritegl::drawing::geometry::rotated_quad_corners;
use spritegl::gpu::batch::{BatchBuffer, MAX_BATCH_VERTICES, QUAD_VERTICES};
use spritegl::gpu::camera_transform;
use spritegl::gpu::postprocess::assemble_fragment_shader;
use spritegl::Rgba;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One recorded submission: (vertex count, additive blend)
type Draw = (usize, bool);

/// Mirrors SpriteRenderer's flush policy without a GPU.
struct SimRenderer {
    buffer: BatchBuffer,
    draws: Vec<Draw>,
}

impl SimRenderer {
    fn new() -> Self {
        Self {
            buffer: BatchBuffer::new(),
            draws: Vec::new(),
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        self.draws
            .push((self.buffer.len(), self.buffer.committed_additive()));
        self.buffer.reset();
    }

    fn quad(&mut self, color: u32) {
        if self.buffer.must_flush_before(QUAD_VERTICES) {
            self.flush();
        }
        self.buffer
            .append_quad(0.0, 0.0, 1.0, 1.0, 0.0, [0.0, 0.0], [1.0, 1.0], color, 0);
    }

    fn polygon(&mut self, points: &[[f32; 2]], color: u32) {
        if self.buffer.must_flush_before(points.len() + 2) {
            self.flush();
        }
        self.buffer.append_polygon(points, color);
    }
}

#[test]
fn mixed_frame_splits_only_on_blend_changes() {
    init_logger();
    let mut sim = SimRenderer::new();
    let white = Rgba::WHITE.pack();

    // Standard-alpha sprites, then a glow pass, then back
    for _ in 0..5 {
        sim.quad(white);
    }
    sim.buffer.set_blend_mode(true);
    sim.quad(white);
    sim.polygon(&[[0.0, 0.0], [8.0, 0.0], [8.0, 6.0], [0.0, 6.0], [-2.0, 3.0]], white);
    sim.buffer.set_blend_mode(false);
    sim.quad(white);
    sim.flush();

    // Three homogeneous batches in emission order
    assert_eq!(
        sim.draws,
        vec![
            (5 * QUAD_VERTICES, false),
            (QUAD_VERTICES + 5 + 2, true),
            (QUAD_VERTICES, false),
        ]
    );
}

#[test]
fn capacity_eviction_never_splits_a_shape() {
    init_logger();
    let mut sim = SimRenderer::new();
    let tint = Rgba::new(255, 0, 0, 255).pack();

    let total_quads = MAX_BATCH_VERTICES / QUAD_VERTICES + 3;
    for _ in 0..total_quads {
        sim.quad(tint);
    }
    sim.flush();

    let flushed: usize = sim.draws.iter().map(|(n, _)| n).sum();
    assert_eq!(flushed, total_quads * QUAD_VERTICES);
    for (n, _) in &sim.draws {
        assert!(*n <= MAX_BATCH_VERTICES);
        // Strip shapes are whole: every batch is a multiple of a quad
        assert_eq!(n % QUAD_VERTICES, 0);
    }
}

#[test]
fn emitted_quad_maps_through_camera_to_ndc() {
    init_logger();
    // A 100x50 quad centered in a 800x600 view under the identity camera
    let corners = rotated_quad_corners(400.0, 300.0, 100.0, 50.0, 0.0);
    let m = camera_transform(800.0, 600.0, 0.0, 0.0, 1.0);

    let apply =
        |p: [f32; 2]| -> (f32, f32) { (m[0] * p[0] + m[12], m[5] * p[1] + m[13]) };

    let (x0, y0) = apply(corners[0]); // top-left
    let (x1, y1) = apply(corners[2]); // bottom-right
    assert!((x0 - (-0.125)).abs() < 1e-6);
    assert!((y0 - (1.0 / 12.0)).abs() < 1e-6);
    assert!((x1 - 0.125).abs() < 1e-6);
    assert!((y1 + (1.0 / 12.0)).abs() < 1e-6);
}

#[test]
fn post_process_shader_protocol_is_stable() {
    init_logger();
    // The wrapper guarantees these names to every user-supplied body
    let src = assemble_fragment_shader(Some(
        "void mainImage(out vec4 color, vec2 fragCoord) {\n    vec2 uv = fragCoord / resolution.xy;\n    color = texture(inputFrame, uv) * abs(sin(elapsedTime));\n}",
    ));
    assert!(src.starts_with("#version 300 es"));
    assert!(src.contains("uniform sampler2D inputFrame;"));
    assert!(src.contains("uniform vec3 resolution;"));
    assert!(src.contains("uniform float elapsedTime;"));
    assert!(src.contains("mainImage(color, gl_FragCoord.xy);"));

    // The default body samples the frame unchanged
    let default_src = assemble_fragment_shader(None);
    assert!(default_src.contains("color = texture(inputFrame, fragCoord / resolution.xy);"));
}

#[test]
fn flat_polygons_survive_any_bound_texture() {
    init_logger();
    let mut sim = SimRenderer::new();
    let tint = Rgba::new(32, 64, 96, 200).pack();
    sim.polygon(&[[0.0, 0.0], [10.0, 0.0], [5.0, 8.0]], tint);

    // texture * 0 + additive == additive: the sampled texel cannot leak in
    for v in sim.buffer.vertices() {
        assert_eq!(v.color, 0);
        assert_eq!(v.additive, tint);
        assert_eq!((v.u, v.v), (0.0, 0.0));
    }
    assert_eq!(sim.buffer.len(), 5);
}
