//! Top-level renderer
//!
//! Owns the GL context and composes the batch pipeline: per-frame setup,
//! geometry emission, the optional post-processing pass, and presentation
//! onto a CPU surface. The caller owns the window and context lifecycle and
//! hands over an already-current `glow::Context`.
//!
//! All drawing is single-threaded and synchronous; draw-call order is
//! exactly emission order.

use std::time::Instant;

use anyhow::Result;
use glow::HasContext;
use log::info;

use crate::config::RendererConfig;
use crate::gpu::batch::SpriteRenderer;
use crate::gpu::postprocess::PostProcess;
use crate::gpu::shader::camera_transform;
use crate::gpu::surface::Surface;
use crate::gpu::texture::{FilterMode, Texture};
use crate::utils::color::parse_hex_color_to_f32;

/// Camera state feeding the per-frame transform. `(x, y)` is the world
/// coordinate at the top-left of the output; one world unit covers `zoom`
/// output pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// A CPU-side RGBA8 image, top-down rows. Stands in for the external
/// non-accelerated presentation surface.
#[derive(Debug, Clone)]
pub struct PixelSurface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }
}

/// The sprite-batching renderer.
pub struct Renderer {
    gl: glow::Context,
    config: RendererConfig,
    clear_color: (f32, f32, f32),
    sprite: SpriteRenderer,
    /// Accelerated surface all batches render into
    batch_surface: Surface,
    post: Option<PostProcess>,
    start: Instant,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Adopt an already-current GL context. This is the only fatal path:
    /// everything per-frame is unconditionally valid once setup succeeds.
    pub fn new(gl: glow::Context, width: u32, height: u32, config: RendererConfig) -> Result<Self> {
        unsafe {
            let version = gl.get_parameter_string(glow::VERSION);
            let renderer = gl.get_parameter_string(glow::RENDERER);
            let vendor = gl.get_parameter_string(glow::VENDOR);
            info!("OpenGL ES: {}", version);
            info!("Renderer: {}", renderer);
            info!("Vendor: {}", vendor);
        }

        let sprite = SpriteRenderer::new(&gl, config.strict_shaders)?;
        let batch_surface = Surface::new(&gl, width, height)?;
        let clear_color = parse_hex_color_to_f32(&config.clear_color);

        Ok(Self {
            gl,
            config,
            clear_color,
            sprite,
            batch_surface,
            post: None,
            start: Instant::now(),
            width,
            height,
        })
    }

    /// The wrapped GL context.
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Texture filtering derived from the configuration.
    pub fn filter_mode(&self) -> FilterMode {
        if self.config.pixel_perfect {
            FilterMode::Nearest
        } else {
            FilterMode::Linear
        }
    }

    /// Create a texture from raw RGBA pixels (or allocate-only when `None`).
    pub fn create_texture(
        &self,
        width: u32,
        height: u32,
        pixels: Option<&[u8]>,
    ) -> Result<Texture> {
        Texture::new(&self.gl, width, height, pixels, self.filter_mode())
    }

    /// Create a texture from an externally decoded image.
    pub fn create_texture_from_image(&self, image: &image::RgbaImage) -> Result<Texture> {
        Texture::from_image(&self.gl, image, self.filter_mode())
    }

    /// Per-frame setup: size the batch surface to the presentation target,
    /// clear it, rebind program/buffer/attribute state, and upload the frame
    /// transform computed from the camera.
    pub fn begin_frame(&mut self, width: u32, height: u32, camera: &Camera) {
        self.width = width;
        self.height = height;
        self.batch_surface.resize(&self.gl, width, height);
        self.batch_surface.bind(&self.gl);

        let (r, g, b) = self.clear_color;
        unsafe {
            self.gl.clear_color(r, g, b, 1.0);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }

        let transform =
            camera_transform(width as f32, height as f32, camera.x, camera.y, camera.zoom);
        self.sprite.begin_frame(&self.gl, &transform);
    }

    /// Emit a textured quad: center `(x, y)`, size `(w, h)`, rotation
    /// `angle` in radians, UV rect `uv0`..`uv1`, packed tint and additive
    /// colors. Flushes first when the shape would not fit or the blend mode
    /// changed.
    #[allow(clippy::too_many_arguments)]
    pub fn emit_quad(
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
        self.sprite
            .emit_quad(&self.gl, x, y, w, h, angle, uv0, uv1, color, additive);
    }

    /// Emit a flat-colored convex polygon. The fill rides in the additive
    /// channel (primary color zero), so the bound texture has no effect.
    pub fn emit_polygon(&mut self, points: &[[f32; 2]], color: u32) {
        self.sprite.emit_polygon(&self.gl, points, color);
    }

    /// Bind a texture for subsequent geometry (flushing if it changes).
    pub fn set_texture(&mut self, texture: &Texture) {
        self.sprite.set_texture(&self.gl, texture);
    }

    /// Request additive or standard alpha blending for subsequent geometry.
    pub fn set_blend_mode(&mut self, additive: bool) {
        self.sprite.set_blend_mode(additive);
    }

    /// Submit any pending batch.
    pub fn flush(&mut self) {
        self.sprite.flush(&self.gl);
    }

    /// Draw calls issued since the last `begin_frame`.
    pub fn draw_calls(&self) -> u32 {
        self.sprite.draw_calls()
    }

    /// Configure the post-processing stage. May happen at most once for the
    /// renderer's lifetime; configuring twice is a programming error.
    pub fn configure_post_process(
        &mut self,
        body: Option<&str>,
        include_overlay: bool,
    ) -> Result<()> {
        assert!(
            self.post.is_none(),
            "post-process stage is already configured"
        );
        let post = PostProcess::new(
            &self.gl,
            self.width,
            self.height,
            body,
            include_overlay,
            self.config.strict_shaders,
        )?;
        self.post = Some(post);
        Ok(())
    }

    /// Run the post-processing pass over the composited frame, into the
    /// default framebuffer. No-op when the stage is not configured.
    pub fn render_post_process(&mut self) {
        if self.post.is_none() {
            return;
        }
        self.sprite.flush(&self.gl);
        let elapsed = self.start.elapsed().as_secs_f32();
        if let Some(post) = self.post.as_mut() {
            post.render(&self.gl, &self.batch_surface, self.width, self.height, elapsed);
        }
    }

    /// Upload externally drawn overlay content. Ignored unless the
    /// post-process stage was configured with the overlay layer.
    pub fn update_overlay(&mut self, source: &PixelSurface) {
        if let Some(overlay) = self.post.as_ref().and_then(|p| p.overlay()) {
            overlay.upload_pixels(&self.gl, source.width, source.height, &source.pixels);
        }
    }

    /// Flush and copy the batch surface onto an external CPU surface. In
    /// overlay-present mode the batch surface is shown directly on the
    /// default framebuffer instead and the copy is skipped, unless
    /// `force_draw` insists on it.
    pub fn copy_to_surface(&mut self, dest: &mut PixelSurface, force_draw: bool) {
        self.sprite.flush(&self.gl);

        if self.config.overlay_present && !force_draw {
            self.batch_surface
                .blit_to_screen(&self.gl, self.width, self.height);
            return;
        }

        dest.width = self.width;
        dest.height = self.height;
        self.batch_surface.read_pixels(&self.gl, &mut dest.pixels);
    }

    /// Release all GL resources. The renderer is unusable afterwards.
    pub fn destroy(&mut self) {
        self.sprite.destroy(&self.gl);
        self.batch_surface.destroy(&self.gl);
        if let Some(post) = self.post.take() {
            post.destroy(&self.gl);
        }
    }
}
