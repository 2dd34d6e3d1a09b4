//! Texture resources
//!
//! Wraps creation of 2D textures from externally decoded RGBA data. The
//! batch samples everything through a single bound texture, and the
//! post-process stage uses an uninitialized texture as per-frame scratch.

use anyhow::{anyhow, Result};
use glow::HasContext;
use log::info;

/// Texture filtering mode.
///
/// `Nearest` is selected when pixel-accurate rendering is requested; wrap is
/// always clamp-to-edge regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Linear,
    Nearest,
}

impl FilterMode {
    fn gl_filter(self) -> i32 {
        match self {
            FilterMode::Linear => glow::LINEAR as i32,
            FilterMode::Nearest => glow::NEAREST as i32,
        }
    }
}

/// A 2D RGBA texture.
pub struct Texture {
    raw: glow::Texture,
    width: u32,
    height: u32,
}

impl Texture {
    /// Allocate a texture, uploading `pixels` when a nonzero-sized image is
    /// supplied. A zero-sized image yields an allocated texture object with
    /// undefined storage (the post-process scratch case); `pixels = None`
    /// with nonzero dimensions allocates uninitialized storage.
    pub fn new(
        gl: &glow::Context,
        width: u32,
        height: u32,
        pixels: Option<&[u8]>,
        filter: FilterMode,
    ) -> Result<Self> {
        if let Some(data) = pixels {
            debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        }

        unsafe {
            let raw = gl
                .create_texture()
                .map_err(|e| anyhow!("Failed to create texture: {}", e))?;
            gl.bind_texture(glow::TEXTURE_2D, Some(raw));

            if width > 0 && height > 0 {
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    glow::RGBA as i32,
                    width as i32,
                    height as i32,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    pixels,
                );
            }

            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter.gl_filter());
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter.gl_filter());
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

            info!("Texture created: {}x{}", width, height);
            Ok(Self { raw, width, height })
        }
    }

    /// Upload a decoded image.
    pub fn from_image(
        gl: &glow::Context,
        image: &image::RgbaImage,
        filter: FilterMode,
    ) -> Result<Self> {
        Self::new(
            gl,
            image.width(),
            image.height(),
            Some(image.as_raw().as_slice()),
            filter,
        )
    }

    /// Bind to the given texture unit.
    pub fn bind(&self, gl: &glow::Context, unit: u32) {
        unsafe {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.raw));
        }
    }

    /// (Re)allocate storage without pixel data. Used by the post-process
    /// stage when the output size changes.
    pub(crate) fn allocate(&mut self, gl: &glow::Context, width: u32, height: u32) {
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(self.raw));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
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
    }

    pub fn raw(&self) -> glow::Texture {
        self.raw
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_texture(self.raw);
        }
    }
}
