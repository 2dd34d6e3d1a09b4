//! spritegl - GPU sprite-batching renderer for OpenGL ES
//!
//! Accumulates textured, colored, rotated quads and flat convex polygons
//! into one shared vertex buffer and submits them to the GPU in as few
//! triangle-strip draw calls as possible. An optional full-screen
//! post-processing pass runs a user-supplied fragment shader over the
//! composited frame before presentation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               Frame Lifecycle                │
//! ├──────────────────────────────────────────────┤
//! │  emit_quad / emit_polygon  →  Batch Buffer   │
//! │            (capacity / state trigger)        │
//! │                     ↓                        │
//! │        Flush (upload + one strip draw)       │
//! │                     ↓                        │
//! │        Post-Process (optional, 1x/frame)     │
//! │                     ↓                        │
//! │             Presentation surface             │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Window and GL context lifecycle, asset decoding, and the game loop are
//! the caller's: construct a [`Renderer`] from an already-current
//! [`glow::Context`] and drive it once per frame with
//! [`Renderer::begin_frame`], any number of emits, then
//! [`Renderer::render_post_process`] and [`Renderer::copy_to_surface`].
//!
//! Draw order is emission order (painter's algorithm); there is no depth
//! buffer. Batches split only when the blend mode or bound texture changes,
//! or the fixed vertex capacity would overflow.

pub mod config;
pub mod drawing;
pub mod gpu;
pub mod renderer;
pub mod utils;

pub use config::RendererConfig;
pub use gpu::{FilterMode, ShaderError, Texture, MAX_BATCH_VERTICES};
pub use renderer::{Camera, PixelSurface, Renderer};
pub use utils::color::Rgba;
