//! GPU rendering with OpenGL ES
//!
//! Handles:
//! - Shader program compilation and linking
//! - Sprite batch accumulation and submission
//! - Texture resources and offscreen surfaces
//! - The full-screen post-processing pass

pub mod batch;
pub mod postprocess;
pub mod shader;
pub mod surface;
pub mod texture;

pub use batch::{BatchBuffer, SpriteRenderer, Vertex, MAX_BATCH_VERTICES, QUAD_VERTICES};
pub use postprocess::PostProcess;
pub use shader::{camera_transform, ProgramBuilder, ShaderError, ShaderStage};
pub use surface::Surface;
pub use texture::{FilterMode, Texture};

/// Convert &[T] to &[u8]
pub(crate) fn cast_slice<T>(slice: &[T]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            slice.as_ptr() as *const u8,
            slice.len() * std::mem::size_of::<T>(),
        )
    }
}
