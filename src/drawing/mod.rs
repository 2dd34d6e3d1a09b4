//! Shape emission geometry
//!
//! Pure-CPU helpers shared by the geometry emitters: strip orderings with
//! degenerate connector duplicates, and rotated quad corner math.

pub mod geometry;

pub use geometry::{rotated_quad_corners, strip_order, strip_with_degenerates};
