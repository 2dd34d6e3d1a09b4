//! Geometric helpers for strip-encoded shape emission
//!
//! All shapes are drawn as one triangle strip per batch. Independent shapes
//! share the strip by duplicating their first and last vertex, which inserts
//! zero-area connector triangles between neighbors. These helpers produce the
//! exact vertex orderings the emitters append to the batch buffer.

/// Iterator over the strip ordering of a convex ring of `n` points.
///
/// A convex polygon given in ring order (p0, p1, .., pn-1) does not fill
/// correctly when emitted as a strip in that order; the strip has to zigzag
/// from both ends of the ring: 0, 1, n-1, 2, n-2, ..
///
/// Yields exactly `n` indices.
pub fn strip_order(n: usize) -> StripOrder {
    debug_assert!(n >= 3, "a strip shape needs at least 3 points");
    StripOrder {
        lo: 1,
        hi: n.saturating_sub(1),
        from_lo: true,
        first: true,
    }
}

pub struct StripOrder {
    lo: usize,
    hi: usize,
    from_lo: bool,
    first: bool,
}

impl Iterator for StripOrder {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.first {
            self.first = false;
            return Some(0);
        }
        if self.lo > self.hi {
            return None;
        }
        if self.from_lo {
            self.from_lo = false;
            self.lo += 1;
            Some(self.lo - 1)
        } else {
            self.from_lo = true;
            self.hi -= 1;
            Some(self.hi + 1)
        }
    }
}

/// Strip ordering with the leading and trailing index duplicated.
///
/// This is the sequence a shape contributes to the shared strip: the
/// duplicates collapse into degenerate triangles against whatever precedes
/// and follows the shape in the same batch. Yields `n + 2` indices.
pub fn strip_with_degenerates(n: usize) -> impl Iterator<Item = usize> {
    // The strip ordering always begins at index 0; the trailing duplicate is
    // whatever index the zigzag ends on.
    let tail = strip_order(n).last();
    std::iter::once(0).chain(strip_order(n)).chain(tail)
}

/// Corner positions of a rotated rectangle, in ring order
/// (top-left, top-right, bottom-right, bottom-left).
///
/// `(cx, cy)` is the shape center; `angle` is in radians. The half-extents
/// are rotated about the center with a single sin/cos evaluation, so the
/// per-shape transform cost is constant rather than per-vertex.
/// Coordinates are y-down (screen space).
#[inline]
pub fn rotated_quad_corners(cx: f32, cy: f32, w: f32, h: f32, angle: f32) -> [[f32; 2]; 4] {
    let (s, c) = angle.sin_cos();
    let hw = w * 0.5;
    let hh = h * 0.5;
    // Rotated half-extent vectors along the shape's local x and y axes
    let rx = hw * c;
    let ry = hw * s;
    let ux = -hh * s;
    let uy = hh * c;
    [
        [cx - rx - ux, cy - ry - uy], // top-left
        [cx + rx - ux, cy + ry - uy], // top-right
        [cx + rx + ux, cy + ry + uy], // bottom-right
        [cx - rx + ux, cy - ry + uy], // bottom-left
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_order(n: usize) -> Vec<usize> {
        strip_order(n).collect()
    }

    #[test]
    fn test_strip_order_small_rings() {
        assert_eq!(collect_order(3), vec![0, 1, 2]);
        assert_eq!(collect_order(4), vec![0, 1, 3, 2]);
        assert_eq!(collect_order(5), vec![0, 1, 4, 2, 3]);
        assert_eq!(collect_order(6), vec![0, 1, 5, 2, 4, 3]);
    }

    #[test]
    fn test_strip_with_degenerates_counts() {
        for n in 3..=8 {
            let seq: Vec<usize> = strip_with_degenerates(n).collect();
            assert_eq!(seq.len(), n + 2);
            // Leading and trailing duplicates
            assert_eq!(seq[0], seq[1]);
            assert_eq!(seq[n], seq[n + 1]);
        }
    }

    #[test]
    fn test_strip_with_degenerates_sequences() {
        let tri: Vec<usize> = strip_with_degenerates(3).collect();
        assert_eq!(tri, vec![0, 0, 1, 2, 2]);
        let quad: Vec<usize> = strip_with_degenerates(4).collect();
        assert_eq!(quad, vec![0, 0, 1, 3, 2, 2]);
        let penta: Vec<usize> = strip_with_degenerates(5).collect();
        assert_eq!(penta, vec![0, 0, 1, 4, 2, 3, 3]);
    }

    #[test]
    fn test_quad_corners_unrotated() {
        let c = rotated_quad_corners(10.0, 20.0, 4.0, 6.0, 0.0);
        assert_eq!(c[0], [8.0, 17.0]); // top-left
        assert_eq!(c[1], [12.0, 17.0]); // top-right
        assert_eq!(c[2], [12.0, 23.0]); // bottom-right
        assert_eq!(c[3], [8.0, 23.0]); // bottom-left
    }

    #[test]
    fn test_quad_corners_quarter_turn() {
        let c = rotated_quad_corners(0.0, 0.0, 4.0, 6.0, std::f32::consts::FRAC_PI_2);
        // (±2, ±3) rotated a quarter turn becomes (∓3, ±2)
        let expect = [[3.0, -2.0], [3.0, 2.0], [-3.0, 2.0], [-3.0, -2.0]];
        for (got, want) in c.iter().zip(expect.iter()) {
            assert!((got[0] - want[0]).abs() < 1e-5, "{:?} vs {:?}", c, expect);
            assert!((got[1] - want[1]).abs() < 1e-5, "{:?} vs {:?}", c, expect);
        }
    }
}
