// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Alexandre Severino
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use smallvec::SmallVec;

use crate::{
    geometry::{point::Point3, segment::Segment3, util::triangle_normal, vector::Vector3},
    kernel::{Sign, edge_plane_crossing, orient3d_sign},
};

#[derive(Clone, Debug, PartialEq)]
pub enum TriTriIntersection {
    /// The triangles cross along a segment of positive length.
    Proper(Segment3),
    /// Both triangles lie in the same plane.
    Coplanar,
    None,
}

impl TriTriIntersection {
    pub fn segment(&self) -> Option<&Segment3> {
        match self {
            TriTriIntersection::Proper(s) => Some(s),
            _ => None,
        }
    }
}

/// Points where the boundary of `tri` meets the plane of `other`. Vertices on
/// the plane are taken as they are; edges with a strict sign change
/// contribute their crossing point.
fn plane_crossings(
    tri: &[Point3; 3],
    other: &[Point3; 3],
    signs: &[Sign; 3],
) -> SmallVec<[Point3; 4]> {
    let mut pts = SmallVec::new();
    for i in 0..3 {
        let j = (i + 1) % 3;
        if signs[i].is_zero() {
            pts.push(tri[i]);
        }
        if signs[i] != Sign::Zero && signs[j] != Sign::Zero && signs[i] != signs[j] {
            let t = edge_plane_crossing(&other[0], &other[1], &other[2], &tri[i], &tri[j]);
            pts.push(tri[i].lerp(&tri[j], t));
        }
    }
    pts
}

fn side_signs(tri: &[Point3; 3], plane: &[Point3; 3]) -> [Sign; 3] {
    std::array::from_fn(|i| orient3d_sign(&plane[0], &plane[1], &plane[2], &tri[i]))
}

fn all_same_nonzero(s: &[Sign; 3]) -> bool {
    s[0] != Sign::Zero && s[0] == s[1] && s[1] == s[2]
}

/// Interval of `pts` along `dir`, with the points realising both ends.
fn interval(pts: &[Point3], dir: &Vector3) -> Option<((f64, Point3), (f64, Point3))> {
    let mut it = pts.iter().map(|p| (p.as_vector().dot(dir), *p));
    let first = it.next()?;
    let (mut lo, mut hi) = (first, first);
    for (t, p) in it {
        if t < lo.0 {
            lo = (t, p);
        }
        if t > hi.0 {
            hi = (t, p);
        }
    }
    Some((lo, hi))
}

/// Computes the segment along which triangles `p` and `q` intersect.
///
/// Touching contacts of zero length and coplanar configurations do not
/// produce a segment.
pub fn tri_tri_intersection(p: &[Point3; 3], q: &[Point3; 3]) -> TriTriIntersection {
    let sp = side_signs(p, q);
    if all_same_nonzero(&sp) {
        return TriTriIntersection::None;
    }
    if sp.iter().all(|s| s.is_zero()) {
        return TriTriIntersection::Coplanar;
    }

    let sq = side_signs(q, p);
    if all_same_nonzero(&sq) {
        return TriTriIntersection::None;
    }
    if sq.iter().all(|s| s.is_zero()) {
        return TriTriIntersection::Coplanar;
    }

    let dir = triangle_normal(p).cross(&triangle_normal(q));
    if dir.norm2() == 0.0 {
        return TriTriIntersection::None;
    }

    let cp = plane_crossings(p, q, &sp);
    let cq = plane_crossings(q, p, &sq);
    let (Some((plo, phi)), Some((qlo, qhi))) = (interval(&cp, &dir), interval(&cq, &dir)) else {
        return TriTriIntersection::None;
    };

    let lo = if plo.0 >= qlo.0 { plo } else { qlo };
    let hi = if phi.0 <= qhi.0 { phi } else { qhi };
    if hi.0 <= lo.0 {
        return TriTriIntersection::None;
    }

    let seg = Segment3::new(&lo.1, &hi.1);
    if seg.length2() == 0.0 {
        return TriTriIntersection::None;
    }
    TriTriIntersection::Proper(seg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> [Point3; 3] {
        [a.into(), b.into(), c.into()]
    }

    #[test]
    fn crossing_triangles_give_segment_on_both() {
        let p = tri([0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        let q = tri([0.5, -1.0, -1.0], [0.5, -1.0, 1.0], [0.5, 3.0, 0.0]);
        let seg = match tri_tri_intersection(&p, &q) {
            TriTriIntersection::Proper(s) => s,
            other => panic!("expected a proper segment, got {other:?}"),
        };
        assert!((seg.a[0] - 0.5).abs() < 1e-12);
        assert!((seg.b[0] - 0.5).abs() < 1e-12);
        assert!(seg.a[2].abs() < 1e-12 && seg.b[2].abs() < 1e-12);
        assert!(seg.length() > 0.5);
    }

    #[test]
    fn separated_triangles_do_not_intersect() {
        let p = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let q = tri([0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 2.0]);
        assert_eq!(tri_tri_intersection(&p, &q), TriTriIntersection::None);
    }

    #[test]
    fn coplanar_triangles_are_reported() {
        let p = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let q = tri([0.2, 0.2, 0.0], [1.0, 0.2, 0.0], [0.2, 1.0, 0.0]);
        assert_eq!(tri_tri_intersection(&p, &q), TriTriIntersection::Coplanar);
    }

    #[test]
    fn vertex_touch_has_no_length() {
        let p = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let q = tri([0.2, 0.2, 0.0], [0.2, 0.2, 1.0], [1.0, 1.0, 1.0]);
        assert_eq!(tri_tri_intersection(&p, &q), TriTriIntersection::None);
    }
}
