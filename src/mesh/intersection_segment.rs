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

use crate::{
    geometry::{
        point::{Point2, Point3},
        segment::Segment3,
        tri_tri_intersect::{TriTriIntersection, tri_tri_intersection},
        util::{barycentric_coords, interpolate_param},
    },
    kernel::{edge_plane_crossing, orient3d_sign},
    mesh::{patch::PatchId, triangle_set::TriangleSet},
};

/// Which end of a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum End {
    Source,
    Target,
}

/// Nearest pair of ends between two segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Connection {
    SourceSource,
    SourceTarget,
    TargetSource,
    TargetTarget,
}

/// One triangle-pair crossing.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionSegment {
    /// Global triangle indices; the first belongs to the lower-sorted patch.
    pub tri: [usize; 2],
    pub src: Point3,
    pub tgt: Point3,
    /// Supplied explicitly instead of computed.
    pub enforced: bool,
    /// Topology nodes, `usize::MAX` until merged.
    pub nodes: [usize; 2],
}

fn ordered(a: usize, b: usize, tris: &TriangleSet) -> [usize; 2] {
    let (pa, pb) = (tris.get(a).patch, tris.get(b).patch);
    if (pa, a) <= (pb, b) { [a, b] } else { [b, a] }
}

impl IntersectionSegment {
    /// Untested pair; call [`intersect`](Self::intersect) to fill the ends.
    pub fn new(a: usize, b: usize, tris: &TriangleSet) -> Self {
        Self {
            tri: ordered(a, b, tris),
            src: Point3::zero(),
            tgt: Point3::zero(),
            enforced: false,
            nodes: [usize::MAX; 2],
        }
    }

    /// Segment with known ends between triangles `a` and `b`.
    pub fn enforced(a: usize, b: usize, src: Point3, tgt: Point3, tris: &TriangleSet) -> Self {
        Self {
            tri: ordered(a, b, tris),
            src,
            tgt,
            enforced: true,
            nodes: [usize::MAX; 2],
        }
    }

    pub fn patches(&self, tris: &TriangleSet) -> [PatchId; 2] {
        [tris.get(self.tri[0]).patch, tris.get(self.tri[1]).patch]
    }

    pub fn segment(&self) -> Segment3 {
        Segment3::new(&self.src, &self.tgt)
    }

    pub fn length(&self) -> f64 {
        self.src.distance_to(&self.tgt)
    }

    pub fn point(&self, end: End) -> &Point3 {
        match end {
            End::Source => &self.src,
            End::Target => &self.tgt,
        }
    }

    pub fn node(&self, end: End) -> usize {
        match end {
            End::Source => self.nodes[0],
            End::Target => self.nodes[1],
        }
    }

    /// Compute the crossing of the two triangles. False when they do not
    /// cross, share a patch, belong to neighbor patches, or only touch.
    pub fn intersect(&mut self, tris: &TriangleSet) -> bool {
        let (ta, tb) = (tris.get(self.tri[0]), tris.get(self.tri[1]));
        if ta.patch == tb.patch || tris.are_neighbors(ta.patch, tb.patch) {
            return false;
        }
        match tri_tri_intersection(&ta.points, &tb.points) {
            TriTriIntersection::Proper(seg) => {
                self.src = seg.a;
                self.tgt = seg.b;
                true
            }
            TriTriIntersection::Coplanar | TriTriIntersection::None => false,
        }
    }

    /// Parameter coordinate of `end` in the patch of `self.tri[side]`.
    pub fn parameter(&self, end: End, side: usize, tris: &TriangleSet) -> Point2 {
        let rec = tris.get(self.tri[side]);
        let p = self.point(end);
        let [a, b, c] = &rec.points;
        match barycentric_coords(p, a, b, c) {
            Some(bary) => interpolate_param(bary, &rec.params),
            None => {
                // Degenerate triangle: fall back to the nearest vertex.
                let k = (0..3)
                    .min_by(|&i, &j| {
                        p.distance_squared_to(&rec.points[i])
                            .total_cmp(&p.distance_squared_to(&rec.points[j]))
                    })
                    .unwrap_or(0);
                rec.params[k]
            }
        }
    }

    /// Position in `(margin, 1 - margin)` where this segment pierces
    /// triangle `face`. Faces of either own patch never count.
    pub fn intersects_face(&self, face: usize, tris: &TriangleSet, margin: f64) -> Option<f64> {
        if face == self.tri[0] || face == self.tri[1] {
            return None;
        }
        let rec = tris.get(face);
        let own = self.patches(tris);
        if rec.patch == own[0] || rec.patch == own[1] {
            return None;
        }
        if !rec.bbox.intersects(&crate::geometry::aabb::Aabb::from_points(&self.src, &self.tgt)) {
            return None;
        }

        let [a, b, c] = &rec.points;
        let ss = orient3d_sign(a, b, c, &self.src);
        let st = orient3d_sign(a, b, c, &self.tgt);
        if ss.is_zero() || st.is_zero() || ss != st.flipped() {
            return None;
        }

        // The line through the segment must pass inside or on the triangle.
        let e0 = orient3d_sign(&self.src, &self.tgt, a, b);
        let e1 = orient3d_sign(&self.src, &self.tgt, b, c);
        let e2 = orient3d_sign(&self.src, &self.tgt, c, a);
        let has_pos = e0.is_positive() || e1.is_positive() || e2.is_positive();
        let has_neg = e0.is_negative() || e1.is_negative() || e2.is_negative();
        if has_pos && has_neg {
            return None;
        }

        let t = edge_plane_crossing(a, b, c, &self.src, &self.tgt);
        (t > margin && t < 1.0 - margin).then_some(t)
    }

    /// Cut at `t`: `self` keeps `[0, t]`, the returned segment covers `[t, 1]`.
    pub fn split(&mut self, t: f64) -> IntersectionSegment {
        let mid = self.src.lerp(&self.tgt, t);
        let tail = IntersectionSegment {
            tri: self.tri,
            src: mid,
            tgt: self.tgt,
            enforced: self.enforced,
            nodes: [usize::MAX, self.nodes[1]],
        };
        self.tgt = mid;
        self.nodes[1] = usize::MAX;
        tail
    }

    /// Nearest pair of ends between `self` and `other`, with the distance
    /// divided by the mean length of both segments.
    pub fn nearest_connection(&self, other: &IntersectionSegment) -> (Connection, f64) {
        let candidates = [
            (Connection::SourceSource, self.src.distance_to(&other.src)),
            (Connection::SourceTarget, self.src.distance_to(&other.tgt)),
            (Connection::TargetSource, self.tgt.distance_to(&other.src)),
            (Connection::TargetTarget, self.tgt.distance_to(&other.tgt)),
        ];
        let (conn, dist) = candidates
            .into_iter()
            .fold(candidates[0], |best, c| if c.1 < best.1 { c } else { best });
        let scale = 0.5 * (self.length() + other.length());
        if scale > 0.0 {
            (conn, dist / scale)
        } else {
            (conn, dist)
        }
    }
}
