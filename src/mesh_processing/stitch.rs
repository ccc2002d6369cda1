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

//! Enforced segments along boundaries two patches share exactly.

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::{
    geometry::point::Point3,
    mesh::{
        intersection_segment::IntersectionSegment,
        patch::{Patch, PatchId, Side},
        triangle_set::TriangleSet,
    },
};

/// Two patch boundaries known to coincide. `forward` walks a side in
/// increasing parameter order; both walks must start at the same end of the
/// shared curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StitchConnection {
    pub a: PatchId,
    pub side_a: Side,
    pub forward_a: bool,
    pub b: PatchId,
    pub side_b: Side,
    pub forward_b: bool,
}

impl StitchConnection {
    pub fn new(a: PatchId, side_a: Side, b: PatchId, side_b: Side) -> Self {
        Self {
            a,
            side_a,
            forward_a: true,
            b,
            side_b,
            forward_b: true,
        }
    }

    /// Walk side `b` in decreasing parameter order.
    pub fn reversed_b(mut self) -> Self {
        self.forward_b = !self.forward_b;
        self
    }
}

/// A boundary vertex chain with its normalised arclength. A chain whose end
/// vertices are joined by a triangle edge is a ring and repeats its first
/// vertex at the end.
struct Chain {
    vertices: Vec<usize>,
    points: Vec<Point3>,
    arclength: Vec<f64>,
    /// Local triangle owning each chain edge.
    owners: Vec<Option<usize>>,
    closed: bool,
}

impl Chain {
    fn new(patch: &dyn Patch, side: Side, forward: bool) -> Option<Self> {
        let mut vertices = patch.boundary(side);
        if !forward {
            vertices.reverse();
        }
        Self::from_parts(vertices, patch.vertices(), patch.triangles())
    }

    fn from_parts(mut vertices: Vec<usize>, xyz: &[Point3], triangles: &[[usize; 3]]) -> Option<Self> {
        if vertices.len() < 2 {
            return None;
        }

        let mut edge_owner: AHashMap<(usize, usize), usize> = AHashMap::new();
        for (i, t) in triangles.iter().enumerate() {
            for k in 0..3 {
                let (a, b) = (t[k], t[(k + 1) % 3]);
                edge_owner.insert((a.min(b), a.max(b)), i);
            }
        }
        let edge_key = |a: usize, b: usize| (a.min(b), a.max(b));

        let (first, last) = (vertices[0], vertices[vertices.len() - 1]);
        let joined = vertices.len() > 2 && first != last && edge_owner.contains_key(&edge_key(first, last));
        if joined {
            vertices.push(first);
        }

        let points: Vec<Point3> = vertices.iter().map(|&v| xyz[v]).collect();
        let mut arclength = Vec::with_capacity(points.len());
        let mut acc = 0.0;
        arclength.push(0.0);
        for w in points.windows(2) {
            acc += w[0].distance_to(&w[1]);
            arclength.push(acc);
        }
        if acc <= 0.0 {
            return None;
        }
        // A seam may repeat the first point under another vertex index.
        let closed = joined || points[0].distance_to(&points[points.len() - 1]) <= 1e-9 * acc;
        for s in &mut arclength {
            *s /= acc;
        }

        let owners = vertices
            .windows(2)
            .map(|w| edge_owner.get(&edge_key(w[0], w[1])).copied())
            .collect();

        Some(Self {
            vertices,
            points,
            arclength,
            owners,
            closed,
        })
    }

    /// Chain edge containing arclength `s`.
    fn piece(&self, s: f64) -> usize {
        let n = self.arclength.len() - 1;
        self.arclength[1..]
            .partition_point(|&x| x < s)
            .min(n - 1)
    }

    fn point_at(&self, s: f64) -> Point3 {
        let i = self.piece(s);
        let (s0, s1) = (self.arclength[i], self.arclength[i + 1]);
        let t = if s1 > s0 { (s - s0) / (s1 - s0) } else { 0.0 };
        self.points[i].lerp(&self.points[i + 1], t.clamp(0.0, 1.0))
    }
}

/// Enforced segments for one connection: the two arclength lists are merged
/// and every consecutive pair of merged stations yields one segment between
/// the triangles owning that stretch on either side. Rings close back onto
/// their first station, so a ring of `n` matching vertices gives `n`
/// segments and an open chain gives `n - 1`.
pub fn stitch(
    conn: &StitchConnection,
    a: &dyn Patch,
    b: &dyn Patch,
    tris: &TriangleSet,
) -> Vec<IntersectionSegment> {
    let (Some(ca), Some(cb)) = (
        Chain::new(a, conn.side_a, conn.forward_a),
        Chain::new(b, conn.side_b, conn.forward_b),
    ) else {
        warn!(a = a.name(), b = b.name(), "stitch connection with a degenerate boundary");
        return Vec::new();
    };
    if ca.closed != cb.closed {
        warn!(a = a.name(), b = b.name(), "stitching a closed boundary to an open one");
    }

    let mut stations: Vec<f64> = ca.arclength.iter().chain(cb.arclength.iter()).copied().collect();
    stations.sort_by(f64::total_cmp);
    stations.dedup_by(|x, y| (*x - *y).abs() <= 1e-9);

    let mut out = Vec::with_capacity(stations.len().saturating_sub(1));
    for w in stations.windows(2) {
        let mid = 0.5 * (w[0] + w[1]);
        let (ia, ib) = (ca.piece(mid), cb.piece(mid));
        let owner_a = ca.owners[ia].and_then(|t| tris.find(conn.a, t));
        let owner_b = cb.owners[ib].and_then(|t| tris.find(conn.b, t));
        let (Some(ta), Some(tb)) = (owner_a, owner_b) else {
            warn!(
                a = a.name(),
                b = b.name(),
                edge_a = ?(ca.vertices[ia], ca.vertices[ia + 1]),
                "boundary edge without an owning triangle"
            );
            continue;
        };
        out.push(IntersectionSegment::enforced(
            ta,
            tb,
            ca.point_at(w[0]),
            ca.point_at(w[1]),
            tris,
        ));
    }
    debug!(
        a = a.name(),
        b = b.name(),
        segments = out.len(),
        "boundary stitched"
    );
    out
}
