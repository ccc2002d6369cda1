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

use ahash::{AHashMap, AHashSet};
use thiserror::Error;
use tracing::trace;

use crate::{
    geometry::{aabb::Aabb, point::Point2},
    kernel::{incircle_sign, orient2d_sign},
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TriangulationError {
    #[error("constraint edge ({a:?}, {b:?}) could not be recovered after {depth} splits")]
    ConstraintNotRecovered { a: Point2, b: Point2, depth: usize },

    #[error("degenerate input: {0}")]
    Degenerate(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Edge(usize, usize);

impl Edge {
    #[inline]
    fn new(a: usize, b: usize) -> Self {
        if a < b { Edge(a, b) } else { Edge(b, a) }
    }
}

/// A point inserted on a constraint edge while recovering it. The point lies
/// at the midpoint of `a -> b`, where both ends existed before the split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstraintSplit {
    pub point: usize,
    pub a: usize,
    pub b: usize,
}

/// Incremental Bowyer-Watson triangulation whose hull is the axis-aligned
/// bounding box of the input. The four box corners are always part of the
/// point set, so no super-triangle has to be peeled off afterwards.
#[derive(Clone, Debug, Default)]
pub struct Delaunay {
    pub points: Vec<Point2>,
    pub triangles: Vec<[usize; 3]>,
    lookup: AHashMap<(u64, u64), usize>,
    bounds: Aabb<2>,
}

fn key(p: &Point2) -> (u64, u64) {
    // +0.0 and -0.0 must collide
    ((p[0] + 0.0).to_bits(), (p[1] + 0.0).to_bits())
}

impl Delaunay {
    /// Build the Delaunay triangulation of `pts`. Exact duplicates are
    /// collapsed; indices of the input points are preserved.
    pub fn build(pts: &[Point2]) -> Result<Self, TriangulationError> {
        let mut dt = Delaunay::default();
        if pts.is_empty() {
            return Err(TriangulationError::Degenerate("no points"));
        }
        if pts.iter().any(|p| !p.is_finite()) {
            return Err(TriangulationError::Degenerate("non-finite point"));
        }

        let (mut minx, mut miny, mut maxx, mut maxy) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for p in pts {
            minx = minx.min(p[0]);
            miny = miny.min(p[1]);
            maxx = maxx.max(p[0]);
            maxy = maxy.max(p[1]);
        }
        if !(maxx > minx && maxy > miny) {
            return Err(TriangulationError::Degenerate("points do not span an area"));
        }

        for p in pts {
            dt.push_point(*p);
        }

        dt.bounds = Aabb::new(Point2::new(minx, miny), Point2::new(maxx, maxy));
        let corners = [
            Point2::new(minx, miny),
            Point2::new(maxx, miny),
            Point2::new(maxx, maxy),
            Point2::new(minx, maxy),
        ];
        let c: [usize; 4] = std::array::from_fn(|i| dt.push_point(corners[i]));
        dt.triangles.push([c[0], c[1], c[2]]);
        dt.triangles.push([c[0], c[2], c[3]]);

        let corner_set: AHashSet<usize> = c.iter().copied().collect();
        for pid in 0..dt.points.len() {
            if !corner_set.contains(&pid) && dt.lookup.get(&key(&dt.points[pid])) == Some(&pid) {
                dt.bowyer_watson_insert_point(pid);
            }
        }
        Ok(dt)
    }

    /// Index of `p`, appending it to the point list when it is new.
    fn push_point(&mut self, p: Point2) -> usize {
        let k = key(&p);
        if let Some(&i) = self.lookup.get(&k) {
            return i;
        }
        self.points.push(p);
        let i = self.points.len() - 1;
        self.lookup.insert(k, i);
        i
    }

    /// Insert `p` into the current triangulation. Returns the index of the
    /// point (an existing one for exact duplicates), or `None` when `p`
    /// falls outside the hull.
    pub fn insert(&mut self, p: Point2) -> Option<usize> {
        if let Some(&i) = self.lookup.get(&key(&p)) {
            return Some(i);
        }
        // The hull is the bounding box.
        if !self.bounds.contains(&p) {
            return None;
        }
        let pid = self.push_point(p);
        self.bowyer_watson_insert_point(pid);
        Some(pid)
    }

    fn bowyer_watson_insert_point(&mut self, pid: usize) {
        let p = self.points[pid];

        let mut bad = Vec::new();
        for (i, t) in self.triangles.iter().enumerate() {
            if self.point_in_circumcircle(&p, t) {
                bad.push(i);
            }
        }
        if bad.is_empty() {
            trace!(point = pid, "outside every circumcircle");
            return;
        }

        // Directed edges of the cavity; an edge is on its boundary when its
        // twin is not part of the cavity.
        let mut directed: AHashSet<(usize, usize)> = AHashSet::with_capacity(bad.len() * 3);
        for &i in &bad {
            let t = self.triangles[i];
            for k in 0..3 {
                directed.insert((t[k], t[(k + 1) % 3]));
            }
        }
        let boundary: Vec<(usize, usize)> = directed
            .iter()
            .copied()
            .filter(|&(a, b)| !directed.contains(&(b, a)))
            .collect();

        bad.sort_unstable();
        for &i in bad.iter().rev() {
            self.triangles.swap_remove(i);
        }

        for (a, b) in boundary {
            // Hull edges passing through p are split, not fanned.
            if orient2d_sign(&self.points[a], &self.points[b], &p).is_positive() {
                self.triangles.push([a, b, pid]);
            }
        }
    }

    fn point_in_circumcircle(&self, p: &Point2, t: &[usize; 3]) -> bool {
        let (a, b, c) = (&self.points[t[0]], &self.points[t[1]], &self.points[t[2]]);
        incircle_sign(a, b, c, p).is_positive()
    }

    fn edge_set(&self) -> AHashSet<Edge> {
        let mut edges = AHashSet::with_capacity(self.triangles.len() * 2);
        for t in &self.triangles {
            for k in 0..3 {
                edges.insert(Edge::new(t[k], t[(k + 1) % 3]));
            }
        }
        edges
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        let e = Edge::new(a, b);
        self.triangles.iter().any(|t| {
            (0..3).any(|k| Edge::new(t[k], t[(k + 1) % 3]) == e)
        })
    }

    /// A vertex lying strictly between `a` and `b` on their segment.
    fn vertex_on_segment(&self, a: usize, b: usize) -> Option<usize> {
        let (pa, pb) = (&self.points[a], &self.points[b]);
        let d = pa.vector_to(pb);
        let len2 = d.norm2();
        let mut best: Option<(f64, usize)> = None;
        for (k, pk) in self.points.iter().enumerate() {
            if k == a || k == b || !orient2d_sign(pa, pb, pk).is_zero() {
                continue;
            }
            let t = pa.vector_to(pk).dot(&d) / len2;
            if t > 0.0 && t < 1.0 && best.is_none_or(|(bt, _)| t < bt) {
                best = Some((t, k));
            }
        }
        best.map(|(_, k)| k)
    }

    /// Make every constraint edge an edge of the triangulation by splitting
    /// missing ones at existing collinear vertices or at their midpoints.
    ///
    /// `constraints` is rewritten to the recovered sub-edges. The returned
    /// splits are in insertion order.
    pub fn conform(
        &mut self,
        constraints: &mut Vec<[usize; 2]>,
        max_depth: usize,
    ) -> Result<Vec<ConstraintSplit>, TriangulationError> {
        let mut splits = Vec::new();
        let mut pending: Vec<([usize; 2], usize)> =
            constraints.drain(..).filter(|c| c[0] != c[1]).map(|c| (c, 0)).collect();
        pending.reverse();
        let mut edges = self.edge_set();
        let mut done = Vec::with_capacity(pending.len());

        while let Some(([a, b], depth)) = pending.pop() {
            if edges.contains(&Edge::new(a, b)) {
                done.push([a, b]);
                continue;
            }
            if let Some(k) = self.vertex_on_segment(a, b) {
                pending.push(([k, b], depth));
                pending.push(([a, k], depth));
                continue;
            }
            if depth >= max_depth {
                return Err(TriangulationError::ConstraintNotRecovered {
                    a: self.points[a],
                    b: self.points[b],
                    depth,
                });
            }
            let mid = self.points[a].midpoint(&self.points[b]);
            let Some(m) = self.insert(mid) else {
                return Err(TriangulationError::Degenerate("constraint midpoint outside hull"));
            };
            if m == a || m == b {
                return Err(TriangulationError::ConstraintNotRecovered {
                    a: self.points[a],
                    b: self.points[b],
                    depth,
                });
            }
            splits.push(ConstraintSplit { point: m, a, b });
            edges = self.edge_set();
            pending.push(([m, b], depth + 1));
            pending.push(([a, m], depth + 1));
        }

        *constraints = done;
        Ok(splits)
    }

    /// Drop triangles with zero area.
    pub fn remove_degenerate(&mut self) {
        let pts = &self.points;
        self.triangles
            .retain(|t| !orient2d_sign(&pts[t[0]], &pts[t[1]], &pts[t[2]]).is_zero());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(dt: &Delaunay) -> f64 {
        dt.triangles
            .iter()
            .map(|t| {
                let (a, b, c) = (&dt.points[t[0]], &dt.points[t[1]], &dt.points[t[2]]);
                0.5 * a.vector_to(b).cross(&a.vector_to(c))
            })
            .sum()
    }

    #[test]
    fn grid_with_collinear_boundary_points_covers_the_box() {
        let mut pts = Vec::new();
        for j in 0..=4 {
            for i in 0..=4 {
                pts.push(Point2::new(i as f64 / 4.0, j as f64 / 4.0));
            }
        }
        let dt = Delaunay::build(&pts).expect("grid triangulates");
        assert_eq!(dt.points.len(), 25);
        assert!((area(&dt) - 1.0).abs() < 1e-12);
        assert_eq!(dt.triangles.len(), 32);
    }

    #[test]
    fn conform_recovers_a_diagonal_constraint() {
        let mut pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        for j in 1..4 {
            for i in 1..4 {
                pts.push(Point2::new(i as f64 / 4.0 + 0.01, j as f64 / 4.0 - 0.02));
            }
        }
        pts.push(Point2::new(0.05, 0.9));
        pts.push(Point2::new(0.95, 0.1));
        let (a, b) = (pts.len() - 2, pts.len() - 1);

        let mut dt = Delaunay::build(&pts).expect("triangulates");
        let mut cons = vec![[a, b]];
        dt.conform(&mut cons, 12).expect("recovers");
        for c in &cons {
            assert!(dt.has_edge(c[0], c[1]));
        }
        assert!((area(&dt) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn insert_outside_hull_is_rejected() {
        let pts = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)];
        let mut dt = Delaunay::build(&pts).expect("box");
        assert!(dt.insert(Point2::new(2.0, 0.5)).is_none());
        assert!(dt.insert(Point2::new(0.5, 0.5)).is_some());
        assert_eq!(dt.triangles.len(), 4);
    }
}
