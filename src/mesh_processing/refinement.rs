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

//! Where the two sides of an intersection have very different triangle
//! sizes, the coarser side gets a refinement spot around the crossing.

use ahash::AHashMap;

use crate::{
    geometry::{aabb::Aabb, point::Point3, util::triangle_normal},
    mesh::{
        intersection_segment::{End, IntersectionSegment},
        patch::{PatchId, RefinementSpot, merge_spots},
        triangle_set::TriangleSet,
    },
};

/// A counterpart triangle counts as "not smaller" above this normal-length
/// ratio.
const AFFECTED_RATIO: f64 = 0.8;

pub struct RefinementAdvisor<'a> {
    tris: &'a TriangleSet,
    segments: &'a [IntersectionSegment],
    threshold: f64,
}

impl<'a> RefinementAdvisor<'a> {
    /// Advisor over `segments`; size ratios below `threshold` yield no spot.
    pub fn new(tris: &'a TriangleSet, segments: &'a [IntersectionSegment], threshold: f64) -> Self {
        Self {
            tris,
            segments,
            threshold,
        }
    }

    /// Spot on the patch of `seg.tri[side]` when that triangle is at least
    /// `threshold` times larger than its counterpart.
    pub fn spot(&self, seg: &IntersectionSegment, side: usize) -> Option<RefinementSpot> {
        let own = self.tris.get(seg.tri[side]);
        let other = self.tris.get(seg.tri[1 - side]);
        let other_perimeter = other.perimeter();
        if other_perimeter <= 0.0 {
            return None;
        }
        let ratio = own.perimeter() / other_perimeter;
        if !(ratio >= self.threshold) {
            return None;
        }
        let a = seg.parameter(End::Source, side, self.tris);
        let b = seg.parameter(End::Target, side, self.tris);
        let center = a.midpoint(&b);
        // Half the parameter extent of the coarse triangle around the crossing.
        let ext = Aabb::enclosing(own.params.iter());
        let radius = [0.5 * ext.extent(0), 0.5 * ext.extent(1)];
        Some(RefinementSpot::ellipse(center, radius, ratio))
    }

    /// Merged spots per patch.
    pub fn spots(&self) -> AHashMap<PatchId, Vec<RefinementSpot>> {
        let mut per_patch: AHashMap<PatchId, Vec<RefinementSpot>> = AHashMap::new();
        for seg in self.segments {
            for side in 0..2 {
                if let Some(spot) = self.spot(seg, side) {
                    per_patch
                        .entry(self.tris.get(seg.tri[side]).patch)
                        .or_default()
                        .push(spot);
                }
            }
        }
        per_patch
            .into_iter()
            .map(|(p, spots)| (p, merge_spots(spots)))
            .collect()
    }

    /// Local vertices of `patch` on triangles crossed by a counterpart
    /// triangle that is not much smaller.
    pub fn affected_vertices(&self, patch: PatchId) -> Vec<usize> {
        let mut out = Vec::new();
        for seg in self.segments {
            for side in 0..2 {
                let own = self.tris.get(seg.tri[side]);
                if own.patch != patch {
                    continue;
                }
                let other = self.tris.get(seg.tri[1 - side]);
                let own_n = normal_length(&own.points);
                if own_n <= 0.0 {
                    continue;
                }
                if normal_length(&other.points) / own_n >= AFFECTED_RATIO {
                    out.extend_from_slice(&own.vertices);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

fn normal_length(points: &[Point3; 3]) -> f64 {
    triangle_normal(points).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::vector::Vector3,
        mesh::{param_patch::ParamPatch, patch::Patch, surface::PlaneSurface},
        mesh_processing::intersector::SpatialIntersector,
    };

    fn plane(origin: [f64; 3], du: [f64; 3], dv: [f64; 3], n: usize) -> ParamPatch {
        let v = |a: [f64; 3]| Vector3::new(a[0], a[1], a[2]);
        let mut p = ParamPatch::new(
            "plane",
            PlaneSurface::new(Point3::new(origin[0], origin[1], origin[2]), v(du), v(dv)),
        );
        p.premesh_with_grid(n, n);
        p
    }

    /// One-cell floor crossed by a finely meshed wall at x = 0.37.
    fn coarse_and_fine() -> (TriangleSet, Vec<IntersectionSegment>) {
        let floor = plane([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], 1);
        let wall = plane([0.37, -0.1, -0.5], [0.0, 1.2, 0.0], [0.0, 0.0, 1.1], 8);
        let mut isec = SpatialIntersector::new(2);
        isec.add_patch(PatchId(0), &floor);
        isec.add_patch(PatchId(1), &wall);
        isec.finalize();
        isec.compute(None, || false);
        let segments = isec.collect(1e-9);
        (isec.into_triangles(), segments)
    }

    #[test]
    fn only_the_coarse_side_gets_spots() {
        let (tris, segments) = coarse_and_fine();
        assert!(!segments.is_empty());
        let advisor = RefinementAdvisor::new(&tris, &segments, 2.0);
        let mut largest: f64 = 0.0;
        for seg in &segments {
            assert_eq!(tris.get(seg.tri[0]).patch, PatchId(0));
            let spot = advisor.spot(seg, 0).expect("coarse side");
            assert!(spot.factor >= 2.0);
            largest = largest.max(spot.factor);
            assert!(advisor.spot(seg, 1).is_none());
        }

        let spots = advisor.spots();
        assert_eq!(spots.len(), 1);
        let merged = &spots[&PatchId(0)];
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].factor, largest);
        for seg in &segments {
            let c = seg
                .parameter(End::Source, 0, &tris)
                .midpoint(&seg.parameter(End::Target, 0, &tris));
            assert!(merged[0].contains(&c));
        }
    }

    #[test]
    fn ratios_below_threshold_are_dropped() {
        let (tris, segments) = coarse_and_fine();
        let advisor = RefinementAdvisor::new(&tris, &segments, 1e3);
        assert!(segments.iter().all(|s| advisor.spot(s, 0).is_none()));
        assert!(advisor.spots().is_empty());
    }

    #[test]
    fn affected_vertices_need_a_comparable_counterpart() {
        let (tris, segments) = coarse_and_fine();
        let advisor = RefinementAdvisor::new(&tris, &segments, 2.0);
        // Floor triangles are far larger than the wall triangles they cross.
        assert!(advisor.affected_vertices(PatchId(0)).is_empty());
        let wall = advisor.affected_vertices(PatchId(1));
        assert!(!wall.is_empty());
        assert!(wall.windows(2).all(|w| w[0] < w[1]));
        assert!(advisor.affected_vertices(PatchId(7)).is_empty());
    }
}
