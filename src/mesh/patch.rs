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

//! The contract every surface patch fulfils, plus the quality criterion and
//! refinement spots that drive its re-triangulation.

use crate::{
    error::PatchDiagnostic,
    geometry::{
        point::{Point2, Point3},
        vector::Vector3,
    },
};

/// Stable handle of a patch inside a [`PatchRegistry`](super::registry::PatchRegistry).
/// The order of handles is the patch sort order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatchId(pub usize);

/// One of the four parametric boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// u = 0
    West,
    /// u = 1
    East,
    /// v = 0
    South,
    /// v = 1
    North,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::West, Side::East, Side::South, Side::North];

    pub fn contains(self, uv: &Point2, tol: f64) -> bool {
        match self {
            Side::West => uv[0].abs() <= tol,
            Side::East => (uv[0] - 1.0).abs() <= tol,
            Side::South => uv[1].abs() <= tol,
            Side::North => (uv[1] - 1.0).abs() <= tol,
        }
    }

    /// Coordinate that runs along this side.
    pub fn running_axis(self) -> usize {
        match self {
            Side::West | Side::East => 1,
            Side::South | Side::North => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpotShape {
    Rectangle,
    Ellipse,
}

/// A region of parameter space where the allowed edge length is divided by
/// `factor`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefinementSpot {
    pub shape: SpotShape,
    pub min: Point2,
    pub max: Point2,
    pub factor: f64,
}

impl RefinementSpot {
    pub fn rectangle(min: Point2, max: Point2, factor: f64) -> Self {
        Self {
            shape: SpotShape::Rectangle,
            min,
            max,
            factor,
        }
    }

    /// Ellipse inscribed in the box around `center` with half-axes `radius`.
    pub fn ellipse(center: Point2, radius: [f64; 2], factor: f64) -> Self {
        Self {
            shape: SpotShape::Ellipse,
            min: Point2::new(center[0] - radius[0], center[1] - radius[1]),
            max: Point2::new(center[0] + radius[0], center[1] + radius[1]),
            factor,
        }
    }

    pub fn contains(&self, uv: &Point2) -> bool {
        match self.shape {
            SpotShape::Rectangle => (0..2).all(|i| uv[i] >= self.min[i] && uv[i] <= self.max[i]),
            SpotShape::Ellipse => {
                let mut r = 0.0;
                for i in 0..2 {
                    let half = 0.5 * (self.max[i] - self.min[i]);
                    if half <= 0.0 {
                        return false;
                    }
                    let d = (uv[i] - 0.5 * (self.max[i] + self.min[i])) / half;
                    r += d * d;
                }
                r <= 1.0
            }
        }
    }

    /// Overlap of the bounding regions.
    pub fn overlaps(&self, other: &RefinementSpot) -> bool {
        (0..2).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    /// Bounding rectangle of both spots with the larger factor.
    pub fn merged(&self, other: &RefinementSpot) -> RefinementSpot {
        RefinementSpot::rectangle(
            Point2::new(self.min[0].min(other.min[0]), self.min[1].min(other.min[1])),
            Point2::new(self.max[0].max(other.max[0]), self.max[1].max(other.max[1])),
            self.factor.max(other.factor),
        )
    }
}

/// Merge overlapping spots until no two overlap.
pub fn merge_spots(mut spots: Vec<RefinementSpot>) -> Vec<RefinementSpot> {
    let mut changed = true;
    while changed {
        changed = false;
        let mut out: Vec<RefinementSpot> = Vec::with_capacity(spots.len());
        for s in spots.drain(..) {
            if let Some(o) = out.iter_mut().find(|o| o.overlaps(&s)) {
                *o = o.merged(&s);
                changed = true;
            } else {
                out.push(s);
            }
        }
        spots = out;
    }
    spots
}

/// Size, angle and stretch limits for one patch.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshCriterion {
    pub max_length: f64,
    pub min_length: f64,
    /// Largest allowed turning angle between neighboring triangles, radians.
    pub max_phi: f64,
    /// Largest allowed longest-edge/height ratio.
    pub max_stretch: f64,
    spots: Vec<RefinementSpot>,
}

impl Default for MeshCriterion {
    fn default() -> Self {
        Self {
            max_length: 0.25,
            min_length: 1e-4,
            max_phi: 0.5,
            max_stretch: 12.0,
            spots: Vec::new(),
        }
    }
}

impl MeshCriterion {
    pub fn new(max_length: f64, min_length: f64, max_phi: f64, max_stretch: f64) -> Self {
        Self {
            max_length,
            min_length,
            max_phi,
            max_stretch,
            spots: Vec::new(),
        }
    }

    pub fn spots(&self) -> &[RefinementSpot] {
        &self.spots
    }

    /// Append spots; overlapping ones are merged with each other and with
    /// spots already present.
    pub fn add_spots(&mut self, spots: impl IntoIterator<Item = RefinementSpot>) {
        let mut all = std::mem::take(&mut self.spots);
        all.extend(spots);
        self.spots = merge_spots(all);
    }

    pub fn clear_spots(&mut self) {
        self.spots.clear();
    }

    /// Allowed edge length at `uv`, taking refinement spots into account.
    pub fn local_max_length(&self, uv: &Point2) -> f64 {
        let factor = self
            .spots
            .iter()
            .filter(|s| s.contains(uv))
            .map(|s| s.factor)
            .fold(1.0_f64, f64::max);
        (self.max_length / factor).max(self.min_length)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PatchKind {
    #[default]
    Plain,
    /// Trailing sheet regenerated from its parent after the parent is final.
    Wake,
}

/// A single independently parameterized surface triangulation.
///
/// Triangles are given as vertex index triples; every vertex has a 3D
/// position and a parameter coordinate in the unit square.
pub trait Patch: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> PatchKind {
        PatchKind::Plain
    }

    /// Initial unconstrained triangulation sized from the criterion.
    fn premesh(&mut self);

    /// Initial triangulation on an explicit `nu` x `nv` grid.
    fn premesh_with_grid(&mut self, nu: usize, nv: usize);

    fn vertices(&self) -> &[Point3];

    fn parameters(&self) -> &[Point2];

    fn triangles(&self) -> &[[usize; 3]];

    fn parameter(&self, vertex: usize) -> Point2 {
        self.parameters()[vertex]
    }

    /// Surface point at `uv`.
    fn evaluate(&self, uv: &Point2) -> Point3;

    /// Unit surface normal at `uv`; central differences unless overridden.
    fn normal(&self, uv: &Point2) -> Vector3 {
        const H: f64 = 1e-6;
        let at = |du: f64, dv: f64| {
            self.evaluate(&Point2::new((uv[0] + du).clamp(0.0, 1.0), (uv[1] + dv).clamp(0.0, 1.0)))
        };
        let su = at(-H, 0.0).vector_to(&at(H, 0.0));
        let sv = at(0.0, -H).vector_to(&at(0.0, H));
        su.cross(&sv).normalized().unwrap_or_default()
    }

    /// Vertex chain along `side`, ordered by the running coordinate.
    fn boundary(&self, side: Side) -> Vec<usize>;

    /// Insert one hard constraint polyline given in parameter and world space.
    fn constrain(&mut self, uv: &[Point2], xyz: &[Point3]) -> Result<(), PatchDiagnostic>;

    /// Re-apply every stored constraint to the current triangulation.
    fn reconstrain(&mut self) -> Result<(), PatchDiagnostic>;

    /// Re-triangulate respecting constraints and the criterion.
    fn refine(&mut self) -> Result<(), PatchDiagnostic>;

    /// Subdivide locally around the given vertices.
    fn refine_around(&mut self, vertices: &[usize]) -> Result<(), PatchDiagnostic>;

    fn clear_constraints(&mut self);

    fn criterion(&self) -> &MeshCriterion;

    fn criterion_mut(&mut self) -> &mut MeshCriterion;

    /// Regenerate from a finalized parent. Returns whether anything changed.
    fn adapt(&mut self, _parent: &dyn Patch) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_spots_merge_into_bounding_rectangle() {
        let a = RefinementSpot::ellipse(Point2::new(0.2, 0.2), [0.1, 0.1], 2.0);
        let b = RefinementSpot::ellipse(Point2::new(0.25, 0.25), [0.1, 0.1], 4.0);
        let c = RefinementSpot::ellipse(Point2::new(0.8, 0.8), [0.05, 0.05], 3.0);
        let merged = merge_spots(vec![a, b, c]);
        assert_eq!(merged.len(), 2);
        let big = merged.iter().find(|s| s.factor == 4.0).expect("merged spot");
        assert_eq!(big.shape, SpotShape::Rectangle);
        assert!((big.min[0] - 0.1).abs() < 1e-12 && (big.max[1] - 0.35).abs() < 1e-12);
    }

    #[test]
    fn local_length_uses_the_strongest_spot() {
        let mut c = MeshCriterion::new(1.0, 0.01, 0.5, 10.0);
        c.add_spots([RefinementSpot::rectangle(Point2::new(0.0, 0.0), Point2::new(0.5, 0.5), 4.0)]);
        assert_eq!(c.local_max_length(&Point2::new(0.25, 0.25)), 0.25);
        assert_eq!(c.local_max_length(&Point2::new(0.75, 0.75)), 1.0);
        c.clear_spots();
        assert_eq!(c.local_max_length(&Point2::new(0.25, 0.25)), 1.0);
    }
}
