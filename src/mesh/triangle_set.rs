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

use ahash::AHashSet;

use crate::{
    geometry::{
        aabb::Aabb,
        point::{Point2, Point3},
        util::triangle_centroid,
    },
    mesh::patch::{Patch, PatchId},
};

/// One triangle copied out of a patch, with everything the intersection
/// passes need to know about it.
#[derive(Clone, Debug)]
pub struct TriangleRecord {
    pub patch: PatchId,
    /// Index of the triangle inside its patch.
    pub local: usize,
    /// Patch-local vertex indices.
    pub vertices: [usize; 3],
    pub points: [Point3; 3],
    pub params: [Point2; 3],
    pub bbox: Aabb<3>,
    pub centroid: Point3,
}

impl TriangleRecord {
    /// Sum of the three edge lengths.
    pub fn perimeter(&self) -> f64 {
        crate::geometry::util::triangle_perimeter(&self.points)
    }
}

/// Snapshot of every triangle from every patch, sorted by (patch, local
/// index) once finalized. Global triangle indices refer to this order.
#[derive(Clone, Debug, Default)]
pub struct TriangleSet {
    records: Vec<TriangleRecord>,
    neighbors: AHashSet<(PatchId, PatchId)>,
    finalized: bool,
}

impl TriangleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append all triangles of `patch`. Global indices are only valid again
    /// after the next [`finalize`](Self::finalize).
    pub fn add_patch(&mut self, id: PatchId, patch: &dyn Patch) {
        let xyz = patch.vertices();
        let uv = patch.parameters();
        for (local, t) in patch.triangles().iter().enumerate() {
            let points = [xyz[t[0]], xyz[t[1]], xyz[t[2]]];
            self.records.push(TriangleRecord {
                patch: id,
                local,
                vertices: *t,
                points,
                params: [uv[t[0]], uv[t[1]], uv[t[2]]],
                bbox: Aabb::enclosing(points.iter()),
                centroid: triangle_centroid(&points),
            });
        }
        self.finalized = false;
    }

    pub fn mark_neighbors(&mut self, a: PatchId, b: PatchId) {
        self.neighbors.insert((a.min(b), a.max(b)));
    }

    pub fn are_neighbors(&self, a: PatchId, b: PatchId) -> bool {
        self.neighbors.contains(&(a.min(b), a.max(b)))
    }

    pub fn finalize(&mut self) {
        self.records.sort_by_key(|r| (r.patch, r.local));
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TriangleRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> &TriangleRecord {
        &self.records[index]
    }

    /// Global index of triangle `local` of `patch`.
    pub fn find(&self, patch: PatchId, local: usize) -> Option<usize> {
        self.records
            .binary_search_by(|r| (r.patch, r.local).cmp(&(patch, local)))
            .ok()
    }

    /// Distinct patches in sort order.
    pub fn patches(&self) -> Vec<PatchId> {
        let mut ids: Vec<PatchId> = self.records.iter().map(|r| r.patch).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
