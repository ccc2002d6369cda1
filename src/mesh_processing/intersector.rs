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

//! Binary bounding-box tree over the triangles of every patch, used to find
//! all crossing triangle pairs between different patches.

use std::{
    ptr,
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};

use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    geometry::aabb::Aabb,
    mesh::{
        intersection_segment::IntersectionSegment,
        patch::{Patch, PatchId},
        triangle_set::TriangleSet,
    },
    operations::pool::{WorkerPool, drain_queue},
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct TreeNode {
    items: Vec<usize>,
    bbox: Aabb<3>,
    /// Distinct patches among `items`, sorted.
    patches: SmallVec<[PatchId; 4]>,
    children: OnceLock<Option<Box<[TreeNode; 2]>>>,
    found: Mutex<Vec<IntersectionSegment>>,
}

impl TreeNode {
    fn new(items: Vec<usize>, tris: &TriangleSet) -> Self {
        let mut bbox = Aabb::empty();
        let mut patches: SmallVec<[PatchId; 4]> = SmallVec::new();
        for &i in &items {
            let rec = tris.get(i);
            bbox = bbox.union(&rec.bbox);
            if !patches.contains(&rec.patch) {
                patches.push(rec.patch);
            }
        }
        patches.sort_unstable();
        Self {
            items,
            bbox,
            patches,
            children: OnceLock::new(),
            found: Mutex::new(Vec::new()),
        }
    }

    fn single_patch(&self) -> Option<PatchId> {
        (self.patches.len() == 1).then(|| self.patches[0])
    }

    /// Children of this node, splitting it on first use. Nodes with fewer
    /// than `2 * min_leaf` triangles stay leaves.
    fn split(&self, tris: &TriangleSet, min_leaf: usize) -> Option<&[TreeNode; 2]> {
        self.children
            .get_or_init(|| {
                if self.items.len() < 2 * min_leaf.max(1) {
                    return None;
                }
                let axis = self.bbox.longest_axis();
                let mut left = self.items.clone();
                let mid = left.len() / 2;
                left.select_nth_unstable_by(mid, |&a, &b| {
                    tris.get(a).centroid[axis].total_cmp(&tris.get(b).centroid[axis])
                });
                let right = left.split_off(mid);
                Some(Box::new([TreeNode::new(left, tris), TreeNode::new(right, tris)]))
            })
            .as_deref()
    }

    fn collect_into(&self, out: &mut Vec<IntersectionSegment>) {
        out.extend(lock(&self.found).iter().cloned());
        if let Some(Some(children)) = self.children.get() {
            for c in children.iter() {
                c.collect_into(out);
            }
        }
    }

    fn depth(&self) -> usize {
        match self.children.get() {
            Some(Some(children)) => 1 + children[0].depth().max(children[1].depth()),
            _ => 1,
        }
    }
}

/// Spatial index over all patch triangles.
///
/// Fill with [`add_patch`](Self::add_patch), call [`finalize`](Self::finalize),
/// then [`compute`](Self::compute). Splitting happens lazily while pairs are
/// visited, so `compute` needs only `&self` and may run on a pool.
pub struct SpatialIntersector {
    tris: TriangleSet,
    min_leaf_size: usize,
    root: Option<TreeNode>,
    enforced: Vec<IntersectionSegment>,
}

impl SpatialIntersector {
    pub fn new(min_leaf_size: usize) -> Self {
        Self {
            tris: TriangleSet::new(),
            min_leaf_size: min_leaf_size.max(1),
            root: None,
            enforced: Vec::new(),
        }
    }

    /// Append all triangles of one patch. Drops any tree built so far.
    pub fn add_patch(&mut self, id: PatchId, patch: &dyn Patch) {
        self.root = None;
        self.tris.add_patch(id, patch);
    }

    /// Register two patches that touch but never cross.
    pub fn mark_neighbors(&mut self, a: PatchId, b: PatchId) {
        self.tris.mark_neighbors(a, b);
    }

    /// Sort the triangles and build the root node.
    pub fn finalize(&mut self) {
        self.tris.finalize();
        let items: Vec<usize> = (0..self.tris.len()).collect();
        self.root = Some(TreeNode::new(items, &self.tris));
    }

    pub fn triangles(&self) -> &TriangleSet {
        &self.tris
    }

    /// Give up the tree and keep the triangle table.
    pub fn into_triangles(self) -> TriangleSet {
        self.tris
    }

    /// Box around every triangle; empty before `finalize`.
    pub fn bbox(&self) -> Aabb<3> {
        self.root.as_ref().map(|r| r.bbox).unwrap_or_else(Aabb::empty)
    }

    /// Distinct patches in the index.
    pub fn patches(&self) -> &[PatchId] {
        self.root.as_ref().map(|r| r.patches.as_slice()).unwrap_or(&[])
    }

    /// Skip a node pair whose boxes are disjoint, or whose sides each hold a
    /// single patch that is the same or a registered neighbor.
    fn skip(&self, a: &TreeNode, b: &TreeNode) -> bool {
        if !a.bbox.intersects(&b.bbox) {
            return true;
        }
        match (a.single_patch(), b.single_patch()) {
            (Some(pa), Some(pb)) => pa == pb || self.tris.are_neighbors(pa, pb),
            _ => false,
        }
    }

    fn test(&self, i: usize, j: usize, out: &mut Vec<IntersectionSegment>) {
        let (ri, rj) = (self.tris.get(i), self.tris.get(j));
        if ri.patch == rj.patch || !ri.bbox.intersects(&rj.bbox) {
            return;
        }
        let mut seg = IntersectionSegment::new(i, j, &self.tris);
        if seg.intersect(&self.tris) {
            out.push(seg);
        } else {
            trace!(i, j, "triangle pair overlaps without crossing");
        }
    }

    fn test_self(&self, node: &TreeNode) {
        let mut out = Vec::new();
        for (k, &i) in node.items.iter().enumerate() {
            for &j in &node.items[k + 1..] {
                self.test(i, j, &mut out);
            }
        }
        if !out.is_empty() {
            lock(&node.found).extend(out);
        }
    }

    fn test_pair(&self, a: &TreeNode, b: &TreeNode) {
        let mut out = Vec::new();
        for &i in &a.items {
            for &j in &b.items {
                self.test(i, j, &mut out);
            }
        }
        if !out.is_empty() {
            lock(&a.found).extend(out);
        }
    }

    fn visit<'a>(&'a self, a: &'a TreeNode, b: &'a TreeNode, next: &mut Vec<(&'a TreeNode, &'a TreeNode)>) {
        if ptr::eq(a, b) {
            if a.single_patch().is_some() || a.items.len() < 2 {
                return;
            }
            match a.split(&self.tris, self.min_leaf_size) {
                Some([l, r]) => next.extend([(l, l), (r, r), (l, r)]),
                None => self.test_self(a),
            }
            return;
        }
        if self.skip(a, b) {
            return;
        }
        let min_leaf = self.min_leaf_size;
        match (a.split(&self.tris, min_leaf), b.split(&self.tris, min_leaf)) {
            (Some([al, ar]), Some([bl, br])) => next.extend([(al, bl), (al, br), (ar, bl), (ar, br)]),
            (Some([al, ar]), None) => next.extend([(al, b), (ar, b)]),
            (None, Some([bl, br])) => next.extend([(a, bl), (a, br)]),
            (None, None) => self.test_pair(a, b),
        }
    }

    /// Find every crossing pair. Node pairs are queued as tasks on `pool`,
    /// or processed depth-first on the calling thread when it is `None`.
    /// Queued pairs are dropped once `interrupted` reports true.
    pub fn compute<I>(&self, pool: Option<&WorkerPool>, interrupted: I)
    where
        I: Fn() -> bool + Sync,
    {
        let Some(root) = &self.root else {
            return;
        };
        drain_queue(pool, vec![(root, root)], interrupted, |(a, b), next| {
            self.visit(a, b, next)
        });
        debug!(
            triangles = self.tris.len(),
            depth = root.depth(),
            "intersection tree traversed"
        );
    }

    /// Inject a segment with known ends, bypassing the geometric test.
    pub fn enforce(&mut self, seg: IntersectionSegment) {
        self.enforced.push(seg);
    }

    pub fn enforced(&self) -> &[IntersectionSegment] {
        &self.enforced
    }

    /// Every segment found so far plus the enforced ones. Computed segments
    /// lying within `tol` of an enforced segment between the same two
    /// patches are dropped as duplicates.
    pub fn collect(&self, tol: f64) -> Vec<IntersectionSegment> {
        let mut computed = Vec::new();
        if let Some(root) = &self.root {
            root.collect_into(&mut computed);
        }

        let mut by_pair: AHashMap<[PatchId; 2], Vec<&IntersectionSegment>> = AHashMap::new();
        for e in &self.enforced {
            by_pair.entry(e.patches(&self.tris)).or_default().push(e);
        }
        let before = computed.len();
        computed.retain(|c| {
            let Some(enforced) = by_pair.get(&c.patches(&self.tris)) else {
                return true;
            };
            !enforced.iter().any(|e| {
                let s = e.segment();
                s.distance_to_point(&c.src) <= tol && s.distance_to_point(&c.tgt) <= tol
            })
        });
        if computed.len() < before {
            debug!(
                dropped = before - computed.len(),
                "computed segments duplicating enforced ones"
            );
        }

        computed.extend(self.enforced.iter().cloned());
        computed
    }
}
