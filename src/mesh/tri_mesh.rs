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

//! The merged global triangle mesh and the repair passes run on it.

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::{
    geometry::{
        aabb::Aabb,
        point::Point3,
        util::{triangle_centroid, triangle_normal},
        vector::Vector3,
    },
    kernel::orient3d_sign,
    mesh::{patch::PatchId, spatial_hash::SpatialHash},
};

pub type EdgeMap = AHashMap<(usize, usize), SmallVec<[usize; 2]>>;

/// Triangle soup with one component tag and one owning patch per face.
#[derive(Clone, Debug, Default)]
pub struct TriMesh {
    pub vertices: Vec<Point3>,
    pub faces: Vec<[usize; 3]>,
    pub tags: Vec<u32>,
    pub patches: Vec<PatchId>,
    /// Component name per tag value.
    pub tag_names: Vec<String>,
}

#[inline]
fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

impl TriMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.faces.clear();
        self.tags.clear();
        self.patches.clear();
    }

    pub fn tag_name(&self, tag: u32) -> Option<&str> {
        self.tag_names.get(tag as usize).map(String::as_str)
    }

    /// Append one patch's triangles under `tag`.
    pub fn append(&mut self, vertices: &[Point3], faces: &[[usize; 3]], tag: u32, patch: PatchId) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(vertices);
        for f in faces {
            self.faces.push([f[0] + offset, f[1] + offset, f[2] + offset]);
            self.tags.push(tag);
            self.patches.push(patch);
        }
    }

    /// Append all faces of `other`, keeping their tags and patches.
    pub fn append_mesh(&mut self, other: &TriMesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);
        for (i, f) in other.faces.iter().enumerate() {
            self.faces.push([f[0] + offset, f[1] + offset, f[2] + offset]);
            self.tags.push(other.tags[i]);
            self.patches.push(other.patches[i]);
        }
    }

    pub fn face_points(&self, f: usize) -> [Point3; 3] {
        let t = self.faces[f];
        [self.vertices[t[0]], self.vertices[t[1]], self.vertices[t[2]]]
    }

    /// Un-normalised face normal.
    pub fn face_normal(&self, f: usize) -> Vector3 {
        triangle_normal(&self.face_points(f))
    }

    pub fn face_centroid(&self, f: usize) -> Point3 {
        triangle_centroid(&self.face_points(f))
    }

    pub fn bbox(&self) -> Aabb<3> {
        Aabb::enclosing(self.vertices.iter())
    }

    /// Keep faces for which `keep(face)` is true.
    pub fn retain_faces(&mut self, mut keep: impl FnMut(usize) -> bool) -> usize {
        let before = self.faces.len();
        let mut faces = Vec::with_capacity(before);
        let mut tags = Vec::with_capacity(before);
        let mut patches = Vec::with_capacity(before);
        for i in 0..before {
            if keep(i) {
                faces.push(self.faces[i]);
                tags.push(self.tags[i]);
                patches.push(self.patches[i]);
            }
        }
        self.faces = faces;
        self.tags = tags;
        self.patches = patches;
        before - self.faces.len()
    }

    /// Copy of the listed faces with compacted vertices.
    pub fn extract_faces(&self, faces: &[usize]) -> TriMesh {
        let mut out = TriMesh {
            tag_names: self.tag_names.clone(),
            ..TriMesh::default()
        };
        let mut remap: AHashMap<usize, usize> = AHashMap::new();
        for &f in faces {
            let t = self.faces[f];
            let nt = t.map(|v| {
                *remap.entry(v).or_insert_with(|| {
                    out.vertices.push(self.vertices[v]);
                    out.vertices.len() - 1
                })
            });
            out.faces.push(nt);
            out.tags.push(self.tags[f]);
            out.patches.push(self.patches[f]);
        }
        out
    }

    /// Faces incident to every undirected edge.
    pub fn edge_map(&self) -> EdgeMap {
        let mut map: EdgeMap = AHashMap::with_capacity(self.faces.len() * 3 / 2);
        for (i, f) in self.faces.iter().enumerate() {
            for k in 0..3 {
                map.entry(edge_key(f[k], f[(k + 1) % 3])).or_default().push(i);
            }
        }
        map
    }

    /// Face adjacency across edges for which `crossable(edge_faces)` holds.
    pub fn face_neighbors(&self, edges: &EdgeMap, crossable: impl Fn(&[usize]) -> bool) -> Vec<SmallVec<[usize; 3]>> {
        let mut adj = vec![SmallVec::new(); self.faces.len()];
        for faces in edges.values() {
            if !crossable(faces) {
                continue;
            }
            for &a in faces.iter() {
                for &b in faces.iter() {
                    if a != b && !adj[a].contains(&b) {
                        adj[a].push(b);
                    }
                }
            }
        }
        adj
    }

    /// Flood fill from `seeds` over `adj`, restricted to faces in `allowed`.
    pub fn flood(adj: &[SmallVec<[usize; 3]>], seeds: &[usize], allowed: impl Fn(usize) -> bool) -> AHashSet<usize> {
        let mut seen = AHashSet::new();
        let mut stack: Vec<usize> = seeds.iter().copied().filter(|&s| allowed(s)).collect();
        while let Some(f) = stack.pop() {
            if !seen.insert(f) {
                continue;
            }
            for &n in &adj[f] {
                if allowed(n) && !seen.contains(&n) {
                    stack.push(n);
                }
            }
        }
        seen
    }

    /// Edge-connected components, each as a sorted face list.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let edges = self.edge_map();
        let adj = self.face_neighbors(&edges, |_| true);
        let mut assigned = vec![false; self.faces.len()];
        let mut comps = Vec::new();
        for start in 0..self.faces.len() {
            if assigned[start] {
                continue;
            }
            let set = Self::flood(&adj, &[start], |f| !assigned[f]);
            let mut comp: Vec<usize> = set.into_iter().collect();
            comp.sort_unstable();
            for &f in &comp {
                assigned[f] = true;
            }
            comps.push(comp);
        }
        comps
    }

    /// Number of faces accepted by `filter` that the segment `from -> to`
    /// crosses strictly inside.
    pub fn crossings(&self, from: &Point3, to: &Point3, filter: impl Fn(usize) -> bool) -> usize {
        let seg_box = Aabb::from_points(from, to);
        let mut count = 0;
        for f in 0..self.faces.len() {
            if !filter(f) {
                continue;
            }
            let [a, b, c] = self.face_points(f);
            if !Aabb::enclosing([a, b, c].iter()).intersects(&seg_box) {
                continue;
            }
            let s0 = orient3d_sign(&a, &b, &c, from);
            let s1 = orient3d_sign(&a, &b, &c, to);
            if s0.is_zero() || s1.is_zero() || s0 != s1.flipped() {
                continue;
            }
            let e0 = orient3d_sign(from, to, &a, &b);
            let e1 = orient3d_sign(from, to, &b, &c);
            let e2 = orient3d_sign(from, to, &c, &a);
            if !e0.is_zero() && e0 == e1 && e1 == e2 {
                count += 1;
            }
        }
        count
    }

    /// Weld vertices closer than `epsilon`; faces collapsing to an edge or
    /// a point are dropped. Returns the number of merged vertices.
    pub fn merge_coincident_vertices(&mut self, epsilon: f64) -> usize {
        let original = self.vertices.len();
        if original == 0 {
            return 0;
        }
        let hash = SpatialHash::from_points(&self.vertices, epsilon);
        let mut remap: Vec<usize> = (0..original).collect();
        let mut merged = 0;
        for i in 0..original {
            if remap[i] != i {
                continue;
            }
            for j in hash.query(&self.vertices[i], epsilon, &self.vertices) {
                if j > i && remap[j] == j {
                    remap[j] = i;
                    merged += 1;
                }
            }
        }
        if merged == 0 {
            return 0;
        }
        for f in &mut self.faces {
            *f = f.map(|v| remap[v]);
        }
        self.retain_faces_where(|f| f[0] != f[1] && f[1] != f[2] && f[0] != f[2]);
        self.remove_unreferenced_vertices();
        debug!(merged, epsilon, before = original, after = self.vertices.len(), "welded vertices");
        merged
    }

    fn retain_faces_where(&mut self, mut keep: impl FnMut(&[usize; 3]) -> bool) -> usize {
        let mask: Vec<bool> = self.faces.iter().map(|f| keep(f)).collect();
        self.retain_faces(|i| mask[i])
    }

    /// Remove faces with the same vertex set, whatever their winding.
    pub fn remove_duplicate_faces(&mut self) -> usize {
        fn normalize_face(face: [usize; 3]) -> [usize; 3] {
            let mut v = face;
            v.sort_unstable();
            v
        }
        let mut seen: AHashSet<[usize; 3]> = AHashSet::with_capacity(self.faces.len());
        let removed = self.retain_faces_where(|f| seen.insert(normalize_face(*f)));
        if removed > 0 {
            debug!(removed, "duplicate faces removed");
        }
        removed
    }

    /// Remove faces with an area below `area_threshold`.
    pub fn remove_degenerate_faces(&mut self, area_threshold: f64) -> usize {
        let keep: Vec<bool> = (0..self.faces.len())
            .map(|f| 0.5 * self.face_normal(f).norm() >= area_threshold)
            .collect();
        let removed = self.retain_faces(|f| keep[f]);
        if removed > 0 {
            debug!(removed, "degenerate faces removed");
        }
        removed
    }

    /// Drop vertices no face refers to.
    pub fn remove_unreferenced_vertices(&mut self) -> usize {
        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut vertices = Vec::with_capacity(self.vertices.len());
        for f in &mut self.faces {
            for v in f.iter_mut() {
                if remap[*v] == usize::MAX {
                    remap[*v] = vertices.len();
                    vertices.push(self.vertices[*v]);
                }
                *v = remap[*v];
            }
        }
        let removed = self.vertices.len() - vertices.len();
        self.vertices = vertices;
        if removed > 0 {
            info!(removed, "unreferenced vertices removed");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> TriMesh {
        let mut m = TriMesh::new();
        let v = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        m.append(&v, &[[0, 1, 2]], 0, PatchId(0));
        let w = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 1e-9),
        ];
        m.append(&w, &[[0, 1, 2]], 1, PatchId(1));
        m
    }

    #[test]
    fn welding_joins_patch_seams() {
        let mut m = two_triangles();
        assert_eq!(m.merge_coincident_vertices(1e-6), 2);
        assert_eq!(m.vertices.len(), 4);
        assert_eq!(m.connected_components().len(), 1);
    }

    #[test]
    fn duplicate_faces_ignore_winding() {
        let mut m = two_triangles();
        m.faces.push([2, 1, 0]);
        m.tags.push(0);
        m.patches.push(PatchId(0));
        assert_eq!(m.remove_duplicate_faces(), 1);
        assert_eq!(m.faces.len(), 2);
    }
}
