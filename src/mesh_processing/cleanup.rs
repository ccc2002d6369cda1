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

//! Passes run on the merged mesh after every patch is final: wake
//! extraction, internal region removal, tri-star removal and destretching.

use ahash::AHashSet;
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::{
    geometry::{point::Point3, util::triangle_stretch, vector::Vector3},
    mesh::{patch::PatchId, tri_mesh::TriMesh},
};

/// Skewed ray direction for parity tests, chosen to avoid grazing
/// axis-aligned edges.
const RAY_DIR: [f64; 3] = [0.5377, 0.5773, 0.6143];

/// Remove the faces of patches selected by `is_wake` and return the part of them
/// reachable from the farthest-downstream wake face of each wake patch
/// across edges shared by exactly two faces.
pub fn extract_wake(mesh: &mut TriMesh, is_wake: impl Fn(PatchId) -> bool, downstream: &Vector3) -> TriMesh {
    let wake: Vec<usize> = (0..mesh.faces.len()).filter(|&f| is_wake(mesh.patches[f])).collect();
    if wake.is_empty() {
        return TriMesh {
            tag_names: mesh.tag_names.clone(),
            ..TriMesh::default()
        };
    }
    let wake_set: AHashSet<usize> = wake.iter().copied().collect();

    // One seed per wake patch.
    let mut seeds: Vec<(PatchId, usize, f64)> = Vec::new();
    for &f in &wake {
        let reach = mesh.face_centroid(f).as_vector().dot(downstream);
        let patch = mesh.patches[f];
        match seeds.iter_mut().find(|(p, ..)| *p == patch) {
            Some(best) if reach > best.2 => *best = (patch, f, reach),
            Some(_) => {}
            None => seeds.push((patch, f, reach)),
        }
    }
    let seeds: Vec<usize> = seeds.into_iter().map(|(_, f, _)| f).collect();

    let edges = mesh.edge_map();
    let adj = mesh.face_neighbors(&edges, |faces| faces.len() == 2);
    let mut external: Vec<usize> = TriMesh::flood(&adj, &seeds, |f| wake_set.contains(&f))
        .into_iter()
        .collect();
    external.sort_unstable();

    let extracted = mesh.extract_faces(&external);
    mesh.retain_faces(|f| !wake_set.contains(&f));
    debug!(
        wake = wake.len(),
        external = extracted.faces.len(),
        "wake faces extracted"
    );
    extracted
}

/// Regions of faces connected across edges shared by exactly two faces.
fn manifold_regions(mesh: &TriMesh) -> Vec<Vec<usize>> {
    let edges = mesh.edge_map();
    let adj = mesh.face_neighbors(&edges, |faces| faces.len() == 2);
    let mut region_of = vec![usize::MAX; mesh.faces.len()];
    let mut regions = Vec::new();
    for start in 0..mesh.faces.len() {
        if region_of[start] != usize::MAX {
            continue;
        }
        let id = regions.len();
        let mut faces: Vec<usize> = TriMesh::flood(&adj, &[start], |f| {
            region_of[f] == usize::MAX && mesh.tags[f] == mesh.tags[start]
        })
        .into_iter()
        .collect();
        faces.sort_unstable();
        for &f in &faces {
            region_of[f] = id;
        }
        regions.push(faces);
    }
    regions
}

/// Face owning the extreme vertex of `faces` along `axis`; its region lies
/// on the outside of the whole mesh.
fn extreme_face(mesh: &TriMesh, faces: &[usize], axis: usize) -> Option<usize> {
    faces.iter().copied().max_by(|&a, &b| {
        let ma = mesh.faces[a].iter().map(|&v| mesh.vertices[v][axis]).fold(f64::MIN, f64::max);
        let mb = mesh.faces[b].iter().map(|&v| mesh.vertices[v][axis]).fold(f64::MIN, f64::max);
        ma.total_cmp(&mb)
    })
}

/// Tags whose faces form closed shells: every edge inside the tag group is
/// shared by at least two of its faces.
fn closed_tags(mesh: &TriMesh, tags: &[u32]) -> AHashSet<u32> {
    let mut open: AHashSet<u32> = AHashSet::new();
    for faces in mesh.edge_map().values() {
        for &tag in tags {
            if faces.iter().filter(|&&f| mesh.tags[f] == tag).count() == 1 {
                open.insert(tag);
            }
        }
    }
    tags.iter().copied().filter(|t| !open.contains(t)).collect()
}

/// Drop regions enclosed by another closed component. Each tag group keeps the
/// region of its extreme face; every other region casts a ray from its
/// largest face and is removed when the ray crosses the faces of the other
/// tag groups an odd number of times. Returns the removed face count.
///
/// Inside/outside comes from ray parity against the closed tag groups, not
/// from walking outward across edges from the kept seed region, so a region
/// only reachable through another group's interior is still judged by its
/// own ray.
pub fn drop_internal(mesh: &mut TriMesh) -> usize {
    let mut tags: Vec<u32> = mesh.tags.clone();
    tags.sort_unstable();
    tags.dedup();
    if tags.len() < 2 {
        return 0;
    }

    let closed = closed_tags(mesh, &tags);
    if closed.is_empty() {
        return 0;
    }

    let far = 2.0 * mesh.bbox().diagonal().max(1.0);
    let dir = Vector3::new(RAY_DIR[0], RAY_DIR[1], RAY_DIR[2]);
    let regions = manifold_regions(mesh);

    let mut keep_region: AHashSet<usize> = AHashSet::new();
    for &tag in &tags {
        let group: Vec<usize> = (0..mesh.faces.len()).filter(|&f| mesh.tags[f] == tag).collect();
        if let Some(seed) = extreme_face(mesh, &group, 0) {
            if let Some(r) = regions.iter().position(|r| r.binary_search(&seed).is_ok()) {
                keep_region.insert(r);
            }
        }
    }

    let mut doomed: AHashSet<usize> = AHashSet::new();
    for (r, faces) in regions.iter().enumerate() {
        if keep_region.contains(&r) {
            continue;
        }
        let Some(&ray_face) = faces
            .iter()
            .max_by(|&&a, &&b| mesh.face_normal(a).norm().total_cmp(&mesh.face_normal(b).norm()))
        else {
            continue;
        };
        let tag = mesh.tags[ray_face];
        let from: Point3 = mesh.face_centroid(ray_face);
        let to = from.add_vector(&dir.scale(far));
        let hits = mesh.crossings(&from, &to, |f| mesh.tags[f] != tag && closed.contains(&mesh.tags[f]));
        if hits % 2 == 1 {
            doomed.extend(faces.iter().copied());
        }
    }

    let removed = mesh.retain_faces(|f| !doomed.contains(&f));
    if removed > 0 {
        mesh.remove_unreferenced_vertices();
        info!(removed, "internal faces removed");
    }
    removed
}

/// Remove edge-connected clusters of at most `max_faces` faces, unless the
/// mesh consists of nothing else.
pub fn remove_tristars(mesh: &mut TriMesh, max_faces: usize) -> usize {
    let comps = mesh.connected_components();
    if comps.len() < 2 {
        return 0;
    }
    let doomed: AHashSet<usize> = comps
        .iter()
        .filter(|c| c.len() <= max_faces)
        .flatten()
        .copied()
        .collect();
    if doomed.len() == mesh.faces.len() {
        return 0;
    }
    let removed = mesh.retain_faces(|f| !doomed.contains(&f));
    if removed > 0 {
        mesh.remove_unreferenced_vertices();
        info!(removed, "tri-star faces removed");
    }
    removed
}

/// Vertices that must not move: on open or non-manifold edges.
fn fixed_vertices(mesh: &TriMesh) -> Vec<bool> {
    let mut fixed = vec![false; mesh.vertices.len()];
    for (&(a, b), faces) in &mesh.edge_map() {
        if faces.len() != 2 {
            fixed[a] = true;
            fixed[b] = true;
        }
    }
    fixed
}

/// Largest angle between the normal of `f` and an edge neighbor's normal.
fn max_turn(mesh: &TriMesh, f: usize, adj: &[SmallVec<[usize; 3]>]) -> f64 {
    let n = mesh.face_normal(f);
    adj[f]
        .iter()
        .map(|&g| n.angle_to(&mesh.face_normal(g)))
        .fold(0.0, f64::max)
}

/// Collapse the shortest edge of every face whose stretch exceeds
/// `max_stretch` or which turns more than `max_phi` against a neighbor.
/// Runs at most `passes` passes; faces flipped by a collapse get their
/// winding restored. Returns the number of collapses.
pub fn destretch(mesh: &mut TriMesh, passes: usize, max_stretch: f64, max_phi: f64) -> usize {
    let mut total = 0;
    for pass in 0..passes {
        let edges = mesh.edge_map();
        let adj = mesh.face_neighbors(&edges, |faces| faces.len() == 2);
        let fixed = fixed_vertices(mesh);
        let before: Vec<Vector3> = (0..mesh.faces.len()).map(|f| mesh.face_normal(f)).collect();

        let mut remap: Vec<usize> = (0..mesh.vertices.len()).collect();
        let mut touched = vec![false; mesh.vertices.len()];
        let mut collapses = 0;
        for f in 0..mesh.faces.len() {
            let tri = mesh.faces[f];
            if tri.iter().any(|&v| touched[v]) {
                continue;
            }
            let bad = triangle_stretch(&mesh.face_points(f)) > max_stretch || max_turn(mesh, f, &adj) > max_phi;
            if !bad {
                continue;
            }
            let Some((a, b)) = (0..3)
                .map(|k| (tri[k], tri[(k + 1) % 3]))
                .filter(|&(a, b)| !(fixed[a] && fixed[b]))
                .min_by(|&(a, b), &(c, d)| {
                    mesh.vertices[a]
                        .distance_squared_to(&mesh.vertices[b])
                        .total_cmp(&mesh.vertices[c].distance_squared_to(&mesh.vertices[d]))
                })
            else {
                continue;
            };
            let (keep, gone) = if fixed[b] { (b, a) } else { (a, b) };
            if fixed[gone] {
                continue;
            }
            if !fixed[keep] {
                mesh.vertices[keep] = mesh.vertices[keep].midpoint(&mesh.vertices[gone]);
            }
            remap[gone] = keep;
            touched[keep] = true;
            touched[gone] = true;
            collapses += 1;
        }
        if collapses == 0 {
            break;
        }

        for face in &mut mesh.faces {
            *face = face.map(|v| remap[v]);
        }
        let mut flipped = 0;
        for (f, n0) in before.iter().enumerate() {
            let n1 = mesh.face_normal(f);
            if n1.norm2() > 1e-24 && n0.norm2() > 1e-24 && n1.dot(n0) < 0.0 {
                mesh.faces[f].swap(1, 2);
                flipped += 1;
            }
        }
        let keep: Vec<bool> = mesh
            .faces
            .iter()
            .map(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
            .collect();
        mesh.retain_faces(|f| keep[f]);
        total += collapses;
        debug!(pass, collapses, flipped, "destretch pass");
    }
    if total > 0 {
        mesh.remove_degenerate_faces(f64::MIN_POSITIVE);
        mesh.remove_unreferenced_vertices();
        info!(collapses = total, "destretch finished");
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetra(mesh: &mut TriMesh, origin: [f64; 3], size: f64, tag: u32) {
        let [x, y, z] = origin;
        let v = [
            Point3::new(x, y, z),
            Point3::new(x + size, y, z),
            Point3::new(x, y + size, z),
            Point3::new(x, y, z + size),
        ];
        mesh.append(&v, &[[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]], tag, PatchId(tag as usize));
    }

    fn strip(len: usize) -> (Vec<Point3>, Vec<[usize; 3]>) {
        let mut v = Vec::new();
        for i in 0..=len {
            v.push(Point3::new(i as f64, 0.0, 0.0));
            v.push(Point3::new(i as f64, 1.0, 0.0));
        }
        let mut f = Vec::new();
        for i in 0..len {
            let a = 2 * i;
            f.push([a, a + 2, a + 3]);
            f.push([a, a + 3, a + 1]);
        }
        (v, f)
    }

    #[test]
    fn enclosed_region_is_removed() {
        let mut mesh = TriMesh::new();
        tetra(&mut mesh, [0.0, 0.0, 0.0], 4.0, 0);
        tetra(&mut mesh, [0.5, 0.5, 0.5], 0.5, 1);
        tetra(&mut mesh, [10.0, 0.0, 0.0], 1.0, 1);
        assert_eq!(drop_internal(&mut mesh), 4);
        assert_eq!(mesh.faces.len(), 8);
        assert!(mesh.vertices.iter().all(|p| p[0] < 0.5 || p[0] > 1.0 || p[1] < 0.5));
    }

    #[test]
    fn open_sheets_are_never_culled() {
        let mut mesh = TriMesh::new();
        let (v, f) = strip(3);
        mesh.append(&v, &f, 0, PatchId(0));
        tetra(&mut mesh, [0.2, 0.2, -0.5], 0.3, 1);
        assert_eq!(drop_internal(&mut mesh), 0);
    }

    #[test]
    fn small_islands_are_dropped() {
        let mut mesh = TriMesh::new();
        let (v, f) = strip(4);
        mesh.append(&v, &f, 0, PatchId(0));
        mesh.append(
            &[
                Point3::new(9.0, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
                Point3::new(9.0, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
            0,
            PatchId(0),
        );
        assert_eq!(remove_tristars(&mut mesh, 3), 1);
        assert_eq!(mesh.faces.len(), 8);
        assert_eq!(mesh.vertices.len(), 10);

        // A lone island is the whole mesh and stays.
        let mut lone = TriMesh::new();
        lone.append(&v[..3], &[[0, 1, 2]], 0, PatchId(0));
        assert_eq!(remove_tristars(&mut lone, 3), 0);
    }

    #[test]
    fn wake_keeps_only_the_downstream_sheet() {
        let mut mesh = TriMesh::new();
        let (v, f) = strip(1);
        mesh.append(&v, &f, 0, PatchId(0));
        let sheet: Vec<Point3> = v.iter().map(|p| Point3::new(p[0] + 2.0, p[1], p[2])).collect();
        mesh.append(&sheet, &f, 1, PatchId(1));
        mesh.append(
            &[
                Point3::new(0.5, 3.0, 0.0),
                Point3::new(1.0, 3.0, 0.0),
                Point3::new(0.5, 4.0, 0.0),
            ],
            &[[0, 1, 2]],
            1,
            PatchId(1),
        );

        let wake = extract_wake(&mut mesh, |p| p == PatchId(1), &Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(wake.faces.len(), 2);
        assert!(wake.vertices.iter().all(|p| p[0] >= 2.0));
        assert_eq!(mesh.faces.len(), 2);
        assert!(mesh.patches.iter().all(|&p| p == PatchId(0)));
    }

    #[test]
    fn regular_strip_needs_no_destretching() {
        let mut mesh = TriMesh::new();
        let (v, f) = strip(5);
        mesh.append(&v, &f, 0, PatchId(0));
        assert_eq!(destretch(&mut mesh, 3, 20.0, 2.5), 0);
        assert_eq!(mesh.faces.len(), 10);
    }

    #[test]
    fn sliver_is_collapsed_without_inversions() {
        let mut mesh = TriMesh::new();
        let v = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(1.0, 0.99, 0.0),
            Point3::new(1.0, 1.01, 0.0),
        ];
        let f = [[0, 1, 4], [1, 5, 4], [1, 2, 5], [2, 3, 5], [3, 0, 4], [3, 4, 5]];
        mesh.append(&v, &f, 0, PatchId(0));

        assert_eq!(destretch(&mut mesh, 3, 20.0, 2.5), 1);
        assert_eq!(mesh.faces.len(), 4);
        assert!((0..mesh.faces.len()).all(|f| mesh.face_normal(f)[2] > 0.0));
        assert_eq!(mesh.vertices.len(), 5);
        assert!(mesh.vertices.iter().any(|p| p.distance_to(&Point3::new(1.0, 1.0, 0.0)) < 1e-12));
    }
}
