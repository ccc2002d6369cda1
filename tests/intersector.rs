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

use patchmesh::{
    geometry::{Point3, Vector3},
    mesh::{FnSurface, IntersectionSegment, ParamPatch, Patch, PatchId, PlaneSurface, Side},
    mesh_processing::{SpatialIntersector, StitchConnection, stitch},
    operations::WorkerPool,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

type Key = ([usize; 2], [u64; 6]);

fn key(s: &IntersectionSegment) -> Key {
    let c = [s.src[0], s.src[1], s.src[2], s.tgt[0], s.tgt[1], s.tgt[2]];
    (s.tri, c.map(f64::to_bits))
}

fn plane(name: &str, origin: Point3, du: Vector3, dv: Vector3, nu: usize, nv: usize) -> ParamPatch {
    let mut p = ParamPatch::new(name, PlaneSurface::new(origin, du, dv));
    p.premesh_with_grid(nu, nv);
    p
}

/// A gently tilted horizontal sheet and a steep wall crossing it.
fn crossing_pair(rng: &mut StdRng) -> (ParamPatch, ParamPatch) {
    let floor = plane(
        "floor",
        Point3::new(0.0, 0.0, rng.random_range(-0.05..0.05)),
        Vector3::new(1.0, 0.0, rng.random_range(-0.2..0.2)),
        Vector3::new(0.0, 1.0, rng.random_range(-0.2..0.2)),
        8,
        8,
    );
    let wall = plane(
        "wall",
        Point3::new(rng.random_range(0.2..0.8), -0.1, -0.5),
        Vector3::new(rng.random_range(-0.1..0.1), 1.2, 0.0),
        Vector3::new(rng.random_range(-0.3..0.3), 0.0, 1.0),
        7,
        9,
    );
    (floor, wall)
}

fn segments(a: &ParamPatch, b: &ParamPatch, min_leaf: usize, pool: Option<&WorkerPool>) -> Vec<Key> {
    let mut isec = SpatialIntersector::new(min_leaf);
    isec.add_patch(PatchId(0), a);
    isec.add_patch(PatchId(1), b);
    isec.finalize();
    isec.compute(pool, || false);
    let mut keys: Vec<Key> = isec.collect(1e-9).iter().map(key).collect();
    keys.sort_unstable();
    keys
}

#[test]
fn leaf_size_does_not_change_the_result() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let pool = WorkerPool::new(3).unwrap();
    for _ in 0..5 {
        let (a, b) = crossing_pair(&mut rng);
        let reference = segments(&a, &b, usize::MAX / 4, None);
        assert!(!reference.is_empty());
        for leaf in [1, 2, 5, 17] {
            assert_eq!(segments(&a, &b, leaf, None), reference, "leaf size {leaf}");
        }
        assert_eq!(segments(&a, &b, 1, Some(&pool)), reference);
    }
}

#[test]
fn every_segment_pairs_two_patches_in_order() {
    let mut rng = StdRng::seed_from_u64(11);
    let (a, b) = crossing_pair(&mut rng);
    let mut isec = SpatialIntersector::new(4);
    isec.add_patch(PatchId(0), &a);
    isec.add_patch(PatchId(1), &b);
    isec.finalize();
    isec.compute(None, || false);
    let tris = isec.triangles();
    for s in isec.collect(1e-9) {
        assert_eq!(s.patches(tris), [PatchId(0), PatchId(1)]);
        assert!(!s.enforced);
        assert!(s.length() > 0.0);
    }
    assert_eq!(isec.patches(), &[PatchId(0), PatchId(1)]);
}

#[test]
fn neighbors_are_never_intersected() {
    let mut rng = StdRng::seed_from_u64(3);
    let (a, b) = crossing_pair(&mut rng);
    let mut isec = SpatialIntersector::new(2);
    isec.add_patch(PatchId(0), &a);
    isec.add_patch(PatchId(1), &b);
    isec.mark_neighbors(PatchId(1), PatchId(0));
    isec.finalize();
    assert!(isec.bbox().diagonal() > 0.0);
    isec.compute(None, || false);
    assert!(isec.collect(1e-9).is_empty());
}

#[test]
fn interrupted_traversal_stops_early() {
    let mut rng = StdRng::seed_from_u64(5);
    let (a, b) = crossing_pair(&mut rng);
    let mut isec = SpatialIntersector::new(1);
    isec.add_patch(PatchId(0), &a);
    isec.add_patch(PatchId(1), &b);
    isec.finalize();
    isec.compute(None, || true);
    assert!(isec.collect(1e-9).is_empty());
}

#[test]
fn stitched_boundary_replaces_touching_pairs() {
    // Flat sheet and a sheet hinged upwards along x = 1, eleven matching
    // vertices on the shared edge.
    let a = plane(
        "flat",
        Point3::new(0.0, 0.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        1,
        10,
    );
    let b = plane(
        "hinged",
        Point3::new(1.0, 0.0, 0.0),
        Vector3::new(0.6, 0.0, 0.8),
        Vector3::new(0.0, 1.0, 0.0),
        1,
        10,
    );
    assert_eq!(a.boundary(Side::East).len(), 11);
    assert_eq!(b.boundary(Side::West).len(), 11);

    let mut isec = SpatialIntersector::new(2);
    isec.add_patch(PatchId(0), &a);
    isec.add_patch(PatchId(1), &b);
    isec.finalize();
    isec.compute(None, || false);

    let conn = StitchConnection::new(PatchId(0), Side::East, PatchId(1), Side::West);
    let enforced = stitch(&conn, &a, &b, isec.triangles());
    assert_eq!(enforced.len(), 10);
    for seg in enforced {
        isec.enforce(seg);
    }
    assert_eq!(isec.enforced().len(), 10);

    let all = isec.collect(1e-6);
    assert_eq!(all.len(), 10);
    assert!(all.iter().all(|s| s.enforced));
    for s in &all {
        assert!((s.src[0] - 1.0).abs() < 1e-12 && (s.tgt[0] - 1.0).abs() < 1e-12);
        assert!((s.length() - 0.1).abs() < 1e-9);
    }
}

/// Unit tube over `z0 <= z <= z0 + 1`, ten cells around.
fn tube(name: &str, z0: f64) -> ParamPatch {
    let mut p = ParamPatch::new(
        name,
        FnSurface(move |u: f64, v: f64| {
            let a = std::f64::consts::TAU * u;
            Point3::new(a.cos(), a.sin(), z0 + v)
        }),
    );
    p.premesh_with_grid(10, 2);
    p
}

#[test]
fn stitched_rim_gives_one_segment_per_vertex() {
    let upper = tube("upper", 0.0);
    let lower = tube("lower", -1.0);
    let rim = upper.boundary(Side::South);
    // Ten distinct rim vertices; the seam repeats the first one.
    assert_eq!(rim.len(), 11);
    let xyz = upper.vertices();
    assert!(xyz[rim[0]].distance_to(&xyz[rim[10]]) < 1e-12);

    let mut isec = SpatialIntersector::new(2);
    isec.add_patch(PatchId(0), &upper);
    isec.add_patch(PatchId(1), &lower);
    isec.finalize();
    isec.compute(None, || false);

    let conn = StitchConnection::new(PatchId(0), Side::South, PatchId(1), Side::North);
    let enforced = stitch(&conn, &upper, &lower, isec.triangles());
    assert_eq!(enforced.len(), 10);
    for seg in enforced {
        assert!(seg.src[2].abs() < 1e-12 && seg.tgt[2].abs() < 1e-12);
        isec.enforce(seg);
    }

    let all = isec.collect(1e-6);
    assert_eq!(all.len(), 10);
    assert!(all.iter().all(|s| s.enforced));
}

#[test]
fn reversed_stitch_walks_the_other_way() {
    let a = plane(
        "a",
        Point3::new(0.0, 0.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        1,
        4,
    );
    // Same edge, parameterised from the top down.
    let b = plane(
        "b",
        Point3::new(1.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(0.0, -1.0, 0.0),
        1,
        4,
    );
    let mut isec = SpatialIntersector::new(2);
    isec.add_patch(PatchId(0), &a);
    isec.add_patch(PatchId(1), &b);
    isec.finalize();

    let conn = StitchConnection::new(PatchId(0), Side::East, PatchId(1), Side::West).reversed_b();
    let segs = stitch(&conn, &a, &b, isec.triangles());
    assert_eq!(segs.len(), 4);
    let tris = isec.triangles();
    for s in &segs {
        // Both owners touch the stitched stretch.
        for side in 0..2 {
            let rec = tris.get(s.tri[side]);
            let near = |p: &Point3| rec.points.iter().filter(|q| q.distance_to(p) < 1e-12).count();
            assert_eq!(near(&s.src) + near(&s.tgt), 2);
        }
    }
}
