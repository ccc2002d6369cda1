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
    MeshGenerator, PatchGroup, PipelineConfig,
    geometry::{Point3, Vector3},
    mesh::{FnSurface, ParamPatch, PatchId, PlaneSurface},
    mesh_processing::{FilterLimits, IntersectionTopology, filter_polyline},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn plane(name: &str, origin: [f64; 3], du: [f64; 3], dv: [f64; 3]) -> ParamPatch {
    let v = |a: [f64; 3]| Vector3::new(a[0], a[1], a[2]);
    ParamPatch::new(
        name,
        PlaneSurface::new(Point3::new(origin[0], origin[1], origin[2]), v(du), v(dv)),
    )
}

/// Horizontal unit square crossed by a wall at x = 0.4.
fn two_planes() -> MeshGenerator {
    let mut generator = MeshGenerator::new(PipelineConfig::default().with_min_leaf_size(2));
    generator
        .add_component(
            PatchGroup::new("pair")
                .with_patch(plane("floor", [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]))
                .with_patch(plane("wall", [0.4, -0.1, -0.4], [0.0, 1.2, 0.0], [0.0, 0.0, 1.1])),
        )
        .unwrap();
    generator
}

/// Three mutually crossing planes meeting at (0.37, 0.43, 0.1).
fn three_planes() -> MeshGenerator {
    let mut generator = MeshGenerator::new(PipelineConfig::default().with_min_leaf_size(2));
    generator
        .add_component(
            PatchGroup::new("corner")
                .with_patch(plane("z", [0.0, 0.0, 0.1], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]))
                .with_patch(plane("x", [0.37, -0.1, -0.5], [0.0, 1.2, 0.0], [0.0, 0.0, 1.0]))
                .with_patch(plane("y", [-0.1, 0.43, -0.6], [1.2, 0.0, 0.0], [0.0, 0.0, 1.15])),
        )
        .unwrap();
    generator
}

/// Unit floor crossed by a wall standing on the grid line x = 0.5.
fn wall_on_grid_line() -> MeshGenerator {
    let mut generator = MeshGenerator::new(PipelineConfig::default().with_min_leaf_size(2));
    generator
        .add_component(
            PatchGroup::new("aligned")
                .with_patch(plane("floor", [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]))
                .with_patch(plane("wall", [0.5, 0.0, -0.5], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0])),
        )
        .unwrap();
    generator
}

/// Unit cylinder around the z axis, seam at (1, 0, z), cut by the plane z = 0.
fn cylinder_through_plane() -> MeshGenerator {
    let cylinder = ParamPatch::new(
        "cylinder",
        FnSurface(|u: f64, v: f64| {
            let a = std::f64::consts::TAU * u;
            Point3::new(a.cos(), a.sin(), -0.7 + 1.6 * v)
        }),
    );
    let mut generator = MeshGenerator::new(PipelineConfig::default().with_min_leaf_size(2));
    generator
        .add_component(
            PatchGroup::new("tube")
                .with_patch(cylinder)
                .with_patch(plane("cut", [-1.45, -1.3, 0.0], [3.0, 0.0, 0.0], [0.0, 2.9, 0.0])),
        )
        .unwrap();
    generator
}

fn intersected(mut generator: MeshGenerator) -> MeshGenerator {
    generator.preprocess();
    generator.intersect();
    generator
}

#[test]
fn single_crossing_gives_one_line() {
    let generator = intersected(two_planes());
    let topo = generator.topology();
    assert_eq!(topo.lines().len(), 1);
    assert_eq!(topo.stats().splits, 0);
    assert!(topo.junctions().is_empty());

    let line = &topo.lines()[0];
    assert!(!line.closed);
    let ends = [line.nodes[0], line.nodes[line.nodes.len() - 1]];
    let mut ys: Vec<f64> = ends.iter().map(|&n| topo.nodes()[n].position[1]).collect();
    ys.sort_by(f64::total_cmp);
    assert!(ys[0].abs() < 1e-9 && (ys[1] - 1.0).abs() < 1e-9);
    for &n in &ends {
        assert!(topo.nodes()[n].on_boundary);
    }
    for node in topo.nodes() {
        assert!((node.position[0] - 0.4).abs() < 1e-9);
        assert!(node.position[2].abs() < 1e-9);
    }
}

#[test]
fn crossing_along_grid_edges_gives_one_line() {
    let generator = intersected(wall_on_grid_line());
    let topo = generator.topology();
    assert_eq!(topo.lines().len(), 1);

    let line = &topo.lines()[0];
    assert!(!line.closed);
    assert_eq!(line.nodes.len(), 5);
    let mut ys: Vec<f64> = line.nodes.iter().map(|&n| topo.nodes()[n].position[1]).collect();
    ys.sort_by(f64::total_cmp);
    for (y, expected) in ys.iter().zip([0.0, 0.25, 0.5, 0.75, 1.0]) {
        assert!((y - expected).abs() < 1e-9);
    }
    for &n in &line.nodes {
        let p = topo.nodes()[n].position;
        assert!((p[0] - 0.5).abs() < 1e-9 && p[2].abs() < 1e-9);
    }
}

#[test]
fn seam_ends_stay_apart() {
    let generator = intersected(cylinder_through_plane());
    let topo = generator.topology();
    assert_eq!(topo.lines().len(), 1);

    let line = &topo.lines()[0];
    assert!(!line.closed);
    let (first, last) = (line.nodes[0], line.nodes[line.nodes.len() - 1]);
    assert_ne!(first, last);
    let seam = Point3::new(1.0, 0.0, 0.0);
    let mut us = Vec::new();
    for n in [first, last] {
        let node = &topo.nodes()[n];
        assert!(node.position.distance_to(&seam) < 1e-9);
        assert!(node.on_boundary);
        us.push(node.param(PatchId(0)).unwrap()[0]);
    }
    us.sort_by(f64::total_cmp);
    assert!(us[0] < 1e-9 && us[1] > 1.0 - 1e-9);
}

#[test]
fn lines_partition_the_segments() {
    for generator in [intersected(two_planes()), intersected(three_planes())] {
        let topo = generator.topology();
        let mut owner = vec![0usize; topo.segments().len()];
        for line in topo.lines() {
            assert_eq!(line.nodes.len(), line.segments.len() + 1);
            for &s in &line.segments {
                owner[s] += 1;
            }
        }
        assert!(owner.iter().all(|&c| c == 1));
    }
}

#[test]
fn merging_twice_changes_nothing() {
    let generator = intersected(three_planes());
    let mut topo: IntersectionTopology = generator.topology().clone();
    let nodes = topo.nodes().len();
    let segments = topo.segments().len();
    assert_eq!(topo.merge_nodes(generator.triangles(), generator.config()), nodes);
    assert_eq!(topo.segments().len(), segments);
}

#[test]
fn three_surfaces_meet_in_one_junction() {
    let generator = intersected(three_planes());
    let topo = generator.topology();
    assert_eq!(topo.stats().splits, 3);

    let junctions = topo.junctions();
    assert_eq!(junctions.len(), 1);
    let node = &topo.nodes()[junctions[0]];
    assert_eq!(node.params.len(), 3);
    assert!(node.position.distance_to(&Point3::new(0.37, 0.43, 0.1)) < 1e-9);
    assert_eq!(topo.node_degrees()[junctions[0]], 6);
    assert_eq!(topo.patches(), vec![PatchId(0), PatchId(1), PatchId(2)]);
}

#[test]
fn projections_land_on_their_patch() {
    for generator in [intersected(two_planes()), intersected(three_planes())] {
        let topo = generator.topology();
        for patch in topo.patches() {
            let surface = generator.registry().get(patch).unwrap();
            let touching: Vec<usize> = topo.lines_touching(patch).collect();
            assert!(!touching.is_empty());
            for line in touching {
                let (uv, xyz) = topo.projection(line, patch).unwrap();
                assert_eq!(uv.len(), xyz.len());
                assert!(uv.len() >= 2);
                for (p, q) in uv.iter().zip(&xyz) {
                    assert!((0.0..=1.0).contains(&p[0]) && (0.0..=1.0).contains(&p[1]));
                    assert!(surface.evaluate(p).distance_to(q) < 1e-7);
                }
            }
        }
    }
}

#[test]
fn filtered_lines_keep_their_ends() {
    let generator = intersected(two_planes());
    let topo = generator.topology();
    for (l, line) in topo.lines().iter().enumerate() {
        let kept = topo.filtered_nodes(l);
        assert!(kept.len() <= line.nodes.len());
        assert_eq!(kept.first(), line.nodes.first());
        assert_eq!(kept.last(), line.nodes.last());
    }
}

#[test]
fn filtering_random_polylines_never_grows_them() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let n = rng.random_range(2..40);
        let mut p = Point3::new(0.0, 0.0, 0.0);
        let mut points = Vec::with_capacity(n);
        for _ in 0..n {
            points.push(p);
            p = p.add_vector(&Vector3::new(
                rng.random_range(0.01..0.2),
                rng.random_range(-0.1..0.1),
                rng.random_range(-0.05..0.05),
            ));
        }
        let limits: Vec<FilterLimits> = (0..n)
            .map(|_| FilterLimits {
                max_length: rng.random_range(0.1..1.0),
                min_length: 1e-3,
                max_phi: rng.random_range(0.1..1.5),
                local_size: rng.random_range(0.05..0.5),
            })
            .collect();

        let kept = filter_polyline(&points, &limits, 1.8);
        assert!(kept.len() <= n);
        assert_eq!(kept.first(), Some(&0));
        assert_eq!(kept.last(), Some(&(n - 1)));
        assert!(kept.windows(2).all(|w| w[0] < w[1]));
    }
}
