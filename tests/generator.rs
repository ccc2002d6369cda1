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

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use patchmesh::{
    MeshGenError, MeshGenerator, Outcome, PatchGroup, PipelineConfig,
    geometry::{Point3, Vector3},
    mesh::{ParamPatch, PatchId, PatchKind, PlaneSurface, Side},
    operations::{Progress, ProgressCounter},
};

fn plane(name: &str, origin: [f64; 3], du: [f64; 3], dv: [f64; 3]) -> ParamPatch {
    let v = |a: [f64; 3]| Vector3::new(a[0], a[1], a[2]);
    ParamPatch::new(
        name,
        PlaneSurface::new(Point3::new(origin[0], origin[1], origin[2]), v(du), v(dv)),
    )
}

fn floor() -> ParamPatch {
    plane("floor", [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0])
}

fn wall() -> ParamPatch {
    plane("wall", [0.4, -0.1, -0.4], [0.0, 1.2, 0.0], [0.0, 0.0, 1.1])
}

fn crossing(config: PipelineConfig) -> MeshGenerator {
    let mut generator = MeshGenerator::new(config);
    generator
        .add_component(PatchGroup::new("floor").with_patch(floor()))
        .unwrap();
    generator
        .add_component(PatchGroup::new("wall").with_patch(wall()))
        .unwrap();
    generator
}

fn vertices_where(generator: &MeshGenerator, id: PatchId, pred: impl Fn(&Point3) -> bool) -> Vec<Point3> {
    let patch = generator.registry().get(id).unwrap();
    patch.vertices().iter().copied().filter(|p| pred(p)).collect()
}

#[test]
fn crossing_planes_share_a_constrained_row() {
    let mut generator = crossing(PipelineConfig::default().with_min_leaf_size(2));
    assert_eq!(generator.process().unwrap(), Outcome::Completed);

    let stats = generator.statistics();
    assert_eq!(stats.patches, 2);
    assert_eq!(stats.lines, 1);
    assert_eq!(stats.constraints, 2);

    let row = vertices_where(&generator, PatchId(0), |p| (p[0] - 0.4).abs() < 1e-9);
    assert!(row.len() >= 2);
    let lo = row.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
    let hi = row.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max);
    assert!(lo.abs() < 1e-9 && (hi - 1.0).abs() < 1e-9);

    let on_floor = vertices_where(&generator, PatchId(1), |p| p[2].abs() < 1e-9);
    assert!(on_floor.len() >= 2);

    let mesh = generator.mesh();
    assert_eq!(mesh.tag_names, vec!["floor".to_string(), "wall".to_string()]);
    assert_eq!(mesh.faces.len(), stats.faces);
    let separate: usize = (0..2)
        .map(|i| generator.registry().get(PatchId(i)).unwrap().vertices().len())
        .sum();
    // The constrained rows are welded together.
    assert!(mesh.vertices.len() < separate);
    assert!(mesh.patches.contains(&PatchId(0)) && mesh.patches.contains(&PatchId(1)));
}

#[test]
fn wall_on_a_grid_line_keeps_one_row() {
    let mut generator = MeshGenerator::new(PipelineConfig::default().with_min_leaf_size(2));
    generator
        .add_component(PatchGroup::new("floor").with_patch(floor()))
        .unwrap();
    generator
        .add_component(
            PatchGroup::new("wall")
                .with_patch(plane("wall", [0.5, 0.0, -0.5], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0])),
        )
        .unwrap();
    assert_eq!(generator.process().unwrap(), Outcome::Completed);
    assert_eq!(generator.statistics().lines, 1);

    for (id, on_row) in [
        (PatchId(0), (|p: &Point3| (p[0] - 0.5).abs() < 1e-9) as fn(&Point3) -> bool),
        (PatchId(1), |p: &Point3| p[2].abs() < 1e-9),
    ] {
        let row = vertices_where(&generator, id, on_row);
        assert!(row.len() >= 2);
        let lo = row.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
        let hi = row.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max);
        assert!(lo.abs() < 1e-9 && (hi - 1.0).abs() < 1e-9);
        assert!(row.iter().all(|p| (p[0] - 0.5).abs() < 1e-9 && p[2].abs() < 1e-9));
    }
}

#[test]
fn pooled_and_two_pass_runs_agree_on_topology() {
    let mut serial = crossing(PipelineConfig::default());
    serial.process().unwrap();
    let mut pooled = crossing(PipelineConfig::default().with_threads(3).with_two_pass(true));
    assert_eq!(pooled.process().unwrap(), Outcome::Completed);
    assert_eq!(pooled.statistics().lines, serial.statistics().lines);
    assert!(!pooled.mesh().is_empty());
}

#[test]
fn neighbors_produce_no_segments() {
    let mut generator = MeshGenerator::new(PipelineConfig::default());
    generator
        .add_component(
            PatchGroup::new("touching")
                .with_patch(floor())
                .with_patch(wall())
                .with_neighbors(0, 1),
        )
        .unwrap();
    assert_eq!(generator.process().unwrap(), Outcome::Completed);
    assert!(generator.registry().is_neighbor(PatchId(1), PatchId(0)));
    assert_eq!(generator.statistics().segments, 0);
    assert!(generator.topology().lines().is_empty());
    assert!(!generator.mesh().is_empty());
}

/// Interrupts at the first increment of the third stage.
#[derive(Default)]
struct StopInStage {
    stages: AtomicUsize,
    increments: AtomicUsize,
    stop: AtomicBool,
}

impl Progress for StopInStage {
    fn nsteps(&self, _n: usize) {
        self.stages.fetch_add(1, Ordering::SeqCst);
    }

    fn inc(&self, k: usize) {
        if self.stages.load(Ordering::SeqCst) >= 3 {
            self.increments.fetch_add(k, Ordering::SeqCst);
            self.stop.store(true, Ordering::SeqCst);
        }
    }

    fn interrupt(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn interrupted(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[test]
fn interrupt_during_refinement_leaves_empty_output() {
    let progress = Arc::new(StopInStage::default());
    let mut generator = MeshGenerator::new(PipelineConfig::default()).with_progress(progress.clone());
    generator
        .add_component(
            PatchGroup::new("trio")
                .with_patch(floor())
                .with_patch(wall())
                .with_patch(plane("roof", [0.0, 0.0, 0.3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0])),
        )
        .unwrap();

    assert_eq!(generator.process().unwrap(), Outcome::Interrupted);
    assert!(generator.mesh().is_empty());
    assert_eq!(progress.stages.load(Ordering::SeqCst), 3);
    assert_eq!(progress.increments.load(Ordering::SeqCst), 1);
}

#[test]
fn interrupt_before_start_skips_everything() {
    let progress = Arc::new(ProgressCounter::new());
    progress.interrupt();
    let mut generator = crossing(PipelineConfig::default()).with_progress(progress.clone());
    assert_eq!(generator.process().unwrap(), Outcome::Interrupted);
    assert!(generator.mesh().is_empty());
    assert_eq!(progress.done(), 0);
}

#[test]
fn invalid_configuration_is_rejected() {
    let mut generator = crossing(PipelineConfig::default().with_min_leaf_size(0));
    assert!(matches!(generator.process(), Err(MeshGenError::InvalidConfig { .. })));
    assert!(generator.registry().get(PatchId(0)).unwrap().vertices().is_empty());
}

#[test]
fn cyclic_parents_fail_before_meshing() {
    let mut generator = MeshGenerator::new(PipelineConfig::default());
    generator
        .add_component(
            PatchGroup::new("loop")
                .with_patch(floor())
                .with_patch(wall())
                .with_parent(0, 1)
                .with_parent(1, 0),
        )
        .unwrap();
    assert!(matches!(
        generator.process(),
        Err(MeshGenError::CircularDependency { .. })
    ));
    assert!(generator.registry().get(PatchId(0)).unwrap().triangles().is_empty());
}

#[test]
fn component_relations_are_checked() {
    let mut generator = MeshGenerator::new(PipelineConfig::default());
    let err = generator
        .add_component(PatchGroup::new("bad").with_patch(floor()).with_neighbors(0, 4))
        .unwrap_err();
    assert!(matches!(err, MeshGenError::UnknownPatch { id } if id == PatchId(4)));

    let ids = generator
        .add_component(PatchGroup::new("good").with_patch(floor()).with_patch(wall()))
        .unwrap();
    assert_eq!(ids, vec![PatchId(1), PatchId(2)]);
    assert_eq!(generator.registry().component(PatchId(2)), Some(1));
}

#[test]
fn wake_follows_its_parent_edge() {
    let mut generator = MeshGenerator::new(PipelineConfig::default());
    let ids = generator
        .add_component(
            PatchGroup::new("wing")
                .with_patch(floor())
                .with_patch(ParamPatch::wake(
                    "wake",
                    PlaneSurface::new(
                        Point3::new(1.0, 0.0, 0.0),
                        Vector3::new(2.0, 0.0, 0.0),
                        Vector3::new(0.0, 1.0, 0.0),
                    ),
                    Side::East,
                ))
                .with_neighbors(0, 1)
                .with_parent(1, 0),
        )
        .unwrap();
    assert_eq!(generator.process().unwrap(), Outcome::Completed);

    let registry = generator.registry();
    assert_eq!(registry.get(ids[1]).unwrap().kind(), PatchKind::Wake);
    let edge = registry.get(ids[0]).unwrap().boundary(Side::East).len();
    let mesh = generator.mesh();
    assert!(mesh.patches.contains(&ids[1]));
    let seam = mesh.vertices.iter().filter(|p| (p[0] - 1.0).abs() < 1e-9).count();
    assert_eq!(seam, edge);
}
