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

//! The top-level pipeline: premesh every patch, intersect, refine locally
//! and globally, then merge everything into one mesh.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use ahash::AHashSet;
use tracing::{debug, info, trace};

use crate::{
    config::PipelineConfig,
    error::{MeshGenError, MeshGenResult, PatchDiagnostic},
    mesh::{
        patch::{Patch, PatchId, PatchKind},
        registry::PatchRegistry,
        tri_mesh::TriMesh,
        triangle_set::TriangleSet,
    },
    mesh_processing::{
        cleanup::{destretch, drop_internal, extract_wake, remove_tristars},
        intersector::SpatialIntersector,
        refinement::RefinementAdvisor,
        stitch::{StitchConnection, stitch},
        topology::IntersectionTopology,
    },
    operations::{
        pool::{WorkerPool, run_batch},
        progress::{Progress, ProgressCounter},
    },
};

/// Constraint polylines shorter than this in parameter space are skipped.
const MIN_CONSTRAINT_SPAN: f64 = 1e-9;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn constraint_error(patch: &dyn Patch, diag: PatchDiagnostic) -> MeshGenError {
    MeshGenError::ConstraintInsertion {
        patch: patch.name().to_string(),
        details: diag.to_string(),
    }
}

/// Something that contributes patches to the pipeline, e.g. a wing or a
/// fuselage. Relations and stitches use indices into the patch list the
/// component hands over.
pub trait MeshComponent {
    fn name(&self) -> &str;

    /// Hand over the component's patches. Called once.
    fn take_patches(&mut self) -> Vec<Box<dyn Patch>>;

    /// Pairs of local patch indices that touch but never cross.
    fn neighbor_pairs(&self) -> Vec<(usize, usize)> {
        Vec::new()
    }

    /// `(child, parent)` pairs of local patch indices.
    fn parent_pairs(&self) -> Vec<(usize, usize)> {
        Vec::new()
    }

    /// Stitch connections whose patch handles are local indices.
    fn stitches(&self) -> Vec<StitchConnection> {
        Vec::new()
    }
}

/// Plain list of patches with their relations.
#[derive(Default)]
pub struct PatchGroup {
    name: String,
    patches: Vec<Box<dyn Patch>>,
    neighbors: Vec<(usize, usize)>,
    parents: Vec<(usize, usize)>,
    stitches: Vec<StitchConnection>,
}

impl PatchGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_patch(mut self, patch: impl Patch + 'static) -> Self {
        self.patches.push(Box::new(patch));
        self
    }

    pub fn with_neighbors(mut self, a: usize, b: usize) -> Self {
        self.neighbors.push((a, b));
        self
    }

    pub fn with_parent(mut self, child: usize, parent: usize) -> Self {
        self.parents.push((child, parent));
        self
    }

    pub fn with_stitch(mut self, conn: StitchConnection) -> Self {
        self.stitches.push(conn);
        self
    }
}

impl MeshComponent for PatchGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn take_patches(&mut self) -> Vec<Box<dyn Patch>> {
        std::mem::take(&mut self.patches)
    }

    fn neighbor_pairs(&self) -> Vec<(usize, usize)> {
        self.neighbors.clone()
    }

    fn parent_pairs(&self) -> Vec<(usize, usize)> {
        self.parents.clone()
    }

    fn stitches(&self) -> Vec<StitchConnection> {
        self.stitches.clone()
    }
}

/// How a [`MeshGenerator::process`] call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Stopped on request; the output mesh is empty.
    Interrupted,
}

/// Counters from the most recent run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    pub patches: usize,
    pub triangles: usize,
    pub segments: usize,
    pub enforced: usize,
    pub splits: usize,
    pub nodes: usize,
    pub lines: usize,
    pub constraints: usize,
    pub adapted: usize,
    pub faces: usize,
    pub vertices: usize,
}

pub struct MeshGenerator {
    config: PipelineConfig,
    registry: PatchRegistry,
    component_names: Vec<String>,
    stitches: Vec<StitchConnection>,
    progress: Arc<dyn Progress>,
    pool: Option<WorkerPool>,
    triangles: TriangleSet,
    topology: IntersectionTopology,
    output: Mutex<TriMesh>,
    stats: GeneratorStats,
}

impl MeshGenerator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            registry: PatchRegistry::new(),
            component_names: Vec::new(),
            stitches: Vec::new(),
            progress: Arc::new(ProgressCounter::new()),
            pool: None,
            triangles: TriangleSet::new(),
            topology: IntersectionTopology::default(),
            output: Mutex::new(TriMesh::new()),
            stats: GeneratorStats::default(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn progress(&self) -> &Arc<dyn Progress> {
        &self.progress
    }

    pub fn registry(&self) -> &PatchRegistry {
        &self.registry
    }

    /// Topology of the last intersection pass.
    pub fn topology(&self) -> &IntersectionTopology {
        &self.topology
    }

    /// Triangle table of the last intersection pass.
    pub fn triangles(&self) -> &TriangleSet {
        &self.triangles
    }

    pub fn statistics(&self) -> GeneratorStats {
        self.stats
    }

    /// Copy of the merged output mesh.
    pub fn mesh(&self) -> TriMesh {
        lock(&self.output).clone()
    }

    /// Register the patches of `component` under a new tag. Returns their
    /// handles in the component's order.
    pub fn add_component(&mut self, mut component: impl MeshComponent) -> MeshGenResult<Vec<PatchId>> {
        let tag = self.component_names.len() as u32;
        self.component_names.push(component.name().to_string());
        let ids: Vec<PatchId> = component
            .take_patches()
            .into_iter()
            .map(|p| self.registry.add(p, tag))
            .collect();
        let global = |i: usize| {
            ids.get(i)
                .copied()
                .ok_or(MeshGenError::UnknownPatch { id: PatchId(i) })
        };
        for (a, b) in component.neighbor_pairs() {
            self.registry.register_neighbor(global(a)?, global(b)?)?;
        }
        for (child, parent) in component.parent_pairs() {
            self.registry.register_parent(global(child)?, global(parent)?)?;
        }
        for mut conn in component.stitches() {
            conn.a = global(conn.a.0)?;
            conn.b = global(conn.b.0)?;
            self.stitches.push(conn);
        }
        debug!(
            component = component.name(),
            patches = ids.len(),
            "component registered"
        );
        Ok(ids)
    }

    pub fn register_neighbor(&mut self, a: PatchId, b: PatchId) -> MeshGenResult<()> {
        self.registry.register_neighbor(a, b)
    }

    pub fn register_parent(&mut self, child: PatchId, parent: PatchId) -> MeshGenResult<()> {
        self.registry.register_parent(child, parent)
    }

    /// Stitch two boundaries given by global handles.
    pub fn add_stitch(&mut self, conn: StitchConnection) -> MeshGenResult<()> {
        for id in [conn.a, conn.b] {
            if self.registry.get(id).is_none() {
                return Err(MeshGenError::UnknownPatch { id });
            }
        }
        self.stitches.push(conn);
        Ok(())
    }

    fn abort(&mut self) -> Outcome {
        lock(&self.output).clear();
        info!("mesh generation interrupted");
        Outcome::Interrupted
    }

    /// Run the whole pipeline. An interrupt leaves the output empty and
    /// returns [`Outcome::Interrupted`]; a patch refusing a constraint fails
    /// the run with [`MeshGenError::ConstraintInsertion`].
    pub fn process(&mut self) -> MeshGenResult<Outcome> {
        self.config.validate()?;
        // Structural problems surface before any patch is touched.
        self.registry.meshing_order()?;
        if self.pool.is_none() && self.config.threads > 0 {
            self.pool = Some(WorkerPool::new(self.config.threads)?);
        }
        lock(&self.output).clear();
        self.stats = GeneratorStats {
            patches: self.registry.len(),
            ..GeneratorStats::default()
        };
        let start = Instant::now();

        self.preprocess();
        if self.progress.interrupted() {
            return Ok(self.abort());
        }
        self.intersect();
        if self.progress.interrupted() {
            return Ok(self.abort());
        }
        if self.config.two_pass {
            self.refine_locally()?;
            if self.progress.interrupted() {
                return Ok(self.abort());
            }
            self.adapt_caps()?;
            self.intersect();
            if self.progress.interrupted() {
                return Ok(self.abort());
            }
        }
        self.refine_globally()?;
        if self.progress.interrupted() {
            return Ok(self.abort());
        }
        self.adapt_caps()?;
        if self.progress.interrupted() {
            return Ok(self.abort());
        }
        self.finalize();
        if self.progress.interrupted() {
            return Ok(self.abort());
        }

        info!(
            faces = self.stats.faces,
            vertices = self.stats.vertices,
            lines = self.stats.lines,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "mesh generation finished"
        );
        Ok(Outcome::Completed)
    }

    /// Premesh every patch, one task per component.
    pub fn preprocess(&mut self) {
        let start = Instant::now();
        let progress = &*self.progress;
        progress.nsteps(self.registry.len());

        let groups = self.component_names.len().max(1);
        let mut work: Vec<Vec<&mut (dyn Patch + 'static)>> = (0..groups).map(|_| Vec::new()).collect();
        for e in self.registry.entries_mut() {
            let slot = (e.component as usize).min(groups - 1);
            work[slot].push(e.patch.as_mut());
        }
        run_batch(self.pool.as_ref(), work, |patches| {
            for patch in patches {
                if progress.interrupted() {
                    return;
                }
                patch.premesh();
                progress.inc(1);
            }
        });
        debug!(
            patches = self.registry.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "premesh done"
        );
    }

    /// Build the spatial index over the current patch meshes, find all
    /// crossings, add stitched boundaries and rebuild the topology.
    pub fn intersect(&mut self) {
        let start = Instant::now();
        let progress = Arc::clone(&self.progress);
        progress.nsteps(3);

        let mut isec = SpatialIntersector::new(self.config.min_leaf_size);
        for id in self.registry.ids() {
            if let Some(patch) = self.registry.get(id) {
                isec.add_patch(id, patch);
            }
        }
        for (a, b) in self.registry.neighbor_pairs() {
            isec.mark_neighbors(a, b);
        }
        isec.finalize();
        progress.inc(1);

        isec.compute(self.pool.as_ref(), || progress.interrupted());
        progress.inc(1);
        if progress.interrupted() {
            return;
        }

        let mut enforced = Vec::new();
        for conn in &self.stitches {
            if let (Some(a), Some(b)) = (self.registry.get(conn.a), self.registry.get(conn.b)) {
                enforced.extend(stitch(conn, a, b, isec.triangles()));
            }
        }
        self.stats.enforced = enforced.len();
        for seg in enforced {
            isec.enforce(seg);
        }

        let segments = isec.collect(self.config.merge_tolerance);
        let tris = isec.into_triangles();
        let topology =
            IntersectionTopology::build(segments, &tris, &self.registry, &self.config, self.pool.as_ref());
        progress.inc(1);

        let stats = topology.stats();
        self.stats.triangles = tris.len();
        self.stats.segments = stats.segments;
        self.stats.splits = stats.splits;
        self.stats.nodes = stats.nodes;
        self.stats.lines = stats.lines;
        self.triangles = tris;
        self.topology = topology;
        info!(
            triangles = self.stats.triangles,
            segments = stats.segments,
            lines = stats.lines,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "intersection pass done"
        );
    }

    /// Refine each patch around the crossings where its triangles are much
    /// coarser than the patch on the other side.
    pub fn refine_locally(&mut self) -> MeshGenResult<()> {
        let progress = &*self.progress;
        let advisor = RefinementAdvisor::new(
            &self.triangles,
            self.topology.segments(),
            self.config.refine_ratio_threshold,
        );
        let mut spots = advisor.spots();
        let mut work = Vec::new();
        for (i, e) in self.registry.entries_mut().iter_mut().enumerate() {
            let id = PatchId(i);
            let patch_spots = spots.remove(&id).unwrap_or_default();
            let affected = advisor.affected_vertices(id);
            if patch_spots.is_empty() && affected.is_empty() {
                continue;
            }
            work.push((e.patch.as_mut(), patch_spots, affected));
        }
        progress.nsteps(work.len());
        debug!(patches = work.len(), "local refinement");

        let results = run_batch(self.pool.as_ref(), work, |(patch, spots, affected)| -> MeshGenResult<()> {
            if progress.interrupted() {
                return Ok(());
            }
            let saved = patch.criterion().spots().to_vec();
            patch.criterion_mut().add_spots(spots);
            let result = patch.refine_around(&affected);
            patch.criterion_mut().clear_spots();
            patch.criterion_mut().add_spots(saved);
            progress.inc(1);
            result.map_err(|d| constraint_error(&*patch, d))
        });
        results.into_iter().collect()
    }

    /// Constrain every patch with the projections of the lines touching it
    /// and re-triangulate, parents before children.
    pub fn refine_globally(&mut self) -> MeshGenResult<()> {
        let start = Instant::now();
        let levels = self.registry.meshing_order()?;
        let progress = &*self.progress;
        progress.nsteps(self.registry.len());

        let mut constraints = 0;
        for level in levels {
            if progress.interrupted() {
                break;
            }
            let members: AHashSet<PatchId> = level.into_iter().collect();
            let work: Vec<(PatchId, &mut (dyn Patch + 'static))> = self
                .registry
                .entries_mut()
                .iter_mut()
                .enumerate()
                .filter(|(i, _)| members.contains(&PatchId(*i)))
                .map(|(i, e)| (PatchId(i), e.patch.as_mut()))
                .collect();
            let topology = &self.topology;
            let config = &self.config;
            let results = run_batch(self.pool.as_ref(), work, |(id, patch)| -> MeshGenResult<usize> {
                if progress.interrupted() {
                    return Ok(0);
                }
                let n = constrain_and_refine(id, patch, topology, config)?;
                progress.inc(1);
                Ok(n)
            });
            let counts: Vec<usize> = results.into_iter().collect::<MeshGenResult<_>>()?;
            constraints += counts.iter().sum::<usize>();
        }
        self.stats.constraints = constraints;
        info!(
            constraints,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "global refinement done"
        );
        Ok(())
    }

    /// Let child patches regenerate from their final parents. A child that
    /// changed gets its constraints reinserted.
    pub fn adapt_caps(&mut self) -> MeshGenResult<()> {
        let levels = self.registry.meshing_order()?;
        let mut adapted = 0;
        for level in levels.iter().skip(1) {
            for &child in level {
                let parents = self.registry.parents(child).to_vec();
                for parent in parents {
                    let Some((c, p)) = self.registry.child_and_parent(child, parent) else {
                        continue;
                    };
                    if !c.adapt(p) {
                        continue;
                    }
                    adapted += 1;
                    trace!(child = c.name(), parent = p.name(), "patch adapted to parent");
                    if self.topology.lines_touching(child).next().is_some() {
                        constrain_and_refine(child, c, &self.topology, &self.config)?;
                    }
                }
            }
        }
        if adapted > 0 {
            debug!(adapted, "child patches regenerated");
        }
        self.stats.adapted += adapted;
        Ok(())
    }

    /// Merge all patches into the output mesh and clean it up.
    pub fn finalize(&mut self) {
        let start = Instant::now();
        self.progress.nsteps(1);
        let config = &self.config;

        let mut mesh = TriMesh::new();
        mesh.tag_names = self.component_names.clone();
        for (i, e) in self.registry.entries().iter().enumerate() {
            mesh.append(e.patch.vertices(), e.patch.triangles(), e.component, PatchId(i));
        }
        mesh.merge_coincident_vertices(config.merge_tolerance);
        mesh.remove_duplicate_faces();

        let wakes: AHashSet<PatchId> = self
            .registry
            .ids()
            .filter(|&id| self.registry.get(id).is_some_and(|p| p.kind() == PatchKind::Wake))
            .collect();
        let wake = extract_wake(&mut mesh, |p| wakes.contains(&p), &config.wake_direction);
        drop_internal(&mut mesh);
        if !wake.is_empty() {
            mesh.append_mesh(&wake);
            mesh.merge_coincident_vertices(config.merge_tolerance);
        }
        remove_tristars(&mut mesh, config.tristar_max_faces);
        if config.destretch_passes > 0 {
            destretch(
                &mut mesh,
                config.destretch_passes,
                config.destretch_max_stretch,
                config.destretch_max_phi,
            );
        }
        mesh.remove_unreferenced_vertices();

        self.stats.faces = mesh.faces.len();
        self.stats.vertices = mesh.vertices.len();
        *lock(&self.output) = mesh;
        self.progress.inc(1);
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "output mesh merged"
        );
    }
}

/// Replace the constraints of `patch` with every line of `topology` that
/// touches it and re-triangulate. Returns the number of inserted curves.
fn constrain_and_refine(
    id: PatchId,
    patch: &mut dyn Patch,
    topology: &IntersectionTopology,
    config: &PipelineConfig,
) -> MeshGenResult<usize> {
    patch.clear_constraints();
    let mut inserted = 0;
    for line in topology.lines_touching(id) {
        let Some((uv, xyz)) = topology.projection(line, id) else {
            continue;
        };
        let span: f64 = uv.windows(2).map(|w| w[0].distance_to(&w[1])).sum();
        if uv.len() < 2 || span < MIN_CONSTRAINT_SPAN {
            trace!(patch = patch.name(), line, "degenerate projection skipped");
            continue;
        }
        patch.constrain(&uv, &xyz).map_err(|d| constraint_error(&*patch, d))?;
        inserted += 1;
    }

    let saved = patch.criterion().max_stretch;
    if inserted > 0 {
        patch.criterion_mut().max_stretch = saved * config.stretch_relaxation;
    }
    let result = patch.refine();
    patch.criterion_mut().max_stretch = saved;
    result.map_err(|d| constraint_error(&*patch, d))?;
    debug!(patch = patch.name(), constraints = inserted, "patch re-triangulated");
    Ok(inserted)
}
