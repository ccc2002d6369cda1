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

//! Reference patch over any [`Surface`]: a structured premesh and a
//! conforming Delaunay re-triangulation in parameter space.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use tracing::{trace, warn};

use crate::{
    error::PatchDiagnostic,
    geometry::{
        point::{Point2, Point3},
        segment::Segment2,
        util::{clamp_unit, triangle_edge_lengths, triangle_normal, triangle_stretch},
        vector::Vector3,
    },
    kernel::orient2d_sign,
    mesh::{
        patch::{MeshCriterion, Patch, PatchKind, Side},
        surface::Surface,
    },
    operations::triangulation::{ConstraintSplit, Delaunay},
};

const MAX_SPLIT_DEPTH: usize = 12;
const MAX_REFINE_PASSES: usize = 8;
const MAX_POINTS: usize = 50_000;
const BOUNDARY_TOL: f64 = 1e-12;
const SEED_CLEARANCE: f64 = 0.3;

#[derive(Clone, Debug)]
struct Constraint {
    uv: Vec<Point2>,
    xyz: Vec<Point3>,
}

pub struct ParamPatch {
    name: String,
    kind: PatchKind,
    surface: Arc<dyn Surface>,
    criterion: MeshCriterion,
    /// Side of the parent a wake attaches to with its `West` side.
    wake_attach: Side,
    u_knots: Vec<f64>,
    v_knots: Vec<f64>,
    uv: Vec<Point2>,
    xyz: Vec<Point3>,
    tris: Vec<[usize; 3]>,
    constraints: Vec<Constraint>,
}

fn uniform_knots(n: usize) -> Vec<f64> {
    let n = n.max(1);
    (0..=n).map(|i| i as f64 / n as f64).collect()
}

/// World positions for the points `conform` inserted on constraint edges,
/// in insertion order. A split reusing an existing point keeps its position.
fn place_splits(xyz: &mut Vec<Point3>, splits: &[ConstraintSplit]) -> Result<(), String> {
    for s in splits {
        if s.point < xyz.len() {
            continue;
        }
        if s.point > xyz.len() {
            return Err(format!(
                "constraint split point {} skips past {} known positions",
                s.point,
                xyz.len()
            ));
        }
        let p = xyz[s.a].midpoint(&xyz[s.b]);
        xyz.push(p);
    }
    Ok(())
}

/// Strict crossing of the open segments `a-b` and `c-d`.
fn segments_cross(a: &Point2, b: &Point2, c: &Point2, d: &Point2) -> bool {
    let o1 = orient2d_sign(a, b, c);
    let o2 = orient2d_sign(a, b, d);
    let o3 = orient2d_sign(c, d, a);
    let o4 = orient2d_sign(c, d, b);
    !o1.is_zero() && !o3.is_zero() && o1 == o2.flipped() && o3 == o4.flipped()
}

impl ParamPatch {
    pub fn new(name: impl Into<String>, surface: impl Surface + 'static) -> Self {
        Self {
            name: name.into(),
            kind: PatchKind::Plain,
            surface: Arc::new(surface),
            criterion: MeshCriterion::default(),
            wake_attach: Side::East,
            u_knots: uniform_knots(1),
            v_knots: uniform_knots(1),
            uv: Vec::new(),
            xyz: Vec::new(),
            tris: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// A wake sheet whose `West` side follows the `attach` boundary of its
    /// parent once the parent is final.
    pub fn wake(name: impl Into<String>, surface: impl Surface + 'static, attach: Side) -> Self {
        let mut p = Self::new(name, surface);
        p.kind = PatchKind::Wake;
        p.wake_attach = attach;
        p
    }

    pub fn with_criterion(mut self, criterion: MeshCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    fn build_grid(&mut self) {
        let nu = self.u_knots.len();
        let nv = self.v_knots.len();
        self.uv.clear();
        self.tris.clear();
        for &v in &self.v_knots {
            for &u in &self.u_knots {
                self.uv.push(Point2::new(u, v));
            }
        }
        for j in 0..nv - 1 {
            for i in 0..nu - 1 {
                let a = j * nu + i;
                let b = a + 1;
                let c = a + nu + 1;
                let d = a + nu;
                self.tris.push([a, b, c]);
                self.tris.push([a, c, d]);
            }
        }
        let surface = &self.surface;
        self.xyz = self.uv.iter().map(|p| surface.evaluate(p)).collect();
    }

    /// World-space length of the iso-line at fixed `t` along `axis`.
    fn iso_length(&self, axis: usize, t: f64) -> f64 {
        const SAMPLES: usize = 16;
        let at = |s: f64| {
            let uv = if axis == 0 { Point2::new(s, t) } else { Point2::new(t, s) };
            self.surface.evaluate(&uv)
        };
        (0..SAMPLES)
            .map(|k| {
                let s0 = k as f64 / SAMPLES as f64;
                let s1 = (k + 1) as f64 / SAMPLES as f64;
                at(s0).distance_to(&at(s1))
            })
            .sum()
    }

    fn diagnostic(&self, what: impl std::fmt::Display) -> PatchDiagnostic {
        PatchDiagnostic::new(format!("{}: {what}", self.name))
    }

    /// Rebuild the triangulation from `seeds` plus every stored constraint.
    fn rebuild(&mut self, seeds: Vec<Point2>, run_criterion: bool) -> Result<(), PatchDiagnostic> {
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];

        // Seeds closer to a constraint piece than a fraction of its length
        // (capped by the grid spacing) would only produce slivers against it.
        let spacing = 1.0 / (self.u_knots.len().max(self.v_knots.len()) - 1).max(1) as f64;
        let near_constraint = |p: &Point2| {
            self.constraints.iter().any(|c| {
                c.uv.windows(2).any(|w| {
                    let piece = Segment2::new(&w[0], &w[1]);
                    piece.distance_to_point(p) < SEED_CLEARANCE * piece.length().min(spacing)
                })
            })
        };
        let mut points: Vec<Point2> = corners.to_vec();
        points.extend(seeds.into_iter().filter(|p| !corners.contains(p) && !near_constraint(p)));

        let mut dt = Delaunay::build(&points).map_err(|e| self.diagnostic(e))?;
        let surface = Arc::clone(&self.surface);
        let mut xyz: Vec<Point3> = dt.points.iter().map(|p| surface.evaluate(p)).collect();

        let mut edges: Vec<[usize; 2]> = Vec::new();
        for c in &self.constraints {
            let mut prev: Option<usize> = None;
            for (uv, w) in c.uv.iter().zip(&c.xyz) {
                let Some(idx) = dt.insert(*uv) else {
                    return Err(self.diagnostic(format!("constraint point {uv:?} outside the domain")));
                };
                if idx == xyz.len() {
                    xyz.push(*w);
                } else {
                    xyz[idx] = *w;
                }
                if let Some(p) = prev {
                    edges.push([p, idx]);
                }
                prev = Some(idx);
            }
        }

        let splits = dt
            .conform(&mut edges, MAX_SPLIT_DEPTH)
            .map_err(|e| self.diagnostic(e))?;
        place_splits(&mut xyz, &splits).map_err(|e| self.diagnostic(e))?;

        if run_criterion {
            self.refine_to_criterion(&mut dt, &mut xyz, &mut edges)?;
        }

        dt.remove_degenerate();
        self.uv = dt.points;
        self.xyz = xyz;
        self.tris = dt.triangles;
        trace!(
            patch = %self.name,
            vertices = self.uv.len(),
            triangles = self.tris.len(),
            "rebuilt"
        );
        Ok(())
    }

    /// Triangles turning more than `max_phi` against a neighbor across an
    /// unconstrained edge.
    fn curved_triangles(&self, dt: &Delaunay, xyz: &[Point3], fixed: &AHashSet<(usize, usize)>) -> Vec<bool> {
        let normals: Vec<Vector3> = dt
            .triangles
            .iter()
            .map(|t| triangle_normal(&[xyz[t[0]], xyz[t[1]], xyz[t[2]]]))
            .collect();
        let mut curved = vec![false; dt.triangles.len()];
        let mut first: AHashMap<(usize, usize), usize> = AHashMap::with_capacity(dt.triangles.len() * 2);
        for (i, t) in dt.triangles.iter().enumerate() {
            for k in 0..3 {
                let (a, b) = (t[k], t[(k + 1) % 3]);
                let key = (a.min(b), a.max(b));
                if fixed.contains(&key) {
                    continue;
                }
                if let Some(&j) = first.get(&key) {
                    if normals[i].angle_to(&normals[j]) > self.criterion.max_phi {
                        curved[i] = true;
                        curved[j] = true;
                    }
                } else {
                    first.insert(key, i);
                }
            }
        }
        curved
    }

    fn refine_to_criterion(
        &self,
        dt: &mut Delaunay,
        xyz: &mut Vec<Point3>,
        edges: &mut Vec<[usize; 2]>,
    ) -> Result<(), PatchDiagnostic> {
        for _ in 0..MAX_REFINE_PASSES {
            let fixed: AHashSet<(usize, usize)> =
                edges.iter().map(|e| (e[0].min(e[1]), e[0].max(e[1]))).collect();
            let curved = self.curved_triangles(dt, xyz, &fixed);

            let mut candidates = Vec::new();
            for (i, t) in dt.triangles.iter().enumerate() {
                let w = [xyz[t[0]], xyz[t[1]], xyz[t[2]]];
                let lengths = triangle_edge_lengths(&w);
                let (k, longest) = lengths
                    .iter()
                    .copied()
                    .enumerate()
                    .fold((0, 0.0), |acc, (i, l)| if l > acc.1 { (i, l) } else { acc });
                if longest < 2.0 * self.criterion.min_length {
                    continue;
                }
                let (a, b) = (t[k], t[(k + 1) % 3]);
                if fixed.contains(&(a.min(b), a.max(b))) {
                    continue;
                }
                let centroid = Point2::new(
                    (dt.points[t[0]][0] + dt.points[t[1]][0] + dt.points[t[2]][0]) / 3.0,
                    (dt.points[t[0]][1] + dt.points[t[1]][1] + dt.points[t[2]][1]) / 3.0,
                );
                let too_long = longest > self.criterion.local_max_length(&centroid);
                let too_stretched = triangle_stretch(&w) > self.criterion.max_stretch;
                if too_long || too_stretched || curved[i] {
                    candidates.push(dt.points[a].midpoint(&dt.points[b]));
                }
            }
            if candidates.is_empty() {
                return Ok(());
            }
            if dt.points.len() + candidates.len() > MAX_POINTS {
                warn!(patch = %self.name, "refinement stopped at point limit");
                return Ok(());
            }

            let before = dt.points.len();
            for c in candidates {
                if let Some(idx) = dt.insert(c) {
                    if idx == xyz.len() {
                        xyz.push(self.surface.evaluate(&c));
                    }
                }
            }
            let splits = dt.conform(edges, MAX_SPLIT_DEPTH).map_err(|e| self.diagnostic(e))?;
            place_splits(xyz, &splits).map_err(|e| self.diagnostic(e))?;
            if dt.points.len() == before {
                return Ok(());
            }
        }
        Ok(())
    }
}

impl Patch for ParamPatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PatchKind {
        self.kind
    }

    fn premesh(&mut self) {
        let lmax = self.criterion.max_length.max(self.criterion.min_length);
        let count = |len: f64| ((len / lmax).ceil() as usize).clamp(1, 256);
        let lu = [0.0, 0.5, 1.0].map(|t| self.iso_length(0, t)).into_iter().fold(0.0, f64::max);
        let lv = [0.0, 0.5, 1.0].map(|t| self.iso_length(1, t)).into_iter().fold(0.0, f64::max);
        self.premesh_with_grid(count(lu), count(lv));
    }

    fn premesh_with_grid(&mut self, nu: usize, nv: usize) {
        self.u_knots = uniform_knots(nu);
        self.v_knots = uniform_knots(nv);
        self.constraints.clear();
        self.build_grid();
    }

    fn vertices(&self) -> &[Point3] {
        &self.xyz
    }

    fn parameters(&self) -> &[Point2] {
        &self.uv
    }

    fn triangles(&self) -> &[[usize; 3]] {
        &self.tris
    }

    fn evaluate(&self, uv: &Point2) -> Point3 {
        self.surface.evaluate(uv)
    }

    fn boundary(&self, side: Side) -> Vec<usize> {
        let axis = side.running_axis();
        let mut idx: Vec<usize> = (0..self.uv.len())
            .filter(|&i| side.contains(&self.uv[i], BOUNDARY_TOL))
            .collect();
        idx.sort_by(|&a, &b| self.uv[a][axis].total_cmp(&self.uv[b][axis]));
        idx
    }

    fn constrain(&mut self, uv: &[Point2], xyz: &[Point3]) -> Result<(), PatchDiagnostic> {
        if uv.len() != xyz.len() || uv.len() < 2 {
            return Err(self.diagnostic("constraint needs at least two matching points"));
        }
        if uv.iter().any(|p| !p.is_finite()) || xyz.iter().any(|p| !p.is_finite()) {
            return Err(self.diagnostic("constraint contains non-finite coordinates"));
        }
        let uv: Vec<Point2> = uv
            .iter()
            .map(|p| Point2::new(clamp_unit(p[0]), clamp_unit(p[1])))
            .collect();

        for i in 0..uv.len() - 1 {
            for j in i + 2..uv.len() - 1 {
                if segments_cross(&uv[i], &uv[i + 1], &uv[j], &uv[j + 1]) {
                    return Err(self.diagnostic(format!(
                        "constraint intersects itself near {:?}; refine the mesh near this area",
                        uv[i]
                    )));
                }
            }
        }
        for c in &self.constraints {
            for w in c.uv.windows(2) {
                for i in 0..uv.len() - 1 {
                    if segments_cross(&uv[i], &uv[i + 1], &w[0], &w[1]) {
                        return Err(self.diagnostic(format!(
                            "constraint crosses an existing constraint near {:?}; refine the mesh near this area",
                            uv[i]
                        )));
                    }
                }
            }
        }

        self.constraints.push(Constraint {
            uv,
            xyz: xyz.to_vec(),
        });
        Ok(())
    }

    fn reconstrain(&mut self) -> Result<(), PatchDiagnostic> {
        let seeds = self.uv.clone();
        self.rebuild(seeds, false)
    }

    fn refine(&mut self) -> Result<(), PatchDiagnostic> {
        let seeds = self.uv.clone();
        self.rebuild(seeds, true)
    }

    fn refine_around(&mut self, vertices: &[usize]) -> Result<(), PatchDiagnostic> {
        let marked: AHashSet<usize> = vertices.iter().copied().collect();
        let mut seeds = self.uv.clone();
        for t in &self.tris {
            if t.iter().any(|v| marked.contains(v)) {
                let w = [self.xyz[t[0]], self.xyz[t[1]], self.xyz[t[2]]];
                if triangle_edge_lengths(&w).iter().all(|&l| l < 2.0 * self.criterion.min_length) {
                    continue;
                }
                seeds.push(Point2::new(
                    (self.uv[t[0]][0] + self.uv[t[1]][0] + self.uv[t[2]][0]) / 3.0,
                    (self.uv[t[0]][1] + self.uv[t[1]][1] + self.uv[t[2]][1]) / 3.0,
                ));
            }
        }
        self.rebuild(seeds, true)
    }

    fn clear_constraints(&mut self) {
        self.constraints.clear();
    }

    fn criterion(&self) -> &MeshCriterion {
        &self.criterion
    }

    fn criterion_mut(&mut self) -> &mut MeshCriterion {
        &mut self.criterion
    }

    fn adapt(&mut self, parent: &dyn Patch) -> bool {
        if self.kind != PatchKind::Wake {
            return false;
        }
        let chain = parent.boundary(self.wake_attach);
        if chain.len() < 2 {
            return false;
        }
        let pts = parent.vertices();
        let mut s = Vec::with_capacity(chain.len());
        let mut acc = 0.0;
        s.push(0.0);
        for w in chain.windows(2) {
            acc += pts[w[0]].distance_to(&pts[w[1]]);
            s.push(acc);
        }
        if acc <= 0.0 {
            return false;
        }
        let mut knots: Vec<f64> = s.iter().map(|x| x / acc).collect();
        knots.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
        if let Some(last) = knots.last_mut() {
            *last = 1.0;
        }
        if knots.len() < 2 || knots == self.v_knots {
            return false;
        }
        self.v_knots = knots;
        self.constraints.clear();
        self.build_grid();
        true
    }
}
