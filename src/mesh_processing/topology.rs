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

//! Turns a bag of pairwise intersection segments into connected
//! intersection lines: triple-point splitting, node merging, parameter
//! fixation, line finding and point filtering.

use std::collections::VecDeque;

use ahash::AHashSet;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::{
    config::PipelineConfig,
    geometry::{
        point::{Point2, Point3},
        util::{on_unit_boundary, snap_unit},
        vector::Vector3,
    },
    mesh::{
        intersection_segment::{End, IntersectionSegment},
        patch::PatchId,
        registry::PatchRegistry,
        spatial_hash::SpatialHash,
        triangle_set::TriangleSet,
    },
    operations::pool::{WorkerPool, run_batch},
};

/// A merged segment endpoint.
#[derive(Clone, Debug, Default)]
pub struct TopologyNode {
    pub position: Point3,
    pub normal: Vector3,
    /// Averaged parameter coordinate per touching patch.
    pub params: SmallVec<[(PatchId, Point2); 3]>,
    pub on_boundary: bool,
    pub enforced: bool,
    /// Mean edge length of the smallest triangle meeting this node.
    pub local_size: f64,
}

impl TopologyNode {
    pub fn param(&self, patch: PatchId) -> Option<Point2> {
        self.params.iter().find(|(p, _)| *p == patch).map(|(_, uv)| *uv)
    }

    pub fn is_junction(&self) -> bool {
        self.params.len() >= 3
    }
}

/// Maximal chain of nodes connected by segments.
#[derive(Clone, Debug, Default)]
pub struct IntersectionLine {
    pub nodes: Vec<usize>,
    pub segments: Vec<usize>,
    pub closed: bool,
}

/// Local limits for dropping a polyline point.
#[derive(Clone, Copy, Debug)]
pub struct FilterLimits {
    pub max_length: f64,
    pub min_length: f64,
    pub max_phi: f64,
    pub local_size: f64,
}

/// Indices of the points of `points` worth keeping. The first and last
/// points always survive.
///
/// A point is kept when dropping it would stretch the chord from the last
/// kept point past `max_length`, when the polyline turns by more than
/// `max_phi` at it, or when the chord would exceed `gap_factor` times the
/// local triangle size while the point is at least `min_length` away.
pub fn filter_polyline(points: &[Point3], limits: &[FilterLimits], gap_factor: f64) -> Vec<usize> {
    let n = points.len();
    if n <= 2 {
        return (0..n).collect();
    }
    let mut kept = vec![0];
    let mut last = 0;
    for i in 1..n - 1 {
        let (a, b, c) = (&points[last], &points[i], &points[i + 1]);
        let lim = &limits[i];
        let chord = a.distance_to(c);
        let turn = a.vector_to(b).angle_to(&b.vector_to(c));
        let keep = chord > lim.max_length
            || turn > lim.max_phi
            || (chord > gap_factor * lim.local_size && a.distance_to(b) >= lim.min_length);
        if keep {
            kept.push(i);
            last = i;
        }
    }
    kept.push(n - 1);
    kept
}

/// Counts from one topology pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TopologyStats {
    pub segments: usize,
    pub splits: usize,
    pub nodes: usize,
    pub lines: usize,
}

#[derive(Clone, Debug, Default)]
pub struct IntersectionTopology {
    segments: Vec<IntersectionSegment>,
    nodes: Vec<TopologyNode>,
    lines: Vec<IntersectionLine>,
    /// Filtered node lists, one per line.
    filtered: Vec<Vec<usize>>,
    splits: usize,
}

fn cmp_points(a: &Point3, b: &Point3) -> std::cmp::Ordering {
    a[0].total_cmp(&b[0])
        .then(a[1].total_cmp(&b[1]))
        .then(a[2].total_cmp(&b[2]))
}

impl IntersectionTopology {
    /// Collect `segments`, dropping zero-length ones and computed duplicates
    /// of the same triangle pair.
    pub fn new(mut segments: Vec<IntersectionSegment>) -> Self {
        segments.retain(|s| s.length() > 0.0);
        segments.sort_by(|a, b| {
            a.tri
                .cmp(&b.tri)
                .then(a.enforced.cmp(&b.enforced))
                .then(cmp_points(&a.src, &b.src))
                .then(cmp_points(&a.tgt, &b.tgt))
        });
        segments.dedup_by(|b, a| {
            a.tri == b.tri
                && a.enforced == b.enforced
                && (!a.enforced || (a.src == b.src && a.tgt == b.tgt))
        });
        Self {
            segments,
            ..Self::default()
        }
    }

    /// Run every stage with the tolerances of `config`.
    pub fn build(
        segments: Vec<IntersectionSegment>,
        tris: &TriangleSet,
        registry: &PatchRegistry,
        config: &PipelineConfig,
        pool: Option<&WorkerPool>,
    ) -> Self {
        let mut topo = Self::new(segments);
        topo.split_triples(tris, config.pierce_margin, pool);
        topo.merge_nodes(tris, config);
        topo.fixate(tris, registry, config.boundary_tolerance);
        topo.find_lines();
        topo.filter(config.filter_gap_factor, registry);
        let stats = topo.stats();
        debug!(
            segments = stats.segments,
            splits = stats.splits,
            nodes = stats.nodes,
            lines = stats.lines,
            "intersection topology built"
        );
        topo
    }

    pub fn segments(&self) -> &[IntersectionSegment] {
        &self.segments
    }

    pub fn nodes(&self) -> &[TopologyNode] {
        &self.nodes
    }

    pub fn lines(&self) -> &[IntersectionLine] {
        &self.lines
    }

    /// Node list of line `line` after filtering, or the full list when the
    /// filter has not run.
    pub fn filtered_nodes(&self, line: usize) -> &[usize] {
        match self.filtered.get(line) {
            Some(f) => f,
            None => &self.lines[line].nodes,
        }
    }

    pub fn stats(&self) -> TopologyStats {
        TopologyStats {
            segments: self.segments.len(),
            splits: self.splits,
            nodes: self.nodes.len(),
            lines: self.lines.len(),
        }
    }

    /// Split every segment once at the earliest point where it pierces a
    /// triangle of another segment. Returns the number of splits.
    pub fn split_triples(&mut self, tris: &TriangleSet, margin: f64, pool: Option<&WorkerPool>) -> usize {
        let mut faces: Vec<usize> = self.segments.iter().flat_map(|s| s.tri).collect();
        faces.sort_unstable();
        faces.dedup();

        let segments = &self.segments;
        let faces = &faces;
        let earliest: Vec<Option<f64>> = run_batch(pool, (0..segments.len()).collect(), |i| {
            let seg = &segments[i];
            faces
                .iter()
                .filter_map(|&f| seg.intersects_face(f, tris, margin))
                .min_by(f64::total_cmp)
        });

        let mut tails = Vec::new();
        for (seg, t) in self.segments.iter_mut().zip(earliest) {
            if let Some(t) = t {
                trace!(tri = ?seg.tri, t, "segment pierced by a third patch");
                tails.push(seg.split(t));
            }
        }
        let splits = tails.len();
        self.segments.extend(tails);
        self.splits += splits;
        splits
    }

    /// Merge endpoints closer than `config.merge_tolerance` into nodes,
    /// snap the segment ends onto them and drop segments that collapsed or
    /// became duplicates. Two endpoints that both sit on a patch boundary
    /// are kept apart when their parameters on a shared patch differ by more
    /// than `config.param_merge_tolerance`. Returns the node count.
    pub fn merge_nodes(&mut self, tris: &TriangleSet, config: &PipelineConfig) -> usize {
        let tol = config.merge_tolerance;
        let n = self.segments.len() * 2;
        let ends = [End::Source, End::Target];

        let points: Vec<Point3> = self
            .segments
            .iter()
            .flat_map(|s| [s.src, s.tgt])
            .collect();
        let params: Vec<[(PatchId, Point2); 2]> = self
            .segments
            .iter()
            .flat_map(|s| {
                let patches = s.patches(tris);
                ends.map(|end| {
                    [
                        (patches[0], s.parameter(end, 0, tris)),
                        (patches[1], s.parameter(end, 1, tris)),
                    ]
                })
            })
            .collect();
        let boundary: Vec<bool> = params
            .iter()
            .map(|pp| {
                pp.iter().any(|(_, uv)| {
                    on_unit_boundary(uv[0], config.boundary_tolerance)
                        || on_unit_boundary(uv[1], config.boundary_tolerance)
                })
            })
            .collect();

        let compatible = |a: usize, b: usize| {
            if !(boundary[a] && boundary[b]) {
                return true;
            }
            params[a].iter().all(|(pa, uva)| {
                params[b]
                    .iter()
                    .filter(|(pb, _)| pb == pa)
                    .all(|(_, uvb)| uva.distance_to(uvb) <= config.param_merge_tolerance)
            })
        };

        let hash = SpatialHash::from_points(&points, tol);
        let mut rep = vec![usize::MAX; n];
        let mut seeds = Vec::new();
        for e in 0..n {
            if rep[e] != usize::MAX {
                continue;
            }
            let node = seeds.len();
            seeds.push(e);
            rep[e] = node;
            for o in hash.query(&points[e], tol, &points) {
                if rep[o] == usize::MAX && compatible(e, o) {
                    rep[o] = node;
                }
            }
        }

        for (i, s) in self.segments.iter_mut().enumerate() {
            s.nodes = [rep[2 * i], rep[2 * i + 1]];
            s.src = points[seeds[s.nodes[0]]];
            s.tgt = points[seeds[s.nodes[1]]];
        }
        let before = self.segments.len();
        self.segments.retain(|s| s.nodes[0] != s.nodes[1]);
        let mut seen = AHashSet::with_capacity(self.segments.len());
        self.segments
            .retain(|s| seen.insert((s.nodes[0].min(s.nodes[1]), s.nodes[0].max(s.nodes[1]))));
        trace!(dropped = before - self.segments.len(), "degenerate or duplicate segments after merge");

        // Compact node ids to the ones still referenced.
        let mut remap = vec![usize::MAX; seeds.len()];
        let mut nodes = Vec::new();
        for s in &mut self.segments {
            for k in 0..2 {
                let old = s.nodes[k];
                if remap[old] == usize::MAX {
                    remap[old] = nodes.len();
                    nodes.push(TopologyNode {
                        position: points[seeds[old]],
                        on_boundary: boundary[seeds[old]],
                        ..TopologyNode::default()
                    });
                }
                s.nodes[k] = remap[old];
            }
        }
        self.nodes = nodes;
        self.lines.clear();
        self.filtered.clear();
        self.nodes.len()
    }

    /// Average the parameter coordinates each node receives from its
    /// segments, snap them onto the unit boundary and place the node at the
    /// mean of the patch surfaces evaluated there.
    pub fn fixate(&mut self, tris: &TriangleSet, registry: &PatchRegistry, boundary_tol: f64) {
        type Acc = SmallVec<[(PatchId, f64, f64, usize); 3]>;
        let mut acc: Vec<Acc> = vec![Acc::new(); self.nodes.len()];
        let mut size = vec![f64::INFINITY; self.nodes.len()];
        let mut enforced = vec![false; self.nodes.len()];

        for s in &self.segments {
            let patches = s.patches(tris);
            let tri_size = s
                .tri
                .iter()
                .map(|&t| tris.get(t).perimeter() / 3.0)
                .fold(f64::INFINITY, f64::min);
            for (k, end) in [End::Source, End::Target].into_iter().enumerate() {
                let node = s.nodes[k];
                size[node] = size[node].min(tri_size);
                enforced[node] |= s.enforced;
                for side in 0..2 {
                    let uv = s.parameter(end, side, tris);
                    let slot = &mut acc[node];
                    match slot.iter_mut().find(|(p, ..)| *p == patches[side]) {
                        Some(entry) => {
                            entry.1 += uv[0];
                            entry.2 += uv[1];
                            entry.3 += 1;
                        }
                        None => slot.push((patches[side], uv[0], uv[1], 1)),
                    }
                }
            }
        }

        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.params = acc[i]
                .iter()
                .map(|&(p, su, sv, c)| {
                    let c = c as f64;
                    let uv = Point2::new(snap_unit(su / c, boundary_tol), snap_unit(sv / c, boundary_tol));
                    (p, uv)
                })
                .collect();
            node.params.sort_by_key(|(p, _)| *p);
            node.on_boundary = node.params.iter().any(|(_, uv)| {
                on_unit_boundary(uv[0], boundary_tol) || on_unit_boundary(uv[1], boundary_tol)
            });
            node.enforced = enforced[i];
            node.local_size = size[i];

            let mut sum = Vector3::zero();
            let mut normal = Vector3::zero();
            let mut count = 0usize;
            for (p, uv) in &node.params {
                let Some(patch) = registry.get(*p) else {
                    warn!(patch = p.0, "topology node refers to an unregistered patch");
                    continue;
                };
                sum = sum + patch.evaluate(uv).as_vector();
                if let Some(n) = patch.normal(uv).normalized() {
                    normal = normal + n;
                }
                count += 1;
            }
            if count > 0 {
                node.position = Point3::zero().add_vector(&sum.scale(1.0 / count as f64));
            }
            node.normal = normal.normalized().unwrap_or(normal);
        }
    }

    /// Decompose the segment graph into maximal polylines. A node continues
    /// a line only when exactly two segments meet there and it is not on a
    /// patch boundary.
    pub fn find_lines(&mut self) {
        let mut adj: Vec<SmallVec<[usize; 2]>> = vec![SmallVec::new(); self.nodes.len()];
        for (i, s) in self.segments.iter().enumerate() {
            adj[s.nodes[0]].push(i);
            adj[s.nodes[1]].push(i);
        }
        let interior = |n: usize| adj[n].len() == 2 && !self.nodes[n].on_boundary;
        let other = |seg: usize, node: usize| {
            let s = &self.segments[seg];
            if s.nodes[0] == node { s.nodes[1] } else { s.nodes[0] }
        };

        let mut tagged = vec![false; self.segments.len()];
        let mut lines = Vec::new();
        for start in 0..self.segments.len() {
            if tagged[start] {
                continue;
            }
            tagged[start] = true;
            let mut nodes: VecDeque<usize> = VecDeque::from(self.segments[start].nodes.to_vec());
            let mut segs: VecDeque<usize> = VecDeque::from([start]);

            while let Some(&cur) = nodes.back() {
                if !interior(cur) {
                    break;
                }
                let Some(&next) = adj[cur].iter().find(|&&s| !tagged[s]) else {
                    break;
                };
                tagged[next] = true;
                segs.push_back(next);
                nodes.push_back(other(next, cur));
            }
            while let Some(&cur) = nodes.front() {
                if !interior(cur) {
                    break;
                }
                let Some(&next) = adj[cur].iter().find(|&&s| !tagged[s]) else {
                    break;
                };
                tagged[next] = true;
                segs.push_front(next);
                nodes.push_front(other(next, cur));
            }

            let closed = nodes.len() > 2 && nodes.front() == nodes.back();
            lines.push(IntersectionLine {
                nodes: nodes.into(),
                segments: segs.into(),
                closed,
            });
        }
        self.lines = lines;
        self.filtered.clear();
    }

    fn limits(&self, node: usize, registry: &PatchRegistry) -> FilterLimits {
        let n = &self.nodes[node];
        let mut lim = FilterLimits {
            max_length: f64::INFINITY,
            min_length: 0.0,
            max_phi: f64::INFINITY,
            local_size: n.local_size,
        };
        for (p, uv) in &n.params {
            if let Some(patch) = registry.get(*p) {
                let c = patch.criterion();
                lim.max_length = lim.max_length.min(c.local_max_length(uv));
                lim.min_length = lim.min_length.max(c.min_length);
                lim.max_phi = lim.max_phi.min(c.max_phi);
            }
        }
        lim
    }

    /// Thin out every line against the criteria of the patches it touches.
    pub fn filter(&mut self, gap_factor: f64, registry: &PatchRegistry) {
        let filtered: Vec<Vec<usize>> = self
            .lines
            .iter()
            .map(|line| {
                let points: Vec<Point3> = line.nodes.iter().map(|&n| self.nodes[n].position).collect();
                let limits: Vec<FilterLimits> = line.nodes.iter().map(|&n| self.limits(n, registry)).collect();
                filter_polyline(&points, &limits, gap_factor)
                    .into_iter()
                    .map(|k| line.nodes[k])
                    .collect::<Vec<usize>>()
            })
            .collect();
        self.filtered = filtered;
    }

    /// Filtered line `line` in the parameter space of `patch` together
    /// with its 3D points, or `None` when some node does not touch `patch`.
    pub fn projection(&self, line: usize, patch: PatchId) -> Option<(Vec<Point2>, Vec<Point3>)> {
        let nodes = self.filtered_nodes(line);
        let mut uv = Vec::with_capacity(nodes.len());
        let mut xyz = Vec::with_capacity(nodes.len());
        for &n in nodes {
            let node = &self.nodes[n];
            uv.push(node.param(patch)?);
            xyz.push(node.position);
        }
        Some((uv, xyz))
    }

    /// Lines whose every node touches `patch`.
    pub fn lines_touching(&self, patch: PatchId) -> impl Iterator<Item = usize> + '_ {
        (0..self.lines.len()).filter(move |&l| {
            self.filtered_nodes(l)
                .iter()
                .all(|&n| self.nodes[n].param(patch).is_some())
        })
    }

    /// Number of segments meeting at each node.
    pub fn node_degrees(&self) -> Vec<usize> {
        let mut deg = vec![0; self.nodes.len()];
        for s in &self.segments {
            deg[s.nodes[0]] += 1;
            deg[s.nodes[1]] += 1;
        }
        deg
    }

    /// Nodes where at least three patches meet.
    pub fn junctions(&self) -> Vec<usize> {
        (0..self.nodes.len()).filter(|&n| self.nodes[n].is_junction()).collect()
    }

    /// Patches touched by any node, sorted.
    pub fn patches(&self) -> Vec<PatchId> {
        let set: AHashSet<PatchId> = self
            .nodes
            .iter()
            .flat_map(|n| n.params.iter().map(|(p, _)| *p))
            .collect();
        let mut ids: Vec<PatchId> = set.into_iter().collect();
        ids.sort_unstable();
        ids
    }
}
