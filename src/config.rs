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

//! Tunable tolerances and switches for one pipeline instance.
//!
//! Nothing here is process-wide: each [`MeshGenerator`](crate::MeshGenerator)
//! owns its own copy, so concurrent pipelines never interfere.

use crate::{
    error::{MeshGenError, MeshGenResult},
    geometry::Vector3,
};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// A tree node is split only when it holds at least twice this many
    /// triangles.
    pub min_leaf_size: usize,

    /// Absolute 3D distance below which segment endpoints are merged.
    pub merge_tolerance: f64,

    /// Parameter-space distance above which two boundary points on a shared
    /// patch are kept apart even when they are close in 3D.
    pub param_merge_tolerance: f64,

    /// Parameter coordinates closer than this to 0 or 1 are snapped onto the
    /// boundary.
    pub boundary_tolerance: f64,

    /// Piercing positions closer than this to either segment end are ignored.
    pub pierce_margin: f64,

    /// Triangle size ratio below which no refinement spot is emitted.
    pub refine_ratio_threshold: f64,

    /// Run a coarse intersection pass to drive local refinement first.
    pub two_pass: bool,

    /// Factor applied to a patch's max stretch while it carries constraints.
    pub stretch_relaxation: f64,

    /// Downstream direction used to seed the wake flood fill.
    pub wake_direction: Vector3,

    /// Connected face clusters up to this size are removed as tri-stars.
    pub tristar_max_faces: usize,

    /// Number of destretch passes; zero disables destretching.
    pub destretch_passes: usize,

    /// Triangles with a larger longest-edge/height ratio are collapsed.
    pub destretch_max_stretch: f64,

    /// Triangles whose normal turns more than this (radians) against an edge
    /// neighbor are collapsed.
    pub destretch_max_phi: f64,

    /// A filtered line keeps a point whose removal leaves a chord longer
    /// than this multiple of the local triangle size.
    pub filter_gap_factor: f64,

    /// Worker threads; zero runs every stage on the calling thread.
    pub threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_leaf_size: 8,
            merge_tolerance: 1e-6,
            param_merge_tolerance: 0.1,
            boundary_tolerance: 1e-6,
            pierce_margin: 1e-4,
            refine_ratio_threshold: 2.0,
            two_pass: false,
            stretch_relaxation: 2.0,
            wake_direction: Vector3::new(1.0, 0.0, 0.0),
            tristar_max_faces: 3,
            destretch_passes: 0,
            destretch_max_stretch: 20.0,
            destretch_max_phi: 2.5,
            filter_gap_factor: 1.8,
            threads: 0,
        }
    }
}

impl PipelineConfig {
    /// Set the minimum leaf size of the spatial tree.
    pub fn with_min_leaf_size(mut self, size: usize) -> Self {
        self.min_leaf_size = size;
        self
    }

    /// Set the 3D node merge tolerance.
    pub fn with_merge_tolerance(mut self, tol: f64) -> Self {
        self.merge_tolerance = tol;
        self
    }

    pub fn with_param_merge_tolerance(mut self, tol: f64) -> Self {
        self.param_merge_tolerance = tol;
        self
    }

    pub fn with_boundary_tolerance(mut self, tol: f64) -> Self {
        self.boundary_tolerance = tol;
        self
    }

    /// Enable or disable the coarse first intersection pass.
    pub fn with_two_pass(mut self, enabled: bool) -> Self {
        self.two_pass = enabled;
        self
    }

    pub fn with_refine_ratio_threshold(mut self, ratio: f64) -> Self {
        self.refine_ratio_threshold = ratio;
        self
    }

    pub fn with_wake_direction(mut self, dir: Vector3) -> Self {
        self.wake_direction = dir;
        self
    }

    /// Set destretch limits and pass count.
    pub fn with_destretch(mut self, passes: usize, max_stretch: f64, max_phi: f64) -> Self {
        self.destretch_passes = passes;
        self.destretch_max_stretch = max_stretch;
        self.destretch_max_phi = max_phi;
        self
    }

    pub fn with_tristar_max_faces(mut self, faces: usize) -> Self {
        self.tristar_max_faces = faces;
        self
    }

    /// Set the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Reject configurations no stage can work with.
    pub fn validate(&self) -> MeshGenResult<()> {
        let positive = [
            ("merge_tolerance", self.merge_tolerance),
            ("param_merge_tolerance", self.param_merge_tolerance),
            ("boundary_tolerance", self.boundary_tolerance),
            ("stretch_relaxation", self.stretch_relaxation),
            ("destretch_max_stretch", self.destretch_max_stretch),
            ("destretch_max_phi", self.destretch_max_phi),
            ("filter_gap_factor", self.filter_gap_factor),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(MeshGenError::InvalidConfig {
                    details: format!("{name} must be positive and finite, got {value}"),
                });
            }
        }
        if self.min_leaf_size == 0 {
            return Err(MeshGenError::InvalidConfig {
                details: "min_leaf_size must be at least 1".to_string(),
            });
        }
        if !(0.0..0.5).contains(&self.pierce_margin) {
            return Err(MeshGenError::InvalidConfig {
                details: format!("pierce_margin must lie in [0, 0.5), got {}", self.pierce_margin),
            });
        }
        if self.wake_direction.normalized().is_none() {
            return Err(MeshGenError::InvalidConfig {
                details: "wake_direction must be a non-zero vector".to_string(),
            });
        }
        Ok(())
    }
}
