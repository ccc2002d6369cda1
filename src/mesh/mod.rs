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

pub mod intersection_segment;
pub mod param_patch;
pub mod patch;
pub mod registry;
pub mod spatial_hash;
pub mod surface;
pub mod tri_mesh;
pub mod triangle_set;

pub use intersection_segment::{Connection, End, IntersectionSegment};
pub use param_patch::ParamPatch;
pub use patch::{MeshCriterion, Patch, PatchId, PatchKind, RefinementSpot, Side, SpotShape};
pub use registry::{PatchEntry, PatchRegistry};
pub use spatial_hash::SpatialHash;
pub use surface::{FnSurface, PlaneSurface, Surface};
pub use tri_mesh::TriMesh;
pub use triangle_set::{TriangleRecord, TriangleSet};
