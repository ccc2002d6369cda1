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

//! Error types for the mesh generation pipeline.

use thiserror::Error;

use crate::mesh::patch::PatchId;

/// Result type alias for pipeline operations.
pub type MeshGenResult<T> = Result<T, MeshGenError>;

/// Errors that abort a pipeline run.
///
/// Geometric degeneracies (zero-length crossings, coplanar triangles) are
/// never reported here; they are skipped where they are found.
#[derive(Debug, Error)]
pub enum MeshGenError {
    /// A patch could not embed a required intersection curve.
    #[error("constraint insertion failed on patch '{patch}': {details}")]
    ConstraintInsertion { patch: String, details: String },

    /// The parent relation among patches contains a cycle.
    #[error("circular meshing dependency involving patch '{patch}'")]
    CircularDependency { patch: String },

    /// A handle that does not belong to the registry.
    #[error("unknown patch handle {id:?}")]
    UnknownPatch { id: PatchId },

    /// Rejected pipeline configuration.
    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },

    /// The worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Message a patch reports when it rejects a constraint curve.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct PatchDiagnostic(pub String);

impl PatchDiagnostic {
    pub fn new(msg: impl Into<String>) -> Self {
        PatchDiagnostic(msg.into())
    }
}
