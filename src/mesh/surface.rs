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

use crate::geometry::{
    point::{Point2, Point3},
    vector::Vector3,
};

/// A parametric surface over the unit square.
pub trait Surface: Send + Sync {
    fn evaluate(&self, uv: &Point2) -> Point3;
}

/// Bilinear map `origin + u * du + v * dv`.
#[derive(Clone, Debug)]
pub struct PlaneSurface {
    pub origin: Point3,
    pub du: Vector3,
    pub dv: Vector3,
}

impl PlaneSurface {
    pub fn new(origin: Point3, du: Vector3, dv: Vector3) -> Self {
        Self { origin, du, dv }
    }
}

impl Surface for PlaneSurface {
    fn evaluate(&self, uv: &Point2) -> Point3 {
        self.origin
            .add_vector(&self.du.scale(uv[0]))
            .add_vector(&self.dv.scale(uv[1]))
    }
}

/// Surface defined by a closure.
pub struct FnSurface<F>(pub F);

impl<F> Surface for FnSurface<F>
where
    F: Fn(f64, f64) -> Point3 + Send + Sync,
{
    fn evaluate(&self, uv: &Point2) -> Point3 {
        (self.0)(uv[0], uv[1])
    }
}
