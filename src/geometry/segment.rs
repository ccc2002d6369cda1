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

use crate::geometry::point::Point;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment<const N: usize> {
    pub a: Point<N>,
    pub b: Point<N>,
}

pub type Segment2 = Segment<2>;
pub type Segment3 = Segment<3>;

impl<const N: usize> Segment<N> {
    pub fn new(a: &Point<N>, b: &Point<N>) -> Self {
        Self { a: *a, b: *b }
    }

    pub fn length2(&self) -> f64 {
        self.a.distance_squared_to(&self.b)
    }

    pub fn length(&self) -> f64 {
        self.length2().sqrt()
    }

    pub fn midpoint(&self) -> Point<N> {
        self.a.midpoint(&self.b)
    }

    pub fn point_at(&self, t: f64) -> Point<N> {
        self.a.lerp(&self.b, t)
    }

    pub fn inverse(&self) -> Self {
        Self::new(&self.b, &self.a)
    }

    /// Parameter of the orthogonal projection of `p` on the supporting line,
    /// clamped to `[0, 1]`.
    pub fn project_parameter(&self, p: &Point<N>) -> f64 {
        let d = self.a.vector_to(&self.b);
        let l2 = d.norm2();
        if l2 <= 0.0 {
            return 0.0;
        }
        (self.a.vector_to(p).dot(&d) / l2).clamp(0.0, 1.0)
    }

    pub fn distance_to_point(&self, p: &Point<N>) -> f64 {
        self.point_at(self.project_parameter(p)).distance_to(p)
    }
}
