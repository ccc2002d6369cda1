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

use std::array::from_fn;

use crate::geometry::point::Point;

/// An axis‐aligned bounding box in N dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb<const N: usize> {
    pub min: Point<N>,
    pub max: Point<N>,
}

impl<const N: usize> Default for Aabb<N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const N: usize> Aabb<N> {
    pub fn new(min: Point<N>, max: Point<N>) -> Self {
        Aabb { min, max }
    }

    /// Box that contains nothing; `expand` on it yields the point itself.
    pub fn empty() -> Self {
        Aabb {
            min: Point::from_vals([f64::INFINITY; N]),
            max: Point::from_vals([f64::NEG_INFINITY; N]),
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..N).any(|i| self.min[i] > self.max[i])
    }

    /// Build the smallest AABB containing two points.
    pub fn from_points(a: &Point<N>, b: &Point<N>) -> Self {
        Aabb {
            min: Point::from_vals(from_fn(|i| a[i].min(b[i]))),
            max: Point::from_vals(from_fn(|i| a[i].max(b[i]))),
        }
    }

    pub fn enclosing<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point<N>>,
    {
        let mut bb = Self::empty();
        for p in points {
            bb.expand(p);
        }
        bb
    }

    pub fn expand(&mut self, p: &Point<N>) {
        for i in 0..N {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn union(&self, other: &Aabb<N>) -> Aabb<N> {
        Aabb {
            min: Point::from_vals(from_fn(|i| self.min[i].min(other.min[i]))),
            max: Point::from_vals(from_fn(|i| self.max[i].max(other.max[i]))),
        }
    }

    /// Grow by `eps` on every side.
    pub fn inflated(&self, eps: f64) -> Aabb<N> {
        Aabb {
            min: Point::from_vals(from_fn(|i| self.min[i] - eps)),
            max: Point::from_vals(from_fn(|i| self.max[i] + eps)),
        }
    }

    /// Does this AABB intersect `other`? Touching boxes count as overlapping.
    pub fn intersects(&self, other: &Aabb<N>) -> bool {
        for i in 0..N {
            if self.max[i] < other.min[i] || other.max[i] < self.min[i] {
                return false;
            }
        }
        true
    }

    pub fn contains(&self, p: &Point<N>) -> bool {
        (0..N).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Center coordinate along axis `i`.
    pub fn center(&self, i: usize) -> f64 {
        0.5 * (self.min[i] + self.max[i])
    }

    pub fn center_point(&self) -> Point<N> {
        Point::from_vals(from_fn(|i| self.center(i)))
    }

    /// Length along axis `i`.
    pub fn extent(&self, i: usize) -> f64 {
        (self.max[i] - self.min[i]).abs()
    }

    pub fn diagonal(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.min.distance_to(&self.max)
    }

    /// Return the axis index with largest extent.
    pub fn longest_axis(&self) -> usize {
        let mut best_i = 0usize;
        let mut best = self.extent(0);
        for i in 1..N {
            let e = self.extent(i);
            if e > best {
                best_i = i;
                best = e;
            }
        }
        best_i
    }
}
