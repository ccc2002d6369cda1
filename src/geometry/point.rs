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

use std::{
    array::from_fn,
    ops::{Add, Index, IndexMut, Sub},
};

use crate::geometry::vector::Vector;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point<const N: usize> {
    pub coords: [f64; N],
}

pub type Point2 = Point<2>;
pub type Point3 = Point<3>;

impl<const N: usize> Default for Point<N> {
    fn default() -> Point<N> {
        Point { coords: [0.0; N] }
    }
}

impl<const N: usize> Point<N> {
    pub fn from_vals(coords: [f64; N]) -> Self {
        Point { coords }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn as_vector(&self) -> Vector<N> {
        Vector(self.coords)
    }

    pub fn vector_to(&self, other: &Self) -> Vector<N> {
        Vector(from_fn(|i| other.coords[i] - self.coords[i]))
    }

    pub fn add_vector(&self, v: &Vector<N>) -> Self {
        Point {
            coords: from_fn(|i| self.coords[i] + v[i]),
        }
    }

    pub fn distance_squared_to(&self, other: &Self) -> f64 {
        self.vector_to(other).norm2()
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        self.distance_squared_to(other).sqrt()
    }

    pub fn midpoint(&self, other: &Self) -> Self {
        self.lerp(other, 0.5)
    }

    /// `self + t * (other - self)`.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Point {
            coords: from_fn(|i| self.coords[i] + t * (other.coords[i] - self.coords[i])),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.coords.iter().all(|c| c.is_finite())
    }

    /// Arithmetic mean of a non-empty point set.
    pub fn centroid<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point<N>>,
    {
        let mut sum = [0.0; N];
        let mut count = 0usize;
        for p in points {
            for i in 0..N {
                sum[i] += p.coords[i];
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let inv = 1.0 / count as f64;
        Some(Point {
            coords: from_fn(|i| sum[i] * inv),
        })
    }
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Point { coords: [x, y] }
    }
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Point { coords: [x, y, z] }
    }
}

impl<const N: usize> Index<usize> for Point<N> {
    type Output = f64;
    fn index(&self, i: usize) -> &Self::Output {
        &self.coords[i]
    }
}

impl<const N: usize> IndexMut<usize> for Point<N> {
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        &mut self.coords[i]
    }
}

impl<'a, 'b, const N: usize> Sub<&'b Point<N>> for &'a Point<N> {
    type Output = Vector<N>;
    fn sub(self, rhs: &'b Point<N>) -> Self::Output {
        rhs.vector_to(self)
    }
}

impl<const N: usize> Sub for Point<N> {
    type Output = Vector<N>;
    fn sub(self, rhs: Point<N>) -> Self::Output {
        rhs.vector_to(&self)
    }
}

impl<'a, 'b, const N: usize> Add<&'b Vector<N>> for &'a Point<N> {
    type Output = Point<N>;
    fn add(self, rhs: &'b Vector<N>) -> Self::Output {
        self.add_vector(rhs)
    }
}

impl<const N: usize> Add<Vector<N>> for Point<N> {
    type Output = Point<N>;
    fn add(self, rhs: Vector<N>) -> Self::Output {
        self.add_vector(&rhs)
    }
}

impl<const N: usize> From<[f64; N]> for Point<N> {
    fn from(coords: [f64; N]) -> Self {
        Point { coords }
    }
}

impl<const N: usize> From<Point<N>> for [f64; N] {
    fn from(p: Point<N>) -> Self {
        p.coords
    }
}
