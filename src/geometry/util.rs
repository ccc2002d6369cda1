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
    point::{Point, Point2, Point3},
    vector::Vector3,
};

pub const EPS: f64 = 1e-10;

/// Barycentric coordinates `(u, v, w)` of `p` with respect to `(a, b, c)`,
/// `p ≈ u*a + v*b + w*c`. Points off the triangle plane are projected first.
pub fn barycentric_coords<const N: usize>(
    p: &Point<N>,
    a: &Point<N>,
    b: &Point<N>,
    c: &Point<N>,
) -> Option<(f64, f64, f64)> {
    let v0 = a.vector_to(b);
    let v1 = a.vector_to(c);
    let v2 = a.vector_to(p);

    let d00 = v0.dot(&v0);
    let d01 = v0.dot(&v1);
    let d11 = v1.dot(&v1);
    let d20 = v2.dot(&v0);
    let d21 = v2.dot(&v1);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= f64::EPSILON * d00 * d11 || denom == 0.0 {
        return None; // degenerate triangle
    }

    let v = (d11 * d20 - d01 * d21) / denom; // coeff of B
    let w = (d00 * d21 - d01 * d20) / denom; // coeff of C
    let u = 1.0 - v - w; // coeff of A

    Some((u, v, w))
}

/// Interpolate per-vertex parameters with barycentric weights and clamp
/// the result into the unit square.
pub fn interpolate_param(bary: (f64, f64, f64), uv: &[Point2; 3]) -> Point2 {
    let (a, b, c) = bary;
    let u = a * uv[0][0] + b * uv[1][0] + c * uv[2][0];
    let v = a * uv[0][1] + b * uv[1][1] + c * uv[2][1];
    Point2::new(clamp_unit(u), clamp_unit(v))
}

#[inline(always)]
pub fn clamp_unit(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Un-normalised triangle normal, `(b - a) x (c - a)`. Its length is twice
/// the triangle area.
pub fn triangle_normal(tri: &[Point3; 3]) -> Vector3 {
    tri[0].vector_to(&tri[1]).cross(&tri[0].vector_to(&tri[2]))
}

pub fn triangle_area(tri: &[Point3; 3]) -> f64 {
    0.5 * triangle_normal(tri).norm()
}

pub fn triangle_centroid<const N: usize>(tri: &[Point<N>; 3]) -> Point<N> {
    Point::from_vals(std::array::from_fn(|i| {
        (tri[0][i] + tri[1][i] + tri[2][i]) / 3.0
    }))
}

/// Sum of the three edge lengths.
pub fn triangle_perimeter<const N: usize>(tri: &[Point<N>; 3]) -> f64 {
    tri[0].distance_to(&tri[1]) + tri[1].distance_to(&tri[2]) + tri[2].distance_to(&tri[0])
}

pub fn triangle_edge_lengths<const N: usize>(tri: &[Point<N>; 3]) -> [f64; 3] {
    [
        tri[0].distance_to(&tri[1]),
        tri[1].distance_to(&tri[2]),
        tri[2].distance_to(&tri[0]),
    ]
}

/// Ratio of the longest edge to the height on it. An equilateral triangle
/// scores `2/sqrt(3)`; degenerate triangles score infinity.
pub fn triangle_stretch(tri: &[Point3; 3]) -> f64 {
    let lengths = triangle_edge_lengths(tri);
    let longest = lengths.iter().cloned().fold(0.0, f64::max);
    let twice_area = triangle_normal(tri).norm();
    if twice_area <= 0.0 {
        return f64::INFINITY;
    }
    let height = twice_area / longest;
    longest / height
}

/// Whether a parameter coordinate lies within `tol` of 0 or 1.
pub fn on_unit_boundary(x: f64, tol: f64) -> bool {
    x.abs() <= tol || (1.0 - x).abs() <= tol
}

/// Snap a parameter coordinate onto 0 or 1 when it lies within `tol`.
pub fn snap_unit(x: f64, tol: f64) -> f64 {
    if x.abs() <= tol {
        0.0
    } else if (1.0 - x).abs() <= tol {
        1.0
    } else {
        clamp_unit(x)
    }
}
