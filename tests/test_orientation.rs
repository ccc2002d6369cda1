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

use patchmesh::geometry::{Point2, Point3};
use patchmesh::kernel::{Sign, incircle_sign, orient2d_sign, orient3d_sign, point_in_or_on_triangle};

#[test]
fn ccw_test() {
    let a = Point2::new(0.0, 0.0);
    let b = Point2::new(1.0, 0.0);
    let c = Point2::new(0.0, 1.0);

    assert_eq!(orient2d_sign(&a, &b, &c), Sign::Positive);
    assert_eq!(orient2d_sign(&a, &c, &b), Sign::Negative);
}

#[test]
fn orientation_3d_signs() {
    let a = Point3::new(0.0, 0.0, 0.0);
    let b = Point3::new(1.0, 0.0, 0.0);
    let c = Point3::new(0.0, 1.0, 0.0);

    let above = Point3::new(0.2, 0.2, 1.0);
    let below = Point3::new(0.2, 0.2, -1e-300);
    let inside = Point3::new(0.3, 0.3, 0.0);
    assert_eq!(orient3d_sign(&a, &b, &c, &above), orient3d_sign(&a, &c, &b, &below));
    assert_ne!(orient3d_sign(&a, &b, &c, &above), orient3d_sign(&a, &b, &c, &below));
    assert_eq!(orient3d_sign(&a, &b, &c, &inside), Sign::Zero);
}

#[test]
fn incircle_on_the_circle_is_zero() {
    let a = Point2::new(1.0, 0.0);
    let b = Point2::new(0.0, 1.0);
    let c = Point2::new(-1.0, 0.0);

    assert_eq!(incircle_sign(&a, &b, &c, &Point2::new(0.0, -1.0)), Sign::Zero);
    assert_eq!(incircle_sign(&a, &b, &c, &Point2::new(0.1, 0.1)), Sign::Positive);
    assert_eq!(incircle_sign(&a, &b, &c, &Point2::new(2.0, 2.0)), Sign::Negative);
}

#[test]
fn test_point_on_triangle() {
    let a = Point2::new(0.0, 0.0);
    let b = Point2::new(1.0, 0.0);
    let c = Point2::new(0.0, 1.0);

    assert!(point_in_or_on_triangle(&Point2::new(0.25, 0.25), &a, &b, &c));
    assert!(point_in_or_on_triangle(&Point2::new(0.5, 0.5), &a, &b, &c));
    assert!(!point_in_or_on_triangle(&Point2::new(0.6, 0.6), &a, &b, &c));
}
