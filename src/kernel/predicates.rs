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

//! Sign predicates with a static floating-point filter. When the filter
//! cannot certify the sign, the determinant is re-evaluated exactly with
//! rational arithmetic on the original `f64` inputs.

use num_traits::ToPrimitive;

use crate::{
    geometry::point::{Point2, Point3},
    kernel::orientation::{incircle, orient2d, orient3d},
    numeric::ExactRational,
};

const HALF_EPS: f64 = f64::EPSILON * 0.5;
const ORIENT2D_BOUND: f64 = (3.0 + 16.0 * HALF_EPS) * HALF_EPS;
const ORIENT3D_BOUND: f64 = (7.0 + 56.0 * HALF_EPS) * HALF_EPS;
const INCIRCLE_BOUND: f64 = (10.0 + 96.0 * HALF_EPS) * HALF_EPS;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sign {
    Negative,
    Zero,
    Positive,
}

impl Sign {
    fn of_exact(v: &ExactRational) -> Sign {
        match v.sign() {
            std::cmp::Ordering::Less => Sign::Negative,
            std::cmp::Ordering::Equal => Sign::Zero,
            std::cmp::Ordering::Greater => Sign::Positive,
        }
    }

    fn of_filtered(det: f64, bound: f64) -> Option<Sign> {
        if det > bound {
            Some(Sign::Positive)
        } else if -det > bound {
            Some(Sign::Negative)
        } else if bound == 0.0 && det == 0.0 {
            Some(Sign::Zero)
        } else {
            None
        }
    }

    pub fn is_positive(self) -> bool {
        self == Sign::Positive
    }

    pub fn is_negative(self) -> bool {
        self == Sign::Negative
    }

    pub fn is_zero(self) -> bool {
        self == Sign::Zero
    }

    pub fn flipped(self) -> Sign {
        match self {
            Sign::Negative => Sign::Positive,
            Sign::Zero => Sign::Zero,
            Sign::Positive => Sign::Negative,
        }
    }
}

fn exact3(p: &Point3) -> [ExactRational; 3] {
    std::array::from_fn(|i| ExactRational::from_f64(p[i]))
}

fn exact2(p: &Point2) -> [ExactRational; 2] {
    std::array::from_fn(|i| ExactRational::from_f64(p[i]))
}

pub fn orient2d_sign(a: &Point2, b: &Point2, c: &Point2) -> Sign {
    let det = orient2d(a, b, c);
    let permanent = ((b[0] - a[0]) * (c[1] - a[1])).abs() + ((b[1] - a[1]) * (c[0] - a[0])).abs();
    if let Some(s) = Sign::of_filtered(det, ORIENT2D_BOUND * permanent) {
        return s;
    }

    let [ax, ay] = exact2(a);
    let [bx, by] = exact2(b);
    let [cx, cy] = exact2(c);
    let l = &(&bx - &ax) * &(&cy - &ay);
    let r = &(&by - &ay) * &(&cx - &ax);
    Sign::of_exact(&(&l - &r))
}

/// Sign of `((b-a) x (c-a)) · (d-a)`.
pub fn orient3d_sign(a: &Point3, b: &Point3, c: &Point3, d: &Point3) -> Sign {
    let det = orient3d(a, b, c, d);
    let ab = a.vector_to(b);
    let ac = a.vector_to(c);
    let ad = a.vector_to(d);
    let permanent = ad[0].abs() * ((ab[1] * ac[2]).abs() + (ab[2] * ac[1]).abs())
        + ad[1].abs() * ((ab[2] * ac[0]).abs() + (ab[0] * ac[2]).abs())
        + ad[2].abs() * ((ab[0] * ac[1]).abs() + (ab[1] * ac[0]).abs());
    if let Some(s) = Sign::of_filtered(det, ORIENT3D_BOUND * permanent) {
        return s;
    }

    Sign::of_exact(&exact_orient3d(a, b, c, d))
}

fn exact_orient3d(a: &Point3, b: &Point3, c: &Point3, d: &Point3) -> ExactRational {
    let [ax, ay, az] = exact3(a);
    let [bx, by, bz] = exact3(b);
    let [cx, cy, cz] = exact3(c);
    let [dx, dy, dz] = exact3(d);
    let (abx, aby, abz) = (&bx - &ax, &by - &ay, &bz - &az);
    let (acx, acy, acz) = (&cx - &ax, &cy - &ay, &cz - &az);
    let (adx, ady, adz) = (&dx - &ax, &dy - &ay, &dz - &az);

    let nx = &(&aby * &acz) - &(&abz * &acy);
    let ny = &(&abz * &acx) - &(&abx * &acz);
    let nz = &(&abx * &acy) - &(&aby * &acx);

    &(&(&nx * &adx) + &(&ny * &ady)) + &(&nz * &adz)
}

/// Parameter `t` in `[0, 1]` at which the segment `a -> b` crosses the
/// plane of `(p, q, r)`. The endpoints must lie strictly on opposite sides.
pub fn edge_plane_crossing(p: &Point3, q: &Point3, r: &Point3, a: &Point3, b: &Point3) -> f64 {
    let da = orient3d(p, q, r, a);
    let db = orient3d(p, q, r, b);
    if da * db < 0.0 {
        return (da / (da - db)).clamp(0.0, 1.0);
    }

    let ea = exact_orient3d(p, q, r, a);
    let eb = exact_orient3d(p, q, r, b);
    let denom = &ea - &eb;
    if denom.sign().is_eq() {
        return 0.5;
    }
    (&ea / &denom).to_f64().unwrap_or(0.5).clamp(0.0, 1.0)
}

/// Positive when `d` is strictly inside the circumcircle of the
/// counter-clockwise triangle `(a, b, c)`.
pub fn incircle_sign(a: &Point2, b: &Point2, c: &Point2, d: &Point2) -> Sign {
    let det = incircle(a, b, c, d);
    let adx = a[0] - d[0];
    let ady = a[1] - d[1];
    let bdx = b[0] - d[0];
    let bdy = b[1] - d[1];
    let cdx = c[0] - d[0];
    let cdy = c[1] - d[1];
    let permanent = ((bdx * cdy).abs() + (cdx * bdy).abs()) * (adx * adx + ady * ady)
        + ((cdx * ady).abs() + (adx * cdy).abs()) * (bdx * bdx + bdy * bdy)
        + ((adx * bdy).abs() + (bdx * ady).abs()) * (cdx * cdx + cdy * cdy);
    if let Some(s) = Sign::of_filtered(det, INCIRCLE_BOUND * permanent) {
        return s;
    }

    let [ax, ay] = exact2(a);
    let [bx, by] = exact2(b);
    let [cx, cy] = exact2(c);
    let [dx, dy] = exact2(d);
    let (adx, ady) = (&ax - &dx, &ay - &dy);
    let (bdx, bdy) = (&bx - &dx, &by - &dy);
    let (cdx, cdy) = (&cx - &dx, &cy - &dy);

    let alift = &(&adx * &adx) + &(&ady * &ady);
    let blift = &(&bdx * &bdx) + &(&bdy * &bdy);
    let clift = &(&cdx * &cdx) + &(&cdy * &cdy);

    let t0 = &alift * &(&(&bdx * &cdy) - &(&cdx * &bdy));
    let t1 = &blift * &(&(&cdx * &ady) - &(&adx * &cdy));
    let t2 = &clift * &(&(&adx * &bdy) - &(&bdx * &ady));
    Sign::of_exact(&(&(&t0 + &t1) + &t2))
}

/// Whether `p` lies inside or on the boundary of the 2D triangle `(a, b, c)`,
/// regardless of the triangle's winding.
pub fn point_in_or_on_triangle(p: &Point2, a: &Point2, b: &Point2, c: &Point2) -> bool {
    let s0 = orient2d_sign(a, b, p);
    let s1 = orient2d_sign(b, c, p);
    let s2 = orient2d_sign(c, a, p);
    let has_neg = s0.is_negative() || s1.is_negative() || s2.is_negative();
    let has_pos = s0.is_positive() || s1.is_positive() || s2.is_positive();
    !(has_neg && has_pos)
}
