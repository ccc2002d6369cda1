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

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::geometry::point::Point3;

/// Uniform grid over 3D points for fixed-radius neighbor queries.
#[derive(Clone, Debug)]
pub struct SpatialHash {
    cell: f64,
    hash_inv: f64,
    buckets: AHashMap<u128, SmallVec<[usize; 4]>>,
}

impl SpatialHash {
    /// Cells of size `cell`; a query with radius up to `cell` visits 27 cells.
    pub fn new(cell: f64) -> Self {
        let mut cell = cell.max(1e-12); // clamp to avoid INF
        if !cell.is_finite() {
            cell = 1e-5;
        }
        Self {
            cell,
            hash_inv: 1.0 / cell,
            buckets: AHashMap::default(),
        }
    }

    /// Hash every point of `points` under its index.
    pub fn from_points(points: &[Point3], cell: f64) -> Self {
        let mut h = Self::new(cell);
        for (i, p) in points.iter().enumerate() {
            h.insert(i, p);
        }
        h
    }

    pub fn cell_size(&self) -> f64 {
        self.cell
    }

    #[inline(always)]
    fn floor_sat_i64(x: f64) -> i64 {
        if !x.is_finite() {
            return if x.is_sign_positive() { i64::MAX } else { i64::MIN };
        }
        let i = x as i64;
        i - ((i as f64 > x) as i64)
    }

    #[inline(always)]
    fn pack_key3(kx: i64, ky: i64, kz: i64) -> u128 {
        // 3 x 42-bit signed lanes into 126 bits (fits typical ranges).
        let mask = (1u128 << 42) - 1;
        let ux = (kx as i128 as u128) & mask;
        let uy = (ky as i128 as u128) & mask;
        let uz = (kz as i128 as u128) & mask;
        ux | (uy << 42) | (uz << 84)
    }

    #[inline(always)]
    pub fn position_to_hash_key(&self, pos: &Point3) -> (i64, i64, i64) {
        (
            Self::floor_sat_i64(pos[0] * self.hash_inv),
            Self::floor_sat_i64(pos[1] * self.hash_inv),
            Self::floor_sat_i64(pos[2] * self.hash_inv),
        )
    }

    pub fn insert(&mut self, id: usize, pos: &Point3) {
        let (x, y, z) = self.position_to_hash_key(pos);
        self.buckets
            .entry(Self::pack_key3(x, y, z))
            .or_default()
            .push(id);
    }

    /// Ids whose point in `points` lies within `radius` of `pos`, in
    /// ascending order.
    pub fn query(&self, pos: &Point3, radius: f64, points: &[Point3]) -> Vec<usize> {
        let (x, y, z) = self.position_to_hash_key(pos);
        let reach = ((radius * self.hash_inv).ceil() as i64).max(1);
        let r2 = radius * radius;
        let mut out = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    let key = Self::pack_key3(
                        x.saturating_add(dx),
                        y.saturating_add(dy),
                        z.saturating_add(dz),
                    );
                    if let Some(ids) = self.buckets.get(&key) {
                        out.extend(
                            ids.iter()
                                .copied()
                                .filter(|&i| points[i].distance_squared_to(pos) <= r2),
                        );
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_points_across_cell_borders() {
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.99e-3, 0.0, 0.0),
            Point3::new(-0.5e-3, 0.5e-3, 0.0),
            Point3::new(5e-3, 0.0, 0.0),
        ];
        let h = SpatialHash::from_points(&pts, 1e-3);
        assert_eq!(h.query(&pts[0], 1e-3, &pts), vec![0, 1, 2]);
        assert_eq!(h.query(&pts[3], 1e-3, &pts), vec![3]);
    }
}
