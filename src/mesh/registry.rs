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
use tracing::debug;

use crate::{
    error::{MeshGenError, MeshGenResult},
    mesh::patch::{Patch, PatchId},
};

pub struct PatchEntry {
    pub patch: Box<dyn Patch>,
    /// Index of the contributing component, resolved to a name by the caller.
    pub component: u32,
    neighbors: SmallVec<[PatchId; 4]>,
    parents: SmallVec<[PatchId; 2]>,
}

/// Owns every patch and the neighbor/parent relations between them, keyed by
/// stable integer handles.
#[derive(Default)]
pub struct PatchRegistry {
    entries: Vec<PatchEntry>,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, patch: Box<dyn Patch>, component: u32) -> PatchId {
        self.entries.push(PatchEntry {
            patch,
            component,
            neighbors: SmallVec::new(),
            parents: SmallVec::new(),
        });
        PatchId(self.entries.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PatchId> + '_ {
        (0..self.entries.len()).map(PatchId)
    }

    fn check(&self, id: PatchId) -> MeshGenResult<()> {
        if id.0 < self.entries.len() {
            Ok(())
        } else {
            Err(MeshGenError::UnknownPatch { id })
        }
    }

    pub fn get(&self, id: PatchId) -> Option<&dyn Patch> {
        self.entries.get(id.0).map(|e| e.patch.as_ref())
    }

    pub fn get_mut(&mut self, id: PatchId) -> Option<&mut (dyn Patch + 'static)> {
        self.entries.get_mut(id.0).map(|e| e.patch.as_mut())
    }

    pub fn entry(&self, id: PatchId) -> Option<&PatchEntry> {
        self.entries.get(id.0)
    }

    pub fn entries(&self) -> &[PatchEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [PatchEntry] {
        &mut self.entries
    }

    pub fn component(&self, id: PatchId) -> Option<u32> {
        self.entries.get(id.0).map(|e| e.component)
    }

    /// Declare that `a` and `b` only touch. The relation is symmetric.
    pub fn register_neighbor(&mut self, a: PatchId, b: PatchId) -> MeshGenResult<()> {
        self.check(a)?;
        self.check(b)?;
        if a == b || self.is_neighbor(a, b) {
            return Ok(());
        }
        self.entries[a.0].neighbors.push(b);
        self.entries[b.0].neighbors.push(a);
        Ok(())
    }

    pub fn is_neighbor(&self, a: PatchId, b: PatchId) -> bool {
        self.entries
            .get(a.0)
            .is_some_and(|e| e.neighbors.contains(&b))
    }

    /// Declare that `child` must be meshed after `parent` is final.
    pub fn register_parent(&mut self, child: PatchId, parent: PatchId) -> MeshGenResult<()> {
        self.check(child)?;
        self.check(parent)?;
        if !self.entries[child.0].parents.contains(&parent) {
            self.entries[child.0].parents.push(parent);
        }
        Ok(())
    }

    pub fn is_parent(&self, child: PatchId, parent: PatchId) -> bool {
        self.entries
            .get(child.0)
            .is_some_and(|e| e.parents.contains(&parent))
    }

    pub fn parents(&self, child: PatchId) -> &[PatchId] {
        self.entries.get(child.0).map_or(&[], |e| e.parents.as_slice())
    }

    /// Every neighbor pair once, lower id first.
    pub fn neighbor_pairs(&self) -> Vec<(PatchId, PatchId)> {
        let mut pairs = Vec::new();
        for (i, e) in self.entries.iter().enumerate() {
            for &n in &e.neighbors {
                if i < n.0 {
                    pairs.push((PatchId(i), n));
                }
            }
        }
        pairs
    }

    /// Mutable `child` together with shared `parent`.
    pub fn child_and_parent(
        &mut self,
        child: PatchId,
        parent: PatchId,
    ) -> Option<(&mut (dyn Patch + 'static), &dyn Patch)> {
        if child == parent || child.0 >= self.entries.len() || parent.0 >= self.entries.len() {
            return None;
        }
        if child.0 < parent.0 {
            let (lo, hi) = self.entries.split_at_mut(parent.0);
            Some((lo[child.0].patch.as_mut(), hi[0].patch.as_ref()))
        } else {
            let (lo, hi) = self.entries.split_at_mut(child.0);
            Some((hi[0].patch.as_mut(), lo[parent.0].patch.as_ref()))
        }
    }

    /// Group patches into levels such that every parent sits in an earlier
    /// level than its children. Fails on a cyclic parent relation.
    pub fn meshing_order(&self) -> MeshGenResult<Vec<Vec<PatchId>>> {
        let n = self.entries.len();
        let mut pending: Vec<usize> = self.entries.iter().map(|e| e.parents.len()).collect();
        let mut children: AHashMap<usize, Vec<usize>> = AHashMap::new();
        for (i, e) in self.entries.iter().enumerate() {
            for p in &e.parents {
                children.entry(p.0).or_default().push(i);
            }
        }

        let mut levels = Vec::new();
        let mut current: Vec<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
        let mut placed = 0;
        while !current.is_empty() {
            placed += current.len();
            let mut next = Vec::new();
            for &i in &current {
                for &c in children.get(&i).map_or(&[][..], |v| v.as_slice()) {
                    pending[c] -= 1;
                    if pending[c] == 0 {
                        next.push(c);
                    }
                }
            }
            next.sort_unstable();
            levels.push(current.into_iter().map(PatchId).collect());
            current = next;
        }

        if placed < n {
            let stuck = (0..n).find(|&i| pending[i] > 0).unwrap_or(0);
            return Err(MeshGenError::CircularDependency {
                patch: self.entries[stuck].patch.name().to_string(),
            });
        }
        debug!(levels = levels.len(), patches = n, "meshing order resolved");
        Ok(levels)
    }
}
