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

use patchmesh::{
    MeshGenError,
    geometry::{Point3, Vector3},
    mesh::{ParamPatch, Patch, PatchId, PatchRegistry, PlaneSurface, Side},
};

fn patch(name: &str) -> Box<dyn Patch> {
    Box::new(ParamPatch::new(
        name,
        PlaneSurface::new(
            Point3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ),
    ))
}

fn registry(n: usize) -> PatchRegistry {
    let mut r = PatchRegistry::new();
    for i in 0..n {
        r.add(patch(&format!("p{i}")), (i % 2) as u32);
    }
    r
}

#[test]
fn parents_come_first() {
    let mut r = registry(4);
    r.register_parent(PatchId(2), PatchId(0)).unwrap();
    r.register_parent(PatchId(3), PatchId(2)).unwrap();
    r.register_parent(PatchId(3), PatchId(1)).unwrap();

    let levels = r.meshing_order().unwrap();
    assert_eq!(
        levels,
        vec![
            vec![PatchId(0), PatchId(1)],
            vec![PatchId(2)],
            vec![PatchId(3)]
        ]
    );
    assert!(r.is_parent(PatchId(3), PatchId(1)));
    assert_eq!(r.parents(PatchId(3)), &[PatchId(2), PatchId(1)]);
}

#[test]
fn cycles_are_reported() {
    let mut r = registry(3);
    r.register_parent(PatchId(0), PatchId(2)).unwrap();
    r.register_parent(PatchId(2), PatchId(0)).unwrap();
    match r.meshing_order() {
        Err(MeshGenError::CircularDependency { patch }) => assert!(patch == "p0" || patch == "p2"),
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn neighbor_relation_is_symmetric() {
    let mut r = registry(3);
    r.register_neighbor(PatchId(2), PatchId(0)).unwrap();
    r.register_neighbor(PatchId(0), PatchId(2)).unwrap();
    r.register_neighbor(PatchId(1), PatchId(1)).unwrap();
    assert!(r.is_neighbor(PatchId(0), PatchId(2)));
    assert!(r.is_neighbor(PatchId(2), PatchId(0)));
    assert!(!r.is_neighbor(PatchId(1), PatchId(1)));
    assert_eq!(r.neighbor_pairs(), vec![(PatchId(0), PatchId(2))]);
}

#[test]
fn unknown_handles_are_rejected() {
    let mut r = registry(2);
    assert!(matches!(
        r.register_neighbor(PatchId(0), PatchId(7)),
        Err(MeshGenError::UnknownPatch { id }) if id == PatchId(7)
    ));
    assert!(r.register_parent(PatchId(9), PatchId(0)).is_err());
    assert!(r.get(PatchId(2)).is_none());
    assert_eq!(r.component(PatchId(1)), Some(1));
}

#[test]
fn child_is_mutable_beside_its_parent() {
    let mut r = registry(2);
    r.get_mut(PatchId(0)).unwrap().premesh_with_grid(2, 3);
    let (child, parent) = r.child_and_parent(PatchId(1), PatchId(0)).unwrap();
    assert_eq!(parent.boundary(Side::East).len(), 4);
    child.premesh_with_grid(1, 1);
    assert_eq!(child.vertices().len(), 4);
    assert!(r.child_and_parent(PatchId(1), PatchId(1)).is_none());
    assert!(r.child_and_parent(PatchId(0), PatchId(5)).is_none());
}
