//! Built-in primitive surfaces

use crate::backend::{BackendResult, SharedBackend, VertexDataAttribute};
use crate::resources::mesh::MeshSurface;

/// Axis-aligned cube of edge `size` centered at the origin
///
/// Positions only, no material: meant for sky boxes and debug volumes.
pub fn cube(backend: &SharedBackend, size: f32) -> BackendResult<MeshSurface> {
    let h = size * 0.5;
    #[rustfmt::skip]
    let vertices = [
        -h, -h, -h,
         h, -h, -h,
         h,  h, -h,
        -h,  h, -h,
        -h, -h,  h,
         h, -h,  h,
         h,  h,  h,
        -h,  h,  h,
    ];
    #[rustfmt::skip]
    let indices = [
        0, 1, 2, 2, 3, 0, // -Z
        4, 6, 5, 6, 4, 7, // +Z
        0, 3, 7, 7, 4, 0, // -X
        1, 5, 6, 6, 2, 1, // +X
        3, 2, 6, 6, 7, 3, // +Y
        0, 4, 5, 5, 1, 0, // -Y
    ];

    MeshSurface::new(
        backend,
        &vertices,
        &indices,
        vec![VertexDataAttribute::float(3)],
        None,
    )
}
