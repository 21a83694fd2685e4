//! Mesh data structures and GPU upload
//!
//! A [`Mesh`] is an ordered list of [`MeshSurface`]s. Each surface owns one
//! vertex buffer, one index buffer and the vertex array describing them.

use crate::backend::{
    BackendResult, BufferDescriptor, BufferHandle, BufferUsage, IndexFormat, PrimitiveTopology,
    SharedBackend, VertexArrayDescriptor, VertexArrayHandle, VertexDataAttribute,
};
use crate::resources::cache::ResourceCache;
use crate::resources::error::LoadResult;
use crate::resources::import::{ImportedMaterial, ImportedMesh, ImportedScene};
use crate::resources::material::Material;
use glam::{Vec2, Vec3};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Floats per vertex in the standard interleaved layout
pub const STANDARD_VERTEX_FLOATS: usize = 14;

/// position(3) normal(3) uv(2) tangent(3) bitangent(3)
pub fn standard_attributes() -> Vec<VertexDataAttribute> {
    vec![
        VertexDataAttribute::float(3),
        VertexDataAttribute::float(3),
        VertexDataAttribute::float(2),
        VertexDataAttribute::float(3),
        VertexDataAttribute::float(3),
    ]
}

/// Interleave an imported mesh into the standard layout
///
/// Missing UVs become (0, 0); missing tangent frames become (1, 0, 0) / (0, 1, 0).
pub fn assemble_vertices(mesh: &ImportedMesh) -> Vec<f32> {
    let mut vertices = Vec::with_capacity(mesh.positions.len() * STANDARD_VERTEX_FLOATS);
    for (i, position) in mesh.positions.iter().enumerate() {
        let attribute = |values: &Option<Vec<Vec3>>, fallback: Vec3| {
            values.as_ref().and_then(|v| v.get(i)).copied().unwrap_or(fallback)
        };
        let normal = attribute(&mesh.normals, Vec3::ZERO);
        let uv = mesh
            .uvs
            .as_ref()
            .and_then(|uvs| uvs.get(i))
            .copied()
            .unwrap_or(Vec2::ZERO);
        let tangent = attribute(&mesh.tangents, Vec3::X);
        let bitangent = attribute(&mesh.bitangents, Vec3::Y);

        vertices.extend_from_slice(&position.to_array());
        vertices.extend_from_slice(&normal.to_array());
        vertices.extend_from_slice(&uv.to_array());
        vertices.extend_from_slice(&tangent.to_array());
        vertices.extend_from_slice(&bitangent.to_array());
    }
    vertices
}

/// One drawable piece of a mesh
pub struct MeshSurface {
    backend: SharedBackend,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    vertex_array: VertexArrayHandle,
    index_count: u32,
    attributes: Vec<VertexDataAttribute>,
    material: Option<Arc<Material>>,
}

impl MeshSurface {
    /// Upload interleaved vertex data and indices
    pub fn new(
        backend: &SharedBackend,
        vertices: &[f32],
        indices: &[u32],
        attributes: Vec<VertexDataAttribute>,
        material: Option<Arc<Material>>,
    ) -> BackendResult<Self> {
        let mut gpu = backend.lock();

        let vertex_buffer = gpu.create_buffer_init(
            &BufferDescriptor {
                label: Some("Surface Vertices".into()),
                usage: BufferUsage::VERTEX,
            },
            bytemuck::cast_slice(vertices),
        )?;
        let index_buffer = match gpu.create_buffer_init(
            &BufferDescriptor {
                label: Some("Surface Indices".into()),
                usage: BufferUsage::INDEX,
            },
            bytemuck::cast_slice(indices),
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                gpu.destroy_buffer(vertex_buffer);
                return Err(e);
            }
        };
        let vertex_array = match gpu.create_vertex_array(&VertexArrayDescriptor {
            label: None,
            vertex_buffer,
            index_buffer,
            index_format: IndexFormat::Uint32,
            attributes: attributes.clone(),
        }) {
            Ok(vertex_array) => vertex_array,
            Err(e) => {
                gpu.destroy_buffer(index_buffer);
                gpu.destroy_buffer(vertex_buffer);
                return Err(e);
            }
        };
        drop(gpu);

        Ok(Self {
            backend: backend.clone(),
            vertex_buffer,
            index_buffer,
            vertex_array,
            index_count: indices.len() as u32,
            attributes,
            material,
        })
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn attributes(&self) -> &[VertexDataAttribute] {
        &self.attributes
    }

    pub fn material(&self) -> Option<&Arc<Material>> {
        self.material.as_ref()
    }

    pub fn vertex_array(&self) -> VertexArrayHandle {
        self.vertex_array
    }

    /// Draw the surface; leaves no texture or vertex array bound
    pub fn render(&self) {
        let mut backend = self.backend.lock();
        if let Some(material) = &self.material {
            material.bind(&mut *backend);
        }
        backend.bind_vertex_array(Some(self.vertex_array));
        backend.draw_indexed(PrimitiveTopology::TriangleList, self.index_count);
        if let Some(material) = &self.material {
            material.unbind(&mut *backend);
        }
        backend.bind_vertex_array(None);
    }
}

impl Drop for MeshSurface {
    fn drop(&mut self) {
        let mut backend = self.backend.lock();
        backend.destroy_vertex_array(self.vertex_array);
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
    }
}

/// A mesh with one or more surfaces
pub struct Mesh {
    surfaces: Vec<MeshSurface>,
    path: PathBuf,
    loaded: bool,
}

impl Mesh {
    pub fn new(surfaces: Vec<MeshSurface>) -> Self {
        Self {
            surfaces,
            path: PathBuf::new(),
            loaded: true,
        }
    }

    /// Import a model file and upload every mesh it contains
    ///
    /// Surfaces follow a depth-first walk of the node tree. Textures go
    /// through `cache`, relative to the model's directory.
    pub fn load(cache: &mut ResourceCache, path: &Path) -> LoadResult<Self> {
        let scene = ImportedScene::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let backend = cache.backend().clone();

        let fallback = ImportedMaterial::default();
        let mut materials: HashMap<Option<usize>, Arc<Material>> = HashMap::new();
        let mut surfaces = Vec::new();

        for mesh_index in scene.root.mesh_order() {
            let Some(imported) = scene.meshes.get(mesh_index) else {
                continue;
            };
            let material = materials
                .entry(imported.material)
                .or_insert_with(|| {
                    let source = scene.material_of(imported).unwrap_or(&fallback);
                    Arc::new(Material::from_imported(cache, source, base_dir))
                })
                .clone();

            let vertices = assemble_vertices(imported);
            surfaces.push(MeshSurface::new(
                &backend,
                &vertices,
                &imported.indices,
                standard_attributes(),
                Some(material),
            )?);
        }

        log::info!("Loaded mesh {} ({} surfaces)", path.display(), surfaces.len());

        Ok(Self {
            surfaces,
            path: path.to_path_buf(),
            loaded: true,
        })
    }

    /// Empty mesh standing in for a file that failed to load
    pub(crate) fn failed(path: &Path) -> Self {
        Self {
            surfaces: Vec::new(),
            path: path.to_path_buf(),
            loaded: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn surfaces(&self) -> &[MeshSurface] {
        &self.surfaces
    }

    /// Draw every surface in order
    pub fn render(&self) {
        for surface in &self.surfaces {
            surface.render();
        }
    }
}
