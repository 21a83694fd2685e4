//! Model import
//!
//! OBJ and glTF files are converted into an [`ImportedScene`]: a node tree
//! referencing triangulated meshes, plus the materials those meshes use. The
//! mesh builder only ever sees this intermediate form.

mod gltf;
mod obj;

use crate::resources::error::{LoadError, LoadResult};
use glam::{Vec2, Vec3};
use std::collections::HashMap;
use std::path::Path;

/// Kind of texture a material references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Diffuse,
    Normal,
    /// Packed occlusion / roughness / metallic
    Orm,
}

/// Material as described by the model file
#[derive(Debug, Clone, Default)]
pub struct ImportedMaterial {
    pub name: String,
    textures: HashMap<TextureSlot, Vec<String>>,
}

impl ImportedMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            textures: HashMap::new(),
        }
    }

    pub fn add_texture(&mut self, slot: TextureSlot, path: impl Into<String>) {
        self.textures.entry(slot).or_default().push(path.into());
    }

    pub fn texture_count(&self, slot: TextureSlot) -> usize {
        self.textures.get(&slot).map_or(0, Vec::len)
    }

    /// Path of the `index`-th texture of `slot`, as written in the file
    pub fn texture_path(&self, slot: TextureSlot, index: usize) -> Option<&str> {
        self.textures
            .get(&slot)
            .and_then(|paths| paths.get(index))
            .map(String::as_str)
    }
}

/// Triangulated mesh with optional per-vertex attributes
#[derive(Debug, Clone, Default)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub uvs: Option<Vec<Vec2>>,
    pub tangents: Option<Vec<Vec3>>,
    pub bitangents: Option<Vec<Vec3>>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

impl ImportedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
            .filter(|t| t.iter().all(|&i| i < self.positions.len()))
    }

    /// Fill in smooth normals when the file carries none
    ///
    /// Face normals are accumulated unnormalised, so larger faces weigh more.
    pub fn generate_normals(&mut self) {
        if self.normals.is_some() {
            return;
        }
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for [a, b, c] in self.triangles() {
            let face = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a]);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }
        self.normals = Some(normals);
    }

    /// Derive tangent frames from UVs when the file carries none
    ///
    /// Needs normals and UVs; leaves the mesh untouched otherwise.
    pub fn generate_tangents(&mut self) {
        if self.tangents.is_some() {
            return;
        }
        let (Some(normals), Some(uvs)) = (self.normals.as_ref(), self.uvs.as_ref()) else {
            return;
        };
        if uvs.len() != self.positions.len() || normals.len() != self.positions.len() {
            return;
        }

        let mut tangents = vec![Vec3::ZERO; self.positions.len()];
        let mut bitangents = vec![Vec3::ZERO; self.positions.len()];
        for [a, b, c] in self.triangles() {
            let e1 = self.positions[b] - self.positions[a];
            let e2 = self.positions[c] - self.positions[a];
            let d1 = uvs[b] - uvs[a];
            let d2 = uvs[c] - uvs[a];
            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let t = (e1 * d2.y - e2 * d1.y) * r;
            let bt = (e2 * d1.x - e1 * d2.x) * r;
            for i in [a, b, c] {
                tangents[i] += t;
                bitangents[i] += bt;
            }
        }

        for i in 0..self.positions.len() {
            let n = normals[i];
            // Gram-Schmidt against the normal
            let t = (tangents[i] - n * n.dot(tangents[i]))
                .try_normalize()
                .unwrap_or(Vec3::X);
            let bt = bitangents[i].try_normalize().unwrap_or_else(|| n.cross(t));
            tangents[i] = t;
            bitangents[i] = bt;
        }
        self.tangents = Some(tangents);
        self.bitangents = Some(bitangents);
    }
}

/// Node of the scene hierarchy
///
/// Node transforms are not imported; every mesh is used in model space.
#[derive(Debug, Clone, Default)]
pub struct ImportedNode {
    pub name: String,
    pub meshes: Vec<usize>,
    pub children: Vec<ImportedNode>,
}

impl ImportedNode {
    /// Mesh indices in depth-first order: own meshes, then each child
    pub fn mesh_order(&self) -> Vec<usize> {
        let mut order = Vec::new();
        self.collect(&mut order);
        order
    }

    fn collect(&self, order: &mut Vec<usize>) {
        order.extend_from_slice(&self.meshes);
        for child in &self.children {
            child.collect(order);
        }
    }
}

/// Imported model file
#[derive(Debug, Clone, Default)]
pub struct ImportedScene {
    pub root: ImportedNode,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
}

impl ImportedScene {
    /// Import `path`, picking the importer from the file extension
    pub fn load(path: &Path) -> LoadResult<Self> {
        if !path.exists() {
            return Err(LoadError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let mut scene = match extension.as_deref() {
            Some("obj") => obj::import(path)?,
            Some("gltf") | Some("glb") => gltf::import(path)?,
            _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        };

        for mesh in &mut scene.meshes {
            mesh.generate_normals();
            mesh.generate_tangents();
        }
        Ok(scene)
    }

    /// Material used by `mesh`, if any
    pub fn material_of(&self, mesh: &ImportedMesh) -> Option<&ImportedMaterial> {
        mesh.material.and_then(|i| self.materials.get(i))
    }
}

pub(crate) use self::obj::load_mtl;
