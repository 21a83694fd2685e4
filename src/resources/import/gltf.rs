//! glTF 2.0 import through the `gltf` crate
//!
//! Every triangle primitive becomes one [`ImportedMesh`]. Textures are only
//! referenced by URI; images embedded in buffers or data URIs are skipped and
//! the slot falls back to the default texture.

use super::{ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene, TextureSlot};
use crate::resources::error::{LoadError, LoadResult};
use ::gltf::image::Source;
use ::gltf::mesh::Mode;
use ::gltf::{Document, Gltf};
use glam::{Vec2, Vec3};
use std::path::Path;

pub(super) fn import(path: &Path) -> LoadResult<ImportedScene> {
    let gltf_error = |source| LoadError::Gltf {
        path: path.to_path_buf(),
        source,
    };
    let Gltf { document, blob } = Gltf::open(path).map_err(gltf_error)?;
    let buffers = ::gltf::import_buffers(&document, path.parent(), blob).map_err(gltf_error)?;

    let materials = document
        .materials()
        .map(|m| convert_material(&m, path))
        .collect();

    // glTF mesh index -> indices of the primitives imported from it
    let mut primitive_map: Vec<Vec<usize>> = Vec::new();
    let mut meshes = Vec::new();
    for mesh in document.meshes() {
        let mut imported = Vec::new();
        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                log::warn!(
                    "Skipping non-triangle primitive in mesh {:?} of {}",
                    mesh.name(),
                    path.display()
                );
                continue;
            }

            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<Vec3> = positions.map(Vec3::from).collect();
            let normals: Option<Vec<Vec3>> =
                reader.read_normals().map(|n| n.map(Vec3::from).collect());
            let uvs = reader
                .read_tex_coords(0)
                .map(|t| t.into_f32().map(Vec2::from).collect());
            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let (tangents, bitangents) = match (reader.read_tangents(), normals.as_ref()) {
                (Some(tangents), Some(normals)) => {
                    let (t, b): (Vec<Vec3>, Vec<Vec3>) = tangents
                        .zip(normals)
                        .map(|([x, y, z, w], n)| {
                            let t = Vec3::new(x, y, z);
                            (t, n.cross(t) * w)
                        })
                        .unzip();
                    (Some(t), Some(b))
                }
                _ => (None, None),
            };

            imported.push(meshes.len());
            meshes.push(ImportedMesh {
                name: mesh.name().unwrap_or_default().to_string(),
                positions,
                normals,
                uvs,
                tangents,
                bitangents,
                indices,
                material: primitive.material().index(),
            });
        }
        primitive_map.push(imported);
    }

    let root = build_root(&document, &primitive_map, path);

    Ok(ImportedScene {
        root,
        meshes,
        materials,
    })
}

fn build_root(document: &Document, primitive_map: &[Vec<usize>], path: &Path) -> ImportedNode {
    let mut root = ImportedNode {
        name: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        ..Default::default()
    };

    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            root.children = scene
                .nodes()
                .map(|node| convert_node(&node, primitive_map))
                .collect();
        }
        // No scene: every mesh hangs off the root in file order
        None => root.meshes = primitive_map.iter().flatten().copied().collect(),
    }
    root
}

fn convert_node(node: &::gltf::Node, primitive_map: &[Vec<usize>]) -> ImportedNode {
    ImportedNode {
        name: node.name().unwrap_or_default().to_string(),
        meshes: node
            .mesh()
            .and_then(|mesh| primitive_map.get(mesh.index()))
            .cloned()
            .unwrap_or_default(),
        children: node
            .children()
            .map(|child| convert_node(&child, primitive_map))
            .collect(),
    }
}

fn texture_uri(texture: ::gltf::Texture, path: &Path) -> Option<String> {
    match texture.source().source() {
        Source::Uri { uri, .. } if !uri.starts_with("data:") => Some(uri.to_string()),
        _ => {
            log::warn!(
                "Embedded texture {} in {} is not supported",
                texture.index(),
                path.display()
            );
            None
        }
    }
}

fn convert_material(material: &::gltf::Material, path: &Path) -> ImportedMaterial {
    let mut imported = ImportedMaterial::new(material.name().unwrap_or_default());
    let pbr = material.pbr_metallic_roughness();

    if let Some(uri) = pbr
        .base_color_texture()
        .and_then(|info| texture_uri(info.texture(), path))
    {
        imported.add_texture(TextureSlot::Diffuse, uri);
    }
    if let Some(uri) = material
        .normal_texture()
        .and_then(|normal| texture_uri(normal.texture(), path))
    {
        imported.add_texture(TextureSlot::Normal, uri);
    }
    // glTF packs roughness/metallic in G/B and commonly occlusion in R of the same image
    let orm = pbr
        .metallic_roughness_texture()
        .and_then(|info| texture_uri(info.texture(), path))
        .or_else(|| {
            material
                .occlusion_texture()
                .and_then(|occlusion| texture_uri(occlusion.texture(), path))
        });
    if let Some(uri) = orm {
        imported.add_texture(TextureSlot::Orm, uri);
    }

    imported
}
