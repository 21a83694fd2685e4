//! Wavefront OBJ/MTL import through `tobj`

use super::{ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene, TextureSlot};
use crate::resources::error::{LoadError, LoadResult};
use glam::{Vec2, Vec3};
use std::path::Path;

/// MTL keys that carry a packed occlusion/roughness/metallic map
const ORM_KEYS: [&str; 2] = ["map_ORM", "map_orm"];

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

pub(super) fn import(path: &Path) -> LoadResult<ImportedScene> {
    let (models, materials) =
        tobj::load_obj(path, &load_options()).map_err(|source| LoadError::Obj {
            path: path.to_path_buf(),
            source,
        })?;

    let materials = match materials {
        Ok(materials) => materials.iter().map(convert_material).collect(),
        Err(e) => {
            log::warn!("No usable materials for {}: {}", path.display(), e);
            Vec::new()
        }
    };

    let mut scene = ImportedScene {
        root: ImportedNode {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..Default::default()
        },
        materials,
        ..Default::default()
    };

    for model in models {
        let index = scene.meshes.len();
        scene.root.children.push(ImportedNode {
            name: model.name.clone(),
            meshes: vec![index],
            children: Vec::new(),
        });
        scene.meshes.push(convert_mesh(model));
    }

    Ok(scene)
}

/// Materials of a standalone `.mtl` file
pub(crate) fn load_mtl(path: &Path) -> LoadResult<Vec<ImportedMaterial>> {
    let (materials, _) = tobj::load_mtl(path).map_err(|source| LoadError::Obj {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(materials.iter().map(convert_material).collect())
}

fn convert_mesh(model: tobj::Model) -> ImportedMesh {
    let mesh = model.mesh;

    let positions = mesh
        .positions
        .chunks_exact(3)
        .map(|v| Vec3::new(v[0], v[1], v[2]))
        .collect();

    let normals = if !mesh.normals.is_empty() {
        Some(
            mesh.normals
                .chunks_exact(3)
                .map(|n| Vec3::new(n[0], n[1], n[2]))
                .collect(),
        )
    } else {
        None
    };

    let uvs = if !mesh.texcoords.is_empty() {
        Some(
            mesh.texcoords
                .chunks_exact(2)
                .map(|t| Vec2::new(t[0], t[1]))
                .collect(),
        )
    } else {
        None
    };

    ImportedMesh {
        name: model.name,
        positions,
        normals,
        uvs,
        tangents: None,
        bitangents: None,
        indices: mesh.indices,
        material: mesh.material_id,
    }
}

fn convert_material(material: &tobj::Material) -> ImportedMaterial {
    let mut imported = ImportedMaterial::new(material.name.clone());
    if let Some(diffuse) = material.diffuse_texture.as_deref() {
        imported.add_texture(TextureSlot::Diffuse, diffuse);
    }
    if let Some(normal) = material.normal_texture.as_deref() {
        imported.add_texture(TextureSlot::Normal, normal);
    }
    for key in ORM_KEYS {
        if let Some(orm) = material.unknown_param.get(key) {
            imported.add_texture(TextureSlot::Orm, orm.trim());
        }
    }
    imported
}
