//! Materials: the three texture slots a surface samples from

use crate::backend::GraphicsBackend;
use crate::resources::cache::ResourceCache;
use crate::resources::error::{LoadError, LoadResult};
use crate::resources::import::{self, ImportedMaterial, TextureSlot};
use crate::resources::texture::Texture;
use std::path::Path;
use std::sync::Arc;

/// Texture unit of each slot
pub const ALBEDO_UNIT: u32 = 0;
pub const NORMAL_UNIT: u32 = 1;
pub const ORM_UNIT: u32 = 2;

/// Albedo, normal and ORM textures bound to units 0, 1 and 2
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    albedo: Arc<Texture>,
    normal: Arc<Texture>,
    orm: Arc<Texture>,
}

impl Material {
    pub fn new(albedo: Arc<Texture>, normal: Arc<Texture>, orm: Arc<Texture>) -> Self {
        Self {
            name: String::new(),
            albedo,
            normal,
            orm,
        }
    }

    /// Resolve the slots of an imported material
    ///
    /// A slot with no texture gets the cache's default texture; otherwise the
    /// first texture is loaded relative to `base_dir`.
    pub fn from_imported(
        cache: &mut ResourceCache,
        imported: &ImportedMaterial,
        base_dir: &Path,
    ) -> Self {
        let mut resolve = |slot: TextureSlot| match imported.texture_path(slot, 0) {
            Some(path) => cache.load_texture(base_dir.join(path)),
            None => cache.default_texture(),
        };
        let albedo = resolve(TextureSlot::Diffuse);
        let normal = resolve(TextureSlot::Normal);
        let orm = resolve(TextureSlot::Orm);

        Self {
            name: imported.name.clone(),
            albedo,
            normal,
            orm,
        }
    }

    /// Build the first material of a `.mtl` file
    pub fn load(cache: &mut ResourceCache, path: &Path) -> LoadResult<Self> {
        let materials = import::load_mtl(path)?;
        let first = materials
            .first()
            .ok_or_else(|| LoadError::NoMaterial(path.to_path_buf()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let material = Self::from_imported(cache, first, base_dir);
        log::info!("Loaded material '{}' from {}", material.name, path.display());
        Ok(material)
    }

    pub fn albedo(&self) -> &Arc<Texture> {
        &self.albedo
    }

    pub fn normal(&self) -> &Arc<Texture> {
        &self.normal
    }

    pub fn orm(&self) -> &Arc<Texture> {
        &self.orm
    }

    /// True when all three textures are resident
    pub fn is_complete(&self) -> bool {
        self.albedo.is_loaded() && self.normal.is_loaded() && self.orm.is_loaded()
    }

    pub fn bind(&self, backend: &mut dyn GraphicsBackend) {
        backend.bind_texture(ALBEDO_UNIT, self.albedo.handle());
        backend.bind_texture(NORMAL_UNIT, self.normal.handle());
        backend.bind_texture(ORM_UNIT, self.orm.handle());
    }

    pub fn unbind(&self, backend: &mut dyn GraphicsBackend) {
        backend.bind_texture(ALBEDO_UNIT, None);
        backend.bind_texture(NORMAL_UNIT, None);
        backend.bind_texture(ORM_UNIT, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::resources::texture::TextureData;

    fn solid(shared: &crate::backend::SharedBackend, name: &str) -> Arc<Texture> {
        Arc::new(
            Texture::from_data(shared, &TextureData::solid_color([1, 2, 3, 4]), Path::new(name))
                .unwrap(),
        )
    }

    #[test]
    fn test_bind_and_unbind_cover_three_units() {
        let (headless, shared) = HeadlessBackend::new_shared();
        let material = Material::new(solid(&shared, "a"), solid(&shared, "n"), solid(&shared, "o"));

        let mut backend = headless.lock();
        material.bind(&mut *backend);
        assert_eq!(backend.bound_texture(ALBEDO_UNIT), material.albedo().handle());
        assert_eq!(backend.bound_texture(NORMAL_UNIT), material.normal().handle());
        assert_eq!(backend.bound_texture(ORM_UNIT), material.orm().handle());

        material.unbind(&mut *backend);
        assert!(backend.is_unbound());
    }
}
