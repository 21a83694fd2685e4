//! Path-keyed resource cache
//!
//! Every resource kind has its own map from canonical path to shared handle.
//! Loading a path that is already present returns the same `Arc` without
//! touching storage. A load that fails still produces a handle, in the "not
//! loaded" state, which is cached like any other so the failure is reported
//! once and never retried.

use crate::backend::SharedBackend;
use crate::resources::audio::AudioBuffer;
use crate::resources::error::LoadResult;
use crate::resources::material::Material;
use crate::resources::mesh::Mesh;
use crate::resources::shader::ShaderProgram;
use crate::resources::texture::{Texture, TextureHdri};
use crate::scene::SkyBox;
use crate::RendererConfig;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

type ResourceMap<T> = HashMap<PathBuf, Arc<T>>;

/// Key used for every map
///
/// Existing files get their canonical path. For a missing file the longest
/// existing ancestor is canonicalized and the remaining components are folded
/// onto it, so the key does not change once the file appears.
pub fn canonical_key(path: &Path) -> PathBuf {
    if let Ok(key) = fs::canonicalize(path) {
        return key;
    }
    let Ok(absolute) = std::path::absolute(path) else {
        return path.to_path_buf();
    };

    let mut base = absolute.as_path();
    let mut key = loop {
        match base.parent() {
            Some(parent) => {
                base = parent;
                if let Ok(resolved) = fs::canonicalize(base) {
                    break resolved;
                }
            }
            None => break base.to_path_buf(),
        }
    };
    let rest = absolute.strip_prefix(base).unwrap_or(Path::new(""));
    for component in rest.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                key.pop();
            }
            other => key.push(other),
        }
    }
    key
}

fn lookup<T>(map: &ResourceMap<T>, key: &Path, kind: &str) -> Option<Arc<T>> {
    let hit = map.get(key).cloned();
    if hit.is_some() {
        log::debug!("{} cache hit: {}", kind, key.display());
    }
    hit
}

fn store<T>(
    map: &mut ResourceMap<T>,
    key: PathBuf,
    kind: &str,
    result: LoadResult<T>,
    failed: impl FnOnce(&Path) -> T,
) -> Arc<T> {
    let resource = match result {
        Ok(resource) => resource,
        Err(e) => {
            log::warn!("Failed to load {} {}: {}", kind, key.display(), e);
            failed(&key)
        }
    };
    insert(map, key, resource)
}

fn insert<T>(map: &mut ResourceMap<T>, key: PathBuf, resource: T) -> Arc<T> {
    let resource = Arc::new(resource);
    map.insert(key, resource.clone());
    resource
}

/// Deduplicating loader for every GPU and audio resource
pub struct ResourceCache {
    backend: SharedBackend,
    default_texture_path: PathBuf,
    meshes: ResourceMap<Mesh>,
    materials: ResourceMap<Material>,
    textures: ResourceMap<Texture>,
    textures_hdri: ResourceMap<TextureHdri>,
    skyboxes: ResourceMap<SkyBox>,
    shaders: ResourceMap<ShaderProgram>,
    audio: ResourceMap<AudioBuffer>,
}

impl ResourceCache {
    pub fn new(backend: SharedBackend, config: &RendererConfig) -> Self {
        Self {
            backend,
            default_texture_path: config.default_texture_path.clone(),
            meshes: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            textures_hdri: HashMap::new(),
            skyboxes: HashMap::new(),
            shaders: HashMap::new(),
            audio: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn default_texture_path(&self) -> &Path {
        &self.default_texture_path
    }

    /// Change the texture used for empty material slots
    ///
    /// Materials built earlier keep the texture they were given.
    pub fn set_default_texture_path(&mut self, path: impl Into<PathBuf>) {
        self.default_texture_path = path.into();
    }

    /// Texture used for material slots the model file leaves empty
    pub fn default_texture(&mut self) -> Arc<Texture> {
        let path = self.default_texture_path.clone();
        self.load_texture(path)
    }

    pub fn load_mesh(&mut self, path: impl AsRef<Path>) -> Arc<Mesh> {
        let key = canonical_key(path.as_ref());
        if let Some(mesh) = lookup(&self.meshes, &key, "mesh") {
            return mesh;
        }
        let result = Mesh::load(self, &key);
        store(&mut self.meshes, key, "mesh", result, Mesh::failed)
    }

    pub fn load_material(&mut self, path: impl AsRef<Path>) -> Arc<Material> {
        let key = canonical_key(path.as_ref());
        if let Some(material) = lookup(&self.materials, &key, "material") {
            return material;
        }
        let material = match Material::load(self, &key) {
            Ok(material) => material,
            Err(e) => {
                log::warn!("Failed to load material {}: {}", key.display(), e);
                // An unreadable material still gets three (default) slots
                let fallback = self.default_texture();
                Material::new(fallback.clone(), fallback.clone(), fallback)
            }
        };
        insert(&mut self.materials, key, material)
    }

    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Arc<Texture> {
        let key = canonical_key(path.as_ref());
        if let Some(texture) = lookup(&self.textures, &key, "texture") {
            return texture;
        }
        let backend = self.backend.clone();
        let result = Texture::load(&backend, &key);
        store(&mut self.textures, key, "texture", result, |p| Texture::failed(&backend, p))
    }

    pub fn load_texture_hdri(&mut self, path: impl AsRef<Path>) -> Arc<TextureHdri> {
        let key = canonical_key(path.as_ref());
        if let Some(texture) = lookup(&self.textures_hdri, &key, "HDR texture") {
            return texture;
        }
        let backend = self.backend.clone();
        let result = TextureHdri::load(&backend, &key);
        store(&mut self.textures_hdri, key, "HDR texture", result, |p| {
            TextureHdri::failed(&backend, p)
        })
    }

    pub fn load_skybox(&mut self, path: impl AsRef<Path>) -> Arc<SkyBox> {
        let key = canonical_key(path.as_ref());
        if let Some(skybox) = lookup(&self.skyboxes, &key, "sky box") {
            return skybox;
        }
        let result = SkyBox::load(&self.backend, &key);
        store(&mut self.skyboxes, key, "sky box", result, SkyBox::failed)
    }

    /// Load a shader program, expanding `#include`s when `preprocess` is set
    ///
    /// The flag only matters on the first load of a path.
    pub fn load_shader(&mut self, path: impl AsRef<Path>, preprocess: bool) -> Arc<ShaderProgram> {
        let key = canonical_key(path.as_ref());
        if let Some(shader) = lookup(&self.shaders, &key, "shader") {
            return shader;
        }
        let backend = self.backend.clone();
        let result = ShaderProgram::load(&backend, &key, preprocess);
        store(&mut self.shaders, key, "shader", result, |p| {
            ShaderProgram::failed(&backend, p)
        })
    }

    /// Load an audio buffer, decoding now or on first access
    pub fn load_audio(&mut self, path: impl AsRef<Path>, load_now: bool) -> Arc<AudioBuffer> {
        let key = canonical_key(path.as_ref());
        if let Some(audio) = lookup(&self.audio, &key, "audio") {
            return audio;
        }
        let result = AudioBuffer::load(&key, load_now);
        store(&mut self.audio, key, "audio", result, AudioBuffer::failed)
    }

    pub fn contains_mesh(&self, path: impl AsRef<Path>) -> bool {
        self.meshes.contains_key(&canonical_key(path.as_ref()))
    }

    pub fn contains_texture(&self, path: impl AsRef<Path>) -> bool {
        self.textures.contains_key(&canonical_key(path.as_ref()))
    }

    pub fn contains_shader(&self, path: impl AsRef<Path>) -> bool {
        self.shaders.contains_key(&canonical_key(path.as_ref()))
    }

    /// Number of cached entries across every kind
    pub fn len(&self) -> usize {
        self.meshes.len()
            + self.materials.len()
            + self.textures.len()
            + self.textures_hdri.len()
            + self.skyboxes.len()
            + self.shaders.len()
            + self.audio.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
