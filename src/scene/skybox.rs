//! Environment sky box

use crate::backend::SharedBackend;
use crate::renderer::{RenderContext, Renderable};
use crate::resources::primitives;
use crate::resources::{CubeMap, HdrImage, LoadResult, MeshSurface};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Texture unit the cube map is bound to while drawing
pub const SKYBOX_UNIT: u32 = 0;

/// Unit cube textured with a cube map projected from an HDR panorama
pub struct SkyBox {
    path: PathBuf,
    cube_map: Option<CubeMap>,
    cube: Option<MeshSurface>,
    warned: AtomicBool,
}

impl SkyBox {
    /// Build a sky box from the equirectangular image at `path`
    ///
    /// The decoded pixels are released once the cube map is uploaded.
    pub fn load(backend: &SharedBackend, path: &Path) -> LoadResult<Self> {
        let image = HdrImage::from_file(path)?;
        Self::from_image(backend, path, &image, CubeMap::DEFAULT_FACE_SIZE)
    }

    pub fn from_image(
        backend: &SharedBackend,
        path: &Path,
        image: &HdrImage,
        face_size: u32,
    ) -> LoadResult<Self> {
        let cube_map = CubeMap::from_hdr(backend, image, face_size)?;
        let cube = primitives::cube(backend, 1.0)?;
        log::info!("Built sky box from {} ({}² faces)", path.display(), face_size);

        Ok(Self {
            path: path.to_path_buf(),
            cube_map: Some(cube_map),
            cube: Some(cube),
            warned: AtomicBool::new(false),
        })
    }

    pub(crate) fn failed(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            cube_map: None,
            cube: None,
            warned: AtomicBool::new(false),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cube_map.is_some() && self.cube.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cube_map(&self) -> Option<&CubeMap> {
        self.cube_map.as_ref()
    }
}

impl Renderable for SkyBox {
    fn render(&self, ctx: &RenderContext<'_>) {
        let (Some(cube_map), Some(cube)) = (&self.cube_map, &self.cube) else {
            if !self.warned.swap(true, Ordering::Relaxed) {
                log::warn!(
                    "Sky box {} skipped in batch '{}': no cube map",
                    self.path.display(),
                    ctx.batch_name
                );
            }
            return;
        };
        // The cube surface takes the backend lock itself
        let backend = cube_map.backend();
        backend.lock().bind_texture(SKYBOX_UNIT, cube_map.handle());
        cube.render();
        backend.lock().bind_texture(SKYBOX_UNIT, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::renderer::Renderer;
    use crate::resources::ShaderProgram;
    use crate::RendererConfig;
    use std::sync::Arc;

    // Any decodable image works as a panorama; PNG keeps the fixture small
    fn write_panorama(path: &Path) {
        image::RgbImage::from_pixel(8, 4, image::Rgb([64, 128, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_skybox_binds_cube_map_for_its_draw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.png");
        write_panorama(&path);

        let (headless, shared) = HeadlessBackend::new_shared();
        let image = HdrImage::from_file(&path).unwrap();
        let skybox = Arc::new(SkyBox::from_image(&shared, &path, &image, 4).unwrap());
        let program =
            Arc::new(ShaderProgram::from_source(&shared, Path::new("sky"), "src").unwrap());

        let mut renderer = Renderer::new(&RendererConfig::default());
        renderer.register_batch("sky", Some(program));
        renderer.register_game_object("sky", &skybox);
        renderer.render(0.0, 0.0);

        let cube_handle = skybox.cube_map().and_then(CubeMap::handle).unwrap();
        let backend = headless.lock();
        let draws = backend.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 36);
        assert_eq!(draws[0].textures.get(&SKYBOX_UNIT), Some(&cube_handle));
        assert!(backend.is_unbound());
        assert_eq!(backend.texture(cube_handle).unwrap().width, 4);
    }

    #[test]
    fn test_load_uploads_only_the_cube_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.png");
        write_panorama(&path);

        let (headless, shared) = HeadlessBackend::new_shared();
        let skybox = SkyBox::load(&shared, &path).unwrap();
        assert!(skybox.is_loaded());
        assert_eq!(skybox.cube_map().unwrap().face_size(), CubeMap::DEFAULT_FACE_SIZE);
        assert_eq!(headless.lock().live_textures(), 1);
    }

    #[test]
    fn test_failed_skybox_draws_nothing() {
        let (headless, shared) = HeadlessBackend::new_shared();
        assert!(SkyBox::load(&shared, Path::new("missing.hdr")).is_err());

        let skybox = Arc::new(SkyBox::failed(Path::new("missing.hdr")));
        let program =
            Arc::new(ShaderProgram::from_source(&shared, Path::new("sky"), "src").unwrap());
        let mut renderer = Renderer::new(&RendererConfig::default());
        renderer.register_batch("sky", Some(program));
        renderer.register_game_object("sky", &skybox);
        renderer.render(0.0, 0.0);

        assert!(!skybox.is_loaded());
        assert!(headless.lock().draw_calls().is_empty());
    }
}
