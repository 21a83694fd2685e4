//! Texture loading and management
//!
//! [`Texture`] is a standard 8-bit RGBA image, [`TextureHdri`] a floating
//! point Radiance HDR image, and [`CubeMap`] six square faces projected from
//! an equirectangular HDR image.

use crate::backend::{
    SamplerDescriptor, SharedBackend, TextureDescriptor, TextureDimension, TextureFormat,
    TextureHandle,
};
use crate::resources::error::{LoadError, LoadResult};
use half::f16;
use image::{DynamicImage, GenericImageView};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};

/// Decoded 8-bit texture data
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Channel count of the source image before expansion to RGBA
    pub channels: u8,
    pub format: TextureFormat,
    pub data: Vec<u8>,
}

impl TextureData {
    /// Load texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> LoadResult<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| match source {
            image::ImageError::IoError(e) => LoadError::io(path, e),
            source => LoadError::Image {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::from_image(img, path)
    }

    /// Create texture data from a decoded image
    pub fn from_image(img: DynamicImage, path: &Path) -> LoadResult<Self> {
        let channels = img.color().channel_count();
        if channels == 0 {
            return Err(LoadError::ZeroChannels(path.to_path_buf()));
        }

        let (width, height) = img.dimensions();
        let data = img.to_rgba8().into_raw();

        Ok(Self {
            width,
            height,
            channels,
            format: TextureFormat::Rgba8Unorm,
            data,
        })
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            channels: 4,
            format: TextureFormat::Rgba8Unorm,
            data: color.to_vec(),
        }
    }
}

/// GPU texture loaded from an image file
pub struct Texture {
    backend: SharedBackend,
    handle: Option<TextureHandle>,
    path: PathBuf,
    width: u32,
    height: u32,
}

impl Texture {
    /// Decode `path` and upload it
    pub fn load(backend: &SharedBackend, path: &Path) -> LoadResult<Self> {
        let data = TextureData::from_file(path)?;
        Self::from_data(backend, &data, path)
    }

    /// Upload already decoded data
    pub fn from_data(backend: &SharedBackend, data: &TextureData, path: &Path) -> LoadResult<Self> {
        let desc = TextureDescriptor {
            label: Some(path.display().to_string()),
            width: data.width,
            height: data.height,
            format: data.format,
            dimension: TextureDimension::D2,
            sampler: SamplerDescriptor::default(),
        };
        let handle = backend.lock().create_texture(&desc, &data.data)?;

        log::info!("Loaded texture {} ({}x{})", path.display(), data.width, data.height);

        Ok(Self {
            backend: backend.clone(),
            handle: Some(handle),
            path: path.to_path_buf(),
            width: data.width,
            height: data.height,
        })
    }

    /// Texture that failed to load; binding it clears the unit
    pub(crate) fn failed(backend: &SharedBackend, path: &Path) -> Self {
        Self {
            backend: backend.clone(),
            handle: None,
            path: path.to_path_buf(),
            width: 0,
            height: 0,
        }
    }

    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.lock().destroy_texture(handle);
        }
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .finish()
    }
}

/// Linear RGBA floating point image
#[derive(Debug, Clone)]
pub struct HdrImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl HdrImage {
    pub fn from_file<P: AsRef<Path>>(path: P) -> LoadResult<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| match source {
            image::ImageError::IoError(e) => LoadError::io(path, e),
            source => LoadError::Image {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::from_image(img, path)
    }

    pub fn from_image(img: DynamicImage, path: &Path) -> LoadResult<Self> {
        if img.color().channel_count() == 0 {
            return Err(LoadError::ZeroChannels(path.to_path_buf()));
        }
        let (width, height) = img.dimensions();
        let raw = img.to_rgba32f().into_raw();
        let pixels = raw
            .chunks_exact(4)
            .map(|p| [p[0], p[1], p[2], p[3]])
            .collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let x = x % self.width;
        let y = y.min(self.height - 1);
        self.pixels[(y * self.width + x) as usize]
    }

    /// Bilinear sample; `u` wraps around, `v` is clamped
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        if self.width == 0 || self.height == 0 {
            return [0.0; 4];
        }
        let x = u.rem_euclid(1.0) * self.width as f32 - 0.5;
        let y = (v.clamp(0.0, 1.0) * self.height as f32 - 0.5).max(0.0);
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let x0 = (x0 as i64).rem_euclid(self.width as i64) as u32;
        let y0 = y0 as u32;

        let a = self.texel(x0, y0);
        let b = self.texel(x0 + 1, y0);
        let c = self.texel(x0, y0 + 1);
        let d = self.texel(x0 + 1, y0 + 1);

        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * fx;
            let bottom = c[i] + (d[i] - c[i]) * fx;
            out[i] = top + (bottom - top) * fy;
        }
        out
    }

    /// Half-float bytes ready for an `Rgba16Float` upload
    pub fn to_f16_bytes(&self) -> Vec<u8> {
        pixels_to_f16_bytes(&self.pixels)
    }
}

fn pixels_to_f16_bytes(pixels: &[[f32; 4]]) -> Vec<u8> {
    let halves: Vec<f16> = pixels.iter().flatten().map(|&c| f16::from_f32(c)).collect();
    bytemuck::cast_slice(&halves).to_vec()
}

/// HDR texture (equirectangular environment map)
pub struct TextureHdri {
    backend: SharedBackend,
    handle: Option<TextureHandle>,
    path: PathBuf,
}

impl TextureHdri {
    pub fn load(backend: &SharedBackend, path: &Path) -> LoadResult<Self> {
        let image = HdrImage::from_file(path)?;
        let desc = TextureDescriptor {
            label: Some(path.display().to_string()),
            width: image.width,
            height: image.height,
            format: TextureFormat::Rgba16Float,
            dimension: TextureDimension::D2,
            sampler: SamplerDescriptor::clamped(),
        };
        let handle = backend.lock().create_texture(&desc, &image.to_f16_bytes())?;

        log::info!("Loaded HDR texture {} ({}x{})", path.display(), image.width, image.height);

        Ok(Self {
            backend: backend.clone(),
            handle: Some(handle),
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn failed(backend: &SharedBackend, path: &Path) -> Self {
        Self {
            backend: backend.clone(),
            handle: None,
            path: path.to_path_buf(),
        }
    }

    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TextureHdri {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.lock().destroy_texture(handle);
        }
    }
}

/// Direction through texel (`x`, `y`) of cube face `face` (+X, -X, +Y, -Y, +Z, -Z)
fn cube_direction(face: usize, x: u32, y: u32, size: u32) -> [f32; 3] {
    let s = 2.0 * (x as f32 + 0.5) / size as f32 - 1.0;
    let t = 2.0 * (y as f32 + 0.5) / size as f32 - 1.0;
    let dir = match face {
        0 => [1.0, -t, -s],
        1 => [-1.0, -t, s],
        2 => [s, 1.0, t],
        3 => [s, -1.0, -t],
        4 => [s, -t, 1.0],
        _ => [-s, -t, -1.0],
    };
    let len = (dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]).sqrt();
    [dir[0] / len, dir[1] / len, dir[2] / len]
}

/// Project an equirectangular image onto six cube faces of `face_size`²
///
/// Faces are packed back to back in +X, -X, +Y, -Y, +Z, -Z order.
pub fn project_equirect(image: &HdrImage, face_size: u32) -> Vec<[f32; 4]> {
    let mut faces = Vec::with_capacity((face_size * face_size * 6) as usize);
    for face in 0..6 {
        for y in 0..face_size {
            for x in 0..face_size {
                let [dx, dy, dz] = cube_direction(face, x, y, face_size);
                let u = 0.5 + dz.atan2(dx) / (2.0 * PI);
                let v = 0.5 - dy.asin() / PI;
                faces.push(image.sample(u, v));
            }
        }
    }
    faces
}

/// Cube map texture
pub struct CubeMap {
    backend: SharedBackend,
    handle: Option<TextureHandle>,
    face_size: u32,
}

impl CubeMap {
    /// Default face resolution for environment maps
    pub const DEFAULT_FACE_SIZE: u32 = 512;

    pub fn from_hdr(backend: &SharedBackend, image: &HdrImage, face_size: u32) -> LoadResult<Self> {
        let faces = project_equirect(image, face_size);
        let desc = TextureDescriptor {
            label: Some("Cube Map".into()),
            width: face_size,
            height: face_size,
            format: TextureFormat::Rgba16Float,
            dimension: TextureDimension::Cube,
            sampler: SamplerDescriptor::clamped(),
        };
        let handle = backend.lock().create_texture(&desc, &pixels_to_f16_bytes(&faces))?;

        Ok(Self {
            backend: backend.clone(),
            handle: Some(handle),
            face_size,
        })
    }

    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    pub fn face_size(&self) -> u32 {
        self.face_size
    }

    pub(crate) fn backend(&self) -> &SharedBackend {
        &self.backend
    }
}

impl Drop for CubeMap {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.lock().destroy_texture(handle);
        }
    }
}
