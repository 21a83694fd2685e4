//! Render Core - batch renderer for real-time 3D scenes
//!
//! The crate manages GPU-resident resources and draws them in named batches:
//! - **Resources**: meshes, materials, textures, HDR panoramas, shaders and
//!   audio buffers, deduplicated by canonical path in a [`ResourceCache`]
//! - **Scene**: camera, lights, game objects and a sky box
//! - **Renderer**: batches keyed by name, each with one shader program and a
//!   setup callback that uploads the frame-wide uniforms
//!
//! Rendering goes through the [`backend::GraphicsBackend`] trait. The wgpu
//! backend draws into a window; the headless backend records calls instead.

pub mod backend;
pub mod engine;
pub mod renderer;
pub mod resources;
pub mod scene;

pub use backend::{HeadlessBackend, SharedBackend, WgpuBackend};
pub use engine::Engine;
pub use renderer::{BatchEntry, RenderContext, Renderable, Renderer};
pub use resources::ResourceCache;
pub use scene::{Camera, GameObject, GameObjectContainer, SkyBox};

use std::path::PathBuf;

/// Texture used for material slots a model leaves empty
pub const DEFAULT_TEXTURE_PATH: &str = "res/testing/textures/texture_01.png";

/// Configuration for the renderer and resource cache
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Vertical field of view in degrees
    pub field_of_view: f32,
    /// Width over height until the first resize
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    /// Specular exponent uploaded as `material.specular_strength`
    pub specular_strength: f32,
    /// Point lights beyond this count are not uploaded
    pub max_point_lights: usize,
    pub default_texture_path: PathBuf,
    /// Enable vsync
    pub vsync: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            field_of_view: 90.0,
            aspect_ratio: 6.0 / 8.0,
            near: 0.1,
            far: 1024.0,
            specular_strength: 32.0,
            max_point_lights: 16,
            default_texture_path: PathBuf::from(DEFAULT_TEXTURE_PATH),
            vsync: true,
        }
    }
}
