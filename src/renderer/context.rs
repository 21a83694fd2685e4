//! Per-batch render state handed to every renderable

use crate::resources::ShaderProgram;
use crate::scene::{AmbientLight, Camera, DirectionalLight, PointLight};

/// Snapshot of the frame, seen through one batch
///
/// Built by [`Renderer::render`](super::Renderer::render) and only valid for
/// the duration of the call that received it.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    /// Program enabled for the batch being drawn
    pub program: &'a ShaderProgram,
    pub batch_name: &'a str,
    /// Seconds since the previous frame
    pub delta: f64,
    /// Seconds since startup
    pub time: f64,
    pub sun: DirectionalLight,
    /// Point lights to upload, already capped to the configured maximum
    pub point_lights: &'a [PointLight],
    pub ambient_light: AmbientLight,
    pub specular_strength: f32,
    pub camera: &'a Camera,
}

/// Anything a batch can draw
pub trait Renderable {
    fn render(&self, ctx: &RenderContext<'_>);
}
