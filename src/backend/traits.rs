//! Core backend abstraction traits
//!
//! [`GraphicsBackend`] is the GPU binding surface the rest of the crate talks to:
//! object creation and destruction, program/uniform state, texture units,
//! vertex arrays and indexed draws.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("Failed to create vertex array: {0}")]
    VertexArrayCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create shader program: {0}")]
    ShaderCreationFailed(String),
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a vertex array (vertex buffer + index buffer + attribute layout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u64);

macro_rules! impl_raw_id {
    ($($handle:ty),*) => {
        $(
            impl $handle {
                /// Backend-assigned id, unique per object kind
                pub fn raw(&self) -> u64 {
                    self.0
                }
            }
        )*
    };
}

impl_raw_id!(BufferHandle, VertexArrayHandle, TextureHandle, ProgramHandle);

/// Main graphics backend trait
///
/// Bind state (`use_program`, `bind_texture`, `bind_vertex_array`) is global to
/// the backend, like a GL context: whatever is bound when `draw_indexed` is
/// called is what the draw uses.
pub trait GraphicsBackend: Send {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Current size of the presentation surface
    fn surface_size(&self) -> (u32, u32);

    /// Resize the presentation surface
    fn resize(&mut self, width: u32, height: u32);

    /// Begin a new frame
    fn begin_frame(&mut self) -> BackendResult<()>;

    /// End and present the frame
    fn end_frame(&mut self) -> BackendResult<()>;

    // Resource creation

    /// Create a buffer with initial (immutable) data
    fn create_buffer_init(&mut self, desc: &BufferDescriptor, data: &[u8])
        -> BackendResult<BufferHandle>;

    /// Create a vertex array describing how a vertex/index buffer pair is read
    fn create_vertex_array(
        &mut self,
        desc: &VertexArrayDescriptor,
    ) -> BackendResult<VertexArrayHandle>;

    /// Create a texture and upload its pixels
    ///
    /// Cube textures expect six faces packed back to back in +X, -X, +Y, -Y,
    /// +Z, -Z order.
    fn create_texture(&mut self, desc: &TextureDescriptor, data: &[u8])
        -> BackendResult<TextureHandle>;

    /// Compile and link a shader program
    fn create_program(&mut self, desc: &ProgramDescriptor) -> BackendResult<ProgramHandle>;

    // State

    /// Make a program current, or clear the current program
    fn use_program(&mut self, program: Option<ProgramHandle>);

    /// Set a uniform of `program` by its flattened name
    ///
    /// Unknown names are ignored.
    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue);

    /// Bind a texture to a texture unit, or clear the unit
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>);

    /// Bind a vertex array, or clear the binding
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);

    /// Draw `index_count` indices from the bound vertex array
    fn draw_indexed(&mut self, topology: PrimitiveTopology, index_count: u32);

    // Resource cleanup

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Destroy a vertex array
    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Destroy a shader program
    fn destroy_program(&mut self, program: ProgramHandle);
}
