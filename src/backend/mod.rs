//! Backend abstraction layer
//!
//! Provides the [`GraphicsBackend`] trait plus two implementations: the wgpu
//! backend that drives a real window surface, and a headless recording backend
//! used when no GPU is available.

pub mod headless;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

use parking_lot::Mutex;
use std::sync::Arc;

pub use headless::{HeadlessBackend, RecordedCommand};
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;

/// Backend shared between the renderer and every GPU resource
///
/// Resources keep a clone so they can release their handles when dropped.
pub type SharedBackend = Arc<Mutex<dyn GraphicsBackend>>;

/// Wrap a backend so it can be shared with resources
pub fn shared<B: GraphicsBackend + 'static>(backend: B) -> SharedBackend {
    Arc::new(Mutex::new(backend))
}
