//! Main engine orchestrator

use crate::backend::{self, BackendResult, SharedBackend, WgpuBackend};
use crate::renderer::Renderer;
use crate::resources::ResourceCache;
use crate::RendererConfig;
use std::sync::Arc;
use winit::window::Window as WinitWindow;

/// Owns the backend, the resource cache and the renderer
///
/// Scene objects registered with the renderer are owned by the caller and
/// must be dropped before the engine so their GPU handles are released
/// against a live backend.
pub struct Engine {
    renderer: Renderer,
    cache: ResourceCache,
    backend: SharedBackend,
    config: RendererConfig,
    frame_count: u64,
}

impl Engine {
    pub fn new(backend: SharedBackend, config: RendererConfig) -> Self {
        let cache = ResourceCache::new(backend.clone(), &config);
        let mut renderer = Renderer::new(&config);
        let (width, height) = backend.lock().surface_size();
        renderer.on_window_resized(width, height);

        log::info!("Engine initialized on {} ({}x{})", backend.lock().name(), width, height);

        Self {
            renderer,
            cache,
            backend,
            config,
            frame_count: 0,
        }
    }

    /// Create an engine drawing into `window` through wgpu
    pub fn with_wgpu(window: Arc<WinitWindow>, config: RendererConfig) -> BackendResult<Self> {
        let wgpu = WgpuBackend::new(window, config.vsync)?;
        Ok(Self::new(backend::shared(wgpu), config))
    }

    /// Render one frame
    ///
    /// `delta` is the time since the previous frame and `time` the time since
    /// startup, both in seconds.
    pub fn frame(&mut self, delta: f64, time: f64) -> BackendResult<()> {
        self.backend.lock().begin_frame()?;
        self.renderer.render(delta, time);
        self.backend.lock().end_frame()?;
        self.frame_count += 1;
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.lock().resize(width, height);
        self.renderer.on_window_resized(width, height);
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResourceCache {
        &mut self.cache
    }

    /// Both halves at once, for loading a resource and registering it
    pub fn split_mut(&mut self) -> (&mut ResourceCache, &mut Renderer) {
        (&mut self.cache, &mut self.renderer)
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, RecordedCommand};

    #[test]
    fn test_frame_brackets_render() {
        let (headless, shared) = HeadlessBackend::new_shared();
        let mut engine = Engine::new(shared, RendererConfig::default());

        engine.frame(0.016, 0.016).unwrap();
        engine.frame(0.016, 0.032).unwrap();

        assert_eq!(engine.frame_count(), 2);
        let backend = headless.lock();
        assert_eq!(backend.frames(), 2);
        assert_eq!(backend.commands().first(), Some(&RecordedCommand::BeginFrame));
        assert_eq!(backend.commands().last(), Some(&RecordedCommand::EndFrame));
    }

    #[test]
    fn test_aspect_follows_backend_size() {
        let (headless, shared) = HeadlessBackend::new_shared();
        let mut engine = Engine::new(shared, RendererConfig::default());
        assert_eq!(engine.renderer().aspect_ratio(), 800.0 / 600.0);

        engine.resize(1600, 900);
        assert_eq!(engine.renderer().aspect_ratio(), 16.0 / 9.0);
        assert_eq!(headless.lock().size(), (1600, 900));
    }
}
