//! Scene objects drawn by the renderer

use crate::renderer::{RenderContext, Renderable};
use crate::resources::Mesh;
use crate::scene::Transform;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

/// A mesh placed in the world
pub struct GameObject {
    pub id: u32,
    pub transform: Mutex<Transform>,
    mesh: Arc<Mesh>,
    warned: AtomicBool,
}

impl GameObject {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self::with_transform(mesh, Transform::default())
    }

    pub fn with_transform(mesh: Arc<Mesh>, transform: Transform) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            transform: Mutex::new(transform),
            mesh,
            warned: AtomicBool::new(false),
        }
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn set_transform(&self, transform: Transform) {
        *self.transform.lock() = transform;
    }
}

impl Renderable for GameObject {
    fn render(&self, ctx: &RenderContext<'_>) {
        if !self.mesh.is_loaded() {
            if !self.warned.swap(true, Ordering::Relaxed) {
                log::warn!(
                    "Game object {} skipped: mesh {} is not loaded",
                    self.id,
                    self.mesh.path().display()
                );
            }
            return;
        }
        let model = self.transform.lock().matrix();
        ctx.program.set_mat4("model_transform", model);
        self.mesh.render();
    }
}

/// Groups a value with a transform without drawing anything
///
/// Registering one in a batch is allowed; rendering it is a no-op.
pub struct GameObjectContainer<T> {
    pub item: Arc<T>,
    pub transform: Mutex<Transform>,
}

impl<T> GameObjectContainer<T> {
    pub fn new(item: Arc<T>) -> Self {
        Self {
            item,
            transform: Mutex::new(Transform::default()),
        }
    }
}

impl<T> Renderable for GameObjectContainer<T> {
    fn render(&self, _ctx: &RenderContext<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, UniformValue, VertexDataAttribute};
    use crate::renderer::Renderer;
    use crate::resources::{MeshSurface, ShaderProgram};
    use crate::RendererConfig;
    use glam::{Mat4, Vec3};
    use std::path::Path;

    #[test]
    fn test_game_object_uploads_model_transform() {
        let (headless, shared) = HeadlessBackend::new_shared();
        let surface = MeshSurface::new(
            &shared,
            &[0.0; 9],
            &[0, 1, 2],
            vec![VertexDataAttribute::float(3)],
            None,
        )
        .unwrap();
        let object = Arc::new(GameObject::with_transform(
            Arc::new(Mesh::new(vec![surface])),
            Transform::from_position(Vec3::new(1.0, 2.0, 3.0)),
        ));
        let program = Arc::new(ShaderProgram::from_source(&shared, Path::new("p"), "src").unwrap());

        let mut renderer = Renderer::new(&RendererConfig::default());
        renderer.register_batch("opaque", Some(program.clone()));
        renderer.register_game_object("opaque", &object);
        renderer.render(0.0, 0.0);

        let handle = program.handle().unwrap();
        let backend = headless.lock();
        assert_eq!(
            backend.uniform(handle, "model_transform"),
            Some(UniformValue::Mat4(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))))
        );
        let draws = backend.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].program, Some(handle));
    }

    #[test]
    fn test_unloaded_mesh_is_skipped() {
        let (headless, shared) = HeadlessBackend::new_shared();
        let object = Arc::new(GameObject::new(Arc::new(Mesh::failed(Path::new("missing.obj")))));
        let program = Arc::new(ShaderProgram::from_source(&shared, Path::new("p"), "src").unwrap());

        let mut renderer = Renderer::new(&RendererConfig::default());
        renderer.register_batch("opaque", Some(program.clone()));
        renderer.register_game_object("opaque", &object);
        renderer.render(0.0, 0.0);
        renderer.render(0.0, 0.0);

        let backend = headless.lock();
        assert!(backend.draw_calls().is_empty());
        assert!(backend.uniform(program.handle().unwrap(), "model_transform").is_none());
    }

    #[test]
    fn test_container_draws_nothing() {
        let (headless, shared) = HeadlessBackend::new_shared();
        let container = Arc::new(GameObjectContainer::new(Arc::new(42u32)));
        let program = Arc::new(ShaderProgram::from_source(&shared, Path::new("p"), "src").unwrap());

        let mut renderer = Renderer::new(&RendererConfig::default());
        renderer.register_batch("groups", Some(program));
        renderer.register_game_object("groups", &container);
        renderer.render(0.0, 0.0);

        assert_eq!(*container.item, 42);
        assert_eq!(renderer.get_batch_data()["groups"], 1);
        assert!(headless.lock().draw_calls().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = GameObject::new(Arc::new(Mesh::failed(Path::new("a"))));
        let b = GameObject::new(Arc::new(Mesh::failed(Path::new("b"))));
        assert_ne!(a.id, b.id);
    }
}
