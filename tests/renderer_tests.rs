//! Renderer batches, frame orchestration and projection updates

use glam::Vec3;
use render_core::backend::{
    HeadlessBackend, RecordedCommand, SharedBackend, UniformValue, VertexDataAttribute,
};
use render_core::resources::{Mesh, MeshSurface, ShaderProgram};
use render_core::scene::PointLight;
use render_core::{GameObject, GameObjectContainer, Renderable, Renderer, RendererConfig};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn program(shared: &SharedBackend, name: &str) -> Arc<ShaderProgram> {
    let source = "@vertex fn vs_main() {}";
    Arc::new(ShaderProgram::from_source(shared, Path::new(name), source).unwrap())
}

fn triangle_object(shared: &SharedBackend) -> Arc<GameObject> {
    let surface = MeshSurface::new(
        shared,
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        &[0, 1, 2],
        vec![VertexDataAttribute::float(3)],
        None,
    )
    .unwrap();
    Arc::new(GameObject::new(Arc::new(Mesh::new(vec![surface]))))
}

#[test]
fn test_registration_into_unknown_batch_is_ignored() {
    init_logger();
    let (_headless, shared) = HeadlessBackend::new_shared();
    let mut renderer = Renderer::new(&RendererConfig::default());
    assert!(renderer.register_batch("opaque", Some(program(&shared, "opaque"))));

    let a = triangle_object(&shared);
    let b = triangle_object(&shared);
    renderer.register_game_object("opaque", &a);
    renderer.register_game_object("missing_batch", &b);

    let expected: BTreeMap<String, usize> = [("opaque".to_string(), 1)].into();
    assert_eq!(renderer.get_batch_data(), expected);
    assert!(renderer.get_program_for("missing_batch").is_none());
}

#[test]
fn test_missing_program_leaves_batches_unchanged() {
    init_logger();
    let (_headless, shared) = HeadlessBackend::new_shared();
    let mut renderer = Renderer::new(&RendererConfig::default());
    let kept = program(&shared, "kept");
    renderer.register_batch("opaque", Some(kept.clone()));
    let object = triangle_object(&shared);
    renderer.register_game_object("opaque", &object);

    assert!(!renderer.register_batch("opaque", None));
    assert!(!renderer.register_batch("transparent", None));

    let current = renderer.get_program_for("opaque").unwrap();
    assert!(Arc::ptr_eq(&current, &kept));
    assert_eq!(renderer.get_batch_data().len(), 1);
    assert_eq!(renderer.get_batch_data()["opaque"], 1);
}

#[test]
fn test_program_that_failed_to_load_is_rejected() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let (headless, shared) = HeadlessBackend::new_shared();
    let mut cache = render_core::ResourceCache::new(shared, &RendererConfig::default());
    let mut renderer = Renderer::new(&RendererConfig::default());

    let broken = cache.load_shader(dir.path().join("missing.wgsl"), false);
    assert!(!renderer.register_batch("opaque", Some(broken)));
    assert!(renderer.get_batch_data().is_empty());

    renderer.render(0.0, 0.0);
    assert!(headless.lock().commands().is_empty());
}

#[test]
fn test_render_without_batches_updates_camera() {
    init_logger();
    let mut renderer = Renderer::new(&RendererConfig::default());
    renderer.camera.set_position(Vec3::new(4.0, 1.0, 0.0));
    let before = renderer.camera.view_matrix();

    renderer.render(0.016, 1.0);

    assert_ne!(renderer.camera.view_matrix(), before);
    assert!(renderer.get_batch_data().is_empty());
}

#[test]
fn test_mixed_scene_registers_through_trait_objects() {
    init_logger();
    let (headless, shared) = HeadlessBackend::new_shared();
    let mut renderer = Renderer::new(&RendererConfig::default());
    renderer.register_batch("scene", Some(program(&shared, "scene")));

    let scene: Vec<Arc<dyn Renderable>> = vec![
        triangle_object(&shared) as Arc<dyn Renderable>,
        Arc::new(GameObjectContainer::new(Arc::new(7u8))) as Arc<dyn Renderable>,
        triangle_object(&shared) as Arc<dyn Renderable>,
    ];
    for object in &scene {
        renderer.register_renderable("scene", object);
    }
    assert_eq!(renderer.get_batch_data()["scene"], 3);

    renderer.render(0.0, 0.0);
    assert_eq!(headless.lock().draw_calls().len(), 2);

    drop(scene);
    assert_eq!(renderer.get_batch_data()["scene"], 0);
}

#[test]
fn test_frame_sequence_per_batch() {
    init_logger();
    let (headless, shared) = HeadlessBackend::new_shared();
    let mut renderer = Renderer::new(&RendererConfig::default());
    let shader = program(&shared, "opaque");
    renderer.register_batch("opaque", Some(shader.clone()));
    renderer.add_point_light(PointLight::new(Vec3::Y, Vec3::ONE, Vec3::new(1.0, 0.1, 0.01)));
    let object = triangle_object(&shared);
    renderer.register_game_object("opaque", &object);

    renderer.render(0.016, 3.0);

    let handle = shader.handle().unwrap();
    let backend = headless.lock();
    let commands = backend.commands();
    assert_eq!(commands.first(), Some(&RecordedCommand::UseProgram(Some(handle))));
    assert_eq!(commands.last(), Some(&RecordedCommand::UseProgram(None)));
    assert_eq!(backend.draw_calls().len(), 1);
    assert!(backend.is_unbound());

    // Frame-wide uniforms are uploaded before the object's draw
    let first_draw = commands
        .iter()
        .position(|c| matches!(c, RecordedCommand::Draw(_)))
        .unwrap();
    let view_upload = commands
        .iter()
        .position(|c| {
            matches!(c, RecordedCommand::SetUniform { name, .. } if name == "view_transform")
        })
        .unwrap();
    assert!(view_upload < first_draw);

    assert_eq!(backend.uniform(handle, "lights_active"), Some(UniformValue::Int(1)));
    assert_eq!(
        backend.uniform(handle, "lights_point[0].attenuation_factors"),
        Some(UniformValue::Vec3(Vec3::new(1.0, 0.1, 0.01)))
    );
    assert_eq!(
        backend.uniform(handle, "material.specular_strength"),
        Some(UniformValue::Float(32.0))
    );
    assert_eq!(
        backend.uniform(handle, "projection_transform"),
        Some(UniformValue::Mat4(renderer.camera.projection_matrix()))
    );
}

#[test]
fn test_resize_changes_aspect_but_not_fov() {
    init_logger();
    let mut renderer = Renderer::new(&RendererConfig::default());
    renderer.on_window_resized(800, 600);
    let projection = renderer.camera.projection_matrix();
    let fov = renderer.field_of_view();

    renderer.on_window_resized(1600, 900);
    assert!((renderer.aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
    assert_ne!(renderer.camera.projection_matrix(), projection);
    assert_eq!(renderer.field_of_view(), fov);
    assert_eq!(renderer.camera.perspective().fov_y_degrees, fov);

    // Same size twice gives the same projection
    let resized = renderer.camera.projection_matrix();
    renderer.on_window_resized(1600, 900);
    assert_eq!(renderer.camera.projection_matrix(), resized);
}

#[test]
fn test_set_fov_keeps_aspect() {
    init_logger();
    let mut renderer = Renderer::new(&RendererConfig::default());
    renderer.on_window_resized(1600, 900);
    renderer.set_fov(60.0);

    let perspective = *renderer.camera.perspective();
    assert_eq!(perspective.fov_y_degrees, 60.0);
    assert!((perspective.aspect - 16.0 / 9.0).abs() < 1e-6);
}

#[test]
fn test_replacing_a_batch_drops_its_objects() {
    init_logger();
    let (_headless, shared) = HeadlessBackend::new_shared();
    let mut renderer = Renderer::new(&RendererConfig::default());
    renderer.register_batch("opaque", Some(program(&shared, "first")));
    let object = triangle_object(&shared);
    renderer.register_game_object("opaque", &object);

    let replacement = program(&shared, "second");
    renderer.register_batch("opaque", Some(replacement.clone()));
    assert_eq!(renderer.get_batch_data()["opaque"], 0);
    assert!(Arc::ptr_eq(&renderer.get_program_for("opaque").unwrap(), &replacement));
}
