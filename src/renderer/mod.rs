//! Batch renderer
//!
//! Objects are grouped into named batches. Each batch owns one shader program
//! and a setup callback; every frame the batches are drawn in name order:
//!
//! 1. enable the batch program
//! 2. run the setup callback (frame-wide uniforms)
//! 3. render every live object in registration order
//! 4. disable the program
//!
//! Batches hold objects weakly. Dropping the last strong handle to an object
//! removes it from its batch on the next frame.

mod context;
mod setup;

pub use context::*;
pub use setup::*;

use crate::resources::ShaderProgram;
use crate::scene::{AmbientLight, Camera, DirectionalLight, PointLight};
use crate::RendererConfig;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// One named batch
pub struct BatchEntry {
    pub program: Arc<ShaderProgram>,
    objects: Vec<Weak<dyn Renderable>>,
    setup: BatchSetupCallback,
}

impl BatchEntry {
    /// Number of registered objects still alive
    pub fn live_objects(&self) -> usize {
        self.objects.iter().filter(|o| o.strong_count() > 0).count()
    }
}

pub struct Renderer {
    batches: BTreeMap<String, BatchEntry>,
    field_of_view: f32,
    aspect_ratio: f32,
    near: f32,
    far: f32,
    max_point_lights: usize,
    pub specular_strength: f32,
    pub ambient_light: AmbientLight,
    pub sun: DirectionalLight,
    pub point_lights: Vec<PointLight>,
    pub camera: Camera,
}

impl Renderer {
    pub fn new(config: &RendererConfig) -> Self {
        let mut camera = Camera::default();
        camera.create_perspective(
            config.field_of_view,
            config.aspect_ratio,
            config.near,
            config.far,
        );

        Self {
            batches: BTreeMap::new(),
            field_of_view: config.field_of_view,
            aspect_ratio: config.aspect_ratio,
            near: config.near,
            far: config.far,
            max_point_lights: config.max_point_lights,
            specular_strength: config.specular_strength,
            ambient_light: AmbientLight::default(),
            sun: DirectionalLight::default(),
            point_lights: Vec::new(),
            camera,
        }
    }

    /// Create or replace a batch using [`default_batch_setup`]
    ///
    /// Returns false, leaving the batches untouched, when `program` is
    /// missing or failed to load.
    pub fn register_batch(&mut self, name: &str, program: Option<Arc<ShaderProgram>>) -> bool {
        self.register_batch_with(name, program, Box::new(default_batch_setup))
    }

    /// Create or replace a batch with a custom setup callback
    pub fn register_batch_with(
        &mut self,
        name: &str,
        program: Option<Arc<ShaderProgram>>,
        setup: BatchSetupCallback,
    ) -> bool {
        let Some(program) = program else {
            log::warn!("Rejected batch '{}': no shader program", name);
            return false;
        };
        if !program.is_loaded() {
            log::warn!(
                "Rejected batch '{}': shader {} failed to load",
                name,
                program.path().display()
            );
            return false;
        }

        let entry = BatchEntry {
            program,
            objects: Vec::new(),
            setup,
        };
        if self.batches.insert(name.to_string(), entry).is_some() {
            log::debug!("Replaced batch '{}'", name);
        }
        true
    }

    /// Append `object` to a batch; unknown batches ignore it
    pub fn register_game_object<R>(&mut self, batch_name: &str, object: &Arc<R>)
    where
        R: Renderable + 'static,
    {
        let object: Arc<dyn Renderable> = object.clone();
        self.register_renderable(batch_name, &object);
    }

    /// Append an already type-erased object to a batch
    pub fn register_renderable(&mut self, batch_name: &str, object: &Arc<dyn Renderable>) {
        match self.batches.get_mut(batch_name) {
            Some(batch) => batch.objects.push(Arc::downgrade(object)),
            None => log::debug!("Dropped registration into unknown batch '{}'", batch_name),
        }
    }

    /// Draw every batch in name order
    pub fn render(&mut self, delta: f64, time: f64) {
        self.camera.update_transform();

        let light_count = self.point_lights.len().min(self.max_point_lights);
        if light_count < self.point_lights.len() {
            log::trace!(
                "Uploading {} of {} point lights",
                light_count,
                self.point_lights.len()
            );
        }
        let point_lights = &self.point_lights[..light_count];

        for (name, batch) in self.batches.iter_mut() {
            let before = batch.objects.len();
            batch.objects.retain(|o| o.strong_count() > 0);
            if batch.objects.len() != before {
                log::debug!(
                    "Pruned {} dropped objects from batch '{}'",
                    before - batch.objects.len(),
                    name
                );
            }

            let ctx = RenderContext {
                program: &batch.program,
                batch_name: name,
                delta,
                time,
                sun: self.sun,
                point_lights,
                ambient_light: self.ambient_light,
                specular_strength: self.specular_strength,
                camera: &self.camera,
            };

            batch.program.enable();
            (batch.setup)(&ctx);
            for object in batch.objects.iter().filter_map(Weak::upgrade) {
                object.render(&ctx);
            }
            batch.program.disable();
        }
    }

    /// Recompute the aspect ratio; a zero height is ignored
    pub fn on_window_resized(&mut self, width: u32, height: u32) {
        if height == 0 {
            log::debug!("Ignoring resize to zero height");
            return;
        }
        self.aspect_ratio = width as f32 / height as f32;
        self.update_projection();
    }

    /// Vertical field of view in degrees
    pub fn set_fov(&mut self, fov: f32) {
        self.field_of_view = fov;
        self.update_projection();
    }

    fn update_projection(&mut self) {
        self.camera
            .create_perspective(self.field_of_view, self.aspect_ratio, self.near, self.far);
    }

    pub fn field_of_view(&self) -> f32 {
        self.field_of_view
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn add_point_light(&mut self, light: PointLight) {
        self.point_lights.push(light);
    }

    pub fn get_program_for(&self, batch_name: &str) -> Option<Arc<ShaderProgram>> {
        self.batches.get(batch_name).map(|b| b.program.clone())
    }

    pub fn batch(&self, batch_name: &str) -> Option<&BatchEntry> {
        self.batches.get(batch_name)
    }

    /// Live object count per batch
    pub fn get_batch_data(&self) -> BTreeMap<String, usize> {
        self.batches
            .iter()
            .map(|(name, batch)| (name.clone(), batch.live_objects()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, RecordedCommand, UniformValue};
    use glam::Vec3;
    use parking_lot::Mutex;
    use std::path::Path;

    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    }

    impl Renderable for Recorder {
        fn render(&self, ctx: &RenderContext<'_>) {
            self.log.lock().push(format!("{}:{}", ctx.batch_name, self.tag));
        }
    }

    fn program(shared: &crate::backend::SharedBackend, name: &str) -> Arc<ShaderProgram> {
        Arc::new(ShaderProgram::from_source(shared, Path::new(name), "// program").unwrap())
    }

    #[test]
    fn test_batches_render_in_name_order() {
        let (_headless, shared) = HeadlessBackend::new_shared();
        let mut renderer = Renderer::new(&RendererConfig::default());
        let log = Arc::new(Mutex::new(Vec::new()));

        assert!(renderer.register_batch("zeta", Some(program(&shared, "z"))));
        assert!(renderer.register_batch("alpha", Some(program(&shared, "a"))));
        let first = Arc::new(Recorder { log: log.clone(), tag: "first" });
        let second = Arc::new(Recorder { log: log.clone(), tag: "second" });
        renderer.register_game_object("zeta", &first);
        renderer.register_game_object("alpha", &second);
        renderer.register_game_object("alpha", &first);

        renderer.render(0.016, 1.0);
        assert_eq!(
            *log.lock(),
            vec!["alpha:second", "alpha:first", "zeta:first"]
        );
    }

    #[test]
    fn test_dropped_objects_are_pruned() {
        let (_headless, shared) = HeadlessBackend::new_shared();
        let mut renderer = Renderer::new(&RendererConfig::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        renderer.register_batch("opaque", Some(program(&shared, "p")));

        let kept = Arc::new(Recorder { log: log.clone(), tag: "kept" });
        let dropped = Arc::new(Recorder { log: log.clone(), tag: "dropped" });
        renderer.register_game_object("opaque", &kept);
        renderer.register_game_object("opaque", &dropped);
        drop(dropped);

        assert_eq!(renderer.get_batch_data()["opaque"], 1);
        renderer.render(0.0, 0.0);
        assert_eq!(*log.lock(), vec!["opaque:kept"]);
    }

    #[test]
    fn test_point_lights_are_capped() {
        let (headless, shared) = HeadlessBackend::new_shared();
        let config = RendererConfig {
            max_point_lights: 2,
            ..Default::default()
        };
        let mut renderer = Renderer::new(&config);
        let shader = program(&shared, "lit");
        renderer.register_batch("lit", Some(shader.clone()));
        for i in 0..3 {
            renderer.add_point_light(PointLight::new(Vec3::splat(i as f32), Vec3::ONE, Vec3::X));
        }

        renderer.render(0.0, 2.5);

        let handle = shader.handle().unwrap();
        let backend = headless.lock();
        assert_eq!(backend.uniform(handle, "lights_active"), Some(UniformValue::Int(2)));
        assert_eq!(
            backend.uniform(handle, "lights_point[1].position"),
            Some(UniformValue::Vec3(Vec3::ONE))
        );
        assert!(backend.uniform(handle, "lights_point[2].position").is_none());
        assert_eq!(backend.uniform(handle, "environment.time"), Some(UniformValue::Float(2.5)));
    }

    #[test]
    fn test_custom_setup_replaces_default() {
        let (headless, shared) = HeadlessBackend::new_shared();
        let mut renderer = Renderer::new(&RendererConfig::default());
        let shader = program(&shared, "custom");
        renderer.register_batch_with(
            "custom",
            Some(shader.clone()),
            Box::new(|ctx: &RenderContext<'_>| ctx.program.set_float("fade", 0.5)),
        );

        renderer.render(0.0, 0.0);

        let handle = shader.handle().unwrap();
        let backend = headless.lock();
        assert_eq!(backend.uniform(handle, "fade"), Some(UniformValue::Float(0.5)));
        assert!(backend.uniform(handle, "view_transform").is_none());
        let uses: Vec<_> = backend
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::UseProgram(_)))
            .collect();
        assert_eq!(uses.len(), 2);
        assert!(backend.current_program().is_none());
    }

    #[test]
    fn test_zero_height_resize_is_ignored() {
        let mut renderer = Renderer::new(&RendererConfig::default());
        renderer.on_window_resized(800, 600);
        let projection = renderer.camera.projection_matrix();
        renderer.on_window_resized(800, 0);
        assert_eq!(renderer.camera.projection_matrix(), projection);
        assert_eq!(renderer.aspect_ratio(), 800.0 / 600.0);
    }
}
