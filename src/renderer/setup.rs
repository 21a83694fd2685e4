//! Batch setup callbacks

use super::RenderContext;

/// Runs once per batch per frame, after the program is enabled and before
/// any object of the batch is drawn
pub type BatchSetupCallback = Box<dyn Fn(&RenderContext<'_>)>;

/// Upload the frame-wide uniforms every lit shader expects
///
/// Point lights go to `lights_point[i]` and their count to `lights_active`.
pub fn default_batch_setup(ctx: &RenderContext<'_>) {
    let program = ctx.program;
    let camera = ctx.camera;

    program.set_float("environment.time", ctx.time as f32);
    program.set_mat4("view_transform", camera.view_matrix());
    program.set_mat4("projection_transform", camera.projection_matrix());
    program.set_vec3("environment.camera_position", camera.position);
    program.set_vec3("environment.ambient_light", ctx.ambient_light.colour);
    program.set_vec3("sun.direction", ctx.sun.direction);
    program.set_vec3("sun.colour", ctx.sun.colour);
    program.set_float("material.specular_strength", ctx.specular_strength);

    for (i, light) in ctx.point_lights.iter().enumerate() {
        program.set_vec3(&format!("lights_point[{i}].position"), light.position);
        program.set_vec3(&format!("lights_point[{i}].colour"), light.colour);
        program.set_vec3(&format!("lights_point[{i}].attenuation_factors"), light.falloff);
    }
    program.set_int("lights_active", ctx.point_lights.len() as i32);
}
