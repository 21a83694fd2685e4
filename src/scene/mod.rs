//! Scene content: camera, lights and the objects batches draw

mod camera;
mod game_object;
mod light;
mod skybox;
mod transform;

pub use camera::*;
pub use game_object::*;
pub use light::*;
pub use skybox::*;
pub use transform::*;
