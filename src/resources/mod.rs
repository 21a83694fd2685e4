//! Resource management
//!
//! Loading and lifetime of meshes, textures, materials, shaders and audio.
//! Everything is normally obtained through [`ResourceCache`], which hands out
//! shared handles keyed by canonical path.

mod audio;
mod cache;
mod error;
mod import;
mod material;
mod mesh;
pub mod primitives;
mod shader;
mod texture;

pub use audio::*;
pub use cache::*;
pub use error::*;
pub use import::{ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene, TextureSlot};
pub use material::*;
pub use mesh::*;
pub use shader::*;
pub use texture::*;
