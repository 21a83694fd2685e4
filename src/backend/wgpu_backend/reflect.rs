//! WGSL program reflection
//!
//! Programs keep their loose uniforms in the `var<uniform>` bound at
//! `@group(0) @binding(0)`. Every leaf member of that block is addressable by
//! its flattened path (`environment.time`, `lights_point[3].position`).
//! Texture unit `n` lives at `@group(1) @binding(2n)` with its sampler at
//! `@binding(2n + 1)`.

use crate::backend::types::TextureDimension;
use naga::{AddressSpace, ArraySize, ImageDimension, Module, TypeInner};
use std::collections::HashMap;

pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;

/// Location of one uniform inside the block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub offset: u32,
    pub size: u32,
}

/// Byte layout of a program's uniform block
#[derive(Debug, Clone, Default)]
pub struct UniformLayout {
    size: u32,
    slots: HashMap<String, UniformSlot>,
}

impl UniformLayout {
    /// Block size in bytes (0 when the program has no uniform block)
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn slot(&self, name: &str) -> Option<UniformSlot> {
        self.slots.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Write `bytes` into `block` at the slot named `name`
    ///
    /// Returns false for unknown names or values larger than the slot.
    pub fn write(&self, block: &mut [u8], name: &str, bytes: &[u8]) -> bool {
        let Some(slot) = self.slot(name) else {
            return false;
        };
        if bytes.len() > slot.size as usize {
            return false;
        }
        let start = slot.offset as usize;
        match block.get_mut(start..start + bytes.len()) {
            Some(dst) => {
                dst.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    fn flatten(
        &mut self,
        module: &Module,
        ty: naga::Handle<naga::Type>,
        path: String,
        offset: u32,
    ) {
        match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => {
                for member in members {
                    let Some(name) = member.name.as_ref() else {
                        continue;
                    };
                    let child = if path.is_empty() {
                        name.clone()
                    } else {
                        format!("{}.{}", path, name)
                    };
                    self.flatten(module, member.ty, child, offset + member.offset);
                }
            }
            TypeInner::Array { base, size, stride } => {
                let count = match size {
                    ArraySize::Constant(n) => n.get(),
                    _ => 0,
                };
                for i in 0..count {
                    self.flatten(module, *base, format!("{}[{}]", path, i), offset + i * stride);
                }
            }
            inner => {
                let size = inner.size(module.to_ctx());
                self.slots.insert(path, UniformSlot { offset, size });
            }
        }
    }
}

/// A sampled texture expected by a program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub unit: u32,
    pub dimension: TextureDimension,
}

/// Everything the backend needs to know about a program's bindings
#[derive(Debug, Clone, Default)]
pub struct ProgramReflection {
    pub uniforms: UniformLayout,
    pub textures: Vec<TextureBinding>,
}

impl ProgramReflection {
    pub fn reflect(module: &Module) -> Self {
        let mut reflection = Self::default();

        for (_, var) in module.global_variables.iter() {
            let Some(binding) = var.binding.as_ref() else {
                continue;
            };

            if binding.group == UNIFORM_GROUP
                && binding.binding == UNIFORM_BINDING
                && var.space == AddressSpace::Uniform
            {
                let ty = &module.types[var.ty];
                reflection.uniforms.size = match &ty.inner {
                    TypeInner::Struct { span, .. } => *span,
                    inner => inner.size(module.to_ctx()),
                };
                let root = match &ty.inner {
                    TypeInner::Struct { .. } => String::new(),
                    _ => var.name.clone().unwrap_or_default(),
                };
                reflection.uniforms.flatten(module, var.ty, root, 0);
                continue;
            }

            if binding.group == TEXTURE_GROUP && binding.binding % 2 == 0 {
                if let TypeInner::Image { dim, .. } = module.types[var.ty].inner {
                    let dimension = match dim {
                        ImageDimension::Cube => TextureDimension::Cube,
                        _ => TextureDimension::D2,
                    };
                    reflection.textures.push(TextureBinding {
                        unit: binding.binding / 2,
                        dimension,
                    });
                }
            }
        }

        reflection.textures.sort_by_key(|t| t.unit);
        reflection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
struct Environment {
    time: f32,
    camera_position: vec3<f32>,
    ambient_light: vec3<f32>,
}

struct PointLight {
    position: vec3<f32>,
    colour: vec3<f32>,
    attenuation_factors: vec3<f32>,
}

struct Uniforms {
    model_transform: mat4x4<f32>,
    view_transform: mat4x4<f32>,
    environment: Environment,
    lights_point: array<PointLight, 4>,
    lights_active: i32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var albedo: texture_2d<f32>;
@group(1) @binding(1) var albedo_sampler: sampler;
@group(1) @binding(4) var sky: texture_cube<f32>;
@group(1) @binding(5) var sky_sampler: sampler;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.view_transform * u.model_transform * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(u.environment.ambient_light, f32(u.lights_active));
}
"#;

    fn reflect() -> ProgramReflection {
        let module = naga::front::wgsl::parse_str(SOURCE).unwrap();
        ProgramReflection::reflect(&module)
    }

    #[test]
    fn test_nested_members_are_flattened() {
        let reflection = reflect();
        let uniforms = &reflection.uniforms;

        assert_eq!(uniforms.slot("model_transform"), Some(UniformSlot { offset: 0, size: 64 }));
        assert_eq!(uniforms.slot("view_transform").map(|s| s.offset), Some(64));
        assert_eq!(uniforms.slot("environment.time").map(|s| s.offset), Some(128));
        // vec3 members are 16-byte aligned
        assert_eq!(uniforms.slot("environment.camera_position").map(|s| s.offset), Some(144));
        assert_eq!(uniforms.slot("environment.camera_position").map(|s| s.size), Some(12));
        assert!(uniforms.slot("environment").is_none());
    }

    #[test]
    fn test_array_elements_use_stride() {
        let reflection = reflect();
        let uniforms = &reflection.uniforms;

        let first = uniforms.slot("lights_point[0].position").unwrap();
        let second = uniforms.slot("lights_point[1].position").unwrap();
        assert_eq!(second.offset - first.offset, 48);
        assert!(uniforms.slot("lights_point[3].attenuation_factors").is_some());
        assert!(uniforms.slot("lights_point[4].position").is_none());
        assert!(uniforms.slot("lights_active").is_some());
        assert_eq!(uniforms.size() % 16, 0);
    }

    #[test]
    fn test_texture_units_follow_binding_pairs() {
        let reflection = reflect();
        assert_eq!(
            reflection.textures,
            vec![
                TextureBinding { unit: 0, dimension: TextureDimension::D2 },
                TextureBinding { unit: 2, dimension: TextureDimension::Cube },
            ]
        );
    }

    #[test]
    fn test_write_rejects_unknown_and_oversized() {
        let reflection = reflect();
        let uniforms = &reflection.uniforms;
        let mut block = vec![0u8; uniforms.size() as usize];

        assert!(uniforms.write(&mut block, "lights_active", &7i32.to_le_bytes()));
        let offset = uniforms.slot("lights_active").unwrap().offset as usize;
        assert_eq!(&block[offset..offset + 4], &7i32.to_le_bytes());

        assert!(!uniforms.write(&mut block, "no_such_uniform", &[0; 4]));
        assert!(!uniforms.write(&mut block, "environment.time", &[0; 64]));
    }
}
