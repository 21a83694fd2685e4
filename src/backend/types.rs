//! Common types shared between backends

use crate::backend::traits::BufferHandle;
use glam::{Mat4, Vec3};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
}

impl TextureFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

/// Texture dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    Cube,
}

impl TextureDimension {
    /// Number of array layers the texture is made of
    pub fn layers(&self) -> u32 {
        match self {
            TextureDimension::D2 => 1,
            TextureDimension::Cube => 6,
        }
    }
}

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage(u32);

impl BufferUsage {
    pub const COPY_DST: Self = Self(1 << 3);
    pub const INDEX: Self = Self(1 << 4);
    pub const VERTEX: Self = Self(1 << 5);
    pub const UNIFORM: Self = Self(1 << 6);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub usage: BufferUsage,
}

/// Filter mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Linear,
}

/// Address mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
}

/// Sampler state baked into a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerDescriptor {
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
        }
    }
}

impl SamplerDescriptor {
    /// Linear filtering, clamped on every axis (HDR maps and cube maps)
    pub fn clamped() -> Self {
        Self {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            ..Default::default()
        }
    }
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub dimension: TextureDimension,
    pub sampler: SamplerDescriptor,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Unorm,
            dimension: TextureDimension::D2,
            sampler: SamplerDescriptor::default(),
        }
    }
}

impl TextureDescriptor {
    /// Number of bytes `create_texture` expects for this descriptor
    pub fn data_size(&self) -> usize {
        (self.width * self.height * self.format.bytes_per_pixel() * self.dimension.layers())
            as usize
    }
}

/// Element type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexDataAttributeType {
    Float,
    Int,
}

impl VertexDataAttributeType {
    /// Size of one component in bytes
    pub fn size(&self) -> u32 {
        match self {
            VertexDataAttributeType::Float => std::mem::size_of::<f32>() as u32,
            VertexDataAttributeType::Int => std::mem::size_of::<i32>() as u32,
        }
    }
}

/// One attribute of an interleaved vertex: element type and component count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexDataAttribute {
    pub ty: VertexDataAttributeType,
    pub size: u32,
}

impl VertexDataAttribute {
    pub fn new(ty: VertexDataAttributeType, size: u32) -> Self {
        Self { ty, size }
    }

    pub fn float(size: u32) -> Self {
        Self::new(VertexDataAttributeType::Float, size)
    }

    pub fn int(size: u32) -> Self {
        Self::new(VertexDataAttributeType::Int, size)
    }

    /// Bytes this attribute occupies in one vertex
    pub fn data_size(&self) -> u32 {
        self.size * self.ty.size()
    }
}

/// Per-vertex byte stride of an attribute sequence
pub fn vertex_stride(attributes: &[VertexDataAttribute]) -> u32 {
    attributes.iter().map(VertexDataAttribute::data_size).sum()
}

/// Byte offset of every attribute inside one vertex, in declaration order
pub fn vertex_offsets(attributes: &[VertexDataAttribute]) -> Vec<u32> {
    attributes
        .iter()
        .scan(0u32, |offset, attrib| {
            let current = *offset;
            *offset += attrib.data_size();
            Some(current)
        })
        .collect()
}

/// Index format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint32,
}

/// Vertex array descriptor
#[derive(Debug, Clone)]
pub struct VertexArrayDescriptor {
    pub label: Option<String>,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_format: IndexFormat,
    pub attributes: Vec<VertexDataAttribute>,
}

impl VertexArrayDescriptor {
    pub fn stride(&self) -> u32 {
        vertex_stride(&self.attributes)
    }
}

/// Shader program descriptor
#[derive(Debug, Clone)]
pub struct ProgramDescriptor {
    pub label: Option<String>,
    /// Fully preprocessed shader source
    pub source: String,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
}

/// Value written by `set_uniform`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec3(Vec3),
    Mat4(Mat4),
}

impl UniformValue {
    /// Raw little-endian bytes as laid out in a uniform block
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Float(v) => v.to_le_bytes().to_vec(),
            UniformValue::Int(v) => v.to_le_bytes().to_vec(),
            UniformValue::Vec3(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Mat4(m) => bytemuck::bytes_of(m).to_vec(),
        }
    }
}
