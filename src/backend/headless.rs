//! Headless backend
//!
//! Records every call instead of talking to a GPU. It keeps track of live
//! objects and of the current bind state so that resource lifetimes and draw
//! sequences can be inspected without a window.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::backend::SharedBackend;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A draw as seen by the backend, with the state bound at the time of the call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub topology: PrimitiveTopology,
    pub index_count: u32,
    pub program: Option<ProgramHandle>,
    pub vertex_array: Option<VertexArrayHandle>,
    pub textures: BTreeMap<u32, TextureHandle>,
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginFrame,
    EndFrame,
    Resize { width: u32, height: u32 },
    UseProgram(Option<ProgramHandle>),
    SetUniform { program: ProgramHandle, name: String, value: UniformValue },
    BindTexture { unit: u32, texture: Option<TextureHandle> },
    BindVertexArray(Option<VertexArrayHandle>),
    Draw(DrawCall),
}

struct ProgramRecord {
    label: Option<String>,
    uniforms: HashMap<String, UniformValue>,
}

/// Recording backend with live-handle accounting
pub struct HeadlessBackend {
    size: (u32, u32),
    next_id: u64,
    buffers: HashMap<u64, usize>,
    vertex_arrays: HashMap<u64, VertexArrayDescriptor>,
    textures: HashMap<u64, TextureDescriptor>,
    programs: HashMap<u64, ProgramRecord>,
    current_program: Option<ProgramHandle>,
    bound_textures: BTreeMap<u32, TextureHandle>,
    bound_vertex_array: Option<VertexArrayHandle>,
    in_frame: bool,
    frames: u64,
    invalid_destroys: usize,
    commands: Vec<RecordedCommand>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            next_id: 1,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            current_program: None,
            bound_textures: BTreeMap::new(),
            bound_vertex_array: None,
            in_frame: false,
            frames: 0,
            invalid_destroys: 0,
            commands: Vec::new(),
        }
    }

    /// Create a backend plus a shared handle onto the same instance
    ///
    /// The concrete handle stays inspectable while resources use the shared one.
    pub fn new_shared() -> (Arc<Mutex<HeadlessBackend>>, SharedBackend) {
        let backend = Arc::new(Mutex::new(HeadlessBackend::default()));
        let shared: SharedBackend = backend.clone();
        (backend, shared)
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Current surface size
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Number of completed frames
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// All draws recorded since the last `clear_commands`
    pub fn draw_calls(&self) -> Vec<&DrawCall> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Total number of live objects of every kind
    pub fn live_handles(&self) -> usize {
        self.live_buffers()
            + self.live_vertex_arrays()
            + self.live_textures()
            + self.live_programs()
    }

    /// Destroy calls for handles that were not alive
    pub fn invalid_destroys(&self) -> usize {
        self.invalid_destroys
    }

    pub fn buffer_size(&self, buffer: BufferHandle) -> Option<usize> {
        self.buffers.get(&buffer.0).copied()
    }

    pub fn vertex_array(&self, vertex_array: VertexArrayHandle) -> Option<&VertexArrayDescriptor> {
        self.vertex_arrays.get(&vertex_array.0)
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    pub fn program_label(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(&program.0).and_then(|p| p.label.as_deref())
    }

    /// Last value written to a uniform of `program`
    pub fn uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        self.programs
            .get(&program.0)
            .and_then(|p| p.uniforms.get(name).copied())
    }

    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureHandle> {
        self.bound_textures.get(&unit).copied()
    }

    pub fn bound_vertex_array(&self) -> Option<VertexArrayHandle> {
        self.bound_vertex_array
    }

    /// True when no program, texture or vertex array is bound
    pub fn is_unbound(&self) -> bool {
        self.current_program.is_none()
            && self.bound_textures.is_empty()
            && self.bound_vertex_array.is_none()
    }

    fn note_destroy(&mut self, kind: &str, id: u64, existed: bool) {
        if !existed {
            log::warn!("Destroying unknown {} handle {}", kind, id);
            self.invalid_destroys += 1;
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = (width, height);
        }
        self.commands.push(RecordedCommand::Resize { width, height });
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        if self.in_frame {
            return Err(BackendError::AcquireImageFailed(
                "begin_frame called twice without end_frame".into(),
            ));
        }
        self.in_frame = true;
        self.commands.push(RecordedCommand::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.in_frame = false;
        self.frames += 1;
        self.commands.push(RecordedCommand::EndFrame);
        Ok(())
    }

    fn create_buffer_init(
        &mut self,
        _desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let id = self.allocate_id();
        self.buffers.insert(id, data.len());
        Ok(BufferHandle(id))
    }

    fn create_vertex_array(
        &mut self,
        desc: &VertexArrayDescriptor,
    ) -> BackendResult<VertexArrayHandle> {
        if !self.buffers.contains_key(&desc.vertex_buffer.0)
            || !self.buffers.contains_key(&desc.index_buffer.0)
        {
            return Err(BackendError::VertexArrayCreationFailed(
                "vertex array references a destroyed buffer".into(),
            ));
        }
        let id = self.allocate_id();
        self.vertex_arrays.insert(id, desc.clone());
        Ok(VertexArrayHandle(id))
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: &[u8],
    ) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed("zero-sized texture".into()));
        }
        if data.len() != desc.data_size() {
            return Err(BackendError::TextureCreationFailed(format!(
                "expected {} bytes of pixel data, got {}",
                desc.data_size(),
                data.len()
            )));
        }
        let id = self.allocate_id();
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn create_program(&mut self, desc: &ProgramDescriptor) -> BackendResult<ProgramHandle> {
        if desc.source.trim().is_empty() {
            return Err(BackendError::ShaderCreationFailed("empty shader source".into()));
        }
        let id = self.allocate_id();
        self.programs.insert(
            id,
            ProgramRecord {
                label: desc.label.clone(),
                uniforms: HashMap::new(),
            },
        );
        Ok(ProgramHandle(id))
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.current_program = program;
        self.commands.push(RecordedCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        if let Some(record) = self.programs.get_mut(&program.0) {
            record.uniforms.insert(name.to_string(), value);
        }
        self.commands.push(RecordedCommand::SetUniform {
            program,
            name: name.to_string(),
            value,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        match texture {
            Some(texture) => {
                self.bound_textures.insert(unit, texture);
            }
            None => {
                self.bound_textures.remove(&unit);
            }
        }
        self.commands.push(RecordedCommand::BindTexture { unit, texture });
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.bound_vertex_array = vertex_array;
        self.commands.push(RecordedCommand::BindVertexArray(vertex_array));
    }

    fn draw_indexed(&mut self, topology: PrimitiveTopology, index_count: u32) {
        log::trace!("headless draw: {} indices", index_count);
        self.commands.push(RecordedCommand::Draw(DrawCall {
            topology,
            index_count,
            program: self.current_program,
            vertex_array: self.bound_vertex_array,
            textures: self.bound_textures.clone(),
        }));
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        let existed = self.buffers.remove(&buffer.0).is_some();
        self.note_destroy("buffer", buffer.0, existed);
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        let existed = self.vertex_arrays.remove(&vertex_array.0).is_some();
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
        self.note_destroy("vertex array", vertex_array.0, existed);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        let existed = self.textures.remove(&texture.0).is_some();
        self.bound_textures.retain(|_, bound| *bound != texture);
        self.note_destroy("texture", texture.0, existed);
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        let existed = self.programs.remove(&program.0).is_some();
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.note_destroy("program", program.0, existed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(backend: &mut HeadlessBackend, len: usize) -> BufferHandle {
        let desc = BufferDescriptor {
            label: None,
            usage: BufferUsage::VERTEX,
        };
        backend.create_buffer_init(&desc, &vec![0u8; len]).unwrap()
    }

    #[test]
    fn test_live_handle_accounting() {
        let mut backend = HeadlessBackend::default();
        let vbo = buffer(&mut backend, 48);
        let ebo = buffer(&mut backend, 12);
        let vao = backend
            .create_vertex_array(&VertexArrayDescriptor {
                label: None,
                vertex_buffer: vbo,
                index_buffer: ebo,
                index_format: IndexFormat::Uint32,
                attributes: vec![VertexDataAttribute::float(3)],
            })
            .unwrap();
        assert_eq!(backend.live_handles(), 3);
        assert_eq!(backend.buffer_size(vbo), Some(48));

        backend.destroy_vertex_array(vao);
        backend.destroy_buffer(vbo);
        backend.destroy_buffer(ebo);
        assert_eq!(backend.live_handles(), 0);
        assert_eq!(backend.invalid_destroys(), 0);

        backend.destroy_buffer(vbo);
        assert_eq!(backend.invalid_destroys(), 1);
    }

    #[test]
    fn test_draw_captures_bound_state() {
        let mut backend = HeadlessBackend::default();
        let program = backend
            .create_program(&ProgramDescriptor {
                label: Some("test".into()),
                source: "fn main() {}".into(),
            })
            .unwrap();
        let pixels = [255u8; 4];
        let texture = backend
            .create_texture(&TextureDescriptor::default(), &pixels)
            .unwrap();

        backend.use_program(Some(program));
        backend.bind_texture(2, Some(texture));
        backend.draw_indexed(PrimitiveTopology::TriangleList, 36);
        backend.bind_texture(2, None);
        backend.use_program(None);

        let draws = backend.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 36);
        assert_eq!(draws[0].program, Some(program));
        assert_eq!(draws[0].textures.get(&2), Some(&texture));
        assert!(backend.is_unbound());
    }

    #[test]
    fn test_texture_size_mismatch_is_rejected() {
        let mut backend = HeadlessBackend::default();
        let desc = TextureDescriptor {
            width: 2,
            height: 2,
            ..Default::default()
        };
        assert!(backend.create_texture(&desc, &[0u8; 4]).is_err());
        assert!(backend.create_texture(&desc, &[0u8; 16]).is_ok());
    }

    #[test]
    fn test_empty_program_source_fails() {
        let mut backend = HeadlessBackend::default();
        let desc = ProgramDescriptor {
            label: None,
            source: "   \n".into(),
        };
        assert!(matches!(
            backend.create_program(&desc),
            Err(BackendError::ShaderCreationFailed(_))
        ));
    }

    #[test]
    fn test_uniforms_are_tracked_per_program() {
        let mut backend = HeadlessBackend::default();
        let desc = ProgramDescriptor {
            label: None,
            source: "x".into(),
        };
        let a = backend.create_program(&desc).unwrap();
        let b = backend.create_program(&desc).unwrap();
        backend.set_uniform(a, "lights_active", UniformValue::Int(3));
        assert_eq!(backend.uniform(a, "lights_active"), Some(UniformValue::Int(3)));
        assert_eq!(backend.uniform(b, "lights_active"), None);
    }
}
