use std::collections::HashMap;

use glam::Mat4;

use crate::error::RendererError;
use crate::renderer::framebuffer::{AttachmentFormat, FramebufferSpec, EMPTY_OWNER};
use crate::renderer::handle::{HandleRegistry, RenderId};

use super::{
    BufferId, DrawDesc, Driver, FramebufferId, ShaderId, TextureId, VertexKind, MAX_TEXTURE_UNITS,
};

/// CPU-only driver: tracks resource traffic (creates, uploads, binds,
/// draw calls, attachment planes) without touching a GPU. Backs the
/// test suite and headless CI runs. Draws are recorded, not
/// rasterized, so color output does not exist; object-id attachment
/// planes honor clear/readback semantics exactly.
pub struct HeadlessDriver {
    textures: HashMap<TextureId, (u32, u32)>,
    buffers: HashMap<BufferId, BufferRecord>,
    shaders: HashMap<ShaderId, String>,
    framebuffers: HashMap<FramebufferId, Target>,
    bound: [Option<TextureId>; MAX_TEXTURE_UNITS],
    camera: Option<Mat4>,
    pass_open: bool,
    draws: Vec<DrawRecord>,
    upload_count: u64,
    registry: HandleRegistry,
}

struct BufferRecord {
    byte_capacity: u64,
    last_upload: u64,
}

struct Target {
    spec: FramebufferSpec,
    width: u32,
    height: u32,
    /// One plane per color attachment; only object-id attachments
    /// carry data.
    planes: Vec<Option<Vec<i32>>>,
}

impl Target {
    fn new(spec: &FramebufferSpec, width: u32, height: u32) -> Self {
        let planes = spec
            .attachments
            .iter()
            .filter(|a| a.is_color())
            .map(|a| match a {
                AttachmentFormat::ObjectId => {
                    Some(vec![EMPTY_OWNER; (width * height) as usize])
                }
                _ => None,
            })
            .collect();
        Self {
            spec: spec.clone(),
            width,
            height,
            planes,
        }
    }
}

/// One recorded draw call, with the texture-unit state it saw.
#[derive(Clone, Debug)]
pub struct DrawRecord {
    pub shader: ShaderId,
    pub kind: VertexKind,
    pub count: u32,
    pub bound_textures: Vec<TextureId>,
    pub uploaded_bytes: u64,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            framebuffers: HashMap::new(),
            bound: [None; MAX_TEXTURE_UNITS],
            camera: None,
            pass_open: false,
            draws: Vec::new(),
            upload_count: 0,
            registry: HandleRegistry::new(),
        }
    }

    pub fn draw_call_count(&self) -> usize {
        self.draws.len()
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn upload_count(&self) -> u64 {
        self.upload_count
    }

    pub fn shader_is_live(&self, shader: ShaderId) -> bool {
        self.shaders.contains_key(&shader)
    }

    pub fn texture_is_live(&self, texture: TextureId) -> bool {
        self.textures.contains_key(&texture)
    }

    pub fn framebuffer_is_live(&self, framebuffer: FramebufferId) -> bool {
        self.framebuffers.contains_key(&framebuffer)
    }

    fn target_mut(&mut self, framebuffer: FramebufferId) -> &mut Target {
        self.framebuffers
            .get_mut(&framebuffer)
            .expect("unknown framebuffer handle")
    }
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for HeadlessDriver {
    fn create_texture_rgba8(
        &mut self,
        width: u32,
        height: u32,
        _pixels: &[u8],
        _label: &str,
    ) -> TextureId {
        let id = TextureId(RenderId::allocate());
        self.textures.insert(id, (width, height));
        self.registry.register(id.0, "texture");
        id
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.registry.release(texture.0);
    }

    fn create_shader(&mut self, label: &str, _source: &str) -> Result<ShaderId, RendererError> {
        let id = ShaderId(RenderId::allocate());
        self.shaders.insert(id, label.to_owned());
        self.registry.register(id.0, "shader");
        Ok(id)
    }

    fn destroy_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
        self.registry.release(shader.0);
    }

    fn create_vertex_buffer(&mut self, byte_capacity: u64, _label: &str) -> BufferId {
        let id = BufferId(RenderId::allocate());
        self.buffers.insert(
            id,
            BufferRecord {
                byte_capacity,
                last_upload: 0,
            },
        );
        id
    }

    fn create_index_buffer(&mut self, indices: &[u32], _label: &str) -> BufferId {
        let id = BufferId(RenderId::allocate());
        self.buffers.insert(
            id,
            BufferRecord {
                byte_capacity: (indices.len() * 4) as u64,
                last_upload: (indices.len() * 4) as u64,
            },
        );
        id
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn upload_vertices(&mut self, buffer: BufferId, bytes: &[u8]) {
        let record = self.buffers.get_mut(&buffer).expect("unknown buffer handle");
        debug_assert!(
            bytes.len() as u64 <= record.byte_capacity,
            "upload of {} bytes exceeds buffer capacity {}",
            bytes.len(),
            record.byte_capacity
        );
        record.last_upload = bytes.len() as u64;
        self.upload_count += 1;
    }

    fn create_framebuffer(
        &mut self,
        spec: &FramebufferSpec,
    ) -> Result<FramebufferId, RendererError> {
        spec.validate()?;
        let id = FramebufferId(RenderId::allocate());
        self.framebuffers
            .insert(id, Target::new(spec, spec.width, spec.height));
        self.registry.register(id.0, "framebuffer");
        Ok(id)
    }

    fn resize_framebuffer(&mut self, framebuffer: FramebufferId, width: u32, height: u32) {
        let target = self.target_mut(framebuffer);
        let spec = target.spec.clone();
        *target = Target::new(&spec, width, height);
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
        self.registry.release(framebuffer.0);
    }

    fn clear_attachment(&mut self, framebuffer: FramebufferId, attachment: usize, value: i32) {
        let target = self.target_mut(framebuffer);
        let plane = target
            .planes
            .get_mut(attachment)
            .expect("color attachment index out of range");
        if let Some(plane) = plane {
            plane.fill(value);
        }
    }

    fn read_pixel(
        &mut self,
        framebuffer: FramebufferId,
        attachment: usize,
        x: u32,
        y: u32,
    ) -> i32 {
        let target = self
            .framebuffers
            .get(&framebuffer)
            .expect("unknown framebuffer handle");
        debug_assert!(
            x < target.width && y < target.height,
            "read_pixel at ({x},{y}) outside {}x{}",
            target.width,
            target.height
        );
        match target.planes.get(attachment) {
            Some(Some(plane)) => plane[(y * target.width + x) as usize],
            _ => EMPTY_OWNER,
        }
    }

    fn begin_pass(&mut self, target: FramebufferId, _clear_color: Option<[f32; 4]>) {
        debug_assert!(!self.pass_open, "begin_pass while a pass is open");
        self.registry.assert_live(target.0, "begin_pass");
        self.pass_open = true;
        self.bound = [None; MAX_TEXTURE_UNITS];
        self.camera = None;
    }

    fn set_view_projection(&mut self, view_proj: Mat4) {
        debug_assert!(self.pass_open, "set_view_projection outside a pass");
        self.camera = Some(view_proj);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.registry.assert_live(texture.0, "bind_texture");
        self.bound[unit as usize] = Some(texture);
    }

    fn draw(&mut self, desc: &DrawDesc) {
        debug_assert!(self.pass_open, "draw outside a pass");
        debug_assert!(self.camera.is_some(), "draw before set_view_projection");
        self.registry.assert_live(desc.shader.0, "draw");
        let uploaded_bytes = self
            .buffers
            .get(&desc.vertices)
            .expect("unknown vertex buffer handle")
            .last_upload;
        if let Some(indices) = desc.indices {
            debug_assert!(
                self.buffers.contains_key(&indices),
                "unknown index buffer handle"
            );
        }
        self.draws.push(DrawRecord {
            shader: desc.shader,
            kind: desc.kind,
            count: desc.count,
            bound_textures: self.bound.iter().flatten().copied().collect(),
            uploaded_bytes,
        });
    }

    fn end_pass(&mut self) {
        debug_assert!(self.pass_open, "end_pass without begin_pass");
        self.pass_open = false;
    }

    fn report_leaks(&self) -> usize {
        self.registry.report_leaks()
    }

    fn as_any(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_plane_honors_clear_and_readback() {
        let mut driver = HeadlessDriver::new();
        let spec = FramebufferSpec::standard(4, 4);
        let fb = driver.create_framebuffer(&spec).unwrap();

        assert_eq!(driver.read_pixel(fb, 1, 2, 3), EMPTY_OWNER);
        driver.clear_attachment(fb, 1, 7);
        assert_eq!(driver.read_pixel(fb, 1, 0, 0), 7);
        driver.clear_attachment(fb, 1, EMPTY_OWNER);
        assert_eq!(driver.read_pixel(fb, 1, 3, 3), EMPTY_OWNER);
    }

    #[test]
    fn draws_snapshot_bound_texture_state() {
        let mut driver = HeadlessDriver::new();
        let spec = FramebufferSpec::standard(4, 4);
        let fb = driver.create_framebuffer(&spec).unwrap();
        let shader = driver.create_shader("test", "").unwrap();
        let texture = driver.create_texture_rgba8(1, 1, &[255; 4], "white");
        let vertices = driver.create_vertex_buffer(1024, "vb");

        driver.begin_pass(fb, None);
        driver.set_view_projection(Mat4::IDENTITY);
        driver.upload_vertices(vertices, &[0u8; 64]);
        driver.bind_texture(0, texture);
        driver.draw(&DrawDesc {
            shader,
            vertices,
            indices: None,
            count: 6,
            kind: VertexKind::Quad,
        });
        driver.end_pass();

        assert_eq!(driver.draw_call_count(), 1);
        let record = &driver.draws()[0];
        assert_eq!(record.bound_textures, vec![texture]);
        assert_eq!(record.uploaded_bytes, 64);
    }
}
