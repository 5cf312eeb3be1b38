pub mod headless;
pub mod wgpu;

use glam::Mat4;

use crate::error::RendererError;
use crate::renderer::framebuffer::FramebufferSpec;
use crate::renderer::handle::RenderId;

pub use headless::{DrawRecord, HeadlessDriver};
pub use self::wgpu::WgpuDriver;

/// How many texture units a single batch can multiplex. Matches the
/// common minimum texture-unit guarantee; `RenderSettings` may lower
/// the per-batch slot count but never raise it past this.
pub const MAX_TEXTURE_UNITS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub RenderId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub RenderId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub RenderId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub RenderId);

/// Which vertex record a draw streams; selects vertex layout and
/// primitive topology in the concrete driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexKind {
    Quad,
    Line,
    Mesh,
}

#[derive(Clone, Copy, Debug)]
pub struct DrawDesc {
    pub shader: ShaderId,
    pub vertices: BufferId,
    /// Indexed draw when set; `count` is then an index count.
    pub indices: Option<BufferId>,
    pub count: u32,
    pub kind: VertexKind,
}

/// The abstract operations the core issues against the GPU: resource
/// creation/destruction, vertex range upload, texture-unit binding,
/// and draws inside a begin/end pass bracket.
///
/// Exactly one implementation is selected at `RenderContext`
/// construction from `RenderSettings::driver`; the submission hot
/// path only reaches the driver at flush time, so the dynamic
/// dispatch cost is per draw call, not per submitted primitive.
pub trait Driver {
    fn create_texture_rgba8(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
        label: &str,
    ) -> TextureId;
    fn destroy_texture(&mut self, texture: TextureId);

    /// Compiles one shader module. Failures carry the driver's
    /// diagnostic text; no placeholder is ever substituted.
    fn create_shader(&mut self, label: &str, source: &str) -> Result<ShaderId, RendererError>;
    fn destroy_shader(&mut self, shader: ShaderId);

    fn create_vertex_buffer(&mut self, byte_capacity: u64, label: &str) -> BufferId;
    fn create_index_buffer(&mut self, indices: &[u32], label: &str) -> BufferId;
    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Uploads exactly the written range; the destination buffer's
    /// tail is left untouched.
    fn upload_vertices(&mut self, buffer: BufferId, bytes: &[u8]);

    fn create_framebuffer(&mut self, spec: &FramebufferSpec)
        -> Result<FramebufferId, RendererError>;
    /// Destroys and recreates every attachment at the new size,
    /// preserving the format list and order.
    fn resize_framebuffer(&mut self, framebuffer: FramebufferId, width: u32, height: u32);
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Resets one color attachment (by color-attachment index) to a
    /// constant without touching the others.
    fn clear_attachment(&mut self, framebuffer: FramebufferId, attachment: usize, value: i32);

    /// Synchronous single-pixel readback; stalls until the GPU value
    /// is available. Interaction-time use only.
    fn read_pixel(&mut self, framebuffer: FramebufferId, attachment: usize, x: u32, y: u32)
        -> i32;

    fn begin_pass(&mut self, target: FramebufferId, clear_color: Option<[f32; 4]>);
    fn set_view_projection(&mut self, view_proj: Mat4);
    fn bind_texture(&mut self, unit: u32, texture: TextureId);
    fn draw(&mut self, desc: &DrawDesc);
    fn end_pass(&mut self);

    /// Logs every live handle and returns the count; called once at
    /// shutdown.
    fn report_leaks(&self) -> usize;

    /// Concrete-type escape hatch for diagnostics and tests.
    fn as_any(&mut self) -> &mut dyn std::any::Any;
}
