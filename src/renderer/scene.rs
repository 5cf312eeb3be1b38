use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::batch::{LineBatch, Quad, QuadBatch};
use crate::renderer::context::RenderContext;
use crate::renderer::driver::{DrawDesc, VertexKind};
use crate::renderer::factory::Shader;
use crate::renderer::framebuffer::{Framebuffer, EMPTY_OWNER};
use crate::renderer::mesh::{Material, Mesh};
use crate::renderer::texture::Texture;
use crate::settings::RenderSettings;

/// Per-scene counters, reset by `begin_scene`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub quads: u32,
    pub lines: u32,
    pub meshes: u32,
}

impl RenderStats {
    pub fn quad_vertices(&self) -> u32 {
        self.quads * 4
    }

    pub fn quad_indices(&self) -> u32 {
        self.quads * 6
    }
}

pub struct ScenePassDesc {
    pub target: Arc<Framebuffer>,
    pub quad_shader: Arc<Shader>,
    pub line_shader: Arc<Shader>,
    pub clear_color: [f32; 4],
}

/// Bookends one render pass over a framebuffer target.
///
/// `begin_scene` uploads the camera matrix once, clears the picking
/// attachment to the empty sentinel, and opens every batch;
/// `end_scene` flushes them, so nothing submitted in between is ever
/// lost. Multiple passes (opaque, transparent, overlay) are
/// independent instances sharing the context's factory.
///
/// Submissions are batched in order, never reordered; callers that
/// want maximal batching can pre-sort with the `sorter` module.
pub struct ScenePass {
    target: Arc<Framebuffer>,
    quads: QuadBatch,
    lines: LineBatch,
    // Keeps the cached modules alive while the batches hold raw ids.
    _quad_shader: Arc<Shader>,
    _line_shader: Arc<Shader>,
    white: Arc<Texture>,
    clear_color: [f32; 4],
    meshes: u32,
    open: bool,
}

impl ScenePass {
    pub fn new(ctx: &mut RenderContext, settings: &RenderSettings, desc: ScenePassDesc) -> Self {
        let white = ctx.white_texture();
        let driver = ctx.driver();
        let quads = QuadBatch::new(driver, settings, white.clone(), desc.quad_shader.id());
        let lines = LineBatch::new(driver, settings, desc.line_shader.id());
        Self {
            target: desc.target,
            quads,
            lines,
            _quad_shader: desc.quad_shader,
            _line_shader: desc.line_shader,
            white,
            clear_color: desc.clear_color,
            meshes: 0,
            open: false,
        }
    }

    /// Uploads the camera matrix and opens all batches. Must pair
    /// with `end_scene`.
    pub fn begin_scene(&mut self, ctx: &mut RenderContext, view_projection: Mat4) {
        debug_assert!(!self.open, "begin_scene while the scene is open");
        let driver = ctx.driver();
        if let Some(attachment) = self.target.object_id_attachment() {
            self.target
                .clear_attachment(driver, attachment, EMPTY_OWNER);
        }
        driver.begin_pass(self.target.id(), Some(self.clear_color));
        driver.set_view_projection(view_projection);
        self.quads.begin();
        self.lines.begin();
        self.quads.reset_counters();
        self.lines.reset_counters();
        self.meshes = 0;
        self.open = true;
    }

    pub fn submit_quad(&mut self, ctx: &mut RenderContext, quad: &Quad) {
        debug_assert!(self.open, "submit_quad outside begin/end_scene");
        self.quads.submit(ctx.driver(), quad);
    }

    pub fn submit_line(
        &mut self,
        ctx: &mut RenderContext,
        from: Vec3,
        to: Vec3,
        color: Vec4,
        owner: i32,
    ) {
        debug_assert!(self.open, "submit_line outside begin/end_scene");
        self.lines.submit(ctx.driver(), from, to, color, owner);
    }

    /// Meshes draw individually. Pending batched geometry flushes
    /// first so draw order matches submission order.
    pub fn submit_mesh(&mut self, ctx: &mut RenderContext, mesh: &Mesh, material: &Material) {
        debug_assert!(self.open, "submit_mesh outside begin/end_scene");
        let driver = ctx.driver();
        self.quads.flush(driver);
        self.lines.flush(driver);

        let texture = material.texture.as_ref().unwrap_or(&self.white);
        driver.bind_texture(0, texture.id());
        driver.draw(&DrawDesc {
            shader: material.shader.id(),
            vertices: mesh.vertex_buffer(),
            indices: Some(mesh.index_buffer()),
            count: mesh.index_count(),
            kind: VertexKind::Mesh,
        });
        self.meshes += 1;
    }

    /// Flushes every batch and closes the pass; no geometry submitted
    /// since `begin_scene` is lost.
    pub fn end_scene(&mut self, ctx: &mut RenderContext) {
        debug_assert!(self.open, "end_scene without begin_scene");
        let driver = ctx.driver();
        self.quads.flush(driver);
        self.lines.flush(driver);
        driver.end_pass();
        self.open = false;
    }

    pub fn stats(&self) -> RenderStats {
        RenderStats {
            draw_calls: self.quads.draw_calls() + self.lines.draw_calls() + self.meshes,
            quads: self.quads.submitted(),
            lines: self.lines.submitted(),
            meshes: self.meshes,
        }
    }

    pub fn target(&self) -> &Arc<Framebuffer> {
        &self.target
    }
}
