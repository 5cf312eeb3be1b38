use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::renderer::driver::{BufferId, DrawDesc, Driver, ShaderId, VertexKind};
use crate::renderer::slots::TextureSlots;
use crate::renderer::stream::VertexStream;
use crate::renderer::texture::Texture;
use crate::renderer::vertex::{
    quad_index_pattern, LineVertex, QuadVertex, INDICES_PER_QUAD, VERTICES_PER_LINE,
    VERTICES_PER_QUAD,
};
use crate::settings::RenderSettings;

const UNIT_QUAD: [Vec4; 4] = [
    Vec4::new(-0.5, -0.5, 0.0, 1.0),
    Vec4::new(0.5, -0.5, 0.0, 1.0),
    Vec4::new(0.5, 0.5, 0.0, 1.0),
    Vec4::new(-0.5, 0.5, 0.0, 1.0),
];

const FULL_UV: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

/// One quad submission. `uv_region` defaults to the full 0..1 quad;
/// `owner` is the picking id (-1 = none).
pub struct Quad {
    pub transform: Mat4,
    pub texture: Option<Arc<Texture>>,
    pub tint: Vec4,
    pub tiling_factor: f32,
    pub uv_region: Option<[Vec2; 4]>,
    pub owner: i32,
}

impl Default for Quad {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            texture: None,
            tint: Vec4::ONE,
            tiling_factor: 1.0,
            uv_region: None,
            owner: -1,
        }
    }
}

fn premultiplied(tint: Vec4) -> [f32; 4] {
    [
        tint.x * tint.w,
        tint.y * tint.w,
        tint.z * tint.w,
        tint.w,
    ]
}

/// Accumulates quads sharing one shader into as few indexed draw
/// calls as the vertex/index and texture-slot capacities allow.
///
/// Both hard limits recover locally: hitting either one flushes the
/// open batch and reopens a fresh one, invisibly to the caller. The
/// stream and slot table are allocated once and reset on flush, so
/// steady-state submission performs no heap allocation.
pub struct QuadBatch {
    stream: VertexStream<QuadVertex>,
    slots: TextureSlots,
    index_count: u32,
    max_indices: u32,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    shader: ShaderId,
    white: Arc<Texture>,
    draw_calls: u32,
    quads: u32,
}

impl QuadBatch {
    pub fn new(
        driver: &mut dyn Driver,
        settings: &RenderSettings,
        white: Arc<Texture>,
        shader: ShaderId,
    ) -> Self {
        let max_vertices = (settings.max_quads * VERTICES_PER_QUAD) as usize;
        let vertex_buffer = driver.create_vertex_buffer(
            (max_vertices * std::mem::size_of::<QuadVertex>()) as u64,
            "QuadVertexBuffer",
        );
        let index_buffer =
            driver.create_index_buffer(&quad_index_pattern(settings.max_quads), "QuadIndexBuffer");

        Self {
            stream: VertexStream::new(max_vertices),
            slots: TextureSlots::new(settings.max_texture_slots as usize, white.clone()),
            index_count: 0,
            max_indices: settings.max_quads * INDICES_PER_QUAD,
            vertex_buffer,
            index_buffer,
            shader,
            white,
            draw_calls: 0,
            quads: 0,
        }
    }

    /// Opens a fresh batch: counts zeroed, slot table back to just
    /// the white texture. Called at scene start and after every
    /// flush.
    pub fn begin(&mut self) {
        self.stream.clear();
        self.slots.reset();
        self.index_count = 0;
    }

    pub fn submit(&mut self, driver: &mut dyn Driver, quad: &Quad) {
        if self.index_count + INDICES_PER_QUAD > self.max_indices {
            self.flush(driver);
        }

        let texture = quad.texture.as_ref().unwrap_or(&self.white).clone();
        let slot = match self.slots.resolve(&texture) {
            Some(slot) => slot,
            None => {
                self.flush(driver);
                self.slots
                    .resolve(&texture)
                    .expect("slot table has room after flush")
            }
        };

        let uvs = quad.uv_region.unwrap_or(FULL_UV);
        let color = premultiplied(quad.tint);
        for corner in 0..4 {
            let position = quad.transform * UNIT_QUAD[corner];
            self.stream.push(QuadVertex {
                position: [position.x, position.y, position.z],
                color,
                uv: uvs[corner].to_array(),
                slot: slot as f32,
                tiling: quad.tiling_factor,
                owner: quad.owner,
            });
        }
        self.index_count += INDICES_PER_QUAD;
        self.quads += 1;
    }

    /// Uploads the written vertex range, binds the slot table's
    /// textures to their units, issues one indexed draw call, and
    /// reopens the batch. A flush followed by new submissions is
    /// indistinguishable from a fresh `begin`.
    pub fn flush(&mut self, driver: &mut dyn Driver) {
        if self.stream.is_empty() {
            return;
        }

        driver.upload_vertices(self.vertex_buffer, self.stream.bytes());
        for (unit, texture) in self.slots.iter().enumerate() {
            driver.bind_texture(unit as u32, texture.id());
        }
        driver.draw(&DrawDesc {
            shader: self.shader,
            vertices: self.vertex_buffer,
            indices: Some(self.index_buffer),
            count: self.index_count,
            kind: VertexKind::Quad,
        });
        self.draw_calls += 1;
        self.begin();
    }

    pub(crate) fn reset_counters(&mut self) {
        self.draw_calls = 0;
        self.quads = 0;
    }

    pub fn vertex_count(&self) -> u32 {
        self.stream.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    pub fn submitted(&self) -> u32 {
        self.quads
    }

    #[cfg(test)]
    pub(crate) fn staged(&self) -> &[QuadVertex] {
        self.stream.as_slice()
    }
}

/// Line accumulator: two vertices per submission, non-indexed
/// line-list draws, no texture slots.
pub struct LineBatch {
    stream: VertexStream<LineVertex>,
    vertex_buffer: BufferId,
    shader: ShaderId,
    draw_calls: u32,
    lines: u32,
}

impl LineBatch {
    pub fn new(driver: &mut dyn Driver, settings: &RenderSettings, shader: ShaderId) -> Self {
        let max_vertices = (settings.max_lines * VERTICES_PER_LINE) as usize;
        let vertex_buffer = driver.create_vertex_buffer(
            (max_vertices * std::mem::size_of::<LineVertex>()) as u64,
            "LineVertexBuffer",
        );
        Self {
            stream: VertexStream::new(max_vertices),
            vertex_buffer,
            shader,
            draw_calls: 0,
            lines: 0,
        }
    }

    pub fn begin(&mut self) {
        self.stream.clear();
    }

    pub fn submit(&mut self, driver: &mut dyn Driver, from: Vec3, to: Vec3, color: Vec4, owner: i32) {
        if self.stream.len() + VERTICES_PER_LINE as usize > self.stream.capacity() {
            self.flush(driver);
        }
        let color = premultiplied(color);
        self.stream.push(LineVertex {
            position: from.to_array(),
            color,
            owner,
        });
        self.stream.push(LineVertex {
            position: to.to_array(),
            color,
            owner,
        });
        self.lines += 1;
    }

    pub fn flush(&mut self, driver: &mut dyn Driver) {
        if self.stream.is_empty() {
            return;
        }
        driver.upload_vertices(self.vertex_buffer, self.stream.bytes());
        driver.draw(&DrawDesc {
            shader: self.shader,
            vertices: self.vertex_buffer,
            indices: None,
            count: self.stream.len() as u32,
            kind: VertexKind::Line,
        });
        self.draw_calls += 1;
        self.begin();
    }

    pub(crate) fn reset_counters(&mut self) {
        self.draw_calls = 0;
        self.lines = 0;
    }

    pub fn vertex_count(&self) -> u32 {
        self.stream.len() as u32
    }

    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    pub fn submitted(&self) -> u32 {
        self.lines
    }
}
