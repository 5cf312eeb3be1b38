use std::sync::Arc;

use crate::renderer::driver::{BufferId, Driver};
use crate::renderer::factory::Shader;
use crate::renderer::texture::Texture;
use crate::renderer::vertex::MeshVertex;

/// Static vertex/index buffer pair for a model mesh. Uploaded once at
/// creation; mesh draws do not participate in texture-slot batching
/// because per-mesh material state is not assumed poolable.
#[derive(Debug)]
pub struct Mesh {
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    index_count: u32,
}

impl Mesh {
    pub fn from_vertices(
        driver: &mut dyn Driver,
        vertices: &[MeshVertex],
        indices: &[u32],
    ) -> Self {
        let vertex_buffer = driver.create_vertex_buffer(
            (vertices.len() * std::mem::size_of::<MeshVertex>()) as u64,
            "MeshVertexBuffer",
        );
        driver.upload_vertices(vertex_buffer, bytemuck::cast_slice(vertices));
        let index_buffer = driver.create_index_buffer(indices, "MeshIndexBuffer");

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }

    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> BufferId {
        self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Shader plus optional texture for one mesh draw. Holds shared
/// references; the factory owns destruction.
#[derive(Clone)]
pub struct Material {
    pub shader: Arc<Shader>,
    pub texture: Option<Arc<Texture>>,
}
