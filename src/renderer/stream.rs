use bytemuck::Pod;

/// Fixed-capacity CPU staging array for one batch. Allocated once at
/// batch creation; `clear` resets the write cursor without touching
/// the allocation, so steady-state submission never hits the heap.
pub(crate) struct VertexStream<V> {
    verts: Vec<V>,
    capacity: usize,
}

impl<V: Pod> VertexStream<V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            verts: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Callers must flush before the stream is full; the batcher's
    /// capacity check guarantees this, not an optimistic write here.
    pub(crate) fn push(&mut self, vertex: V) {
        debug_assert!(
            self.verts.len() < self.capacity,
            "vertex stream overflow: flush-before-overflow invariant broken"
        );
        self.verts.push(vertex);
    }

    pub(crate) fn clear(&mut self) {
        self.verts.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.verts.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.verts.is_empty()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// The written range only, ready for upload.
    pub(crate) fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.verts)
    }

    #[cfg(test)]
    pub(crate) fn as_slice(&self) -> &[V] {
        &self.verts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_keeps_the_allocation() {
        let mut stream: VertexStream<[f32; 4]> = VertexStream::new(8);
        for i in 0..8 {
            stream.push([i as f32; 4]);
        }
        let ptr = stream.verts.as_ptr();
        stream.clear();
        assert!(stream.is_empty());
        stream.push([1.0; 4]);
        assert_eq!(stream.verts.as_ptr(), ptr);
    }

    #[test]
    fn bytes_cover_only_the_written_range() {
        let mut stream: VertexStream<[f32; 2]> = VertexStream::new(16);
        stream.push([1.0, 2.0]);
        stream.push([3.0, 4.0]);
        assert_eq!(stream.bytes().len(), 2 * std::mem::size_of::<[f32; 2]>());
    }
}
