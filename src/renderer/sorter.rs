use std::cmp::Ordering;

use crate::renderer::factory::Shader;
use crate::renderer::texture::Texture;

/// Blend grouping for sort purposes; opaque draws sort before
/// blended ones so blended geometry lands on a finished opaque
/// layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlendMode {
    Opaque,
    Alpha,
}

/// Sort key for pre-submission ordering: shader, then texture, then
/// blend mode, then depth. A thin policy layer over caller-owned
/// command lists; the batchers themselves never reorder, so callers
/// that want maximal batching sort before submitting.
#[derive(Clone, Copy, Debug)]
pub struct DrawKey {
    pub shader: u64,
    pub texture: u64,
    pub blend: BlendMode,
    pub depth: f32,
}

impl DrawKey {
    pub fn new(shader: &Shader, texture: Option<&Texture>, blend: BlendMode, depth: f32) -> Self {
        Self {
            shader: shader.id().0.get(),
            texture: texture.map(|t| t.id().0.get()).unwrap_or(0),
            blend,
            depth,
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        self.shader
            .cmp(&other.shader)
            .then(self.texture.cmp(&other.texture))
            .then(self.blend.cmp(&other.blend))
            .then(
                self.depth
                    .partial_cmp(&other.depth)
                    .unwrap_or(Ordering::Equal),
            )
    }
}

/// Stable sort, so equal keys keep their submission order.
pub fn sort_draws<T>(draws: &mut [(DrawKey, T)]) {
    draws.sort_by(|(a, _), (b, _)| a.cmp(b));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(shader: u64, texture: u64, blend: BlendMode, depth: f32) -> DrawKey {
        DrawKey {
            shader,
            texture,
            blend,
            depth,
        }
    }

    #[test]
    fn groups_by_shader_then_texture() {
        let mut draws = vec![
            (key(2, 1, BlendMode::Opaque, 0.0), "c"),
            (key(1, 2, BlendMode::Opaque, 0.0), "b"),
            (key(1, 1, BlendMode::Opaque, 0.0), "a"),
        ];
        sort_draws(&mut draws);
        let order: Vec<_> = draws.iter().map(|(_, tag)| *tag).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn equal_keys_keep_submission_order() {
        let mut draws = vec![
            (key(1, 1, BlendMode::Opaque, 0.5), "first"),
            (key(1, 1, BlendMode::Opaque, 0.5), "second"),
        ];
        sort_draws(&mut draws);
        assert_eq!(draws[0].1, "first");
        assert_eq!(draws[1].1, "second");
    }

    #[test]
    fn blended_draws_sort_after_opaque_then_by_depth() {
        let mut draws = vec![
            (key(1, 1, BlendMode::Alpha, 2.0), "far"),
            (key(1, 1, BlendMode::Opaque, 0.0), "solid"),
            (key(1, 1, BlendMode::Alpha, 1.0), "near"),
        ];
        sort_draws(&mut draws);
        let order: Vec<_> = draws.iter().map(|(_, tag)| *tag).collect();
        assert_eq!(order, vec!["solid", "near", "far"]);
    }
}
