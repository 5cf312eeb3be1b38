use std::sync::Arc;

use crate::renderer::texture::Texture;

/// Maps texture handles to small slot indices within the current
/// batch. Slot 0 is always the shared white texture and is never
/// evicted. Lookup is a linear scan by handle identity: at N <= 16
/// with one-integer equality, that beats a hash map.
pub(crate) struct TextureSlots {
    slots: Vec<Arc<Texture>>,
    max: usize,
}

impl TextureSlots {
    pub(crate) fn new(max: usize, white: Arc<Texture>) -> Self {
        debug_assert!(max >= 2, "slot table needs room beyond the white slot");
        let mut slots = Vec::with_capacity(max);
        slots.push(white);
        Self { slots, max }
    }

    /// Returns the slot for `texture`, appending it if the table has
    /// room. `None` means the table is full and the batch must flush
    /// before this texture can be used.
    pub(crate) fn resolve(&mut self, texture: &Arc<Texture>) -> Option<u32> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.id() == texture.id() {
                return Some(index as u32);
            }
        }
        if self.slots.len() < self.max {
            self.slots.push(texture.clone());
            Some((self.slots.len() - 1) as u32)
        } else {
            None
        }
    }

    /// Drops everything except the reserved white slot. Keeps the
    /// table's allocation.
    pub(crate) fn reset(&mut self) {
        self.slots.truncate(1);
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<Texture>> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::driver::{Driver, HeadlessDriver};

    fn texture(driver: &mut HeadlessDriver) -> Arc<Texture> {
        Arc::new(Texture::from_rgba8(driver, 1, 1, &[0, 0, 0, 255], "t"))
    }

    fn table(driver: &mut HeadlessDriver, max: usize) -> TextureSlots {
        let white = Arc::new(Texture::white(driver));
        TextureSlots::new(max, white)
    }

    #[test]
    fn white_occupies_slot_zero() {
        let mut driver = HeadlessDriver::new();
        let white = Arc::new(Texture::white(&mut driver));
        let mut slots = TextureSlots::new(4, white.clone());
        assert_eq!(slots.resolve(&white), Some(0));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn repeated_handle_reuses_its_slot() {
        let mut driver = HeadlessDriver::new();
        let mut slots = table(&mut driver, 4);
        let a = texture(&mut driver);
        let b = texture(&mut driver);
        assert_eq!(slots.resolve(&a), Some(1));
        assert_eq!(slots.resolve(&b), Some(2));
        assert_eq!(slots.resolve(&a), Some(1));
        assert_eq!(slots.len(), 3);
    }

    #[test]
    fn full_table_signals_exhaustion() {
        let mut driver = HeadlessDriver::new();
        let mut slots = table(&mut driver, 3);
        let a = texture(&mut driver);
        let b = texture(&mut driver);
        let c = texture(&mut driver);
        assert_eq!(slots.resolve(&a), Some(1));
        assert_eq!(slots.resolve(&b), Some(2));
        assert_eq!(slots.resolve(&c), None);
        // The repeated handles still resolve.
        assert_eq!(slots.resolve(&b), Some(2));
    }

    #[test]
    fn reset_keeps_only_the_white_slot() {
        let mut driver = HeadlessDriver::new();
        let mut slots = table(&mut driver, 4);
        let a = texture(&mut driver);
        slots.resolve(&a);
        slots.reset();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots.resolve(&a), Some(1));
    }
}
