use crate::renderer::driver::{Driver, TextureId};

/// Non-owning wrapper around one GPU texture. Equality for slot
/// assignment is by handle identity, never by contents; the actual
/// pixel storage lives behind the driver. Decoding image files into
/// rgba8 is an asset-pipeline concern and happens elsewhere.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
}

impl Texture {
    /// Create a texture from tightly packed rgba8 data.
    pub fn from_rgba8(
        driver: &mut dyn Driver,
        width: u32,
        height: u32,
        pixels: &[u8],
        label: &str,
    ) -> Self {
        debug_assert_eq!(
            pixels.len(),
            (width * height * 4) as usize,
            "rgba8 data does not match {width}x{height}"
        );
        let id = driver.create_texture_rgba8(width, height, pixels, label);
        Self { id, width, height }
    }

    /// The shared 1x1 opaque white texture bound to slot 0 of every
    /// batch, so tint-only quads batch with textured ones.
    pub fn white(driver: &mut dyn Driver) -> Self {
        Self::from_rgba8(driver, 1, 1, &[255, 255, 255, 255], "White")
    }

    /// Create a solid color 1x1 texture.
    pub fn from_color(driver: &mut dyn Driver, color: [u8; 4], label: &str) -> Self {
        Self::from_rgba8(driver, 1, 1, &color, label)
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
