use std::sync::Arc;

use crate::error::RendererError;
use crate::renderer::driver::{Driver, HeadlessDriver, WgpuDriver};
use crate::renderer::factory::{ResourceFactory, Shader};
use crate::renderer::framebuffer::{Framebuffer, FramebufferSpec};
use crate::renderer::mesh::Mesh;
use crate::renderer::texture::Texture;
use crate::renderer::vertex::MeshVertex;
use crate::settings::{DriverKind, RenderSettings};

/// Everything the renderer threads through call sites: the concrete
/// driver (selected once, here), the resource factory, and the shared
/// white texture. Constructed once at startup and passed explicitly
/// to whatever needs it; there is no process-wide instance.
pub struct RenderContext {
    driver: Box<dyn Driver>,
    factory: ResourceFactory,
    white: Arc<Texture>,
}

impl RenderContext {
    pub fn new(settings: &RenderSettings) -> Self {
        let driver: Box<dyn Driver> = match settings.driver {
            DriverKind::Wgpu => Box::new(WgpuDriver::new()),
            DriverKind::Headless => Box::new(HeadlessDriver::new()),
        };
        Self::with_driver(driver)
    }

    /// Wraps an already-constructed driver; the normal path is
    /// `new`, which selects one from settings.
    pub fn with_driver(mut driver: Box<dyn Driver>) -> Self {
        let white = Arc::new(Texture::white(driver.as_mut()));
        Self {
            driver,
            factory: ResourceFactory::new(),
            white,
        }
    }

    pub fn driver(&mut self) -> &mut dyn Driver {
        self.driver.as_mut()
    }

    pub fn white_texture(&self) -> Arc<Texture> {
        self.white.clone()
    }

    pub fn create_texture_rgba8(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
        label: &str,
    ) -> Arc<Texture> {
        Arc::new(Texture::from_rgba8(
            self.driver.as_mut(),
            width,
            height,
            pixels,
            label,
        ))
    }

    pub fn destroy_texture(&mut self, texture: &Arc<Texture>) {
        self.driver.destroy_texture(texture.id());
    }

    pub fn create_mesh(&mut self, vertices: &[MeshVertex], indices: &[u32]) -> Mesh {
        Mesh::from_vertices(self.driver.as_mut(), vertices, indices)
    }

    /// Cached by (path, mtime); see `ResourceFactory`.
    pub fn create_shader(
        &mut self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Arc<Shader>, RendererError> {
        self.factory
            .get_or_create_shader(self.driver.as_mut(), path)
    }

    pub fn create_shader_from_source(
        &mut self,
        label: &str,
        source: &str,
    ) -> Result<Arc<Shader>, RendererError> {
        self.factory
            .create_shader_from_source(self.driver.as_mut(), label, source)
    }

    /// Cached by spec; see `ResourceFactory`.
    pub fn create_framebuffer(
        &mut self,
        spec: &FramebufferSpec,
    ) -> Result<Arc<Framebuffer>, RendererError> {
        self.factory
            .get_or_create_framebuffer(self.driver.as_mut(), spec)
    }

    pub fn factory(&self) -> &ResourceFactory {
        &self.factory
    }

    /// Destroys retired GPU objects; call once per frame or at
    /// loading boundaries.
    pub fn reclaim(&mut self) {
        self.factory.reclaim(self.driver.as_mut());
    }

    /// Forcibly disposes every cached resource; for full reloads.
    pub fn clear_cache(&mut self) {
        self.factory.clear_cache(self.driver.as_mut());
    }

    /// Tears down cached resources and reports handles still live.
    /// Returns the leak count so embedders can assert on it.
    pub fn shutdown(mut self) -> usize {
        self.factory.clear_cache(self.driver.as_mut());
        let white = self.white.id();
        self.driver.destroy_texture(white);
        self.driver.report_leaks()
    }
}
