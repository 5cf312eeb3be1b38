pub mod error;
pub mod renderer;
pub mod settings;

pub use error::RendererError;
pub use renderer::{
    AttachmentFormat, Framebuffer, FramebufferSpec, LineBatch, Material, Mesh, Quad, QuadBatch,
    RenderContext, RenderStats, ResourceFactory, ScenePass, ScenePassDesc, Shader, Texture,
    EMPTY_OWNER,
};
pub use settings::{DriverKind, RenderSettings};

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
