use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by resource creation. Capacity and slot-table
/// conditions are recovered internally by the batchers and never
/// appear here.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("shader compilation failed for {path:?}: {message}")]
    ShaderCompile { path: PathBuf, message: String },

    #[error("framebuffer is incomplete: {0}")]
    FramebufferIncomplete(String),

    #[error("failed to read shader source {path:?}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
