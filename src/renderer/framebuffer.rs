use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::renderer::driver::{Driver, FramebufferId};
use crate::renderer::factory::{Retired, RetireQueue};
use crate::error::RendererError;

/// Value read back from the object-id attachment where nothing was
/// drawn this frame.
pub const EMPTY_OWNER: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentFormat {
    /// 8-bit rgba color.
    Rgba8,
    /// Single-channel signed integer holding picking ids.
    ObjectId,
    DepthStencil,
}

impl AttachmentFormat {
    pub fn is_color(self) -> bool {
        !matches!(self, AttachmentFormat::DepthStencil)
    }
}

/// Attachment formats and order are fixed at creation; resize
/// recreates every attachment at the new size but never changes the
/// list. Also the cache key for `get_or_create_framebuffer`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FramebufferSpec {
    pub width: u32,
    pub height: u32,
    pub samples: u32,
    pub attachments: Vec<AttachmentFormat>,
}

impl FramebufferSpec {
    /// The editor-viewport layout: color, picking ids, depth-stencil.
    pub fn standard(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            samples: 1,
            attachments: vec![
                AttachmentFormat::Rgba8,
                AttachmentFormat::ObjectId,
                AttachmentFormat::DepthStencil,
            ],
        }
    }

    pub(crate) fn validate(&self) -> Result<(), RendererError> {
        if self.width == 0 || self.height == 0 {
            return Err(RendererError::FramebufferIncomplete(format!(
                "zero-sized target {}x{}",
                self.width, self.height
            )));
        }
        if self.samples == 0 {
            return Err(RendererError::FramebufferIncomplete(
                "sample count must be at least 1".into(),
            ));
        }
        if !self.attachments.iter().any(|a| a.is_color()) {
            return Err(RendererError::FramebufferIncomplete(
                "no color attachment declared".into(),
            ));
        }
        Ok(())
    }
}

/// Off-screen render target. Attachment handles captured before a
/// `resize` are invalid afterwards; holding one across a resize is a
/// caller error and is not runtime-checked.
pub struct Framebuffer {
    id: FramebufferId,
    attachments: Vec<AttachmentFormat>,
    size: Mutex<(u32, u32)>,
    disposed: AtomicBool,
    retire: RetireQueue,
}

impl Framebuffer {
    pub(crate) fn create(
        driver: &mut dyn Driver,
        spec: &FramebufferSpec,
        retire: RetireQueue,
    ) -> Result<Self, RendererError> {
        let id = driver.create_framebuffer(spec)?;
        Ok(Self {
            id,
            attachments: spec.attachments.clone(),
            size: Mutex::new((spec.width, spec.height)),
            disposed: AtomicBool::new(false),
            retire,
        })
    }

    pub fn id(&self) -> FramebufferId {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        *self.size.lock().unwrap()
    }

    pub fn attachments(&self) -> &[AttachmentFormat] {
        &self.attachments
    }

    /// Color-attachment index of the picking attachment, if declared.
    pub fn object_id_attachment(&self) -> Option<usize> {
        self.attachments
            .iter()
            .filter(|a| a.is_color())
            .position(|a| *a == AttachmentFormat::ObjectId)
    }

    /// Destroys and recreates all attachments in place at the new
    /// size. Zero dimensions (minimized viewport) are ignored.
    pub fn resize(&self, driver: &mut dyn Driver, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("ignoring framebuffer resize to {width}x{height}");
            return;
        }
        driver.resize_framebuffer(self.id, width, height);
        *self.size.lock().unwrap() = (width, height);
    }

    /// Resets one color attachment to a constant; used to clear the
    /// object-id buffer to `EMPTY_OWNER` each frame without touching
    /// color or depth.
    pub fn clear_attachment(&self, driver: &mut dyn Driver, attachment: usize, value: i32) {
        driver.clear_attachment(self.id, attachment, value);
    }

    /// Synchronous readback of one integer from a color attachment.
    /// May stall the pipeline; call on explicit user interaction only,
    /// never per frame. Coordinates must lie within the current size.
    pub fn read_pixel(&self, driver: &mut dyn Driver, attachment: usize, x: u32, y: u32) -> i32 {
        driver.read_pixel(self.id, attachment, x, y)
    }

    pub(crate) fn mark_disposed(&self) {
        self.disposed.store(true, Ordering::Release);
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::Acquire) {
            if let Ok(mut retired) = self.retire.lock() {
                retired.push(Retired::Framebuffer(self.id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_spec_orders_color_then_id_then_depth() {
        let spec = FramebufferSpec::standard(1280, 720);
        assert_eq!(
            spec.attachments,
            vec![
                AttachmentFormat::Rgba8,
                AttachmentFormat::ObjectId,
                AttachmentFormat::DepthStencil
            ]
        );
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn validate_rejects_degenerate_specs() {
        let mut spec = FramebufferSpec::standard(0, 720);
        assert!(spec.validate().is_err());

        spec = FramebufferSpec::standard(64, 64);
        spec.samples = 0;
        assert!(spec.validate().is_err());

        spec = FramebufferSpec::standard(64, 64);
        spec.attachments = vec![AttachmentFormat::DepthStencil];
        assert!(spec.validate().is_err());
    }
}
