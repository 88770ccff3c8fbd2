//! The render target: one color renderbuffer sized to the surface, owned by
//! one framebuffer object.
//!
//! The target is torn down and rebuilt on every layout event. GPU handles
//! are not reference counted, so the previous generation is deleted
//! explicitly before the next is allocated; deleting when nothing is held
//! is a no-op.

use crate::backends::{Device, FrameBufferId, RenderBufferId};
use crate::errors::{Error, Result};
use crate::surface::Surface;

#[derive(Debug, Default)]
pub struct FramebufferManager {
    render_buffer: Option<RenderBufferId>,
    frame_buffer: Option<FrameBufferId>,
}

impl FramebufferManager {
    pub fn new() -> Self {
        FramebufferManager {
            render_buffer: None,
            frame_buffer: None,
        }
    }

    /// Frees any previously held buffers, then allocates a color
    /// renderbuffer at the surface's device-pixel size and a framebuffer
    /// with it as the sole color attachment. The framebuffer is left bound.
    pub fn rebuild(&mut self, device: &mut dyn Device, surface: &Surface) -> Result<FrameBufferId> {
        surface.validate()?;
        self.release(device)?;

        let dimensions = surface.device_dimensions();
        let render_buffer =
            unsafe { device.create_render_buffer(dimensions, surface.params.format)? };

        let frame_buffer = match unsafe { device.create_frame_buffer(render_buffer) } {
            Ok(frame_buffer) => frame_buffer,
            Err(err) => {
                let _ = unsafe { device.delete_render_buffer(render_buffer) };
                return Err(err);
            }
        };

        info!(
            "[FramebufferManager] rebuilds render target ({}x{}).",
            dimensions.x, dimensions.y
        );

        self.render_buffer = Some(render_buffer);
        self.frame_buffer = Some(frame_buffer);
        Ok(frame_buffer)
    }

    /// Deletes the held buffers. A framebuffer is undefined once its
    /// attachment is gone, so the framebuffer goes first.
    pub fn release(&mut self, device: &mut dyn Device) -> Result<()> {
        if let Some(frame_buffer) = self.frame_buffer.take() {
            unsafe { device.delete_frame_buffer(frame_buffer)? };
        }

        if let Some(render_buffer) = self.render_buffer.take() {
            unsafe { device.delete_render_buffer(render_buffer)? };
        }

        Ok(())
    }

    pub fn frame_buffer(&self) -> Result<FrameBufferId> {
        self.frame_buffer
            .ok_or_else(|| Error::precondition("render target has not been built"))
    }

    pub fn render_buffer(&self) -> Result<RenderBufferId> {
        self.render_buffer
            .ok_or_else(|| Error::precondition("render target has not been built"))
    }
}
