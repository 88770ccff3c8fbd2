//! The presentable drawing target and the binder that attaches the
//! pipeline to it.
//!
//! The surface itself is owned by the host view system; the pipeline only
//! keeps a validated description of it. Binding happens once per surface
//! change, and every later stage of the pipeline may assume a bound,
//! non-degenerate surface.

use crate::errors::{Error, Result};
use crate::math::Vector2;

/// The color format of the surface backing store. The pipeline renders to
/// 32-bit RGBA only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFormat {
    Rgba8,
}

/// The drawable properties of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceParams {
    pub format: SurfaceFormat,
    /// Whether the backing store keeps its contents after presentation.
    /// The pipeline redraws everything each pass and runs non-retained.
    pub retained_backing: bool,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        SurfaceParams {
            format: SurfaceFormat::Rgba8,
            retained_backing: false,
        }
    }
}

/// A host-provided presentable target: logical dimensions plus the display
/// scale factor that maps them to device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub dimensions: Vector2<u32>,
    pub scale_factor: f32,
    pub params: SurfaceParams,
}

impl Surface {
    pub fn new(dimensions: Vector2<u32>, scale_factor: f32) -> Self {
        Surface {
            dimensions,
            scale_factor,
            params: SurfaceParams::default(),
        }
    }

    /// Dimensions in device pixels, the unit every GPU allocation and the
    /// viewport use.
    pub fn device_dimensions(&self) -> Vector2<u32> {
        Vector2::new(
            (self.dimensions.x as f32 * self.scale_factor).round() as u32,
            (self.dimensions.y as f32 * self.scale_factor).round() as u32,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.scale_factor <= 0.0 {
            return Err(Error::precondition(format!(
                "surface scale factor must be positive, got {}",
                self.scale_factor
            )));
        }

        let device = self.device_dimensions();
        if device.x == 0 || device.y == 0 {
            return Err(Error::SurfaceDegenerate(device.x, device.y));
        }

        Ok(())
    }
}

/// Holds the surface the pipeline currently renders to. Rebinding replaces
/// the previous surface; downstream framebuffers must be rebuilt afterwards.
#[derive(Debug, Default)]
pub struct SurfaceBinder {
    surface: Option<Surface>,
}

impl SurfaceBinder {
    pub fn new() -> Self {
        SurfaceBinder { surface: None }
    }

    pub fn bind(&mut self, surface: Surface) -> Result<&Surface> {
        surface.validate()?;

        let device = surface.device_dimensions();
        info!(
            "[SurfaceBinder] binds surface ({}x{} @ {}x -> {}x{}).",
            surface.dimensions.x,
            surface.dimensions.y,
            surface.scale_factor,
            device.x,
            device.y
        );

        self.surface = Some(surface);
        Ok(self.surface.as_ref().unwrap())
    }

    pub fn surface(&self) -> Result<&Surface> {
        self.surface.as_ref().ok_or(Error::SurfaceNotBound)
    }

    pub fn is_bound(&self) -> bool {
        self.surface.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_dimensions() {
        let surface = Surface::new(Vector2::new(200, 300), 2.0);
        assert_eq!(surface.device_dimensions(), Vector2::new(400, 600));

        let surface = Surface::new(Vector2::new(3, 3), 1.5);
        assert_eq!(surface.device_dimensions(), Vector2::new(5, 5));
    }

    #[test]
    fn degenerate_surface_is_refused() {
        let mut binder = SurfaceBinder::new();
        assert!(binder.bind(Surface::new(Vector2::new(0, 300), 2.0)).is_err());
        assert!(!binder.is_bound());
        assert!(binder.surface().is_err());

        assert!(binder
            .bind(Surface::new(Vector2::new(200, 300), 0.0))
            .is_err());

        binder.bind(Surface::new(Vector2::new(200, 300), 2.0)).unwrap();
        assert!(binder.is_bound());
    }

    #[test]
    fn default_params() {
        let params = SurfaceParams::default();
        assert_eq!(params.format, SurfaceFormat::Rgba8);
        assert!(!params.retained_backing);
    }
}
