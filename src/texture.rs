//! Texture upload from a CPU-decoded image.
//!
//! Image providers hand over row-major RGBA8 bytes with a top-left origin;
//! GPU textures put their origin at the bottom-left. The loader stages the
//! texels through a zeroed scratch buffer with the rows vertically flipped,
//! so that a sample at UV (0, 1) lands on the image's top-left pixel. The
//! scratch buffer lives for the duration of one upload and is freed on
//! every path, success or failure.

use crate::backends::{Device, TextureId};
use crate::errors::{Error, Result};
use crate::math::Vector2;

pub const BYTES_PER_TEXEL: usize = 4;

/// Specify how the texture is sampled whenever a pixel is being textured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// Sets the wrap parameter for both texture axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrap {
    Repeat,
    Clamp,
}

/// The sampling parameters and dimensions of a texture object. The pixel
/// format is fixed to RGBA8 at mip level 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureParams {
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
    pub dimensions: Vector2<u32>,
}

impl Default for TextureParams {
    fn default() -> Self {
        TextureParams {
            filter: TextureFilter::Linear,
            wrap: TextureWrap::Clamp,
            dimensions: Vector2::new(0, 0),
        }
    }
}

impl TextureParams {
    pub fn validate(&self, bytes: &[u8]) -> Result<()> {
        if self.dimensions.x == 0 || self.dimensions.y == 0 {
            return Err(Error::ImageInvalid(format!(
                "texture dimensions are {}x{}",
                self.dimensions.x, self.dimensions.y
            )));
        }

        let expected = self.dimensions.x as usize * self.dimensions.y as usize * BYTES_PER_TEXEL;
        if bytes.len() != expected {
            return Err(Error::ImageInvalid(format!(
                "expected {} texel bytes, got {}",
                expected,
                bytes.len()
            )));
        }

        Ok(())
    }
}

/// A decoded bitmap handed over by the image provider: row-major RGBA8
/// bytes, top-left origin, premultiplied alpha in the last component.
/// Single use; consumed by the upload and dropped immediately after.
#[derive(Debug, Clone)]
pub struct ImageSample {
    pub dimensions: Vector2<u32>,
    pub bytes: Vec<u8>,
}

impl ImageSample {
    pub fn new(dimensions: Vector2<u32>, bytes: Vec<u8>) -> Self {
        ImageSample { dimensions, bytes }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimensions.x == 0 || self.dimensions.y == 0 {
            return Err(Error::ImageInvalid(format!(
                "image dimensions are {}x{}",
                self.dimensions.x, self.dimensions.y
            )));
        }

        let expected = self.dimensions.x as usize * self.dimensions.y as usize * BYTES_PER_TEXEL;
        if self.bytes.len() != expected {
            return Err(Error::ImageInvalid(format!(
                "expected {} bytes for {}x{} RGBA, got {}",
                expected,
                self.dimensions.x,
                self.dimensions.y,
                self.bytes.len()
            )));
        }

        Ok(())
    }
}

/// A GPU texture object and the dimensions it was uploaded with.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    dimensions: Vector2<u32>,
}

impl Texture {
    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn dimensions(&self) -> Vector2<u32> {
        self.dimensions
    }

    pub fn bind(&self, device: &mut dyn Device, unit: usize) -> Result<()> {
        unsafe { device.bind_texture(unit, self.id) }
    }

    pub fn release(self, device: &mut dyn Device) -> Result<()> {
        unsafe { device.delete_texture(self.id) }
    }
}

pub struct TextureLoader;

impl TextureLoader {
    /// Converts `image` into a texture object with linear filtering and
    /// clamp-to-edge wrapping. The image is validated first; on any failure
    /// no texture is produced. Both the image and the flipped scratch
    /// buffer are dropped when this returns.
    pub fn load(device: &mut dyn Device, image: ImageSample) -> Result<Texture> {
        image.validate()?;

        let scratch = flip_rows(&image);
        let params = TextureParams {
            dimensions: image.dimensions,
            ..TextureParams::default()
        };

        let id = unsafe { device.create_texture(params, &scratch)? };
        info!(
            "[TextureLoader] uploads {} ({}x{}).",
            id, image.dimensions.x, image.dimensions.y
        );

        Ok(Texture {
            id,
            dimensions: image.dimensions,
        })
    }
}

/// Renders the image into a zeroed scratch buffer with the row order
/// reversed, matching the GPU's bottom-left texture origin.
fn flip_rows(image: &ImageSample) -> Vec<u8> {
    let row = image.dimensions.x as usize * BYTES_PER_TEXEL;
    let rows = image.dimensions.y as usize;
    let mut scratch = vec![0; row * rows];

    for (i, src) in image.bytes.chunks(row).enumerate() {
        let offset = (rows - 1 - i) * row;
        scratch[offset..offset + row].copy_from_slice(src);
    }

    scratch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_reverses_rows() {
        let image = ImageSample::new(
            Vector2::new(2, 2),
            vec![
                1, 1, 1, 1, 2, 2, 2, 2, // top row
                3, 3, 3, 3, 4, 4, 4, 4, // bottom row
            ],
        );

        let flipped = flip_rows(&image);
        assert_eq!(
            flipped,
            vec![
                3, 3, 3, 3, 4, 4, 4, 4, // bottom row first
                1, 1, 1, 1, 2, 2, 2, 2,
            ]
        );
    }

    #[test]
    fn validate_refuses_degenerate_images() {
        let image = ImageSample::new(Vector2::new(0, 2), Vec::new());
        assert!(image.validate().is_err());

        let image = ImageSample::new(Vector2::new(2, 2), vec![0; 15]);
        assert!(image.validate().is_err());

        let image = ImageSample::new(Vector2::new(2, 2), vec![0; 16]);
        assert!(image.validate().is_ok());
    }
}
