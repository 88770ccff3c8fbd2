//! One frame: clear, viewport, bind everything, draw, present.
//!
//! The pass owns a single *generation* of GPU resources (program, slots,
//! vertex buffer and texture) keyed by a content fingerprint of its inputs.
//! When the inputs repeat, the generation is reused untouched; when they
//! change, the prior generation is released before the replacement is
//! built. Handles never accumulate across frames.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::backends::{Device, Primitive};
use crate::errors::{Error, Result};
use crate::framebuffer::FramebufferManager;
use crate::geometry::{GeometryBuffer, FLOATS_PER_VERTEX, VERTEX_COUNT};
use crate::math::Color;
use crate::shader::{self, AttributeSlot, ShaderProgram, UniformSlot, UnlinkedProgram};
use crate::surface::Surface;
use crate::texture::{ImageSample, Texture, TextureLoader};

/// The background color the pass clears to.
pub const CLEAR_COLOR: Color = Color {
    r: 0.9,
    g: 0.8,
    b: 0.5,
    a: 1.0,
};

/// Everything one frame consumes. Shader sources and vertices are borrowed
/// from the providers; the image is single-use and consumed by the pass.
pub struct PassParams<'a> {
    pub vertex_shader: &'a str,
    pub fragment_shader: &'a str,
    pub vertices: &'a [f32; VERTEX_COUNT * FLOATS_PER_VERTEX],
    pub image: ImageSample,
}

struct Generation {
    fingerprint: u64,
    program: ShaderProgram,
    position: AttributeSlot,
    text_coordinate: AttributeSlot,
    color_map: UniformSlot,
    geometry: GeometryBuffer,
    texture: Texture,
}

pub struct RenderPass {
    clear_color: Color,
    generation: Option<Generation>,
}

impl Default for RenderPass {
    fn default() -> Self {
        RenderPass::new()
    }
}

impl RenderPass {
    pub fn new() -> Self {
        RenderPass {
            clear_color: CLEAR_COLOR,
            generation: None,
        }
    }

    pub fn with_clear_color(clear_color: Color) -> Self {
        RenderPass {
            clear_color,
            generation: None,
        }
    }

    /// Executes one frame against the target built by `FramebufferManager`.
    /// Returns the number of vertices drawn.
    ///
    /// Any failure aborts the pass before the draw call; the previously
    /// presented frame stays intact.
    pub fn execute(
        &mut self,
        device: &mut dyn Device,
        surface: &Surface,
        target: &FramebufferManager,
        params: PassParams,
    ) -> Result<u32> {
        surface.validate()?;
        let frame_buffer = target.frame_buffer()?;
        let render_buffer = target.render_buffer()?;

        unsafe {
            device.bind_frame_buffer(frame_buffer)?;
            device.clear(self.clear_color)?;
            device.set_viewport(surface.device_dimensions())?;
        }

        let generation = self.materialize(device, params)?;
        generation.program.bind(device)?;
        generation
            .geometry
            .describe_layout(device, generation.position, generation.text_coordinate)?;
        generation.texture.bind(device, 0)?;

        let vertices = unsafe {
            device.bind_uniform_i32(generation.color_map, 0)?;
            let primitives = device.draw(Primitive::Triangles, 0, VERTEX_COUNT as u32)?;
            device.present(render_buffer)?;
            primitives * 3
        };

        Ok(vertices)
    }

    /// Releases the current generation's GPU handles, if any.
    pub fn release(&mut self, device: &mut dyn Device) -> Result<()> {
        if let Some(generation) = self.generation.take() {
            generation.texture.release(device)?;
            generation.geometry.release(device)?;
            generation.program.release(device)?;
        }

        Ok(())
    }

    /// Returns the cached generation when the fingerprint matches, or
    /// replaces it (release first, then allocate) when it does not.
    fn materialize(&mut self, device: &mut dyn Device, params: PassParams) -> Result<&Generation> {
        let fingerprint = fingerprint(&params);
        let hit = self
            .generation
            .as_ref()
            .map(|v| v.fingerprint == fingerprint)
            .unwrap_or(false);

        if !hit {
            self.release(device)?;
            let generation = Self::build(device, fingerprint, params)?;
            info!("[RenderPass] rebuilds generation {:#018x}.", fingerprint);
            self.generation = Some(generation);
        }

        Ok(self.generation.as_ref().unwrap())
    }

    fn build(
        device: &mut dyn Device,
        fingerprint: u64,
        params: PassParams,
    ) -> Result<Generation> {
        let program = UnlinkedProgram::compile(device, params.vertex_shader, params.fragment_shader)?
            .link(device)?;

        match Self::resolve_and_load(device, &program, params.vertices, params.image) {
            Ok((position, text_coordinate, color_map, geometry, texture)) => Ok(Generation {
                fingerprint,
                program,
                position,
                text_coordinate,
                color_map,
                geometry,
                texture,
            }),
            Err(err) => {
                let _ = program.release(device);
                Err(err)
            }
        }
    }

    /// Resolves the required slots and uploads geometry and texture.
    /// Unresolved required names are hard errors surfaced before any draw.
    fn resolve_and_load(
        device: &mut dyn Device,
        program: &ShaderProgram,
        vertices: &[f32; VERTEX_COUNT * FLOATS_PER_VERTEX],
        image: ImageSample,
    ) -> Result<(AttributeSlot, AttributeSlot, UniformSlot, GeometryBuffer, Texture)> {
        let position = program
            .locate(device, shader::POSITION)?
            .ok_or_else(|| Error::AttributeUndefined(shader::POSITION.into()))?;

        let text_coordinate = program
            .locate(device, shader::TEXT_COORDINATE)?
            .ok_or_else(|| Error::AttributeUndefined(shader::TEXT_COORDINATE.into()))?;

        let color_map = program
            .locate_uniform(device, shader::COLOR_MAP)?
            .ok_or_else(|| Error::UniformUndefined(shader::COLOR_MAP.into()))?;

        let geometry = GeometryBuffer::upload(device, vertices)?;
        let texture = match TextureLoader::load(device, image) {
            Ok(texture) => texture,
            Err(err) => {
                let _ = geometry.release(device);
                return Err(err);
            }
        };

        Ok((position, text_coordinate, color_map, geometry, texture))
    }
}

fn fingerprint(params: &PassParams) -> u64 {
    let mut hasher = DefaultHasher::new();
    params.vertex_shader.hash(&mut hasher);
    params.fragment_shader.hash(&mut hasher);

    for v in params.vertices.iter() {
        v.to_bits().hash(&mut hasher);
    }

    params.image.dimensions.x.hash(&mut hasher);
    params.image.dimensions.y.hash(&mut hasher);
    params.image.bytes.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::QUAD_VERTICES;
    use crate::math::Vector2;

    fn params<'a>(image: ImageSample) -> PassParams<'a> {
        PassParams {
            vertex_shader: "void main() {}",
            fragment_shader: "void main() {}",
            vertices: &QUAD_VERTICES,
            image,
        }
    }

    #[test]
    fn fingerprint_is_content_addressed() {
        let image = ImageSample::new(Vector2::new(1, 1), vec![1, 2, 3, 4]);
        let a = fingerprint(&params(image.clone()));
        let b = fingerprint(&params(image));
        assert_eq!(a, b);

        let other = ImageSample::new(Vector2::new(1, 1), vec![9, 9, 9, 9]);
        assert_ne!(a, fingerprint(&params(other)));
    }
}
