//! The quad geometry: six vertices, two triangles, interleaved position and
//! texture coordinate.
//!
//! The layout is immutable for this pipeline: 3 position floats followed by
//! 2 texcoord floats per vertex, stride 5 floats. The buffer is uploaded
//! with a dynamic usage hint since the design re-uploads rather than
//! caching across surfaces.

use std::mem;
use std::slice;

use crate::backends::{BufferHint, BufferId, Device};
use crate::errors::Result;
use crate::shader::AttributeSlot;

pub const VERTEX_COUNT: usize = 6;
pub const FLOATS_PER_VERTEX: usize = 5;

const POSITION_COMPONENTS: u8 = 3;
const TEXCOORD_COMPONENTS: u8 = 2;
const STRIDE: usize = FLOATS_PER_VERTEX * mem::size_of::<f32>();
const TEXCOORD_OFFSET: usize = POSITION_COMPONENTS as usize * mem::size_of::<f32>();

/// The full-surface quad as two counter-clockwise triangles, texture
/// coordinates running from (0, 0) at the bottom-left corner of clip space
/// to (1, 1) at the top-right.
pub const QUAD_VERTICES: [f32; VERTEX_COUNT * FLOATS_PER_VERTEX] = [
    1.0, -1.0, 0.0, 1.0, 0.0, // right bottom
    1.0, 1.0, 0.0, 1.0, 1.0, // right top
    -1.0, 1.0, 0.0, 0.0, 1.0, // left top
    1.0, -1.0, 0.0, 1.0, 0.0, // right bottom
    -1.0, 1.0, 0.0, 0.0, 1.0, // left top
    -1.0, -1.0, 0.0, 0.0, 0.0, // left bottom
];

fn as_bytes(vertices: &[f32]) -> &[u8] {
    unsafe {
        slice::from_raw_parts(
            vertices.as_ptr() as *const u8,
            vertices.len() * mem::size_of::<f32>(),
        )
    }
}

/// GPU-side copy of the interleaved vertex array.
#[derive(Debug)]
pub struct GeometryBuffer {
    id: BufferId,
}

impl GeometryBuffer {
    /// Copies the fixed 30-float array into a fresh GPU buffer.
    pub fn upload(
        device: &mut dyn Device,
        vertices: &[f32; VERTEX_COUNT * FLOATS_PER_VERTEX],
    ) -> Result<GeometryBuffer> {
        let id = unsafe { device.create_vertex_buffer(as_bytes(vertices), BufferHint::Dynamic)? };
        Ok(GeometryBuffer { id })
    }

    /// Re-uploads into the existing buffer. Repeated refreshes with the
    /// same array leave the GPU-visible data byte-identical.
    pub fn refresh(
        &self,
        device: &mut dyn Device,
        vertices: &[f32; VERTEX_COUNT * FLOATS_PER_VERTEX],
    ) -> Result<()> {
        unsafe { device.update_vertex_buffer(self.id, as_bytes(vertices)) }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Binds the buffer and declares how the two attribute slots read from
    /// it. Must be called with slots resolved from a linked program.
    pub fn describe_layout(
        &self,
        device: &mut dyn Device,
        position: AttributeSlot,
        text_coordinate: AttributeSlot,
    ) -> Result<()> {
        unsafe {
            device.bind_vertex_buffer(self.id)?;
            device.bind_attribute(position, POSITION_COMPONENTS, STRIDE, 0)?;
            device.bind_attribute(text_coordinate, TEXCOORD_COMPONENTS, STRIDE, TEXCOORD_OFFSET)?;
        }

        Ok(())
    }

    pub fn release(self, device: &mut dyn Device) -> Result<()> {
        unsafe { device.delete_vertex_buffer(self.id) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_layout() {
        assert_eq!(
            mem::size_of_val(&QUAD_VERTICES),
            VERTEX_COUNT * FLOATS_PER_VERTEX * mem::size_of::<f32>()
        );

        // Every texcoord is the position corner remapped from [-1, 1] to [0, 1].
        for vertex in QUAD_VERTICES.chunks(FLOATS_PER_VERTEX) {
            assert_eq!(vertex[3], (vertex[0] + 1.0) * 0.5);
            assert_eq!(vertex[4], (vertex[1] + 1.0) * 0.5);
        }
    }

    #[test]
    fn byte_view() {
        let bytes = as_bytes(&QUAD_VERTICES);
        assert_eq!(bytes.len(), 120);
        assert_eq!(&bytes[0..4], &1.0f32.to_bits().to_ne_bytes()[..]);
    }
}
