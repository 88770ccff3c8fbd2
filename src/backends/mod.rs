//! The backend of the pipeline, responsible for only one thing: issuing
//! resource and draw commands through low-level video APIs.
//!
//! Components never talk to OpenGL directly; they go through the [`Device`]
//! trait so that the same pipeline code runs against the production GL
//! backend and the headless tracking backend used in tests.

pub mod gl;
pub mod headless;

use crate::errors::Result;
use crate::math::{Color, Vector2};
use crate::shader::{AttributeSlot, ShaderStage, UniformSlot};
use crate::surface::SurfaceFormat;
use crate::texture::TextureParams;

macro_rules! impl_id {
    ($name:ident) => {
        /// Opaque device handle. The id is only meaningful to the device
        /// that issued it.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

impl_id!(RenderBufferId);
impl_id!(FrameBufferId);
impl_id!(ShaderId);
impl_id!(ProgramId);
impl_id!(BufferId);
impl_id!(TextureId);

/// Hint abouts the intended update strategy of a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferHint {
    /// The buffer is written once and drawn many times.
    Static,
    /// The buffer is expected to be re-uploaded.
    Dynamic,
}

/// The primitive the draw call assembles vertices into. The pipeline draws
/// a triangle list, never a strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
}

impl Primitive {
    /// Number of primitives assembled from `vertices`.
    pub fn assemble(self, vertices: u32) -> u32 {
        match self {
            Primitive::Triangles => vertices / 3,
        }
    }
}

pub trait Device {
    /// Allocates a color renderbuffer with `format` storage at `dimensions`
    /// device pixels.
    unsafe fn create_render_buffer(
        &mut self,
        dimensions: Vector2<u32>,
        format: SurfaceFormat,
    ) -> Result<RenderBufferId>;

    unsafe fn delete_render_buffer(&mut self, id: RenderBufferId) -> Result<()>;

    /// Allocates a framebuffer with `attachment` as its sole color target,
    /// leaving it bound.
    unsafe fn create_frame_buffer(&mut self, attachment: RenderBufferId) -> Result<FrameBufferId>;

    unsafe fn bind_frame_buffer(&mut self, id: FrameBufferId) -> Result<()>;

    unsafe fn delete_frame_buffer(&mut self, id: FrameBufferId) -> Result<()>;

    /// Compiles one shader stage. On failure the bounded diagnostic log is
    /// carried in the error, and no shader object survives.
    unsafe fn compile_shader(&mut self, stage: ShaderStage, src: &str) -> Result<ShaderId>;

    unsafe fn delete_shader(&mut self, id: ShaderId) -> Result<()>;

    /// Creates a program with both stages attached. The shader objects are
    /// released here; the driver keeps them alive until the program goes.
    unsafe fn create_program(&mut self, vs: ShaderId, fs: ShaderId) -> Result<ProgramId>;

    unsafe fn link_program(&mut self, id: ProgramId) -> Result<()>;

    unsafe fn bind_program(&mut self, id: ProgramId) -> Result<()>;

    unsafe fn delete_program(&mut self, id: ProgramId) -> Result<()>;

    /// Resolves a vertex attribute by name. Returns `None` for names absent
    /// from the linked program. Lookups against unlinked programs are
    /// refused.
    unsafe fn attribute_location(
        &mut self,
        id: ProgramId,
        name: &str,
    ) -> Result<Option<AttributeSlot>>;

    unsafe fn uniform_location(&mut self, id: ProgramId, name: &str)
        -> Result<Option<UniformSlot>>;

    /// Sets an i32 uniform on the currently bound program.
    unsafe fn bind_uniform_i32(&mut self, slot: UniformSlot, value: i32) -> Result<()>;

    unsafe fn create_vertex_buffer(&mut self, bytes: &[u8], hint: BufferHint) -> Result<BufferId>;

    unsafe fn update_vertex_buffer(&mut self, id: BufferId, bytes: &[u8]) -> Result<()>;

    unsafe fn bind_vertex_buffer(&mut self, id: BufferId) -> Result<()>;

    unsafe fn delete_vertex_buffer(&mut self, id: BufferId) -> Result<()>;

    /// Declares how `slot` reads from the bound vertex buffer: `components`
    /// floats per vertex, `stride` bytes between vertices, starting at
    /// `offset` bytes.
    unsafe fn bind_attribute(
        &mut self,
        slot: AttributeSlot,
        components: u8,
        stride: usize,
        offset: usize,
    ) -> Result<()>;

    unsafe fn create_texture(&mut self, params: TextureParams, bytes: &[u8]) -> Result<TextureId>;

    unsafe fn bind_texture(&mut self, unit: usize, id: TextureId) -> Result<()>;

    unsafe fn delete_texture(&mut self, id: TextureId) -> Result<()>;

    unsafe fn clear(&mut self, color: Color) -> Result<()>;

    unsafe fn set_viewport(&mut self, dimensions: Vector2<u32>) -> Result<()>;

    /// Issues one draw call of `count` vertices starting at `first`.
    /// Returns the number of primitives assembled.
    unsafe fn draw(&mut self, primitive: Primitive, first: u32, count: u32) -> Result<u32>;

    /// Presents `id` to the surface the device was created against.
    unsafe fn present(&mut self, id: RenderBufferId) -> Result<()>;
}

/// Creates the headless backend. It tracks every resource operation and
/// simulates enough of the pipeline to test against without a GL context.
pub fn new_headless() -> Box<dyn Device> {
    Box::new(self::headless::HeadlessDevice::new())
}
