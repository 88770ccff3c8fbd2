pub use crate::backends::{self, Device};
pub use crate::context::GraphicsContext;
pub use crate::errors::{Error, Result};
pub use crate::framebuffer::FramebufferManager;
pub use crate::geometry::{GeometryBuffer, QUAD_VERTICES};
pub use crate::math::{Color, Vector2};
pub use crate::pass::{PassParams, RenderPass};
pub use crate::shader::{ShaderProgram, ShaderStage, UnlinkedProgram};
pub use crate::surface::{Surface, SurfaceBinder};
pub use crate::texture::{ImageSample, Texture, TextureLoader};
