use gl;
use gl::types::*;

use crate::backends::{BufferHint, Primitive};
use crate::shader::ShaderStage;
use crate::surface::SurfaceFormat;
use crate::texture::{TextureFilter, TextureWrap};

impl From<SurfaceFormat> for GLenum {
    fn from(v: SurfaceFormat) -> Self {
        match v {
            SurfaceFormat::Rgba8 => gl::RGBA8,
        }
    }
}

impl From<BufferHint> for GLenum {
    fn from(v: BufferHint) -> Self {
        match v {
            BufferHint::Static => gl::STATIC_DRAW,
            BufferHint::Dynamic => gl::DYNAMIC_DRAW,
        }
    }
}

impl From<Primitive> for GLenum {
    fn from(v: Primitive) -> Self {
        match v {
            Primitive::Triangles => gl::TRIANGLES,
        }
    }
}

impl From<ShaderStage> for GLenum {
    fn from(v: ShaderStage) -> Self {
        match v {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        }
    }
}

impl From<TextureFilter> for GLenum {
    fn from(v: TextureFilter) -> Self {
        match v {
            TextureFilter::Nearest => gl::NEAREST,
            TextureFilter::Linear => gl::LINEAR,
        }
    }
}

impl From<TextureWrap> for GLenum {
    fn from(v: TextureWrap) -> Self {
        match v {
            TextureWrap::Repeat => gl::REPEAT,
            TextureWrap::Clamp => gl::CLAMP_TO_EDGE,
        }
    }
}
