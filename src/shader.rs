//! Shader program lifecycle: per-stage compilation, linking, and name-based
//! resolution of attribute and uniform slots.
//!
//! The two-step `compile` / `link` split mirrors the driver's own state
//! machine, and the type split between [`UnlinkedProgram`] and
//! [`ShaderProgram`] keeps the invariant that slot lookups only ever happen
//! against a successfully linked program.

use std::fmt;

use crate::backends::{Device, ProgramId};
use crate::errors::Result;

/// Vertex position input, three floats per vertex.
pub const POSITION: &str = "position";
/// Texture coordinate input, two floats per vertex.
pub const TEXT_COORDINATE: &str = "textCoordinate";
/// The sampler uniform, bound to texture unit 0.
pub const COLOR_MAP: &str = "colorMap";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// A per-vertex input location resolved by name from a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSlot(pub u32);

/// A per-draw constant location resolved by name from a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot(pub i32);

/// A program object with both stages compiled and attached, but not yet
/// linked. Slot lookups are not available in this state.
#[derive(Debug)]
pub struct UnlinkedProgram {
    id: ProgramId,
}

impl UnlinkedProgram {
    /// Compiles both stages independently and attaches them to a fresh
    /// program object. A failure in either stage carries that stage and its
    /// diagnostic log in the error, and leaves no shader object behind.
    ///
    /// The shader objects are released as soon as they are attached; the
    /// driver keeps them alive for the lifetime of the program.
    pub fn compile(device: &mut dyn Device, vs: &str, fs: &str) -> Result<UnlinkedProgram> {
        let vs = unsafe { device.compile_shader(ShaderStage::Vertex, vs)? };
        let fs = match unsafe { device.compile_shader(ShaderStage::Fragment, fs) } {
            Ok(fs) => fs,
            Err(err) => {
                let _ = unsafe { device.delete_shader(vs) };
                return Err(err);
            }
        };

        let id = unsafe { device.create_program(vs, fs)? };
        Ok(UnlinkedProgram { id })
    }

    /// Inspects the link status. On failure the program is deleted and the
    /// link log is carried in the error; it must never reach a draw call.
    pub fn link(self, device: &mut dyn Device) -> Result<ShaderProgram> {
        match unsafe { device.link_program(self.id) } {
            Ok(()) => {
                info!("[ShaderProgram] links {}.", self.id);
                Ok(ShaderProgram { id: self.id })
            }
            Err(err) => {
                let _ = unsafe { device.delete_program(self.id) };
                Err(err)
            }
        }
    }
}

/// A successfully linked program, safe to bind and resolve slots against.
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
}

impl ShaderProgram {
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn bind(&self, device: &mut dyn Device) -> Result<()> {
        unsafe { device.bind_program(self.id) }
    }

    /// Resolves a vertex attribute by name. Absent names yield `None`;
    /// callers decide whether that is fatal for their pipeline.
    pub fn locate(&self, device: &mut dyn Device, name: &str) -> Result<Option<AttributeSlot>> {
        unsafe { device.attribute_location(self.id, name) }
    }

    pub fn locate_uniform(
        &self,
        device: &mut dyn Device,
        name: &str,
    ) -> Result<Option<UniformSlot>> {
        unsafe { device.uniform_location(self.id, name) }
    }

    pub fn release(self, device: &mut dyn Device) -> Result<()> {
        unsafe { device.delete_program(self.id) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }
}
