//! A device without a GPU behind it, used wherever the pipeline has to run
//! with no GL context: tests, CI, and the allocation accounting they need.
//!
//! Every resource class keeps created/deleted tallies, uploads are stored
//! verbatim, and shader sources are scanned for their declarations so that
//! compile, link and name lookups behave like a driver's. The draw call
//! rasterizes the one shape this pipeline knows, the full-surface quad,
//! by sampling the bound texture at its nearest texel.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::backends::{
    BufferHint, BufferId, Device, FrameBufferId, Primitive, ProgramId, RenderBufferId, ShaderId,
    TextureId,
};
use crate::errors::{Error, Result};
use crate::math::{Color, Vector2};
use crate::shader::{AttributeSlot, ShaderStage, UniformSlot};
use crate::surface::SurfaceFormat;
use crate::texture::{TextureParams, BYTES_PER_TEXEL};

/// Created/deleted tallies for one resource class.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResourceStats {
    pub created: usize,
    pub deleted: usize,
}

impl ResourceStats {
    pub fn alive(&self) -> usize {
        self.created - self.deleted
    }
}

/// Tallies for every resource class the device hands out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessStats {
    pub render_buffers: ResourceStats,
    pub frame_buffers: ResourceStats,
    pub shaders: ResourceStats,
    pub programs: ResourceStats,
    pub buffers: ResourceStats,
    pub textures: ResourceStats,
}

/// One recorded draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub primitive: Primitive,
    pub first: u32,
    pub count: u32,
}

/// The frame most recently handed to the surface. Pixels are RGBA8 in GL
/// framebuffer convention: row 0 is the bottom of the displayed image.
#[derive(Debug, Clone)]
pub struct PresentedFrame {
    pub dimensions: Vector2<u32>,
    pub pixels: Vec<u8>,
}

impl PresentedFrame {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y * self.dimensions.x + x) as usize * BYTES_PER_TEXEL;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ]
    }
}

#[derive(Debug, Clone)]
struct HeadlessShader {
    stage: ShaderStage,
    attributes: Vec<String>,
    uniforms: Vec<String>,
    varyings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct HeadlessProgram {
    linked: bool,
    attributes: Vec<String>,
    uniforms: Vec<String>,
    vertex_varyings: Vec<String>,
    fragment_varyings: Vec<String>,
}

#[derive(Debug, Clone)]
struct HeadlessRenderBuffer {
    dimensions: Vector2<u32>,
    pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
struct HeadlessBuffer {
    hint: BufferHint,
    bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
struct HeadlessTexture {
    params: TextureParams,
    texels: Vec<u8>,
}

pub struct HeadlessDevice {
    next_id: u32,
    render_buffers: HashMap<u32, HeadlessRenderBuffer>,
    frame_buffers: HashMap<u32, RenderBufferId>,
    shaders: HashMap<u32, HeadlessShader>,
    programs: HashMap<u32, HeadlessProgram>,
    buffers: HashMap<u32, HeadlessBuffer>,
    textures: HashMap<u32, HeadlessTexture>,

    bound_frame_buffer: Option<FrameBufferId>,
    bound_program: Option<ProgramId>,
    bound_vertex_buffer: Option<BufferId>,
    bound_textures: SmallVec<[Option<TextureId>; 8]>,
    viewport: Option<Vector2<u32>>,

    stats: HeadlessStats,
    draws: Vec<DrawCommand>,
    uniform_writes: Vec<(UniformSlot, i32)>,
    presented: Option<PresentedFrame>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        HeadlessDevice::new()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        HeadlessDevice {
            next_id: 0,
            render_buffers: HashMap::new(),
            frame_buffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            bound_frame_buffer: None,
            bound_program: None,
            bound_vertex_buffer: None,
            bound_textures: SmallVec::new(),
            viewport: None,
            stats: HeadlessStats::default(),
            draws: Vec::new(),
            uniform_writes: Vec::new(),
            presented: None,
        }
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }

    pub fn draws(&self) -> &[DrawCommand] {
        &self.draws
    }

    pub fn uniform_writes(&self) -> &[(UniformSlot, i32)] {
        &self.uniform_writes
    }

    pub fn presented(&self) -> Option<&PresentedFrame> {
        self.presented.as_ref()
    }

    pub fn vertex_buffer(&self, id: BufferId) -> Option<(BufferHint, &[u8])> {
        self.buffers.get(&id.0).map(|v| (v.hint, &v.bytes[..]))
    }

    pub fn texture(&self, id: TextureId) -> Option<(TextureParams, &[u8])> {
        self.textures.get(&id.0).map(|v| (v.params, &v.texels[..]))
    }
}

impl Device for HeadlessDevice {
    unsafe fn create_render_buffer(
        &mut self,
        dimensions: Vector2<u32>,
        _: SurfaceFormat,
    ) -> Result<RenderBufferId> {
        let id = self.allocate();
        let pixels = vec![0; dimensions.x as usize * dimensions.y as usize * BYTES_PER_TEXEL];

        self.render_buffers
            .insert(id, HeadlessRenderBuffer { dimensions, pixels });
        self.stats.render_buffers.created += 1;
        Ok(RenderBufferId(id))
    }

    unsafe fn delete_render_buffer(&mut self, id: RenderBufferId) -> Result<()> {
        self.render_buffers
            .remove(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live renderbuffer", id)))?;
        self.stats.render_buffers.deleted += 1;
        Ok(())
    }

    unsafe fn create_frame_buffer(&mut self, attachment: RenderBufferId) -> Result<FrameBufferId> {
        if !self.render_buffers.contains_key(&attachment.0) {
            return Err(Error::precondition(format!(
                "{} is not a live renderbuffer",
                attachment
            )));
        }

        let id = FrameBufferId(self.allocate());
        self.frame_buffers.insert(id.0, attachment);
        self.stats.frame_buffers.created += 1;
        self.bound_frame_buffer = Some(id);
        Ok(id)
    }

    unsafe fn bind_frame_buffer(&mut self, id: FrameBufferId) -> Result<()> {
        if !self.frame_buffers.contains_key(&id.0) {
            return Err(Error::precondition(format!(
                "{} is not a live framebuffer",
                id
            )));
        }

        self.bound_frame_buffer = Some(id);
        Ok(())
    }

    unsafe fn delete_frame_buffer(&mut self, id: FrameBufferId) -> Result<()> {
        self.frame_buffers
            .remove(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live framebuffer", id)))?;

        if self.bound_frame_buffer == Some(id) {
            self.bound_frame_buffer = None;
        }

        self.stats.frame_buffers.deleted += 1;
        Ok(())
    }

    unsafe fn compile_shader(&mut self, stage: ShaderStage, src: &str) -> Result<ShaderId> {
        let shader = parse_stage(stage, src).map_err(|log| Error::CompileFailure(stage, log))?;

        let id = self.allocate();
        self.shaders.insert(id, shader);
        self.stats.shaders.created += 1;
        Ok(ShaderId(id))
    }

    unsafe fn delete_shader(&mut self, id: ShaderId) -> Result<()> {
        self.shaders
            .remove(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live shader", id)))?;
        self.stats.shaders.deleted += 1;
        Ok(())
    }

    unsafe fn create_program(&mut self, vs: ShaderId, fs: ShaderId) -> Result<ProgramId> {
        if self.shaders.get(&vs.0).map(|v| v.stage) != Some(ShaderStage::Vertex)
            || self.shaders.get(&fs.0).map(|v| v.stage) != Some(ShaderStage::Fragment)
        {
            return Err(Error::precondition(
                "a program needs one live vertex and one live fragment shader",
            ));
        }

        let vs = self.shaders.remove(&vs.0).unwrap();
        let fs = self.shaders.remove(&fs.0).unwrap();
        self.stats.shaders.deleted += 2;

        let mut uniforms = vs.uniforms;
        for name in fs.uniforms {
            if !uniforms.contains(&name) {
                uniforms.push(name);
            }
        }

        let id = self.allocate();
        self.programs.insert(
            id,
            HeadlessProgram {
                linked: false,
                attributes: vs.attributes,
                uniforms,
                vertex_varyings: vs.varyings,
                fragment_varyings: fs.varyings,
            },
        );
        self.stats.programs.created += 1;
        Ok(ProgramId(id))
    }

    unsafe fn link_program(&mut self, id: ProgramId) -> Result<()> {
        let program = self
            .programs
            .get_mut(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live program", id)))?;

        for name in &program.fragment_varyings {
            if !program.vertex_varyings.contains(name) {
                return Err(Error::LinkFailure(format!(
                    "varying '{}' is not declared by the vertex shader",
                    name
                )));
            }
        }

        program.linked = true;
        Ok(())
    }

    unsafe fn bind_program(&mut self, id: ProgramId) -> Result<()> {
        match self.programs.get(&id.0) {
            Some(program) if program.linked => {}
            Some(_) => {
                return Err(Error::precondition(format!("{} is not linked", id)));
            }
            None => {
                return Err(Error::precondition(format!("{} is not a live program", id)));
            }
        }

        self.bound_program = Some(id);
        Ok(())
    }

    unsafe fn delete_program(&mut self, id: ProgramId) -> Result<()> {
        self.programs
            .remove(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live program", id)))?;

        if self.bound_program == Some(id) {
            self.bound_program = None;
        }

        self.stats.programs.deleted += 1;
        Ok(())
    }

    unsafe fn attribute_location(
        &mut self,
        id: ProgramId,
        name: &str,
    ) -> Result<Option<AttributeSlot>> {
        let program = self
            .programs
            .get(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live program", id)))?;

        if !program.linked {
            return Err(Error::precondition(
                "attribute lookup requires a successfully linked program",
            ));
        }

        Ok(program
            .attributes
            .iter()
            .position(|v| v == name)
            .map(|v| AttributeSlot(v as u32)))
    }

    unsafe fn uniform_location(
        &mut self,
        id: ProgramId,
        name: &str,
    ) -> Result<Option<UniformSlot>> {
        let program = self
            .programs
            .get(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live program", id)))?;

        if !program.linked {
            return Err(Error::precondition(
                "uniform lookup requires a successfully linked program",
            ));
        }

        Ok(program
            .uniforms
            .iter()
            .position(|v| v == name)
            .map(|v| UniformSlot(v as i32)))
    }

    unsafe fn bind_uniform_i32(&mut self, slot: UniformSlot, value: i32) -> Result<()> {
        if self.bound_program.is_none() {
            return Err(Error::precondition("no program is bound"));
        }

        self.uniform_writes.push((slot, value));
        Ok(())
    }

    unsafe fn create_vertex_buffer(&mut self, bytes: &[u8], hint: BufferHint) -> Result<BufferId> {
        let id = BufferId(self.allocate());
        self.buffers.insert(
            id.0,
            HeadlessBuffer {
                hint,
                bytes: bytes.to_vec(),
            },
        );
        self.stats.buffers.created += 1;
        self.bound_vertex_buffer = Some(id);
        Ok(id)
    }

    unsafe fn update_vertex_buffer(&mut self, id: BufferId, bytes: &[u8]) -> Result<()> {
        let buffer = self
            .buffers
            .get_mut(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live buffer", id)))?;

        if bytes.len() > buffer.bytes.len() {
            return Err(Error::precondition("vertex buffer update out of bounds"));
        }

        buffer.bytes[..bytes.len()].copy_from_slice(bytes);
        self.bound_vertex_buffer = Some(id);
        Ok(())
    }

    unsafe fn bind_vertex_buffer(&mut self, id: BufferId) -> Result<()> {
        if !self.buffers.contains_key(&id.0) {
            return Err(Error::precondition(format!("{} is not a live buffer", id)));
        }

        self.bound_vertex_buffer = Some(id);
        Ok(())
    }

    unsafe fn delete_vertex_buffer(&mut self, id: BufferId) -> Result<()> {
        self.buffers
            .remove(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live buffer", id)))?;

        if self.bound_vertex_buffer == Some(id) {
            self.bound_vertex_buffer = None;
        }

        self.stats.buffers.deleted += 1;
        Ok(())
    }

    unsafe fn bind_attribute(&mut self, _: AttributeSlot, _: u8, _: usize, _: usize) -> Result<()> {
        if self.bound_vertex_buffer.is_none() {
            return Err(Error::precondition("no vertex buffer is bound"));
        }

        Ok(())
    }

    unsafe fn create_texture(&mut self, params: TextureParams, bytes: &[u8]) -> Result<TextureId> {
        params.validate(bytes)?;

        let id = TextureId(self.allocate());
        self.textures.insert(
            id.0,
            HeadlessTexture {
                params,
                texels: bytes.to_vec(),
            },
        );
        self.stats.textures.created += 1;

        if self.bound_textures.is_empty() {
            self.bound_textures.resize(1, None);
        }
        self.bound_textures[0] = Some(id);
        Ok(id)
    }

    unsafe fn bind_texture(&mut self, unit: usize, id: TextureId) -> Result<()> {
        if !self.textures.contains_key(&id.0) {
            return Err(Error::precondition(format!("{} is not a live texture", id)));
        }

        if self.bound_textures.len() <= unit {
            self.bound_textures.resize(unit + 1, None);
        }

        self.bound_textures[unit] = Some(id);
        Ok(())
    }

    unsafe fn delete_texture(&mut self, id: TextureId) -> Result<()> {
        self.textures
            .remove(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live texture", id)))?;

        for v in self.bound_textures.iter_mut() {
            if *v == Some(id) {
                *v = None;
            }
        }

        self.stats.textures.deleted += 1;
        Ok(())
    }

    unsafe fn clear(&mut self, color: Color) -> Result<()> {
        let frame_buffer = self
            .bound_frame_buffer
            .ok_or_else(|| Error::precondition("no framebuffer is bound"))?;

        let attachment = self.frame_buffers[&frame_buffer.0];
        let render_buffer = self
            .render_buffers
            .get_mut(&attachment.0)
            .ok_or_else(|| Error::precondition("framebuffer attachment has been deleted"))?;

        let texel: [u8; 4] = color.into();
        for pixel in render_buffer.pixels.chunks_mut(BYTES_PER_TEXEL) {
            pixel.copy_from_slice(&texel);
        }

        Ok(())
    }

    unsafe fn set_viewport(&mut self, dimensions: Vector2<u32>) -> Result<()> {
        self.viewport = Some(dimensions);
        Ok(())
    }

    unsafe fn draw(&mut self, primitive: Primitive, first: u32, count: u32) -> Result<u32> {
        match self.bound_program {
            Some(id) if self.programs[&id.0].linked => {}
            _ => return Err(Error::precondition("no linked program is bound")),
        }

        if self.bound_vertex_buffer.is_none() {
            return Err(Error::precondition("no vertex buffer is bound"));
        }

        if count != 6 {
            return Err(Error::precondition(
                "the headless backend draws the six-vertex quad only",
            ));
        }

        let frame_buffer = self
            .bound_frame_buffer
            .ok_or_else(|| Error::precondition("no framebuffer is bound"))?;
        let viewport = self
            .viewport
            .ok_or_else(|| Error::precondition("no viewport is set"))?;

        let texture = self
            .bound_textures
            .first()
            .cloned()
            .unwrap_or(None)
            .ok_or_else(|| Error::precondition("no texture is bound to unit 0"))?;
        let texture = &self.textures[&texture.0];

        let attachment = self.frame_buffers[&frame_buffer.0];
        let render_buffer = self
            .render_buffers
            .get_mut(&attachment.0)
            .ok_or_else(|| Error::precondition("framebuffer attachment has been deleted"))?;

        // The quad spans clip space, so each covered pixel maps affinely to
        // UV and samples its nearest texel.
        let dims = render_buffer.dimensions;
        let width = viewport.x.min(dims.x);
        let height = viewport.y.min(dims.y);
        let tex_dims = texture.params.dimensions;

        for y in 0..height {
            for x in 0..width {
                let u = (x as f32 + 0.5) / width as f32;
                let v = (y as f32 + 0.5) / height as f32;
                let tx = ((u * tex_dims.x as f32) as u32).min(tex_dims.x - 1);
                let ty = ((v * tex_dims.y as f32) as u32).min(tex_dims.y - 1);

                let src = (ty * tex_dims.x + tx) as usize * BYTES_PER_TEXEL;
                let dst = (y * dims.x + x) as usize * BYTES_PER_TEXEL;
                render_buffer.pixels[dst..dst + BYTES_PER_TEXEL]
                    .copy_from_slice(&texture.texels[src..src + BYTES_PER_TEXEL]);
            }
        }

        self.draws.push(DrawCommand {
            primitive,
            first,
            count,
        });

        Ok(primitive.assemble(count))
    }

    unsafe fn present(&mut self, id: RenderBufferId) -> Result<()> {
        let render_buffer = self
            .render_buffers
            .get(&id.0)
            .ok_or_else(|| Error::precondition(format!("{} is not a live renderbuffer", id)))?;

        self.presented = Some(PresentedFrame {
            dimensions: render_buffer.dimensions,
            pixels: render_buffer.pixels.clone(),
        });

        Ok(())
    }
}

/// Scans one stage's source the way a front end would: an entry point,
/// balanced braces, and the declarations later name lookups resolve
/// against.
fn parse_stage(stage: ShaderStage, src: &str) -> ::std::result::Result<HeadlessShader, String> {
    if !src.contains("void main") {
        return Err(format!("0:1: missing entry point 'main' in {} shader", stage));
    }

    if src.matches('{').count() != src.matches('}').count() {
        return Err("0:1: syntax error, unbalanced braces".into());
    }

    let attributes = declared_names(src, "attribute");
    if stage == ShaderStage::Fragment && !attributes.is_empty() {
        return Err(format!(
            "0:1: storage qualifier 'attribute' is not allowed in {} shaders",
            stage
        ));
    }

    Ok(HeadlessShader {
        stage,
        attributes,
        uniforms: declared_names(src, "uniform"),
        varyings: declared_names(src, "varying"),
    })
}

/// Collects the identifiers declared with `qualifier`, in declaration
/// order. Precision qualifiers and types between the qualifier and the
/// name are skipped.
fn declared_names(src: &str, qualifier: &str) -> Vec<String> {
    let mut names = Vec::new();

    for line in src.lines() {
        let line = line.trim();
        let mut words = line.split_whitespace();
        if words.next() != Some(qualifier) {
            continue;
        }

        let line = match line.find(';') {
            Some(end) => &line[..end],
            None => continue,
        };

        if let Some(name) = line.split_whitespace().last() {
            names.push(name.to_string());
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_scan() {
        let src = "attribute vec4 position;\n\
                   attribute vec2 textCoordinate;\n\
                   varying lowp vec2 varyTextCoord;\n\
                   void main() {\n\
                       varyTextCoord = textCoordinate;\n\
                       gl_Position = position;\n\
                   }\n";

        assert_eq!(
            declared_names(src, "attribute"),
            vec!["position", "textCoordinate"]
        );
        assert_eq!(declared_names(src, "varying"), vec!["varyTextCoord"]);
        assert!(declared_names(src, "uniform").is_empty());
    }

    #[test]
    fn parse_rejects_missing_entry_point() {
        assert!(parse_stage(ShaderStage::Vertex, "attribute vec4 position;").is_err());
        assert!(parse_stage(ShaderStage::Fragment, "void main() {}").is_ok());
    }

    #[test]
    fn parse_rejects_attributes_in_fragment_stage() {
        let src = "attribute vec4 position;\nvoid main() {}\n";
        assert!(parse_stage(ShaderStage::Vertex, src).is_ok());
        assert!(parse_stage(ShaderStage::Fragment, src).is_err());
    }
}
