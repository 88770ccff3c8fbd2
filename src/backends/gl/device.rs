use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::c_void;
use std::ptr;

use gl;
use gl::types::*;
use smallvec::SmallVec;

use crate::backends::{
    BufferHint, BufferId, Device, FrameBufferId, Primitive, ProgramId, RenderBufferId, ShaderId,
    TextureId,
};
use crate::errors::{Error, Result};
use crate::math::{Color, Vector2};
use crate::shader::{AttributeSlot, ShaderStage, UniformSlot};
use crate::surface::SurfaceFormat;
use crate::texture::TextureParams;

/// Default upper bound on captured compile/link diagnostics. Longer driver
/// logs are truncated; truncation never fails the capture.
pub const DEFAULT_LOG_CAPACITY: usize = 512;

/// Presents the currently bound renderbuffer to the surface. Returns false
/// when the host could not present.
pub type Presenter = Box<dyn FnMut() -> bool>;

/// The bind state of one pipeline, carried explicitly so that two devices
/// never share bindings through ambient globals. Used to elide redundant
/// binds the way a driver would not.
#[derive(Debug, Default)]
struct PipelineState {
    frame_buffer: Option<FrameBufferId>,
    render_buffer: Option<RenderBufferId>,
    program: Option<ProgramId>,
    vertex_buffer: Option<BufferId>,
    texture_unit: usize,
    textures: SmallVec<[Option<TextureId>; 8]>,
    viewport: Option<Vector2<u32>>,
    clear_color: Option<Color>,
}

pub struct GlDevice {
    state: PipelineState,
    shaders: HashMap<GLuint, ShaderStage>,
    programs: HashMap<GLuint, bool>,
    presenter: Presenter,
    log_capacity: usize,
}

impl GlDevice {
    /// Loads the GL function pointers through `loader` and prepares the
    /// device. The host's context must be current on the calling thread.
    pub unsafe fn new<F>(loader: F, presenter: Presenter) -> Result<Self>
    where
        F: FnMut(&str) -> *const c_void,
    {
        gl::load_with(loader);
        gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
        gl::Disable(gl::DEPTH_TEST);
        gl::Disable(gl::CULL_FACE);
        check()?;

        Ok(GlDevice {
            state: PipelineState::default(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            presenter,
            log_capacity: DEFAULT_LOG_CAPACITY,
        })
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity.max(1);
        self
    }
}

impl Device for GlDevice {
    unsafe fn create_render_buffer(
        &mut self,
        dimensions: Vector2<u32>,
        format: SurfaceFormat,
    ) -> Result<RenderBufferId> {
        let mut id = 0;
        gl::GenRenderbuffers(1, &mut id);
        if id == 0 {
            return Err(Error::Device("failed to generate renderbuffer".into()));
        }

        gl::BindRenderbuffer(gl::RENDERBUFFER, id);
        gl::RenderbufferStorage(
            gl::RENDERBUFFER,
            format.into(),
            dimensions.x as GLsizei,
            dimensions.y as GLsizei,
        );
        check()?;

        let id = RenderBufferId(id);
        self.state.render_buffer = Some(id);
        Ok(id)
    }

    unsafe fn delete_render_buffer(&mut self, id: RenderBufferId) -> Result<()> {
        if self.state.render_buffer == Some(id) {
            self.state.render_buffer = None;
        }

        gl::DeleteRenderbuffers(1, &id.0);
        check()
    }

    unsafe fn create_frame_buffer(&mut self, attachment: RenderBufferId) -> Result<FrameBufferId> {
        let mut id = 0;
        gl::GenFramebuffers(1, &mut id);
        if id == 0 {
            return Err(Error::Device("failed to generate framebuffer".into()));
        }

        gl::BindFramebuffer(gl::FRAMEBUFFER, id);
        gl::FramebufferRenderbuffer(
            gl::FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::RENDERBUFFER,
            attachment.0,
        );

        let status = gl::CheckFramebufferStatus(gl::FRAMEBUFFER);
        if status != gl::FRAMEBUFFER_COMPLETE {
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
            gl::DeleteFramebuffers(1, &id);
            self.state.frame_buffer = None;

            return Err(Error::Device(match status {
                gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => {
                    "framebuffer attachment is incomplete".into()
                }
                gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => {
                    "no images are attached to the framebuffer".into()
                }
                gl::FRAMEBUFFER_UNSUPPORTED => {
                    "the combination of attached formats is unsupported".into()
                }
                _ => format!("framebuffer is incomplete ({:#x})", status),
            }));
        }

        check()?;

        let id = FrameBufferId(id);
        self.state.frame_buffer = Some(id);
        Ok(id)
    }

    unsafe fn bind_frame_buffer(&mut self, id: FrameBufferId) -> Result<()> {
        if self.state.frame_buffer == Some(id) {
            return Ok(());
        }

        gl::BindFramebuffer(gl::FRAMEBUFFER, id.0);
        check()?;

        self.state.frame_buffer = Some(id);
        Ok(())
    }

    unsafe fn delete_frame_buffer(&mut self, id: FrameBufferId) -> Result<()> {
        if self.state.frame_buffer == Some(id) {
            self.state.frame_buffer = None;
        }

        gl::DeleteFramebuffers(1, &id.0);
        check()
    }

    unsafe fn compile_shader(&mut self, stage: ShaderStage, src: &str) -> Result<ShaderId> {
        let id = gl::CreateShader(stage.into());
        if id == 0 {
            return Err(Error::Device("failed to create shader object".into()));
        }

        let src = CString::new(src)
            .map_err(|_| Error::Device("shader source contains a NUL byte".into()))?;
        gl::ShaderSource(id, 1, &src.as_ptr(), ptr::null());
        gl::CompileShader(id);

        let mut status = GLint::from(gl::FALSE);
        gl::GetShaderiv(id, gl::COMPILE_STATUS, &mut status);
        if status != GLint::from(gl::TRUE) {
            let log = shader_log(id, self.log_capacity);
            gl::DeleteShader(id);
            return Err(Error::CompileFailure(stage, log));
        }

        check()?;
        self.shaders.insert(id, stage);
        Ok(ShaderId(id))
    }

    unsafe fn delete_shader(&mut self, id: ShaderId) -> Result<()> {
        self.shaders.remove(&id.0);
        gl::DeleteShader(id.0);
        check()
    }

    unsafe fn create_program(&mut self, vs: ShaderId, fs: ShaderId) -> Result<ProgramId> {
        if self.shaders.get(&vs.0) != Some(&ShaderStage::Vertex)
            || self.shaders.get(&fs.0) != Some(&ShaderStage::Fragment)
        {
            return Err(Error::precondition(
                "a program needs one live vertex and one live fragment shader",
            ));
        }

        let id = gl::CreateProgram();
        if id == 0 {
            return Err(Error::Device("failed to create program object".into()));
        }

        gl::AttachShader(id, vs.0);
        gl::AttachShader(id, fs.0);

        // Attached shaders live as long as the program; the standalone
        // objects have no further value.
        gl::DeleteShader(vs.0);
        gl::DeleteShader(fs.0);
        self.shaders.remove(&vs.0);
        self.shaders.remove(&fs.0);
        check()?;

        self.programs.insert(id, false);
        Ok(ProgramId(id))
    }

    unsafe fn link_program(&mut self, id: ProgramId) -> Result<()> {
        if !self.programs.contains_key(&id.0) {
            return Err(Error::precondition(format!("{} is not a live program", id)));
        }

        gl::LinkProgram(id.0);

        let mut status = GLint::from(gl::FALSE);
        gl::GetProgramiv(id.0, gl::LINK_STATUS, &mut status);
        if status != GLint::from(gl::TRUE) {
            return Err(Error::LinkFailure(program_log(id.0, self.log_capacity)));
        }

        check()?;
        self.programs.insert(id.0, true);
        Ok(())
    }

    unsafe fn bind_program(&mut self, id: ProgramId) -> Result<()> {
        match self.programs.get(&id.0) {
            Some(true) => {}
            Some(false) => {
                return Err(Error::precondition(format!("{} is not linked", id)));
            }
            None => {
                return Err(Error::precondition(format!("{} is not a live program", id)));
            }
        }

        if self.state.program == Some(id) {
            return Ok(());
        }

        gl::UseProgram(id.0);
        check()?;

        self.state.program = Some(id);
        Ok(())
    }

    unsafe fn delete_program(&mut self, id: ProgramId) -> Result<()> {
        self.programs.remove(&id.0);
        if self.state.program == Some(id) {
            self.state.program = None;
        }

        gl::DeleteProgram(id.0);
        check()
    }

    unsafe fn attribute_location(
        &mut self,
        id: ProgramId,
        name: &str,
    ) -> Result<Option<AttributeSlot>> {
        if self.programs.get(&id.0) != Some(&true) {
            return Err(Error::precondition(
                "attribute lookup requires a successfully linked program",
            ));
        }

        let c_name = CString::new(name)
            .map_err(|_| Error::Device("attribute name contains a NUL byte".into()))?;
        let location = gl::GetAttribLocation(id.0, c_name.as_ptr());
        check()?;

        if location < 0 {
            Ok(None)
        } else {
            Ok(Some(AttributeSlot(location as u32)))
        }
    }

    unsafe fn uniform_location(
        &mut self,
        id: ProgramId,
        name: &str,
    ) -> Result<Option<UniformSlot>> {
        if self.programs.get(&id.0) != Some(&true) {
            return Err(Error::precondition(
                "uniform lookup requires a successfully linked program",
            ));
        }

        let c_name = CString::new(name)
            .map_err(|_| Error::Device("uniform name contains a NUL byte".into()))?;
        let location = gl::GetUniformLocation(id.0, c_name.as_ptr());
        check()?;

        if location < 0 {
            Ok(None)
        } else {
            Ok(Some(UniformSlot(location)))
        }
    }

    unsafe fn bind_uniform_i32(&mut self, slot: UniformSlot, value: i32) -> Result<()> {
        if self.state.program.is_none() {
            return Err(Error::precondition("no program is bound"));
        }

        gl::Uniform1i(slot.0, value);
        check()
    }

    unsafe fn create_vertex_buffer(&mut self, bytes: &[u8], hint: BufferHint) -> Result<BufferId> {
        let mut id = 0;
        gl::GenBuffers(1, &mut id);
        if id == 0 {
            return Err(Error::Device("failed to generate buffer".into()));
        }

        gl::BindBuffer(gl::ARRAY_BUFFER, id);

        let ptr = if bytes.is_empty() {
            ptr::null()
        } else {
            bytes.as_ptr() as *const c_void
        };

        gl::BufferData(gl::ARRAY_BUFFER, bytes.len() as GLsizeiptr, ptr, hint.into());
        check()?;

        let id = BufferId(id);
        self.state.vertex_buffer = Some(id);
        Ok(id)
    }

    unsafe fn update_vertex_buffer(&mut self, id: BufferId, bytes: &[u8]) -> Result<()> {
        self.bind_vertex_buffer(id)?;
        gl::BufferSubData(
            gl::ARRAY_BUFFER,
            0,
            bytes.len() as GLsizeiptr,
            bytes.as_ptr() as *const c_void,
        );
        check()
    }

    unsafe fn bind_vertex_buffer(&mut self, id: BufferId) -> Result<()> {
        if self.state.vertex_buffer == Some(id) {
            return Ok(());
        }

        gl::BindBuffer(gl::ARRAY_BUFFER, id.0);
        check()?;

        self.state.vertex_buffer = Some(id);
        Ok(())
    }

    unsafe fn delete_vertex_buffer(&mut self, id: BufferId) -> Result<()> {
        if self.state.vertex_buffer == Some(id) {
            self.state.vertex_buffer = None;
        }

        gl::DeleteBuffers(1, &id.0);
        check()
    }

    unsafe fn bind_attribute(
        &mut self,
        slot: AttributeSlot,
        components: u8,
        stride: usize,
        offset: usize,
    ) -> Result<()> {
        if self.state.vertex_buffer.is_none() {
            return Err(Error::precondition("no vertex buffer is bound"));
        }

        gl::EnableVertexAttribArray(slot.0);
        gl::VertexAttribPointer(
            slot.0,
            GLint::from(components),
            gl::FLOAT,
            gl::FALSE,
            stride as GLsizei,
            offset as *const c_void,
        );
        check()
    }

    unsafe fn create_texture(&mut self, params: TextureParams, bytes: &[u8]) -> Result<TextureId> {
        params.validate(bytes)?;

        let mut id = 0;
        gl::GenTextures(1, &mut id);
        if id == 0 {
            return Err(Error::Device("failed to generate texture".into()));
        }

        let id = TextureId(id);
        self.bind_texture(0, id)?;

        let wrap: GLenum = params.wrap.into();
        let filter: GLenum = params.filter.into();
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, filter as GLint);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, filter as GLint);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, wrap as GLint);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, wrap as GLint);

        gl::TexImage2D(
            gl::TEXTURE_2D,
            0,
            gl::RGBA8 as GLint,
            params.dimensions.x as GLsizei,
            params.dimensions.y as GLsizei,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            bytes.as_ptr() as *const c_void,
        );
        check()?;

        Ok(id)
    }

    unsafe fn bind_texture(&mut self, unit: usize, id: TextureId) -> Result<()> {
        if self.state.texture_unit != unit {
            self.state.texture_unit = unit;
            gl::ActiveTexture(gl::TEXTURE0 + unit as GLuint);
        }

        if self.state.textures.len() <= unit {
            self.state.textures.resize(unit + 1, None);
        }

        if self.state.textures[unit] != Some(id) {
            self.state.textures[unit] = Some(id);
            gl::BindTexture(gl::TEXTURE_2D, id.0);
        }

        check()
    }

    unsafe fn delete_texture(&mut self, id: TextureId) -> Result<()> {
        for v in self.state.textures.iter_mut() {
            if *v == Some(id) {
                *v = None;
            }
        }

        gl::DeleteTextures(1, &id.0);
        check()
    }

    unsafe fn clear(&mut self, color: Color) -> Result<()> {
        if self.state.clear_color != Some(color) {
            gl::ClearColor(color.r, color.g, color.b, color.a);
            self.state.clear_color = Some(color);
        }

        gl::Clear(gl::COLOR_BUFFER_BIT);
        check()
    }

    unsafe fn set_viewport(&mut self, dimensions: Vector2<u32>) -> Result<()> {
        if self.state.viewport == Some(dimensions) {
            return Ok(());
        }

        gl::Viewport(0, 0, dimensions.x as GLsizei, dimensions.y as GLsizei);
        check()?;

        self.state.viewport = Some(dimensions);
        Ok(())
    }

    unsafe fn draw(&mut self, primitive: Primitive, first: u32, count: u32) -> Result<u32> {
        if self.state.program.is_none() {
            return Err(Error::precondition("no linked program is bound"));
        }

        if self.state.vertex_buffer.is_none() {
            return Err(Error::precondition("no vertex buffer is bound"));
        }

        gl::DrawArrays(primitive.into(), first as GLint, count as GLsizei);
        check()?;

        Ok(primitive.assemble(count))
    }

    unsafe fn present(&mut self, id: RenderBufferId) -> Result<()> {
        if self.state.render_buffer != Some(id) {
            gl::BindRenderbuffer(gl::RENDERBUFFER, id.0);
            self.state.render_buffer = Some(id);
        }

        check()?;

        if !(self.presenter)() {
            return Err(Error::PresentFailure);
        }

        Ok(())
    }
}

unsafe fn shader_log(id: GLuint, capacity: usize) -> String {
    let mut len = 0;
    gl::GetShaderiv(id, gl::INFO_LOG_LENGTH, &mut len);

    let mut buf = vec![0u8; (len.max(0) as usize).min(capacity).max(1)];
    gl::GetShaderInfoLog(
        id,
        buf.len() as GLsizei,
        ptr::null_mut(),
        buf.as_mut_ptr() as *mut GLchar,
    );

    log_to_string(buf)
}

unsafe fn program_log(id: GLuint, capacity: usize) -> String {
    let mut len = 0;
    gl::GetProgramiv(id, gl::INFO_LOG_LENGTH, &mut len);

    let mut buf = vec![0u8; (len.max(0) as usize).min(capacity).max(1)];
    gl::GetProgramInfoLog(
        id,
        buf.len() as GLsizei,
        ptr::null_mut(),
        buf.as_mut_ptr() as *mut GLchar,
    );

    log_to_string(buf)
}

fn log_to_string(buf: Vec<u8>) -> String {
    let end = buf.iter().position(|&v| v == 0).unwrap_or_else(|| buf.len());
    let log = String::from_utf8_lossy(&buf[..end]).into_owned();

    if log.is_empty() {
        "no diagnostic log available".into()
    } else {
        log
    }
}

unsafe fn check() -> Result<()> {
    match gl::GetError() {
        gl::NO_ERROR => Ok(()),
        gl::INVALID_ENUM => Err(Error::Device(
            "an unacceptable value is specified for an enumerated argument".into(),
        )),
        gl::INVALID_VALUE => Err(Error::Device("a numeric argument is out of range".into())),
        gl::INVALID_OPERATION => Err(Error::Device(
            "the specified operation is not allowed in the current state".into(),
        )),
        gl::INVALID_FRAMEBUFFER_OPERATION => Err(Error::Device(
            "the currently bound framebuffer is not framebuffer complete".into(),
        )),
        gl::OUT_OF_MEMORY => Err(Error::OutOfMemory),
        _ => Err(Error::Device("unknown OpenGL error".into())),
    }
}
