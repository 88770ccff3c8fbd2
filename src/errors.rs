use crate::shader::ShaderStage;

/// Everything that can abort a render pass. Compile and link failures carry
/// the diagnostic log captured from the driver, so callers can surface it
/// instead of losing it to stdout.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Failed to compile {} shader:\n{}", _0, _1)]
    CompileFailure(ShaderStage, String),
    #[fail(display = "Failed to link program:\n{}", _0)]
    LinkFailure(String),
    #[fail(display = "Invalid image: {}.", _0)]
    ImageInvalid(String),
    #[fail(display = "Attribute '{}' is undefined in shader sources.", _0)]
    AttributeUndefined(String),
    #[fail(display = "Uniform '{}' is undefined in shader sources.", _0)]
    UniformUndefined(String),
    #[fail(display = "Precondition violated: {}.", _0)]
    PreconditionViolation(String),
    #[fail(display = "No surface is bound to the pipeline.")]
    SurfaceNotBound,
    #[fail(display = "Surface has degenerate dimensions ({}x{}).", _0, _1)]
    SurfaceDegenerate(u32, u32),
    #[fail(display = "The graphics context is not current on the calling thread.")]
    ContextNotCurrent,
    #[fail(display = "Failed to present render buffer to the surface.")]
    PresentFailure,
    #[fail(display = "Device: {}.", _0)]
    Device(String),
    #[fail(display = "There is not enough GPU memory left to execute the command.")]
    OutOfMemory,
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl Error {
    /// Shorthand used by the backends when an invariant that should have
    /// been established by an earlier pipeline stage does not hold.
    pub fn precondition<T: Into<String>>(what: T) -> Error {
        Error::PreconditionViolation(what.into())
    }
}
