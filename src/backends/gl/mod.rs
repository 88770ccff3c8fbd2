//! The production backend, speaking OpenGL through the `gl` function
//! loader. The host owns context creation and presentation; this backend
//! takes a symbol loader and a presenter callback at the seam.

mod device;
mod types;

pub use self::device::{GlDevice, Presenter, DEFAULT_LOG_CAPACITY};

use std::os::raw::c_void;

use super::Device;
use crate::errors::Result;

/// Creates the GL backend. `loader` resolves GL symbols against the host's
/// context, which must be current on the calling thread; `presenter`
/// presents the bound renderbuffer to the surface.
pub fn new<F>(loader: F, presenter: Presenter) -> Result<Box<dyn Device>>
where
    F: FnMut(&str) -> *const c_void,
{
    let device = unsafe { GlDevice::new(loader, presenter)? };
    Ok(Box::new(device))
}
