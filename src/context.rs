//! Ownership of the GPU command context.
//!
//! A context is current on exactly one thread; every GPU call in this crate
//! funnels through [`GraphicsContext::device_mut`], which refuses access
//! from any thread other than the one the context was created on. The
//! trait-object boundary keeps device types out of component signatures, so
//! the same pipeline runs against GL and the headless backend.

use std::thread::{self, ThreadId};

use crate::backends::Device;
use crate::errors::{Error, Result};

pub struct GraphicsContext {
    device: Box<dyn Device>,
    owner: ThreadId,
}

impl GraphicsContext {
    /// Wraps `device` and makes the context current on the calling thread.
    pub fn new(device: Box<dyn Device>) -> Self {
        info!("[GraphicsContext] becomes current on {:?}.", thread::current().id());

        GraphicsContext {
            device,
            owner: thread::current().id(),
        }
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// The device, available only on the owning thread.
    pub fn device_mut(&mut self) -> Result<&mut dyn Device> {
        if !self.is_current() {
            return Err(Error::ContextNotCurrent);
        }

        Ok(&mut *self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends;

    #[test]
    fn current_on_owning_thread() {
        let mut ctx = GraphicsContext::new(backends::new_headless());
        assert!(ctx.is_current());
        assert!(ctx.device_mut().is_ok());
    }
}
