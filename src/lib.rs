//! # Billboard
//!
//! A tiny textured-quad rendering pipeline. `billboard` owns a drawable
//! surface binding, a shader program, a vertex buffer and a texture, and
//! executes one render pass per layout event of the host view system.
//!
//! The pipeline is deliberately fixed-function at the API level: six
//! vertices forming two triangles, one texture on unit 0, one color
//! renderbuffer behind one framebuffer. What it does expose is the full
//! resource lifecycle: compile/link diagnostics, name-based attribute
//! resolution, and explicit rebuild and release of every GPU handle, all as
//! typed results instead of silent GL state.
//!
//! The host is responsible for window and context creation; `billboard`
//! reaches the GPU through the [`Device`](backends/trait.Device.html)
//! trait, with an OpenGL backend for production and a headless backend for
//! tests.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

pub mod backends;
pub mod context;
pub mod errors;
pub mod framebuffer;
pub mod geometry;
pub mod math;
pub mod pass;
pub mod prelude;
pub mod shader;
pub mod surface;
pub mod texture;
