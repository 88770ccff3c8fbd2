//! The few math types the pipeline needs, mainly re-exported from `cgmath`.

pub use cgmath::Vector2;

pub mod color;
pub use self::color::Color;
