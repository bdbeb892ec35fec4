pub mod color;
pub mod palette;
pub mod primitive;
pub mod projector;

// Re-export main types
pub use color::Color;
pub use palette::{Palette, Theme};
pub use primitive::{Extruded, RenderLayer, RenderPrimitive, Shape, Stroke, WallFace};
pub use projector::Renderer;
