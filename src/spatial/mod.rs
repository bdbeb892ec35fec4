pub mod culling;
pub mod index;

pub use culling::Culling;
pub use index::{Declutter, SpatialIndex, SpatialItem};
