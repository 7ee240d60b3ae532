pub mod geo;
pub mod mat4;
pub mod precision;
pub mod predict;
pub mod vec;

pub use geo::*;
pub use mat4::*;
pub use precision::*;
pub use predict::*;
pub use vec::*;
