pub mod entity;
pub mod instancing;
pub mod lifecycle;
pub mod lod;
pub mod records;
pub mod selection;
pub mod spatial;
pub mod store;
pub mod viewport;
pub mod visibility;

pub use entity::*;
pub use records::*;
pub use selection::Focus;
pub use store::*;
