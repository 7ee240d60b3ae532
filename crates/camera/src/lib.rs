pub mod controller;
pub mod easing;
pub mod input;
pub mod pose;
pub mod snap;
pub mod transition;

pub use controller::*;
pub use input::*;
pub use pose::CameraPose;
pub use snap::*;
pub use transition::*;
