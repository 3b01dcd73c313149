pub mod controls;
pub mod engine;

pub use controls::*;
pub use engine::*;
