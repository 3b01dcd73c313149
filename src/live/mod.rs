pub mod controller;
pub mod loop_;

pub use controller::*;
pub use loop_::*;
