pub mod candle;
pub mod decision;
pub mod order;
pub mod position;
pub mod trading;

pub use candle::*;
pub use decision::*;
pub use order::*;
pub use position::*;
pub use trading::*;
