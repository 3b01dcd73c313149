pub mod binance_candles;
pub mod cache;
pub mod coingecko;
pub mod providers;
pub mod service;
pub mod stream;

pub use binance_candles::*;
pub use cache::*;
pub use coingecko::*;
pub use providers::*;
pub use service::*;
pub use stream::*;
