use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CoinId, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TpMode {
    Fixed,
    Trailing,
}

/// Produced by the risk engine, consumed by the execution simulator / exchange adapter.
/// Never mutated once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub coin_id: CoinId,
    pub direction: Side,
    pub size: Decimal,
    pub leverage: Decimal,
    pub order_type: OrderType,
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit_1: Decimal,
    pub take_profit_2: Option<Decimal>,
    pub take_profit_3: Option<Decimal>,
    pub tp_mode: TpMode,
    pub trailing_distance: Option<Decimal>,
}

impl OrderIntent {
    /// Per-direction level invariants from the data model: for LONG entry>stop, each TP>entry;
    /// for SHORT the reverse.
    pub fn levels_valid(&self) -> bool {
        let long = matches!(self.direction, Side::Buy);
        let stop_ok = if long {
            self.entry > self.stop_loss
        } else {
            self.entry < self.stop_loss
        };
        let tp1_ok = if long {
            self.take_profit_1 > self.entry
        } else {
            self.take_profit_1 < self.entry
        };
        stop_ok && tp1_ok
    }

    pub fn risk_per_unit(&self) -> Decimal {
        (self.entry - self.stop_loss).abs()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub filled: bool,
    pub fill_price: Decimal,
    pub fill_qty: Decimal,
    pub fees: Decimal,
    pub slippage_bps: Decimal,
    pub order_type: OrderType,
}
