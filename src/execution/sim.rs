use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{Fill, OrderIntent, OrderType, Side};

#[derive(Debug, Clone, Copy)]
pub struct ExecutionConfig {
    pub min_slip_bps: Decimal,
    pub slip_k: Decimal,
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    pub funding_rate_per_hour: Decimal,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            min_slip_bps: dec!(5),
            slip_k: dec!(8),
            maker_fee: dec!(0.001),
            taker_fee: dec!(0.001),
            funding_rate_per_hour: dec!(0.0001),
        }
    }
}

/// What ExecutionSim needs from the bar the order is being tested against.
#[derive(Debug, Clone, Copy)]
pub struct FillSnapshot {
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub atr: Option<Decimal>,
    /// Current order size as a fraction of the coin's typical traded size; 1.0 is neutral.
    pub size_factor: Decimal,
}

fn unfilled(order_type: OrderType) -> Fill {
    Fill {
        filled: false,
        fill_price: Decimal::ZERO,
        fill_qty: Decimal::ZERO,
        fees: Decimal::ZERO,
        slippage_bps: Decimal::ZERO,
        order_type,
    }
}

pub struct ExecutionSim {
    pub config: ExecutionConfig,
}

impl ExecutionSim {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    /// Deterministic fill simulation for a single bar. `price` is the reference
    /// price to fill a market order at (typically next-bar open in a backtest).
    pub fn execute(&self, order: &OrderIntent, price: Decimal, snapshot: &FillSnapshot) -> Fill {
        match order.order_type {
            OrderType::Market => self.fill_market(order, price, snapshot),
            OrderType::Limit => self.fill_limit(order, price, snapshot),
            OrderType::Stop => self.fill_stop(order, snapshot),
            OrderType::StopLimit => self.fill_stop_limit(order, snapshot),
        }
    }

    fn slippage_bps(&self, snapshot: &FillSnapshot, reference_price: Decimal) -> Decimal {
        let atr_pct = match snapshot.atr {
            Some(atr) if !reference_price.is_zero() => (atr / reference_price) * Decimal::from(100),
            _ => Decimal::ZERO,
        };
        let size_mult = snapshot.size_factor.max(dec!(0.1));
        let computed = self.config.slip_k * atr_pct * snapshot.size_factor * size_mult;
        computed.max(self.config.min_slip_bps)
    }

    fn fill_market(&self, order: &OrderIntent, price: Decimal, snapshot: &FillSnapshot) -> Fill {
        let slip_bps = self.slippage_bps(snapshot, price);
        let slip_frac = slip_bps / Decimal::from(10_000);
        let fill_price = match order.direction {
            Side::Buy => price * (Decimal::ONE + slip_frac),
            Side::Sell => price * (Decimal::ONE - slip_frac),
        };
        let notional = fill_price * order.size;
        Fill {
            filled: true,
            fill_price,
            fill_qty: order.size,
            fees: notional * self.config.taker_fee,
            slippage_bps: slip_bps,
            order_type: OrderType::Market,
        }
    }

    fn fill_limit(&self, order: &OrderIntent, limit_price: Decimal, snapshot: &FillSnapshot) -> Fill {
        let reached = match order.direction {
            Side::Buy => snapshot.low <= limit_price,
            Side::Sell => snapshot.high >= limit_price,
        };
        if !reached {
            return unfilled(OrderType::Limit);
        }
        let notional = limit_price * order.size;
        Fill {
            filled: true,
            fill_price: limit_price,
            fill_qty: order.size,
            fees: notional * self.config.maker_fee,
            slippage_bps: Decimal::ZERO,
            order_type: OrderType::Limit,
        }
    }

    fn fill_stop(&self, order: &OrderIntent, snapshot: &FillSnapshot) -> Fill {
        let trigger = order.stop_loss;
        let triggered = match order.direction {
            Side::Buy => snapshot.high >= trigger,
            Side::Sell => snapshot.low <= trigger,
        };
        if !triggered {
            return unfilled(OrderType::Stop);
        }
        let mut result = self.fill_market(order, trigger, snapshot);
        result.order_type = OrderType::Stop;
        result
    }

    fn fill_stop_limit(&self, order: &OrderIntent, snapshot: &FillSnapshot) -> Fill {
        let trigger = order.stop_loss;
        let triggered = match order.direction {
            Side::Buy => snapshot.high >= trigger,
            Side::Sell => snapshot.low <= trigger,
        };
        if !triggered {
            return unfilled(OrderType::StopLimit);
        }
        let mut result = self.fill_limit(order, trigger, snapshot);
        result.order_type = OrderType::StopLimit;
        result
    }

    /// Funding accrued for one hour of holding a futures position. Returns a signed
    /// balance delta: longs pay on a positive funding rate, shorts receive it.
    pub fn funding_payment(&self, notional: Decimal, direction: Side, hours: Decimal) -> Decimal {
        let payment = notional * self.config.funding_rate_per_hour * hours;
        match direction {
            Side::Buy => -payment,
            Side::Sell => payment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CoinId, TpMode};

    fn order(direction: Side, order_type: OrderType) -> OrderIntent {
        OrderIntent {
            coin_id: CoinId::new("bitcoin"),
            direction,
            size: dec!(1),
            leverage: dec!(2),
            order_type,
            entry: dec!(50000),
            stop_loss: dec!(49000),
            take_profit_1: dec!(51500),
            take_profit_2: None,
            take_profit_3: None,
            tp_mode: TpMode::Fixed,
            trailing_distance: None,
        }
    }

    fn snapshot() -> FillSnapshot {
        FillSnapshot { high: dec!(50200), low: dec!(49800), close: dec!(50000), atr: Some(dec!(500)), size_factor: dec!(1) }
    }

    #[test]
    fn market_long_pays_positive_slippage() {
        let sim = ExecutionSim::new(ExecutionConfig::default());
        let result = sim.execute(&order(Side::Buy, OrderType::Market), dec!(50000), &snapshot());
        assert!(result.filled);
        assert!(result.fill_price > dec!(50000));
        assert!(result.fees > Decimal::ZERO);
    }

    #[test]
    fn stop_does_not_fill_until_range_crosses_it() {
        let sim = ExecutionSim::new(ExecutionConfig::default());
        let mut ord = order(Side::Sell, OrderType::Stop);
        ord.stop_loss = dec!(49000);
        let snap = snapshot(); // low 49800, never reaches 49000
        let result = sim.execute(&ord, dec!(50000), &snap);
        assert!(!result.filled);
    }

    #[test]
    fn shorts_receive_funding_when_rate_positive() {
        let sim = ExecutionSim::new(ExecutionConfig::default());
        let payment = sim.funding_payment(dec!(10000), Side::Sell, dec!(1));
        assert!(payment > Decimal::ZERO);
    }
}
