use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{CoinId, PortfolioSnapshot, TradeStatus};

#[derive(Debug, Clone, Copy)]
pub struct PortfolioControlsConfig {
    pub max_concurrent_trades: usize,
    pub max_per_symbol_exposure_pct: Decimal,
    pub daily_loss_limit_pct: Decimal,
}

impl Default for PortfolioControlsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_trades: 5,
            max_per_symbol_exposure_pct: dec!(0.30),
            daily_loss_limit_pct: dec!(0.08),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Ok,
    MaxConcurrentTrades,
    MaxSymbolExposure,
    DailyLossLimit,
    KillSwitch,
}

/// Pure policy gate consulted before any new entry; independent of the risk-sizing math.
pub fn can_open_trade(
    coin_id: &CoinId,
    portfolio: &PortfolioSnapshot,
    kill_switch: bool,
    cfg: &PortfolioControlsConfig,
) -> GateDecision {
    if kill_switch {
        return GateDecision::KillSwitch;
    }
    if portfolio.open_count() >= cfg.max_concurrent_trades {
        return GateDecision::MaxConcurrentTrades;
    }
    if !portfolio.equity.is_zero() {
        let symbol_exposure: Decimal = portfolio
            .open_trades
            .iter()
            .filter(|t| t.status == TradeStatus::Open && &t.coin_id == coin_id)
            .map(|t| t.entry_price * t.position_size)
            .sum();
        let exposure_pct = symbol_exposure / portfolio.equity;
        if exposure_pct >= cfg.max_per_symbol_exposure_pct {
            return GateDecision::MaxSymbolExposure;
        }
    }
    if !portfolio.daily_start_equity.is_zero() {
        let drawdown_pct = (portfolio.daily_start_equity - portfolio.equity) / portfolio.daily_start_equity;
        if drawdown_pct >= cfg.daily_loss_limit_pct {
            return GateDecision::DailyLossLimit;
        }
    }
    GateDecision::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Regime, Side, StrategyKind, Trade};
    use chrono::Utc;

    fn portfolio(equity: Decimal, start: Decimal) -> PortfolioSnapshot {
        PortfolioSnapshot {
            timestamp: Utc::now(),
            equity,
            available_balance: equity,
            open_trades: vec![],
            daily_start_equity: start,
        }
    }

    fn open_trade(coin_id: CoinId, entry_price: Decimal, size: Decimal) -> Trade {
        Trade::open(
            coin_id,
            Side::Buy,
            entry_price,
            entry_price - dec!(1000),
            entry_price + dec!(1000),
            None,
            None,
            size,
            dec!(1),
            dec!(70),
            StrategyKind::TrendFollow,
            Regime::Trending,
            Utc::now(),
        )
    }

    #[test]
    fn trips_daily_loss_limit() {
        let cfg = PortfolioControlsConfig::default();
        let pf = portfolio(dec!(9000), dec!(10000)); // -10% > 8% limit
        assert_eq!(can_open_trade(&CoinId::new("bitcoin"), &pf, false, &cfg), GateDecision::DailyLossLimit);
    }

    #[test]
    fn kill_switch_overrides_everything() {
        let cfg = PortfolioControlsConfig::default();
        let pf = portfolio(dec!(10000), dec!(10000));
        assert_eq!(can_open_trade(&CoinId::new("bitcoin"), &pf, true, &cfg), GateDecision::KillSwitch);
    }

    #[test]
    fn trips_max_symbol_exposure() {
        let cfg = PortfolioControlsConfig::default(); // 30% cap
        let mut pf = portfolio(dec!(10000), dec!(10000));
        // 3500 notional on bitcoin alone is 35% of equity, above the 30% cap.
        pf.open_trades.push(open_trade(CoinId::new("bitcoin"), dec!(35000), dec!(0.1)));
        assert_eq!(can_open_trade(&CoinId::new("bitcoin"), &pf, false, &cfg), GateDecision::MaxSymbolExposure);
        // A different symbol isn't affected by bitcoin's exposure.
        assert_eq!(can_open_trade(&CoinId::new("ethereum"), &pf, false, &cfg), GateDecision::Ok);
    }
}
