use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{CoinId, Decision, OrderIntent, OrderType, PortfolioSnapshot, RiskMode, Side, TpMode, UserSettings};

#[derive(Debug, Clone, Copy)]
pub struct RiskConfig {
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    pub max_sl_distance_pct: Decimal,
    pub min_sl_atr_mult: Decimal,
    pub cooldown_hours: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            maker_fee: dec!(0.001),
            taker_fee: dec!(0.001),
            max_sl_distance_pct: dec!(0.15),
            min_sl_atr_mult: dec!(1.0),
            cooldown_hours: 4,
        }
    }
}

/// Extra facts RiskEngine needs beyond the Decision and live portfolio snapshot.
///
/// `last_close_time`/`direction` describe the most recent closed trade on this coin *in the
/// direction being considered for entry* — the cooldown is per-(coin, direction), not per-coin,
/// so a long closing out doesn't block an immediate short (or vice versa).
#[derive(Debug, Clone, Default)]
pub struct RiskContext {
    pub atr: Option<Decimal>,
    pub last_close_time: Option<chrono::DateTime<chrono::Utc>>,
    pub direction: Option<Side>,
    pub now: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct RiskEngine {
    pub config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// `decision + portfolio snapshot + settings + context -> order intent (or none)`. Pure:
    /// no I/O, no mutation of its inputs.
    pub fn plan(
        &self,
        coin_id: &CoinId,
        decision: &Decision,
        portfolio: &PortfolioSnapshot,
        settings: &UserSettings,
        ctx: &RiskContext,
    ) -> Option<OrderIntent> {
        let side = decision.side?;

        if portfolio.has_open(coin_id, side) {
            return None;
        }
        if portfolio.open_count() >= settings.max_open_trades {
            return None;
        }
        if let (Some(last_close), Some(now)) = (ctx.last_close_time, ctx.now) {
            if ctx.direction == Some(side) && now - last_close < chrono::Duration::hours(self.config.cooldown_hours) {
                return None;
            }
        }
        if settings.paper_balance <= Decimal::ZERO {
            return None;
        }

        let balance = settings.paper_balance;
        let leverage = settings.default_leverage;

        let raw_risk = match settings.risk_mode {
            RiskMode::Percent => balance * settings.risk_per_trade_pct / Decimal::from(100),
            RiskMode::Dollar => settings.dollar_risk_per_trade,
        };

        let mut stop_loss = decision.stop_loss;
        let mut stop_distance_pct = (decision.entry - stop_loss).abs() / decision.entry;
        if stop_distance_pct.is_zero() {
            stop_distance_pct = dec!(0.02);
            stop_loss = match side {
                Side::Buy => decision.entry * (Decimal::ONE - stop_distance_pct),
                Side::Sell => decision.entry * (Decimal::ONE + stop_distance_pct),
            };
        }
        if let Some(atr) = ctx.atr {
            let atr_pct = atr * self.config.min_sl_atr_mult / decision.entry;
            if stop_distance_pct < atr_pct {
                stop_distance_pct = atr_pct;
                stop_loss = match side {
                    Side::Buy => decision.entry - atr * self.config.min_sl_atr_mult,
                    Side::Sell => decision.entry + atr * self.config.min_sl_atr_mult,
                };
            }
        }
        if stop_distance_pct > self.config.max_sl_distance_pct {
            stop_distance_pct = self.config.max_sl_distance_pct;
            stop_loss = match side {
                Side::Buy => decision.entry * (Decimal::ONE - stop_distance_pct),
                Side::Sell => decision.entry * (Decimal::ONE + stop_distance_pct),
            };
        }

        let confidence_mult = (dec!(0.5) + decision.score / Decimal::from(100)).min(dec!(1.2));
        let mut notional = (raw_risk / stop_distance_pct) * leverage * confidence_mult;

        let max_by_alloc = settings.max_balance_percent_per_trade * balance * leverage;
        notional = notional.min(max_by_alloc);

        let margin_fee_rate = Decimal::ONE / leverage + self.config.maker_fee;
        let max_by_balance = (balance - dec!(0.5)) / margin_fee_rate;
        notional = notional.min(max_by_balance.max(Decimal::ZERO));

        if notional <= Decimal::ZERO {
            return None;
        }

        let size = notional / decision.entry;

        let mut tp1 = decision.take_profit_1;
        let mut tp2 = decision.take_profit_2;
        let mut tp3 = decision.take_profit_3;
        let tp1_ok = match side {
            Side::Buy => tp1 > decision.entry,
            Side::Sell => tp1 < decision.entry,
        };
        if !tp1_ok {
            return None;
        }
        tp2 = tp2.filter(|tp| match side {
            Side::Buy => *tp > decision.entry,
            Side::Sell => *tp < decision.entry,
        });
        tp3 = tp3.filter(|tp| match side {
            Side::Buy => *tp > decision.entry,
            Side::Sell => *tp < decision.entry,
        });

        let stop_ok = match side {
            Side::Buy => stop_loss < decision.entry,
            Side::Sell => stop_loss > decision.entry,
        };
        if !stop_ok {
            stop_loss = match side {
                Side::Buy => decision.entry * (Decimal::ONE - dec!(0.02)),
                Side::Sell => decision.entry * (Decimal::ONE + dec!(0.02)),
            };
        }

        Some(OrderIntent {
            coin_id: coin_id.clone(),
            direction: side,
            size,
            leverage,
            order_type: OrderType::Market,
            entry: decision.entry,
            stop_loss,
            take_profit_1: tp1,
            take_profit_2: tp2,
            take_profit_3: tp3,
            tp_mode: TpMode::Fixed,
            trailing_distance: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::types::{Regime, ScoreBreakdown, StrategyKind};

    fn settings() -> UserSettings {
        UserSettings::default()
    }

    fn portfolio() -> PortfolioSnapshot {
        PortfolioSnapshot {
            timestamp: Utc::now(),
            equity: dec!(10000),
            available_balance: dec!(10000),
            open_trades: vec![],
            daily_start_equity: dec!(10000),
        }
    }

    fn decision() -> Decision {
        Decision {
            side: Some(Side::Buy),
            signal: crate::types::Signal::Buy,
            score: dec!(60),
            confluence_level: 2,
            regime: Regime::Trending,
            strategy: StrategyKind::TrendFollow,
            entry: dec!(50000),
            stop_loss: dec!(49000),
            take_profit_1: dec!(51500),
            take_profit_2: Some(dec!(53000)),
            take_profit_3: None,
            top_strategies: vec![],
            reasoning: vec![],
            score_breakdown: ScoreBreakdown::default(),
        }
    }

    #[test]
    fn rejects_duplicate_direction_on_same_coin() {
        let engine = RiskEngine::new(RiskConfig::default());
        let mut pf = portfolio();
        let mut trade = crate::types::Trade::open(
            CoinId::new("bitcoin"), Side::Buy, dec!(50000), dec!(49000), dec!(51500),
            None, None, dec!(1), dec!(2), dec!(60), StrategyKind::TrendFollow, Regime::Trending, Utc::now(),
        );
        trade.status = crate::types::TradeStatus::Open;
        pf.open_trades.push(trade);

        let intent = engine.plan(&CoinId::new("bitcoin"), &decision(), &pf, &settings(), &RiskContext::default());
        assert!(intent.is_none());
    }

    #[test]
    fn cooldown_blocks_same_direction_reentry() {
        let engine = RiskEngine::new(RiskConfig::default());
        let now = Utc::now();
        let ctx = RiskContext {
            last_close_time: Some(now - chrono::Duration::hours(1)),
            direction: Some(Side::Buy),
            now: Some(now),
            ..Default::default()
        };
        let intent = engine.plan(&CoinId::new("bitcoin"), &decision(), &portfolio(), &settings(), &ctx);
        assert!(intent.is_none());
    }

    #[test]
    fn cooldown_does_not_block_opposite_direction() {
        let engine = RiskEngine::new(RiskConfig::default());
        let now = Utc::now();
        // A long closed an hour ago; a new long is blocked (cooldown), but a short was never
        // tested here, so confirm a *different* direction's cooldown doesn't leak into this one:
        // the recent close was a Sell, and we're entering a Buy.
        let ctx = RiskContext {
            last_close_time: Some(now - chrono::Duration::hours(1)),
            direction: Some(Side::Sell),
            now: Some(now),
            ..Default::default()
        };
        let intent = engine.plan(&CoinId::new("bitcoin"), &decision(), &portfolio(), &settings(), &ctx);
        assert!(intent.is_some());
    }

    #[test]
    fn sizes_a_fresh_long() {
        let engine = RiskEngine::new(RiskConfig::default());
        let intent = engine
            .plan(&CoinId::new("bitcoin"), &decision(), &portfolio(), &settings(), &RiskContext::default())
            .unwrap();
        assert!(intent.size > Decimal::ZERO);
        assert!(intent.levels_valid());
    }
}
