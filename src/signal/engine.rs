use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::indicators::build_snapshot_series;
use crate::types::{CandleSlice, Decision, Regime, Side, Signal, StrategyKind, TimeFrame};

use super::regime::detect_regime;
use super::scoring::{score_timeframe, TfDirection};
use super::strategies::{pick_best_strategy, strategy_levels, StrategyStatsTable};

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub min_signal_score: Decimal,
    pub min_confluence_for_signal: u8,
    pub mtf_divergence_penalty: Decimal,
    pub session_start_utc: u32,
    pub session_end_utc: u32,
    pub session_penalty: Decimal,
    pub btc_override: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_signal_score: dec!(52),
            min_confluence_for_signal: 2,
            mtf_divergence_penalty: dec!(10),
            session_start_utc: 12,
            session_end_utc: 22,
            session_penalty: dec!(5),
            btc_override: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EvaluateOptions {
    pub strategy_stats: StrategyStatsTable,
    pub btc_signal: Option<Signal>,
    pub bar_time: Option<DateTime<Utc>>,
}

/// A library of pure functions: given multi-timeframe candles, produce a scored Decision. No
/// shared state, no wall-clock dependence when `bar_time` is supplied.
pub struct SignalEngine {
    pub config: EngineConfig,
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, candles: &CandleSlice, price: Decimal, options: &EvaluateOptions) -> Decision {
        let now = options.bar_time.unwrap_or_else(Utc::now);

        let snapshots: std::collections::BTreeMap<TimeFrame, Vec<_>> = [TimeFrame::H1, TimeFrame::H4, TimeFrame::D1, TimeFrame::M15, TimeFrame::W1]
            .into_iter()
            .filter_map(|tf| {
                let slice = candles.get(tf);
                if slice.is_empty() {
                    None
                } else {
                    Some((tf, build_snapshot_series(slice)))
                }
            })
            .collect();

        let h1_snap = snapshots.get(&TimeFrame::H1).and_then(|v| v.last());
        let Some(h1_snap) = h1_snap else {
            return Decision::hold(price, vec!["insufficient 1h history".to_string()]);
        };

        let h1_score = score_timeframe(h1_snap, price);
        let h4_score = snapshots.get(&TimeFrame::H4).and_then(|v| v.last()).map(|s| score_timeframe(s, price));
        let d1_score = snapshots.get(&TimeFrame::D1).and_then(|v| v.last()).map(|s| score_timeframe(s, price));

        let h1_total = h1_score.breakdown.total();
        let h4_total = h4_score.as_ref().map(|s| s.breakdown.total()).unwrap_or(h1_total);
        let d1_total = d1_score.as_ref().map(|s| s.breakdown.total()).unwrap_or(h1_total);

        let mut confluence_score = dec!(0.40) * d1_total + dec!(0.35) * h4_total + dec!(0.25) * h1_total;

        // Dominant direction: tally directions across available timeframes.
        let directions: Vec<TfDirection> = std::iter::once(h1_score.direction)
            .chain(h4_score.as_ref().map(|s| s.direction))
            .chain(d1_score.as_ref().map(|s| s.direction))
            .collect();
        let bulls = directions.iter().filter(|d| **d == TfDirection::Bull).count();
        let bears = directions.iter().filter(|d| **d == TfDirection::Bear).count();

        let mut dominant = if bulls > bears {
            TfDirection::Bull
        } else if bears > bulls {
            TfDirection::Bear
        } else if confluence_score >= dec!(55) {
            TfDirection::Bull
        } else if confluence_score <= dec!(45) {
            TfDirection::Bear
        } else {
            TfDirection::Neutral
        };

        let confluence_level = directions.iter().filter(|d| **d == dominant).count().min(3) as u8;

        let mut reasoning = Vec::new();

        // Adjustments.
        if let Some(h4) = &h4_score {
            if h4.direction != h1_score.direction && h4.direction != TfDirection::Neutral && h1_score.direction != TfDirection::Neutral {
                confluence_score -= self.config.mtf_divergence_penalty;
                reasoning.push("1h/4h direction conflict".to_string());
            }
        }
        let hour = now.hour();
        if hour < self.config.session_start_utc || hour >= self.config.session_end_utc {
            confluence_score -= self.config.session_penalty;
            reasoning.push("outside primary session window".to_string());
        }
        if h1_snap.bullish_divergence_count > 0 && dominant == TfDirection::Bull {
            confluence_score += dec!(8) + dec!(2) * Decimal::from(h1_snap.bullish_divergence_count - 1);
            reasoning.push(format!("bullish divergence confirms direction ({} indicators)", h1_snap.bullish_divergence_count));
        }
        if h1_snap.bearish_divergence_count > 0 && dominant == TfDirection::Bear {
            confluence_score += dec!(8) + dec!(2) * Decimal::from(h1_snap.bearish_divergence_count - 1);
            reasoning.push(format!("bearish divergence confirms direction ({} indicators)", h1_snap.bearish_divergence_count));
        }
        if h1_snap.potential_top && dominant == TfDirection::Bull {
            confluence_score -= dec!(12);
            reasoning.push("potential top against dominant direction".to_string());
        }
        if h1_snap.potential_bottom && dominant == TfDirection::Bear {
            confluence_score -= dec!(12);
            reasoning.push("potential bottom against dominant direction".to_string());
        }
        confluence_score = confluence_score.clamp(Decimal::ZERO, dec!(100));

        let regime = detect_regime(d1_score.is_some().then(|| snapshots[&TimeFrame::D1].last().unwrap()), h4_score.is_some().then(|| snapshots[&TimeFrame::H4].last().unwrap()));

        let (strategy, _strategy_score, top_strategies) = pick_best_strategy(&h1_score.breakdown, regime, &options.strategy_stats);
        let top_strategies: Vec<StrategyKind> = top_strategies.into_iter().take(3).map(|(k, _)| k).collect();

        // BTC regime override.
        if self.config.btc_override {
            if let Some(btc_signal) = options.btc_signal {
                if btc_signal == Signal::StrongSell && dominant == TfDirection::Bull {
                    dominant = TfDirection::Neutral;
                    reasoning.push("suppressed by BTC STRONG_SELL regime".to_string());
                } else if btc_signal == Signal::StrongBuy && dominant == TfDirection::Bear {
                    dominant = TfDirection::Neutral;
                    reasoning.push("suppressed by BTC STRONG_BUY regime".to_string());
                }
            }
        }

        let side = match dominant {
            TfDirection::Bull => Some(Side::Buy),
            TfDirection::Bear => Some(Side::Sell),
            TfDirection::Neutral => None,
        };

        let signal = if side.is_none() || confluence_score < self.config.min_signal_score || confluence_level < self.config.min_confluence_for_signal {
            Signal::Hold
        } else {
            match (side, confluence_score) {
                (Some(Side::Buy), s) if s >= dec!(75) => Signal::StrongBuy,
                (Some(Side::Buy), _) => Signal::Buy,
                (Some(Side::Sell), s) if s >= dec!(75) => Signal::StrongSell,
                (Some(Side::Sell), _) => Signal::Sell,
                _ => Signal::Hold,
            }
        };

        let side = if matches!(signal, Signal::Hold) { None } else { side };

        let atr = h1_snap.atr_14.unwrap_or(price * dec!(0.01));
        let levels = strategy_levels(strategy);
        let (stop_loss, tp1, tp2, tp3) = compute_levels(price, side, atr, &levels);

        Decision {
            side,
            signal,
            score: confluence_score,
            confluence_level,
            regime,
            strategy,
            entry: price,
            stop_loss,
            take_profit_1: tp1,
            take_profit_2: tp2,
            take_profit_3: tp3,
            top_strategies,
            reasoning,
            score_breakdown: h1_score.breakdown,
        }
    }
}

fn compute_levels(
    price: Decimal,
    side: Option<Side>,
    atr: Decimal,
    levels: &super::strategies::StrategyLevels,
) -> (Decimal, Decimal, Option<Decimal>, Option<Decimal>) {
    let Some(side) = side else {
        return (price, price, None, None);
    };
    let stop_distance = atr * levels.atr_stop_mult;
    let (stop_loss, sign): (Decimal, Decimal) = match side {
        Side::Buy => (price - stop_distance, Decimal::ONE),
        Side::Sell => (price + stop_distance, -Decimal::ONE),
    };
    let risk = (price - stop_loss).abs();
    let mut tps = levels.tp_r_multiples.iter().map(|r| price + sign * risk * *r);
    let tp1 = tps.next().unwrap_or(price);
    let tp2 = tps.next();
    let tp3 = tps.next();
    (stop_loss, tp1, tp2, tp3)
}
