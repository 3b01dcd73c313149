use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use crate::types::{Regime, ScoreBreakdown, StrategyKind};

/// Per-dimension weighting used to reduce a `ScoreBreakdown` to one strategy's display score.
#[derive(Debug, Clone, Copy)]
pub struct StrategyWeights {
    pub trend: Decimal,
    pub momentum: Decimal,
    pub volume: Decimal,
    pub structure: Decimal,
    pub volatility: Decimal,
    pub risk_quality: Decimal,
}

impl StrategyWeights {
    pub fn score(&self, breakdown: &ScoreBreakdown) -> Decimal {
        breakdown.trend * self.trend
            + breakdown.momentum * self.momentum
            + breakdown.volume * self.volume
            + breakdown.structure * self.structure
            + breakdown.volatility * self.volatility
            + breakdown.risk_quality * self.risk_quality
    }
}

/// Default weight table per strategy, expressed as a multiplier (~1.0 baseline) per dimension.
/// Learned weights (`strategy_stats`) may override these once a strategy has ≥5 closed trades.
pub fn default_weights(kind: StrategyKind) -> StrategyWeights {
    match kind {
        StrategyKind::TrendFollow => StrategyWeights {
            trend: dec!(1.4), momentum: dec!(1.0), volume: dec!(0.8),
            structure: dec!(0.9), volatility: dec!(0.8), risk_quality: dec!(1.0),
        },
        StrategyKind::Breakout => StrategyWeights {
            trend: dec!(0.9), momentum: dec!(1.2), volume: dec!(1.4),
            structure: dec!(1.3), volatility: dec!(1.1), risk_quality: dec!(0.9),
        },
        StrategyKind::MeanRevert => StrategyWeights {
            trend: dec!(0.5), momentum: dec!(1.3), volume: dec!(0.8),
            structure: dec!(1.2), volatility: dec!(0.7), risk_quality: dec!(1.1),
        },
        StrategyKind::Momentum => StrategyWeights {
            trend: dec!(1.1), momentum: dec!(1.5), volume: dec!(1.1),
            structure: dec!(0.7), volatility: dec!(0.9), risk_quality: dec!(0.9),
        },
        StrategyKind::Scalping => StrategyWeights {
            trend: dec!(0.6), momentum: dec!(1.3), volume: dec!(1.2),
            structure: dec!(1.1), volatility: dec!(1.3), risk_quality: dec!(0.7),
        },
        StrategyKind::Swing => StrategyWeights {
            trend: dec!(1.2), momentum: dec!(0.9), volume: dec!(0.8),
            structure: dec!(1.2), volatility: dec!(0.9), risk_quality: dec!(1.1),
        },
        StrategyKind::Position => StrategyWeights {
            trend: dec!(1.5), momentum: dec!(0.7), volume: dec!(0.7),
            structure: dec!(1.0), volatility: dec!(0.7), risk_quality: dec!(1.3),
        },
    }
}

/// ATR multiplier and R-multiple table used to compute entry levels once a strategy is chosen.
#[derive(Debug, Clone, Copy)]
pub struct StrategyLevels {
    pub atr_stop_mult: Decimal,
    pub tp_r_multiples: &'static [Decimal],
}

pub fn strategy_levels(kind: StrategyKind) -> StrategyLevels {
    match kind {
        StrategyKind::Scalping => StrategyLevels { atr_stop_mult: dec!(0.8), tp_r_multiples: &[dec!(1.0)] },
        StrategyKind::Momentum => StrategyLevels { atr_stop_mult: dec!(1.2), tp_r_multiples: &[dec!(1.5), dec!(2.5)] },
        StrategyKind::Breakout => StrategyLevels { atr_stop_mult: dec!(1.3), tp_r_multiples: &[dec!(1.5), dec!(3.0)] },
        StrategyKind::MeanRevert => StrategyLevels { atr_stop_mult: dec!(1.0), tp_r_multiples: &[dec!(1.0), dec!(2.0)] },
        StrategyKind::TrendFollow => StrategyLevels { atr_stop_mult: dec!(1.5), tp_r_multiples: &[dec!(1.5), dec!(3.0), dec!(5.0)] },
        StrategyKind::Swing => StrategyLevels { atr_stop_mult: dec!(1.8), tp_r_multiples: &[dec!(2.0), dec!(3.5), dec!(5.5)] },
        StrategyKind::Position => StrategyLevels { atr_stop_mult: dec!(2.2), tp_r_multiples: &[dec!(2.5), dec!(4.5), dec!(7.0)] },
    }
}

/// Learned per-strategy performance, keyed by strategy; used to override default weights once
/// enough closed trades exist and to allow regime-blocked strategies a minimum sample size.
#[derive(Debug, Clone, Default)]
pub struct StrategyStats {
    pub closed_trades: u32,
    pub learned_weights: Option<StrategyWeights>,
}

pub type StrategyStatsTable = HashMap<StrategyKind, StrategyStats>;

/// Pick the best strategy: highest weighted display score among those allowed in the current
/// regime, plus strategies under 5 closed trades which may still be considered even if blocked.
pub fn pick_best_strategy(
    breakdown: &ScoreBreakdown,
    regime: Regime,
    stats: &StrategyStatsTable,
) -> (StrategyKind, Decimal, Vec<(StrategyKind, Decimal)>) {
    let mut scored: Vec<(StrategyKind, Decimal)> = StrategyKind::all()
        .into_iter()
        .filter(|k| {
            k.allowed_in(regime) || stats.get(k).map(|s| s.closed_trades < 5).unwrap_or(true)
        })
        .map(|k| {
            let weights = stats
                .get(&k)
                .and_then(|s| s.learned_weights)
                .unwrap_or_else(|| default_weights(k));
            let mut score = weights.score(breakdown);
            if k.allowed_in(regime) {
                score += dec!(2); // small regime-fit bonus
            }
            (k, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    let (best_kind, best_score) = scored.first().copied().unwrap_or((StrategyKind::Swing, Decimal::ZERO));
    (best_kind, best_score, scored)
}
