use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Regime, Side, Signal, StrategyKind};

/// Per-dimension score breakdown backing a Decision's total score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub trend: Decimal,
    pub momentum: Decimal,
    pub volume: Decimal,
    pub structure: Decimal,
    pub volatility: Decimal,
    pub risk_quality: Decimal,
}

impl ScoreBreakdown {
    pub fn total(&self) -> Decimal {
        self.trend + self.momentum + self.volume + self.structure + self.volatility + self.risk_quality
    }
}

/// Snapshot of every indicator value computed for one (coin, timeframe, bar). Pure function
/// output: no identity beyond its field values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub sma_20: Option<Decimal>,
    pub sma_50: Option<Decimal>,
    pub sma_200: Option<Decimal>,
    pub ema_12: Option<Decimal>,
    pub ema_26: Option<Decimal>,
    pub rsi_14: Option<Decimal>,
    pub macd_line: Option<Decimal>,
    pub macd_signal: Option<Decimal>,
    pub macd_histogram: Option<Decimal>,
    pub atr_14: Option<Decimal>,
    pub adx_14: Option<Decimal>,
    pub plus_di: Option<Decimal>,
    pub minus_di: Option<Decimal>,
    pub bb_upper: Option<Decimal>,
    pub bb_middle: Option<Decimal>,
    pub bb_lower: Option<Decimal>,
    pub bb_squeeze: bool,
    pub stoch_k: Option<Decimal>,
    pub stoch_d: Option<Decimal>,
    pub vwap: Option<Decimal>,
    pub obv: Option<Decimal>,
    pub swing_high: Option<Decimal>,
    pub swing_low: Option<Decimal>,
    pub nearest_resistance: Option<Decimal>,
    pub nearest_support: Option<Decimal>,
    pub trend_label: TrendLabel,
    pub volatility_class: VolatilityClass,
    pub potential_top: bool,
    pub potential_bottom: bool,
    /// Count of {RSI, MACD histogram, OBV, Stochastic} series currently showing bullish divergence.
    pub bullish_divergence_count: u8,
    /// Count of {RSI, MACD histogram, OBV, Stochastic} series currently showing bearish divergence.
    pub bearish_divergence_count: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendLabel {
    Up,
    Down,
    #[default]
    Flat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityClass {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bull,
    Bear,
    Neutral,
}

/// Output of the signal engine for one (coin, bar). Produced once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub side: Option<Side>,
    pub signal: Signal,
    pub score: Decimal,
    pub confluence_level: u8,
    pub regime: Regime,
    pub strategy: StrategyKind,
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit_1: Decimal,
    pub take_profit_2: Option<Decimal>,
    pub take_profit_3: Option<Decimal>,
    pub top_strategies: Vec<StrategyKind>,
    pub reasoning: Vec<String>,
    pub score_breakdown: ScoreBreakdown,
}

impl Decision {
    pub fn hold(entry: Decimal, reasoning: Vec<String>) -> Self {
        Self {
            side: None,
            signal: Signal::Hold,
            score: Decimal::ZERO,
            confluence_level: 0,
            regime: Regime::Mixed,
            strategy: StrategyKind::Swing,
            entry,
            stop_loss: entry,
            take_profit_1: entry,
            take_profit_2: None,
            take_profit_3: None,
            top_strategies: Vec::new(),
            reasoning,
            score_breakdown: ScoreBreakdown::default(),
        }
    }
}
