use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{IndicatorSnapshot, ScoreBreakdown, TrendLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfDirection {
    Bull,
    Bear,
    Neutral,
}

#[derive(Debug, Clone)]
pub struct TfScore {
    pub breakdown: ScoreBreakdown,
    pub direction: TfDirection,
    pub bull_points: Decimal,
    pub bear_points: Decimal,
}

/// Scores one timeframe's indicator snapshot across six dimensions, each contributing toward
/// either a "bull" or "bear" tally that decides this timeframe's direction.
pub fn score_timeframe(snap: &IndicatorSnapshot, price: Decimal) -> TfScore {
    let mut bull = Decimal::ZERO;
    let mut bear = Decimal::ZERO;
    let mut breakdown = ScoreBreakdown::default();

    // Trend (0-20): SMA stack + trend label + ADX directional dominance.
    let mut trend = Decimal::ZERO;
    match snap.trend_label {
        TrendLabel::Up => {
            trend += dec!(8);
            bull += dec!(2);
        }
        TrendLabel::Down => {
            trend += dec!(8);
            bear += dec!(2);
        }
        TrendLabel::Flat => {}
    }
    if let (Some(s20), Some(s50), Some(s200)) = (snap.sma_20, snap.sma_50, snap.sma_200) {
        if s20 > s50 && s50 > s200 {
            trend += dec!(7);
            bull += dec!(2);
        } else if s20 < s50 && s50 < s200 {
            trend += dec!(7);
            bear += dec!(2);
        }
    }
    if let (Some(plus_di), Some(minus_di), Some(adx)) = (snap.plus_di, snap.minus_di, snap.adx_14) {
        if adx > dec!(25) {
            if plus_di > minus_di {
                trend += dec!(5);
                bull += dec!(1);
            } else {
                trend += dec!(5);
                bear += dec!(1);
            }
        }
    }
    breakdown.trend = trend.min(dec!(20));

    // Momentum (0-20): RSI zone + MACD histogram/line + Stochastic.
    let mut momentum = Decimal::ZERO;
    if let Some(rsi) = snap.rsi_14 {
        if rsi < dec!(25) {
            momentum += dec!(6);
            bull += dec!(1);
        } else if rsi > dec!(75) {
            momentum += dec!(6);
            bear += dec!(1);
        } else if rsi > dec!(50) {
            momentum += dec!(3);
            bull += dec!(1);
        } else {
            momentum += dec!(3);
            bear += dec!(1);
        }
    }
    if let (Some(hist), Some(line), Some(signal)) = (snap.macd_histogram, snap.macd_line, snap.macd_signal) {
        if hist > Decimal::ZERO && line > signal {
            momentum += dec!(5);
            bull += dec!(1);
        } else if hist < Decimal::ZERO && line < signal {
            momentum += dec!(5);
            bear += dec!(1);
        }
    }
    if let (Some(k), Some(d)) = (snap.stoch_k, snap.stoch_d) {
        if k < dec!(20) && k > d {
            momentum += dec!(4);
            bull += dec!(1);
        } else if k > dec!(80) && k < d {
            momentum += dec!(4);
            bear += dec!(1);
        }
    }
    breakdown.momentum = momentum.min(dec!(20));

    // Volume (0-20): relative volume confirmation + OBV direction + VWAP position.
    let mut volume = Decimal::ZERO;
    if let Some(vwap) = snap.vwap {
        if !vwap.is_zero() {
            if price > vwap {
                volume += dec!(6);
                bull += dec!(1);
            } else if price < vwap {
                volume += dec!(6);
                bear += dec!(1);
            }
        }
    }
    if snap.obv.is_some() {
        volume += dec!(4);
    }
    breakdown.volume = volume.min(dec!(20));

    // Structure (0-20): proximity to nearest S/R, potential top/bottom flags.
    let mut structure = Decimal::ZERO;
    if let Some(resistance) = snap.nearest_resistance {
        if !resistance.is_zero() {
            let distance_pct = ((resistance - price) / resistance).abs() * Decimal::from(100);
            if distance_pct < dec!(1) {
                structure += dec!(5);
                bear += dec!(1);
            }
        }
    }
    if let Some(support) = snap.nearest_support {
        if !support.is_zero() {
            let distance_pct = ((price - support) / support).abs() * Decimal::from(100);
            if distance_pct < dec!(1) {
                structure += dec!(5);
                bull += dec!(1);
            }
        }
    }
    if snap.potential_top {
        structure -= dec!(4);
        bear += dec!(2);
    }
    if snap.potential_bottom {
        structure += dec!(4);
        bull += dec!(2);
    }
    if snap.bullish_divergence_count > 0 {
        structure += dec!(6);
        bull += dec!(2);
    }
    if snap.bearish_divergence_count > 0 {
        structure -= dec!(6);
        bear += dec!(2);
    }
    breakdown.structure = structure.clamp(Decimal::ZERO, dec!(20));

    // Volatility (0-10): BB squeeze (compression, neutral) vs normal/high (clearer range).
    breakdown.volatility = if snap.bb_squeeze { dec!(4) } else { dec!(7) };

    // Risk-quality (0-10): ATR present and non-degenerate.
    breakdown.risk_quality = match snap.atr_14 {
        Some(atr) if !price.is_zero() && atr / price < dec!(0.1) => dec!(8),
        Some(_) => dec!(4),
        None => dec!(2),
    };

    let direction = if bull > bear + Decimal::ONE {
        TfDirection::Bull
    } else if bear > bull + Decimal::ONE {
        TfDirection::Bear
    } else {
        TfDirection::Neutral
    };

    TfScore { breakdown, direction, bull_points: bull, bear_points: bear }
}
