use rust_decimal_macros::dec;

use crate::types::{IndicatorSnapshot, Regime, TrendLabel, VolatilityClass};

/// Classifies market regime from the 1d/4h indicator snapshots' ADX, trend label, BB squeeze and
/// volatility class.
pub fn detect_regime(daily: Option<&IndicatorSnapshot>, four_hour: Option<&IndicatorSnapshot>) -> Regime {
    let adx = four_hour.and_then(|s| s.adx_14).or_else(|| daily.and_then(|s| s.adx_14));
    let squeeze = four_hour.map(|s| s.bb_squeeze).unwrap_or(false) || daily.map(|s| s.bb_squeeze).unwrap_or(false);
    let volatility = four_hour.map(|s| s.volatility_class).unwrap_or(VolatilityClass::Normal);
    let trend_label = four_hour
        .map(|s| s.trend_label)
        .or_else(|| daily.map(|s| s.trend_label))
        .unwrap_or(TrendLabel::Flat);

    if squeeze {
        return Regime::Compression;
    }

    match (adx, volatility) {
        (Some(adx), _) if adx > dec!(25) && !matches!(trend_label, TrendLabel::Flat) => Regime::Trending,
        (_, VolatilityClass::High) => Regime::Volatile,
        (Some(adx), _) if adx < dec!(18) => Regime::Ranging,
        _ => Regime::Mixed,
    }
}
