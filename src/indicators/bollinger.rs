use rust_decimal::Decimal;

use super::{sma, stddev};

#[derive(Debug, Clone, Copy)]
pub struct BollingerPoint {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
    pub bandwidth: Decimal,
    pub percent_b: Decimal,
}

pub fn bollinger_series(closes: &[Decimal], period: usize, std_dev_multiplier: Decimal) -> Vec<Option<BollingerPoint>> {
    (0..closes.len())
        .map(|i| {
            let window = &closes[..=i];
            let middle = sma(window, period)?;
            let dev = stddev(window, period)?;
            let deviation = dev * std_dev_multiplier;
            let upper = middle + deviation;
            let lower = middle - deviation;
            let band_range = upper - lower;
            let bandwidth = if middle.is_zero() { Decimal::ZERO } else { band_range / middle * Decimal::from(100) };
            let percent_b = if band_range.is_zero() {
                Decimal::new(5, 1)
            } else {
                (closes[i] - lower) / band_range
            };
            Some(BollingerPoint { upper, middle, lower, bandwidth, percent_b })
        })
        .collect()
}

pub fn bollinger_last(closes: &[Decimal], period: usize, std_dev_multiplier: Decimal) -> Option<BollingerPoint> {
    bollinger_series(closes, period, std_dev_multiplier).last().copied().flatten()
}

/// A squeeze is flagged when current bandwidth sits in the lowest quartile of the trailing window.
pub fn is_squeeze(series: &[Option<BollingerPoint>], lookback: usize) -> bool {
    let recent: Vec<Decimal> = series.iter().rev().take(lookback).filter_map(|p| p.map(|b| b.bandwidth)).collect();
    if recent.len() < lookback {
        return false;
    }
    let Some(current) = recent.first().copied() else { return false };
    let mut sorted = recent.clone();
    sorted.sort();
    let quartile = sorted[sorted.len() / 4];
    current <= quartile
}
