//! Pure functions over numeric slices. No I/O, no shared state, fully deterministic.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod snapshot;
pub mod structure;
pub mod volume;

pub use atr::*;
pub use bollinger::*;
pub use ema::*;
pub use macd::*;
pub use rsi::*;
pub use snapshot::*;
pub use structure::*;
pub use volume::*;

use rust_decimal::Decimal;

pub fn sma(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period || period == 0 {
        return None;
    }
    let sum: Decimal = values.iter().rev().take(period).sum();
    Some(sum / Decimal::from(period as u32))
}

/// Simple moving average at every index that has enough history; `None` before that.
pub fn sma_series(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    (0..values.len())
        .map(|i| sma(&values[..=i], period))
        .collect()
}

pub fn highest(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period || period == 0 {
        return None;
    }
    values.iter().rev().take(period).max().copied()
}

pub fn lowest(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period || period == 0 {
        return None;
    }
    values.iter().rev().take(period).min().copied()
}

pub fn stddev(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period {
        return None;
    }
    let mean = sma(values, period)?;
    let variance: Decimal = values
        .iter()
        .rev()
        .take(period)
        .map(|v| {
            let diff = *v - mean;
            diff * diff
        })
        .sum::<Decimal>()
        / Decimal::from(period as u32);

    Some(sqrt_decimal(variance))
}

pub fn sqrt_decimal(value: Decimal) -> Decimal {
    if value.is_zero() || value.is_sign_negative() {
        return Decimal::ZERO;
    }

    let mut guess = value / Decimal::from(2);
    let epsilon = Decimal::new(1, 10);

    for _ in 0..50 {
        let new_guess = (guess + value / guess) / Decimal::from(2);
        if (new_guess - guess).abs() < epsilon {
            return new_guess;
        }
        guess = new_guess;
    }
    guess
}

/// Wilder-style smoothing recurrence shared by RSI/ATR/ADX: seed with a plain average over the
/// first `period` values, then roll forward with `(prev*(period-1)+new)/period`.
pub fn wilder_series(raw: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let mut out = vec![None; raw.len()];
    if raw.len() < period || period == 0 {
        return out;
    }
    let period_dec = Decimal::from(period as u32);
    let seed: Decimal = raw[..period].iter().sum::<Decimal>() / period_dec;
    out[period - 1] = Some(seed);
    let mut prev = seed;
    for i in period..raw.len() {
        let next = (prev * (period_dec - Decimal::ONE) + raw[i]) / period_dec;
        out[i] = Some(next);
        prev = next;
    }
    out
}
