use rust_decimal::Decimal;

use super::wilder_series;

/// Wilder-smoothed RSI over a close series. `None` for the first `period` bars.
pub fn rsi_series(closes: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    if closes.len() < 2 {
        return vec![None; closes.len()];
    }
    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        gains.push(if change > Decimal::ZERO { change } else { Decimal::ZERO });
        losses.push(if change < Decimal::ZERO { change.abs() } else { Decimal::ZERO });
    }
    let avg_gain = wilder_series(&gains, period);
    let avg_loss = wilder_series(&losses, period);

    let mut out = vec![None; closes.len()];
    for i in 0..avg_gain.len() {
        if let (Some(g), Some(l)) = (avg_gain[i], avg_loss[i]) {
            let rsi = if l.is_zero() {
                Decimal::from(100)
            } else {
                let rs = g / l;
                Decimal::from(100) - (Decimal::from(100) / (Decimal::ONE + rs))
            };
            out[i + 1] = Some(rsi);
        }
    }
    out
}

pub fn rsi_last(closes: &[Decimal], period: usize) -> Option<Decimal> {
    rsi_series(closes, period).last().copied().flatten()
}

#[derive(Debug, Clone, Copy)]
pub struct StochasticPoint {
    pub k: Decimal,
    pub d: Decimal,
}

/// Classic %K/%D stochastic oscillator over the high/low/close window.
pub fn stochastic_series(
    highs: &[Decimal],
    lows: &[Decimal],
    closes: &[Decimal],
    k_period: usize,
    d_period: usize,
) -> Vec<Option<StochasticPoint>> {
    let n = closes.len();
    let mut k_values: Vec<Option<Decimal>> = vec![None; n];
    for i in 0..n {
        if i + 1 < k_period {
            continue;
        }
        let window_start = i + 1 - k_period;
        let hh = highs[window_start..=i].iter().cloned().fold(Decimal::MIN, Decimal::max);
        let ll = lows[window_start..=i].iter().cloned().fold(Decimal::MAX, Decimal::min);
        let range = hh - ll;
        k_values[i] = Some(if range.is_zero() {
            Decimal::from(50)
        } else {
            (closes[i] - ll) / range * Decimal::from(100)
        });
    }

    let mut out = vec![None; n];
    for i in 0..n {
        if i + 1 < d_period {
            continue;
        }
        let window = &k_values[i + 1 - d_period..=i];
        if window.iter().any(|v| v.is_none()) {
            continue;
        }
        let sum: Decimal = window.iter().map(|v| v.unwrap()).sum();
        let d = sum / Decimal::from(d_period as u32);
        out[i] = Some(StochasticPoint { k: k_values[i].unwrap(), d });
    }
    out
}

pub fn stochastic_last(
    highs: &[Decimal],
    lows: &[Decimal],
    closes: &[Decimal],
    k_period: usize,
    d_period: usize,
) -> Option<StochasticPoint> {
    stochastic_series(highs, lows, closes, k_period, d_period).last().copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn monotonic_rise_pushes_rsi_toward_100() {
        let closes: Vec<Decimal> = (1..=20).map(Decimal::from).collect();
        let rsi = rsi_last(&closes, 14).unwrap();
        assert!(rsi > dec!(80));
    }

    #[test]
    fn insufficient_history_is_none() {
        let closes = vec![dec!(1), dec!(2)];
        assert_eq!(rsi_last(&closes, 14), None);
    }
}
