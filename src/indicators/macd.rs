use rust_decimal::Decimal;

use super::ema_series;

#[derive(Debug, Clone, Copy)]
pub struct MacdPoint {
    pub macd_line: Decimal,
    pub signal_line: Decimal,
    pub histogram: Decimal,
}

/// MACD(fast, slow, signal) over a close series, one entry per bar (`None` until the slow EMA
/// and the signal EMA over the MACD line both have enough history).
pub fn macd_series(
    closes: &[Decimal],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Vec<Option<MacdPoint>> {
    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);

    let macd_line: Vec<Decimal> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => *f - *s,
            _ => Decimal::ZERO,
        })
        .collect();

    let valid_from = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .position(|(f, s)| f.is_some() && s.is_some());

    let Some(valid_from) = valid_from else {
        return vec![None; closes.len()];
    };

    let signal_input = &macd_line[valid_from..];
    let signal_ema = ema_series(signal_input, signal);

    let mut out = vec![None; closes.len()];
    for (i, sig) in signal_ema.iter().enumerate() {
        if let Some(sig) = sig {
            let idx = valid_from + i;
            let line = macd_line[idx];
            out[idx] = Some(MacdPoint {
                macd_line: line,
                signal_line: *sig,
                histogram: line - *sig,
            });
        }
    }
    out
}

pub fn macd_last(closes: &[Decimal], fast: usize, slow: usize, signal: usize) -> Option<MacdPoint> {
    macd_series(closes, fast, slow, signal).last().copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn uptrend_yields_positive_histogram() {
        let closes: Vec<Decimal> = (1..=60).map(Decimal::from).collect();
        let point = macd_last(&closes, 12, 26, 9).unwrap();
        assert!(point.histogram > dec!(0));
        assert!(point.macd_line > dec!(0));
    }
}
