use rust_decimal::Decimal;

use super::wilder_series;

fn true_ranges(highs: &[Decimal], lows: &[Decimal], closes: &[Decimal]) -> Vec<Decimal> {
    let mut out = Vec::with_capacity(highs.len());
    for i in 0..highs.len() {
        let hl = highs[i] - lows[i];
        let tr = if i == 0 {
            hl
        } else {
            let hc = (highs[i] - closes[i - 1]).abs();
            let lc = (lows[i] - closes[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        out.push(tr);
    }
    out
}

/// Wilder-smoothed average true range, one entry per bar.
pub fn atr_series(highs: &[Decimal], lows: &[Decimal], closes: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let tr = true_ranges(highs, lows, closes);
    wilder_series(&tr, period)
}

pub fn atr_last(highs: &[Decimal], lows: &[Decimal], closes: &[Decimal], period: usize) -> Option<Decimal> {
    atr_series(highs, lows, closes, period).last().copied().flatten()
}

#[derive(Debug, Clone, Copy)]
pub struct AdxPoint {
    pub adx: Decimal,
    pub plus_di: Decimal,
    pub minus_di: Decimal,
}

/// Wilder ADX/+DI/-DI, one entry per bar.
pub fn adx_series(highs: &[Decimal], lows: &[Decimal], closes: &[Decimal], period: usize) -> Vec<Option<AdxPoint>> {
    let n = highs.len();
    if n < 2 {
        return vec![None; n];
    }
    let tr = true_ranges(highs, lows, closes);
    let mut plus_dm = vec![Decimal::ZERO; n];
    let mut minus_dm = vec![Decimal::ZERO; n];
    for i in 1..n {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];
        if up_move > down_move && up_move > Decimal::ZERO {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > Decimal::ZERO {
            minus_dm[i] = down_move;
        }
    }

    let smoothed_tr = wilder_series(&tr, period);
    let smoothed_plus = wilder_series(&plus_dm, period);
    let smoothed_minus = wilder_series(&minus_dm, period);

    let mut dx = vec![None; n];
    for i in 0..n {
        if let (Some(atr), Some(pdm), Some(mdm)) = (smoothed_tr[i], smoothed_plus[i], smoothed_minus[i]) {
            if atr.is_zero() {
                continue;
            }
            let plus_di = Decimal::from(100) * pdm / atr;
            let minus_di = Decimal::from(100) * mdm / atr;
            let di_sum = plus_di + minus_di;
            let dx_val = if di_sum.is_zero() {
                Decimal::ZERO
            } else {
                Decimal::from(100) * (plus_di - minus_di).abs() / di_sum
            };
            dx[i] = Some((dx_val, plus_di, minus_di));
        }
    }

    let dx_values: Vec<Decimal> = dx.iter().map(|d| d.map(|(x, _, _)| x).unwrap_or(Decimal::ZERO)).collect();
    let valid_from = dx.iter().position(|d| d.is_some());
    let Some(valid_from) = valid_from else {
        return vec![None; n];
    };
    let adx_smoothed = wilder_series(&dx_values[valid_from..], period);

    let mut out = vec![None; n];
    for (i, adx) in adx_smoothed.iter().enumerate() {
        if let Some(adx) = adx {
            let idx = valid_from + i;
            if let Some((_, plus_di, minus_di)) = dx[idx] {
                out[idx] = Some(AdxPoint {
                    adx: *adx,
                    plus_di,
                    minus_di,
                });
            }
        }
    }
    out
}

pub fn adx_last(highs: &[Decimal], lows: &[Decimal], closes: &[Decimal], period: usize) -> Option<AdxPoint> {
    adx_series(highs, lows, closes, period).last().copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn flat_range_yields_small_atr() {
        let highs = vec![dec!(10); 20];
        let lows = vec![dec!(9); 20];
        let closes = vec![dec!(9.5); 20];
        let atr = atr_last(&highs, &lows, &closes, 14).unwrap();
        assert_eq!(atr, dec!(1));
    }
}
