use rust_decimal::Decimal;

/// EMA series seeded by a plain SMA over the first `period` closes, then rolled forward with the
/// standard multiplier `2/(period+1)`. `None` before the seed index.
pub fn ema_series(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let mut out = vec![None; values.len()];
    if values.len() < period || period == 0 {
        return out;
    }
    let period_dec = Decimal::from(period as u32);
    let seed: Decimal = values[..period].iter().sum::<Decimal>() / period_dec;
    out[period - 1] = Some(seed);
    let multiplier = Decimal::from(2) / (period_dec + Decimal::ONE);
    let mut prev = seed;
    for (i, v) in values.iter().enumerate().skip(period) {
        let next = (*v - prev) * multiplier + prev;
        out[i] = Some(next);
        prev = next;
    }
    out
}

pub fn ema_last(values: &[Decimal], period: usize) -> Option<Decimal> {
    ema_series(values, period).last().copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn seeds_with_sma_then_rolls_forward() {
        let closes = vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5), dec!(6)];
        let series = ema_series(&closes, 3);
        assert_eq!(series[0], None);
        assert_eq!(series[1], None);
        assert_eq!(series[2], Some(dec!(2))); // sma(1,2,3)
        assert!(series[5].unwrap() > series[2].unwrap());
    }
}
