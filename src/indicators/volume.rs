use rust_decimal::Decimal;

/// Volume-weighted average price, cumulative from the start of the supplied slice.
pub fn vwap_series(highs: &[Decimal], lows: &[Decimal], closes: &[Decimal], volumes: &[Decimal]) -> Vec<Option<Decimal>> {
    let mut cum_tp_vol = Decimal::ZERO;
    let mut cum_vol = Decimal::ZERO;
    (0..closes.len())
        .map(|i| {
            let typical = (highs[i] + lows[i] + closes[i]) / Decimal::from(3);
            cum_tp_vol += typical * volumes[i];
            cum_vol += volumes[i];
            if cum_vol.is_zero() {
                None
            } else {
                Some(cum_tp_vol / cum_vol)
            }
        })
        .collect()
}

pub fn obv_series(closes: &[Decimal], volumes: &[Decimal]) -> Vec<Decimal> {
    let mut out = Vec::with_capacity(closes.len());
    let mut value = Decimal::ZERO;
    for i in 0..closes.len() {
        if i > 0 {
            if closes[i] > closes[i - 1] {
                value += volumes[i];
            } else if closes[i] < closes[i - 1] {
                value -= volumes[i];
            }
        }
        out.push(value);
    }
    out
}

pub fn relative_volume(volumes: &[Decimal], period: usize) -> Option<Decimal> {
    let avg = super::sma(volumes, period)?;
    let current = *volumes.last()?;
    if avg.is_zero() {
        Some(Decimal::ONE)
    } else {
        Some(current / avg)
    }
}
