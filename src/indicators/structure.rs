use rust_decimal::Decimal;

use crate::types::Candle;

/// A pivot high/low detected with a `±width` bar window (a swing point must be the extreme of
/// `width` bars on each side).
#[derive(Debug, Clone, Copy)]
pub struct SwingPoint {
    pub index: usize,
    pub price: Decimal,
}

pub fn swing_highs(candles: &[Candle], width: usize) -> Vec<SwingPoint> {
    let mut out = Vec::new();
    if candles.len() < width * 2 + 1 {
        return out;
    }
    for i in width..candles.len() - width {
        let pivot = candles[i].high;
        let is_peak = (i - width..i).chain(i + 1..=i + width).all(|j| candles[j].high <= pivot);
        if is_peak {
            out.push(SwingPoint { index: i, price: pivot });
        }
    }
    out
}

pub fn swing_lows(candles: &[Candle], width: usize) -> Vec<SwingPoint> {
    let mut out = Vec::new();
    if candles.len() < width * 2 + 1 {
        return out;
    }
    for i in width..candles.len() - width {
        let pivot = candles[i].low;
        let is_trough = (i - width..i).chain(i + 1..=i + width).all(|j| candles[j].low >= pivot);
        if is_trough {
            out.push(SwingPoint { index: i, price: pivot });
        }
    }
    out
}

/// Nearest resistance/support above/below `price` from the detected swing points.
pub fn nearest_levels(swings_high: &[SwingPoint], swings_low: &[SwingPoint], price: Decimal) -> (Option<Decimal>, Option<Decimal>) {
    let resistance = swings_high
        .iter()
        .map(|s| s.price)
        .filter(|p| *p > price)
        .min();
    let support = swings_low
        .iter()
        .map(|s| s.price)
        .filter(|p| *p < price)
        .max();
    (resistance, support)
}

/// Groups swing extremes within 0.5% of each other into a single liquidity level.
pub fn liquidity_clusters(swings: &[SwingPoint]) -> Vec<Decimal> {
    let mut prices: Vec<Decimal> = swings.iter().map(|s| s.price).collect();
    prices.sort();
    let mut clusters: Vec<Vec<Decimal>> = Vec::new();
    for p in prices {
        if let Some(last) = clusters.last_mut() {
            let anchor = last[0];
            if anchor.is_zero() {
                clusters.push(vec![p]);
                continue;
            }
            if ((p - anchor) / anchor).abs() <= Decimal::new(5, 3) {
                last.push(p);
                continue;
            }
        }
        clusters.push(vec![p]);
    }
    clusters
        .into_iter()
        .map(|c| c.iter().sum::<Decimal>() / Decimal::from(c.len() as u32))
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct OrderBlock {
    pub index: usize,
    pub bullish: bool,
    pub low: Decimal,
    pub high: Decimal,
}

/// An order block: an opposing candle immediately followed by a move exceeding `0.4*ATR`.
pub fn order_blocks(candles: &[Candle], atr: &[Option<Decimal>], move_atr_mult: Decimal) -> Vec<OrderBlock> {
    let mut out = Vec::new();
    for i in 0..candles.len().saturating_sub(1) {
        let Some(atr_val) = atr[i] else { continue };
        let threshold = atr_val * move_atr_mult;
        let candle = &candles[i];
        let next = &candles[i + 1];
        if candle.is_bearish() && next.close - candle.high > threshold {
            out.push(OrderBlock { index: i, bullish: true, low: candle.low, high: candle.high });
        } else if candle.is_bullish() && candle.low - next.close > threshold {
            out.push(OrderBlock { index: i, bullish: false, low: candle.low, high: candle.high });
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
pub struct FairValueGap {
    pub index: usize,
    pub bullish: bool,
    pub gap_low: Decimal,
    pub gap_high: Decimal,
}

/// A 3-candle imbalance: candle[i-1].high < candle[i+1].low (bullish gap) or the mirror (bearish).
pub fn fair_value_gaps(candles: &[Candle]) -> Vec<FairValueGap> {
    let mut out = Vec::new();
    if candles.len() < 3 {
        return out;
    }
    for i in 1..candles.len() - 1 {
        let prev = &candles[i - 1];
        let next = &candles[i + 1];
        if prev.high < next.low {
            out.push(FairValueGap { index: i, bullish: true, gap_low: prev.high, gap_high: next.low });
        } else if prev.low > next.high {
            out.push(FairValueGap { index: i, bullish: false, gap_low: next.high, gap_high: prev.low });
        }
    }
    out
}

/// Compares the two most recent swing lows/highs against an indicator series sampled at the
/// same indices to detect price/indicator divergence.
pub fn detect_divergence(
    swings_low: &[SwingPoint],
    swings_high: &[SwingPoint],
    indicator: &[Option<Decimal>],
) -> (bool, bool) {
    let bullish = last_two(swings_low).map_or(false, |(a, b)| {
        price_lower_indicator_higher(a, b, indicator)
    });
    let bearish = last_two(swings_high).map_or(false, |(a, b)| {
        price_higher_indicator_lower(a, b, indicator)
    });
    (bullish, bearish)
}

fn last_two(points: &[SwingPoint]) -> Option<(SwingPoint, SwingPoint)> {
    if points.len() < 2 {
        return None;
    }
    let len = points.len();
    Some((points[len - 2], points[len - 1]))
}

fn price_lower_indicator_higher(a: SwingPoint, b: SwingPoint, indicator: &[Option<Decimal>]) -> bool {
    let (Some(ia), Some(ib)) = (indicator.get(a.index).copied().flatten(), indicator.get(b.index).copied().flatten()) else {
        return false;
    };
    b.price < a.price && ib > ia
}

fn price_higher_indicator_lower(a: SwingPoint, b: SwingPoint, indicator: &[Option<Decimal>]) -> bool {
    let (Some(ia), Some(ib)) = (indicator.get(a.index).copied().flatten(), indicator.get(b.index).copied().flatten()) else {
        return false;
    };
    b.price > a.price && ib < ia
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn candle(o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Candle {
        Candle {
            timeframe: crate::types::TimeFrame::H1,
            open_time: Utc::now(),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: dec!(100),
        }
    }

    #[test]
    fn finds_bullish_fvg() {
        let candles = vec![
            candle(dec!(10), dec!(11), dec!(9), dec!(10.5)),
            candle(dec!(10.5), dec!(11.5), dec!(10.2), dec!(11.2)),
            candle(dec!(12), dec!(13), dec!(11.8), dec!(12.5)),
        ];
        let gaps = fair_value_gaps(&candles);
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].bullish);
    }
}
