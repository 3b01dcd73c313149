use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{Candle, IndicatorSnapshot, TrendLabel, VolatilityClass};

use super::{
    adx_series, atr_series, bollinger_series, detect_divergence, ema_series, is_squeeze, macd_series,
    nearest_levels, obv_series, rsi_series, sma_series, stochastic_series, swing_highs, swing_lows, vwap_series,
};

/// Builds one `IndicatorSnapshot` per bar in a single forward pass over the candle slice: every
/// per-bar series (SMA/EMA/RSI/MACD/ATR/ADX/Bollinger/Stochastic/VWAP/OBV) is computed once over
/// the whole slice rather than recomputed independently bar by bar.
pub fn build_snapshot_series(candles: &[Candle]) -> Vec<IndicatorSnapshot> {
    let n = candles.len();
    if n == 0 {
        return Vec::new();
    }
    let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
    let highs: Vec<Decimal> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<Decimal> = candles.iter().map(|c| c.low).collect();
    let volumes: Vec<Decimal> = candles.iter().map(|c| c.volume).collect();

    let sma20 = sma_series(&closes, 20);
    let sma50 = sma_series(&closes, 50);
    let sma200 = sma_series(&closes, 200);
    let ema12 = ema_series(&closes, 12);
    let ema26 = ema_series(&closes, 26);
    let rsi14 = rsi_series(&closes, 14);
    let macd = macd_series(&closes, 12, 26, 9);
    let atr14 = atr_series(&highs, &lows, &closes, 14);
    let adx14 = adx_series(&highs, &lows, &closes, 14);
    let bb = bollinger_series(&closes, 20, dec!(2));
    let stoch = stochastic_series(&highs, &lows, &closes, 14, 3);
    let vwap = vwap_series(&highs, &lows, &closes, &volumes);
    let obv = obv_series(&closes, &volumes);

    let swings_high = swing_highs(candles, 2);
    let swings_low = swing_lows(candles, 2);
    let (rsi_bullish_div, rsi_bearish_div) = detect_divergence(&swings_low, &swings_high, &rsi14);
    let macd_hist: Vec<Option<Decimal>> = macd.iter().map(|m| m.map(|p| p.histogram)).collect();
    let (macd_bullish_div, macd_bearish_div) = detect_divergence(&swings_low, &swings_high, &macd_hist);
    let obv_opt: Vec<Option<Decimal>> = obv.iter().copied().map(Some).collect();
    let (obv_bullish_div, obv_bearish_div) = detect_divergence(&swings_low, &swings_high, &obv_opt);
    let stoch_k: Vec<Option<Decimal>> = stoch.iter().map(|s| s.map(|p| p.k)).collect();
    let (stoch_bullish_div, stoch_bearish_div) = detect_divergence(&swings_low, &swings_high, &stoch_k);

    let bullish_divergence_count =
        [rsi_bullish_div, macd_bullish_div, obv_bullish_div, stoch_bullish_div].iter().filter(|d| **d).count() as u8;
    let bearish_divergence_count =
        [rsi_bearish_div, macd_bearish_div, obv_bearish_div, stoch_bearish_div].iter().filter(|d| **d).count() as u8;

    (0..n)
        .map(|i| {
            let price = closes[i];
            let (resistance, support) = nearest_levels(&swings_high, &swings_low, price);

            let trend_label = match (sma20[i], sma50[i]) {
                (Some(s20), Some(s50)) if s20 > s50 => TrendLabel::Up,
                (Some(s20), Some(s50)) if s20 < s50 => TrendLabel::Down,
                _ => TrendLabel::Flat,
            };

            let volatility_class = match atr14[i] {
                Some(atr) if !price.is_zero() => {
                    let pct = atr / price * Decimal::from(100);
                    if pct > dec!(3) {
                        VolatilityClass::High
                    } else if pct < dec!(1) {
                        VolatilityClass::Low
                    } else {
                        VolatilityClass::Normal
                    }
                }
                _ => VolatilityClass::Normal,
            };

            let squeeze = is_squeeze(&bb, 20.min(i + 1));

            let potential_top = matches!(bb[i], Some(b) if price >= b.upper) && rsi14[i].map_or(false, |r| r > dec!(70));
            let potential_bottom = matches!(bb[i], Some(b) if price <= b.lower) && rsi14[i].map_or(false, |r| r < dec!(30));

            IndicatorSnapshot {
                sma_20: sma20[i],
                sma_50: sma50[i],
                sma_200: sma200[i],
                ema_12: ema12[i],
                ema_26: ema26[i],
                rsi_14: rsi14[i],
                macd_line: macd[i].map(|m| m.macd_line),
                macd_signal: macd[i].map(|m| m.signal_line),
                macd_histogram: macd[i].map(|m| m.histogram),
                atr_14: atr14[i],
                adx_14: adx14[i].map(|a| a.adx),
                plus_di: adx14[i].map(|a| a.plus_di),
                minus_di: adx14[i].map(|a| a.minus_di),
                bb_upper: bb[i].map(|b| b.upper),
                bb_middle: bb[i].map(|b| b.middle),
                bb_lower: bb[i].map(|b| b.lower),
                bb_squeeze: squeeze,
                stoch_k: stoch[i].map(|s| s.k),
                stoch_d: stoch[i].map(|s| s.d),
                vwap: vwap[i],
                obv: Some(obv[i]),
                swing_high: swings_high.iter().filter(|s| s.index <= i).last().map(|s| s.price),
                swing_low: swings_low.iter().filter(|s| s.index <= i).last().map(|s| s.price),
                nearest_resistance: resistance,
                nearest_support: support,
                trend_label,
                volatility_class,
                potential_top,
                potential_bottom,
                bullish_divergence_count,
                bearish_divergence_count,
            }
        })
        .collect()
}

pub fn build_snapshot_last(candles: &[Candle]) -> Option<IndicatorSnapshot> {
    build_snapshot_series(candles).into_iter().last()
}
