use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TimeFrame;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timeframe: TimeFrame,
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn body_size(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> Decimal {
        self.high - self.close.max(self.open)
    }

    pub fn lower_wick(&self) -> Decimal {
        self.close.min(self.open) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body_percentage(&self) -> Decimal {
        let range = self.range();
        if range.is_zero() {
            return Decimal::ZERO;
        }
        (self.body_size() / range) * Decimal::from(100)
    }

    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }

    pub fn change_percentage(&self) -> Decimal {
        if self.open.is_zero() {
            return Decimal::ZERO;
        }
        ((self.close - self.open) / self.open) * Decimal::from(100)
    }
}

/// A snapshot of the latest known price for a coin, with a freshness timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub price_usd: Decimal,
    pub change_24h_pct: Decimal,
    pub volume_24h: Decimal,
    pub market_cap: Option<Decimal>,
    pub last_updated: DateTime<Utc>,
}

impl Quote {
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: chrono::Duration) -> bool {
        now - self.last_updated > stale_after
    }
}

/// A fully time-aligned multi-timeframe candle slice as of a given bar.
#[derive(Debug, Clone, Default)]
pub struct CandleSlice {
    pub by_timeframe: std::collections::BTreeMap<TimeFrame, Vec<Candle>>,
}

impl CandleSlice {
    pub fn get(&self, tf: TimeFrame) -> &[Candle] {
        self.by_timeframe
            .get(&tf)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn closes(&self, tf: TimeFrame) -> Vec<Decimal> {
        self.get(tf).iter().map(|c| c.close).collect()
    }

    pub fn highs(&self, tf: TimeFrame) -> Vec<Decimal> {
        self.get(tf).iter().map(|c| c.high).collect()
    }

    pub fn lows(&self, tf: TimeFrame) -> Vec<Decimal> {
        self.get(tf).iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self, tf: TimeFrame) -> Vec<Decimal> {
        self.get(tf).iter().map(|c| c.volume).collect()
    }

    pub fn last_close(&self, tf: TimeFrame) -> Option<Decimal> {
        self.get(tf).last().map(|c| c.close)
    }
}
