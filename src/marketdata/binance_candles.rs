use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;

use crate::types::{Candle, CoinId, TimeFrame};

use super::providers::{CandleProvider, ProviderError};

const BINANCE_US_API: &str = "https://api.binance.us";

/// Public Binance klines source, keyed by exchange symbol ("BTCUSDT") rather than CoinGecko id.
/// `symbol_map` resolves a `CoinId` to the symbol Binance expects.
#[derive(Debug, Clone)]
pub struct BinanceCandleProvider {
    client: Client,
    base_url: String,
    symbol_map: HashMap<CoinId, String>,
}

impl BinanceCandleProvider {
    pub fn new(symbol_map: HashMap<CoinId, String>) -> Self {
        Self {
            client: Client::new(),
            base_url: BINANCE_US_API.to_string(),
            symbol_map,
        }
    }

    fn symbol_for(&self, coin_id: &CoinId) -> Result<&str, ProviderError> {
        self.symbol_map
            .get(coin_id)
            .map(String::as_str)
            .ok_or_else(|| ProviderError::Decode(format!("no exchange symbol mapped for {}", coin_id)))
    }

    async fn fetch_klines(&self, symbol: &str, interval: &str, limit: usize, start_ms: Option<i64>, end_ms: Option<i64>) -> Result<Vec<Candle>, ProviderError> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );
        if let Some(s) = start_ms {
            url.push_str(&format!("&startTime={}", s));
        }
        if let Some(e) = end_ms {
            url.push_str(&format!("&endTime={}", e));
        }

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS || resp.status() == reqwest::StatusCode::IM_A_TEAPOT {
            return Err(ProviderError::RateLimited { retry_after_ms: 30_000 });
        }
        if resp.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::GeoBlocked);
        }
        if !resp.status().is_success() {
            return Err(ProviderError::Decode(format!("http {}", resp.status())));
        }

        let rows: Vec<Vec<serde_json::Value>> = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let timeframe = interval_to_timeframe(interval)?;

        rows.into_iter()
            .map(|k| {
                let open_time = k.get(0).and_then(|v| v.as_i64()).unwrap_or(0);
                let open = k.get(1).and_then(|v| v.as_str()).unwrap_or("0");
                let high = k.get(2).and_then(|v| v.as_str()).unwrap_or("0");
                let low = k.get(3).and_then(|v| v.as_str()).unwrap_or("0");
                let close = k.get(4).and_then(|v| v.as_str()).unwrap_or("0");
                let volume = k.get(5).and_then(|v| v.as_str()).unwrap_or("0");

                Ok(Candle {
                    timeframe,
                    open_time: Utc.timestamp_millis_opt(open_time).single().ok_or_else(|| {
                        ProviderError::Decode("invalid open_time".to_string())
                    })?,
                    open: parse_decimal(open)?,
                    high: parse_decimal(high)?,
                    low: parse_decimal(low)?,
                    close: parse_decimal(close)?,
                    volume: parse_decimal(volume)?,
                })
            })
            .collect()
    }
}

fn parse_decimal(s: &str) -> Result<Decimal, ProviderError> {
    Decimal::from_str(s).map_err(|e| ProviderError::Decode(e.to_string()))
}

fn interval_to_timeframe(interval: &str) -> Result<TimeFrame, ProviderError> {
    match interval {
        "15m" => Ok(TimeFrame::M15),
        "1h" => Ok(TimeFrame::H1),
        "4h" => Ok(TimeFrame::H4),
        "1d" => Ok(TimeFrame::D1),
        "1w" => Ok(TimeFrame::W1),
        other => Err(ProviderError::Decode(format!("unsupported interval {}", other))),
    }
}

#[async_trait]
impl CandleProvider for BinanceCandleProvider {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn fetch_candles(&self, coin_id: &CoinId, tf: TimeFrame, limit: usize) -> Result<Vec<Candle>, ProviderError> {
        let symbol = self.symbol_for(coin_id)?;
        self.fetch_klines(symbol, tf.as_str(), limit, None, None).await
    }

    async fn fetch_historical_candles(&self, coin_id: &CoinId, tf: TimeFrame, start_ms: i64, end_ms: i64) -> Result<Vec<Candle>, ProviderError> {
        let symbol = self.symbol_for(coin_id)?;
        self.fetch_klines(symbol, tf.as_str(), 1000, Some(start_ms), Some(end_ms)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_coin_is_rejected() {
        let provider = BinanceCandleProvider::new(HashMap::new());
        assert!(provider.symbol_for(&CoinId::new("bitcoin")).is_err());
    }

    #[test]
    fn interval_mapping_round_trips_known_timeframes() {
        for tf in TimeFrame::all() {
            assert_eq!(interval_to_timeframe(tf.as_str()).unwrap(), tf);
        }
    }
}
