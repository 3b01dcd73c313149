use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use crate::types::{CoinId, Quote};

use super::providers::{ProviderError, QuoteProvider};

const COINGECKO_API: &str = "https://api.coingecko.com/api/v3";

/// Public CoinGecko quote source, keyed by CoinGecko's own coin ids ("bitcoin", "ethereum", ...).
/// One request covers the whole universe via `/simple/price`.
#[derive(Debug, Clone)]
pub struct CoinGeckoQuoteProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoQuoteProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: COINGECKO_API.to_string(),
        }
    }
}

impl Default for CoinGeckoQuoteProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SimplePriceEntry {
    usd: Option<Decimal>,
    usd_24h_change: Option<Decimal>,
    usd_24h_vol: Option<Decimal>,
    usd_market_cap: Option<Decimal>,
}

#[async_trait]
impl QuoteProvider for CoinGeckoQuoteProvider {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_all_quotes(&self, universe: &[CoinId]) -> Result<Vec<(CoinId, Quote)>, ProviderError> {
        if universe.is_empty() {
            return Ok(Vec::new());
        }

        let ids = universe.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(",");
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true&include_24hr_vol=true&include_market_cap=true",
            self.base_url, ids
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited { retry_after_ms: 60_000 });
        }
        if resp.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::GeoBlocked);
        }
        if !resp.status().is_success() {
            return Err(ProviderError::Decode(format!("http {}", resp.status())));
        }

        let body: HashMap<String, SimplePriceEntry> = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let now = Utc::now();
        let quotes = universe
            .iter()
            .filter_map(|coin_id| {
                let entry = body.get(coin_id.as_str())?;
                let price_usd = entry.usd?;
                Some((
                    coin_id.clone(),
                    Quote {
                        price_usd,
                        change_24h_pct: entry.usd_24h_change.unwrap_or(Decimal::ZERO),
                        volume_24h: entry.usd_24h_vol.unwrap_or(Decimal::ZERO),
                        market_cap: entry.usd_market_cap,
                        last_updated: now,
                    },
                ))
            })
            .collect();

        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_coingecko() {
        let p = CoinGeckoQuoteProvider::new();
        assert_eq!(p.name(), "coingecko");
    }
}
