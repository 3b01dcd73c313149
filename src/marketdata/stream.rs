use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

use crate::types::{CoinId, Quote};

use super::service::MarketDataService;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Owns a single public ticker WebSocket connection; on disconnect reconnects after a fixed
/// delay, sends a keepalive every 20s, and never reconnects once `shutdown` is observed.
pub struct StreamSubscriber {
    url: String,
    symbols: Vec<(String, CoinId)>,
}

impl StreamSubscriber {
    pub fn new(url: impl Into<String>, symbols: Vec<(String, CoinId)>) -> Self {
        Self { url: url.into(), symbols }
    }

    pub async fn run(&self, service: Arc<MarketDataService>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                info!("stream subscriber shutting down");
                return;
            }
            match self.connect_and_stream(&service, &mut shutdown).await {
                Ok(()) => info!("stream closed cleanly"),
                Err(e) => warn!("stream error: {}, reconnecting in {:?}", e, RECONNECT_DELAY),
            }
            if *shutdown.borrow() {
                return;
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    async fn connect_and_stream(
        &self,
        service: &Arc<MarketDataService>,
        shutdown: &mut tokio::sync::watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let (ws_stream, _) = connect_async(&self.url).await?;
        let (mut write, mut read) = ws_stream.split();
        let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = write.close().await;
                    return Ok(());
                }
                _ = keepalive.tick() => {
                    if write.send(Message::Ping(Vec::new())).await.is_err() {
                        return Ok(());
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some((coin_id, quote)) = self.parse_tick(&text) {
                                service.push_stream_update(coin_id, quote).await;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("stream read error: {}", e);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn parse_tick(&self, text: &str) -> Option<(CoinId, Quote)> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        let symbol = value.get("s")?.as_str()?.to_lowercase();
        let (_, coin_id) = self.symbols.iter().find(|(sym, _)| *sym == symbol)?;

        let price: Decimal = value.get("c")?.as_str()?.parse().ok()?;
        let change_pct: Decimal = value.get("P")?.as_str()?.parse().ok()?;
        let volume: Decimal = value.get("v")?.as_str()?.parse().ok()?;

        Some((
            coin_id.clone(),
            Quote {
                price_usd: price,
                change_24h_pct: change_pct,
                volume_24h: volume,
                market_cap: None,
                last_updated: chrono::Utc::now(),
            },
        ))
    }
}
