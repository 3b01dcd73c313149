#![allow(dead_code)]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a tracked coin, independent of any single provider's symbol spelling.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CoinId(pub String);

impl CoinId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CoinId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Process-wide immutable metadata for a coin in the tracked universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinMeta {
    pub coin_id: CoinId,
    pub display_symbol: String,
    pub exchange_symbol: String,
    pub human_name: String,
}

impl CoinMeta {
    pub fn new(
        coin_id: impl Into<String>,
        display_symbol: impl Into<String>,
        exchange_symbol: impl Into<String>,
        human_name: impl Into<String>,
    ) -> Self {
        Self {
            coin_id: CoinId::new(coin_id),
            display_symbol: display_symbol.into(),
            exchange_symbol: exchange_symbol.into(),
            human_name: human_name.into(),
        }
    }

    /// Default tracked universe used when no configuration overrides it.
    pub fn default_universe() -> Vec<CoinMeta> {
        vec![
            CoinMeta::new("bitcoin", "BTC", "BTCUSDT", "Bitcoin"),
            CoinMeta::new("ethereum", "ETH", "ETHUSDT", "Ethereum"),
            CoinMeta::new("solana", "SOL", "SOLUSDT", "Solana"),
            CoinMeta::new("binancecoin", "BNB", "BNBUSDT", "BNB"),
            CoinMeta::new("cardano", "ADA", "ADAUSDT", "Cardano"),
            CoinMeta::new("ripple", "XRP", "XRPUSDT", "XRP"),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed set of timeframes the signal engine reasons over. 1h is primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    M15,
    H1,
    H4,
    D1,
    W1,
}

impl TimeFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::M15 => "15m",
            TimeFrame::H1 => "1h",
            TimeFrame::H4 => "4h",
            TimeFrame::D1 => "1d",
            TimeFrame::W1 => "1w",
        }
    }

    pub fn to_minutes(&self) -> u64 {
        match self {
            TimeFrame::M15 => 15,
            TimeFrame::H1 => 60,
            TimeFrame::H4 => 240,
            TimeFrame::D1 => 1440,
            TimeFrame::W1 => 10080,
        }
    }

    pub fn to_milliseconds(&self) -> i64 {
        self.to_minutes() as i64 * 60 * 1000
    }

    /// How many base (1h) bars fully close per one bar of this timeframe.
    pub fn bars_per_hour_bar(&self) -> u64 {
        self.to_minutes() / TimeFrame::H1.to_minutes().max(1)
    }

    pub fn all() -> [TimeFrame; 5] {
        [
            TimeFrame::M15,
            TimeFrame::H1,
            TimeFrame::H4,
            TimeFrame::D1,
            TimeFrame::W1,
        ]
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    Paper,
    Live,
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Paper => write!(f, "Paper"),
            TradingMode::Live => write!(f, "Live"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Signal {
    pub fn strength(&self) -> i8 {
        match self {
            Signal::StrongBuy => 2,
            Signal::Buy => 1,
            Signal::Hold => 0,
            Signal::Sell => -1,
            Signal::StrongSell => -2,
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Signal::StrongBuy | Signal::Buy)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, Signal::StrongSell | Signal::Sell)
    }
}

/// Coarse market classification driving strategy regime-gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    Trending,
    Ranging,
    Volatile,
    Compression,
    Mixed,
}

/// The seven strategy variants the signal engine scores in parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    TrendFollow,
    Breakout,
    MeanRevert,
    Momentum,
    Scalping,
    Swing,
    Position,
}

impl StrategyKind {
    pub fn all() -> [StrategyKind; 7] {
        [
            StrategyKind::TrendFollow,
            StrategyKind::Breakout,
            StrategyKind::MeanRevert,
            StrategyKind::Momentum,
            StrategyKind::Scalping,
            StrategyKind::Swing,
            StrategyKind::Position,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TrendFollow => "trend_follow",
            StrategyKind::Breakout => "breakout",
            StrategyKind::MeanRevert => "mean_revert",
            StrategyKind::Momentum => "momentum",
            StrategyKind::Scalping => "scalping",
            StrategyKind::Swing => "swing",
            StrategyKind::Position => "position",
        }
    }

    /// Whether this strategy is permitted to lead in the given regime.
    pub fn allowed_in(&self, regime: Regime) -> bool {
        match self {
            StrategyKind::MeanRevert => !matches!(regime, Regime::Trending),
            StrategyKind::TrendFollow | StrategyKind::Momentum => {
                !matches!(regime, Regime::Ranging)
            }
            StrategyKind::Scalping => {
                !matches!(regime, Regime::Trending | Regime::Ranging)
            }
            _ => true,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
