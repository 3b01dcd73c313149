#![allow(dead_code)]
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{CoinId, UserSettings};

/// Trading strategy profiles optimized for different market conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyProfile {
    /// Ultra-aggressive multi-year strategy (3-coin: BTC+ETH+SOL)
    /// Target: 3965%+ over 5 years (109.71% annualized)
    /// Risk: High (61% drawdown)
    UltraAggressive,

    /// Conservative 5-year strategy with professional risk management (3-coin: BTC+ETH+SOL)
    /// Target: 2623%+ over 5 years (93.58% annualized)
    /// Risk: Moderate (39% drawdown)
    /// RECOMMENDED: Best risk-adjusted returns (4.59 Sharpe)
    Conservative5Year,

    /// Custom user-defined settings
    Custom,
}

impl StrategyProfile {
    pub fn name(&self) -> &str {
        match self {
            Self::UltraAggressive => "Ultra Aggressive (3-Coin)",
            Self::Conservative5Year => "Conservative (3-Coin)",
            Self::Custom => "Custom",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::UltraAggressive => {
                "High-risk BTC+ETH+SOL strategy. 3965%+ over 5 years (109.71% annual). 61% drawdown."
            }
            Self::Conservative5Year => {
                "Professional risk, BTC+ETH+SOL. 2623%+ over 5 years (93.58% annual). Best risk-adjusted returns."
            }
            Self::Custom => "User-defined custom settings.",
        }
    }

    pub fn target_return(&self) -> &str {
        match self {
            Self::UltraAggressive => "109.7% annual",
            Self::Conservative5Year => "93.6% annual",
            Self::Custom => "Variable",
        }
    }

    pub fn risk_level(&self) -> &str {
        match self {
            Self::UltraAggressive => "High",
            Self::Conservative5Year => "Moderate",
            Self::Custom => "Variable",
        }
    }
}

/// A named preset over the per-user risk knobs and the tracked coin universe. Seeds a new
/// user's `UserSettings` and `RuntimeConfig::general.universe` in one shot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub profile: StrategyProfile,
    pub risk_per_trade_pct: Decimal,
    pub max_open_trades: usize,
    pub cooldown_hours: i64,
    pub universe: Vec<CoinId>,
    pub min_signal_score: Decimal,
}

impl StrategyConfig {
    /// Ultra Aggressive: higher per-trade risk and a higher concurrent-trade ceiling, still
    /// gated by the same signal-quality floor as the conservative preset.
    pub fn ultra_aggressive() -> Self {
        Self {
            profile: StrategyProfile::UltraAggressive,
            risk_per_trade_pct: dec!(12),
            max_open_trades: 5,
            cooldown_hours: 4,
            universe: vec![CoinId::new("bitcoin"), CoinId::new("ethereum"), CoinId::new("solana")],
            min_signal_score: dec!(52),
        }
    }

    /// Conservative 5-Year: professional-level risk sizing, same 3-coin universe.
    pub fn conservative_5year() -> Self {
        Self {
            profile: StrategyProfile::Conservative5Year,
            risk_per_trade_pct: dec!(5),
            max_open_trades: 3,
            cooldown_hours: 4,
            universe: vec![CoinId::new("bitcoin"), CoinId::new("ethereum"), CoinId::new("solana")],
            min_signal_score: dec!(52),
        }
    }

    /// Seeds a fresh user account's settings from this preset, leaving balance/leverage/flags
    /// at their account defaults.
    pub fn user_settings(&self) -> UserSettings {
        UserSettings {
            risk_per_trade_pct: self.risk_per_trade_pct,
            max_open_trades: self.max_open_trades,
            cooldown_hours: self.cooldown_hours,
            ..Default::default()
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::conservative_5year()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_configs() {
        let ultra = StrategyConfig::ultra_aggressive();
        assert_eq!(ultra.profile, StrategyProfile::UltraAggressive);
        assert_eq!(ultra.risk_per_trade_pct, dec!(12));
        assert_eq!(ultra.universe.len(), 3);

        let conservative = StrategyConfig::conservative_5year();
        assert_eq!(conservative.profile, StrategyProfile::Conservative5Year);
        assert_eq!(conservative.risk_per_trade_pct, dec!(5));
        assert_eq!(conservative.universe.len(), 3);
    }

    #[test]
    fn test_profile_metadata() {
        let profile = StrategyProfile::UltraAggressive;
        assert_eq!(profile.name(), "Ultra Aggressive (3-Coin)");
        assert_eq!(profile.target_return(), "109.7% annual");
        assert_eq!(profile.risk_level(), "High");

        let profile = StrategyProfile::Conservative5Year;
        assert_eq!(profile.name(), "Conservative (3-Coin)");
        assert_eq!(profile.target_return(), "93.6% annual");
        assert_eq!(profile.risk_level(), "Moderate");
    }

    #[test]
    fn user_settings_carries_profile_risk_sizing() {
        let settings = StrategyConfig::ultra_aggressive().user_settings();
        assert_eq!(settings.risk_per_trade_pct, dec!(12));
        assert_eq!(settings.max_open_trades, 5);
    }
}
