use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{ActionType, StrategyKind, Trade};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub at: DateTime<Utc>,
    pub equity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StrategyBreakdown {
    pub trades: u64,
    pub wins: u64,
    pub net_pnl: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    pub profit_factor: Decimal,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: Decimal,
    pub strategy_breakdown: HashMap<StrategyKind, StrategyBreakdown>,
    pub action_counts: HashMap<ActionType, u64>,
    pub exit_reasons: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub summary: BacktestSummary,
}

/// Derives aggregate statistics from a closed-trade ledger and an equity curve.
/// Mirrors the teacher's `MetricsCalculator`, adapted to the `Trade`/`ActionType` model.
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn calculate(trades: &[Trade], equity_curve: &[EquityPoint]) -> BacktestSummary {
        let mut wins = 0u64;
        let mut losses = 0u64;
        let mut gross_profit = Decimal::ZERO;
        let mut gross_loss = Decimal::ZERO;
        let mut strategy_breakdown: HashMap<StrategyKind, StrategyBreakdown> = HashMap::new();
        let mut action_counts: HashMap<ActionType, u64> = HashMap::new();
        let mut exit_reasons: HashMap<String, u64> = HashMap::new();

        for trade in trades {
            let pnl = trade.pnl.unwrap_or(Decimal::ZERO);
            if pnl > Decimal::ZERO {
                wins += 1;
                gross_profit += pnl;
            } else if pnl < Decimal::ZERO {
                losses += 1;
                gross_loss += pnl.abs();
            }

            let entry = strategy_breakdown.entry(trade.strategy).or_default();
            entry.trades += 1;
            entry.net_pnl += pnl;
            if pnl > Decimal::ZERO {
                entry.wins += 1;
            }

            for action in &trade.actions {
                *action_counts.entry(action.action).or_insert(0) += 1;
            }
            if let Some(reason) = &trade.exit_reason {
                *exit_reasons.entry(reason.clone()).or_insert(0) += 1;
            }
        }

        let total_trades = trades.len() as u64;
        let total_pnl = gross_profit - gross_loss;
        let win_rate = if total_trades > 0 {
            Decimal::from(wins) / Decimal::from(total_trades) * dec!(100)
        } else {
            Decimal::ZERO
        };
        let profit_factor = if !gross_loss.is_zero() {
            gross_profit / gross_loss
        } else if gross_profit > Decimal::ZERO {
            dec!(100)
        } else {
            Decimal::ZERO
        };

        let (max_drawdown, max_drawdown_pct) = Self::max_drawdown(equity_curve);
        let sharpe_ratio = Self::sharpe_ratio(equity_curve);

        BacktestSummary {
            total_trades,
            wins,
            losses,
            win_rate,
            total_pnl,
            profit_factor,
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio,
            strategy_breakdown,
            action_counts,
            exit_reasons,
        }
    }

    fn max_drawdown(curve: &[EquityPoint]) -> (Decimal, Decimal) {
        let mut peak = Decimal::ZERO;
        let mut max_dd = Decimal::ZERO;
        let mut max_dd_pct = Decimal::ZERO;
        for point in curve {
            if point.equity > peak {
                peak = point.equity;
            }
            let dd = peak - point.equity;
            if dd > max_dd {
                max_dd = dd;
                max_dd_pct = if !peak.is_zero() { dd / peak * dec!(100) } else { Decimal::ZERO };
            }
        }
        (max_dd, max_dd_pct)
    }

    fn sharpe_ratio(curve: &[EquityPoint]) -> Decimal {
        if curve.len() < 3 {
            return Decimal::ZERO;
        }
        let returns: Vec<Decimal> = curve
            .windows(2)
            .filter_map(|pair| {
                if pair[0].equity.is_zero() {
                    None
                } else {
                    Some((pair[1].equity - pair[0].equity) / pair[0].equity)
                }
            })
            .collect();
        if returns.is_empty() {
            return Decimal::ZERO;
        }
        let n = Decimal::from(returns.len());
        let mean = returns.iter().sum::<Decimal>() / n;
        let variance = returns.iter().map(|r| (*r - mean) * (*r - mean)).sum::<Decimal>() / n;
        if variance.is_zero() {
            return Decimal::ZERO;
        }
        let std_dev = crate::indicators::sqrt_decimal(variance);
        if std_dev.is_zero() {
            return Decimal::ZERO;
        }
        (mean / std_dev) * crate::indicators::sqrt_decimal(dec!(365))
    }
}
