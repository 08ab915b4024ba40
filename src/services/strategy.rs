//! Rule-based trading strategy replay.
//!
//! Swarm fitness is computed by replaying a long-only RSI + Bollinger
//! strategy over buffered ticks and collapsing the outcome into a single
//! scalar to minimize. The replay is deterministic: same ticks and
//! parameters, same score.

use crate::domain::models::MarketTick;

/// RSI lookback, in bars.
const RSI_PERIOD: usize = 14;
/// Bollinger lookback, in bars.
const BOLLINGER_PERIOD: usize = 20;
/// Bollinger band width, in standard deviations.
const BOLLINGER_K: f64 = 2.0;
/// Bollinger position below which an entry is considered oversold.
const ENTRY_BAND_POSITION: f64 = 0.2;
/// Bollinger position above which an exit is considered overbought.
const EXIT_BAND_POSITION: f64 = 0.8;

/// Search space of the optimizer, one `(lo, hi)` pair per dimension:
/// entry RSI threshold, exit RSI threshold, stop-loss, take-profit.
pub const PARAMETER_BOUNDS: [(f64, f64); 4] =
    [(10.0, 50.0), (50.0, 90.0), (0.01, 0.25), (0.01, 0.5)];

/// Strategy parameters, one optimizer dimension each.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyParams {
    /// Enter when RSI drops below this
    pub entry_threshold: f64,
    /// Exit when RSI rises above this
    pub exit_threshold: f64,
    /// Exit when price falls this fraction below entry
    pub stop_loss: f64,
    /// Exit when price rises this fraction above entry
    pub take_profit: f64,
}

impl StrategyParams {
    /// Builds parameters from an optimizer position, clamping each
    /// dimension into its bound.
    pub fn from_position(position: &[f64]) -> Self {
        let dim = |i: usize| {
            let (lo, hi) = PARAMETER_BOUNDS[i];
            position.get(i).copied().unwrap_or(lo).clamp(lo, hi)
        };
        Self {
            entry_threshold: dim(0),
            exit_threshold: dim(1),
            stop_loss: dim(2),
            take_profit: dim(3),
        }
    }
}

/// Outcome of one replay.
#[derive(Debug, Clone, Default)]
pub struct StrategyReport {
    pub trades: usize,
    pub wins: usize,
    pub total_return: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
    /// Mean/stddev of per-trade returns; 0 when fewer than two trades
    pub sharpe: f64,
}

/// Relative strength index over the last `period` deltas, `None` until
/// enough bars exist.
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period + 1 {
        return None;
    }
    let window = &prices[prices.len() - period - 1..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    if losses == 0.0 {
        return Some(100.0);
    }
    let rs = gains / losses;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Position of the last price within its Bollinger band, 0 at the lower
/// band and 1 at the upper, `None` until enough bars exist.
pub fn bollinger_position(prices: &[f64], period: usize, k: f64) -> Option<f64> {
    if prices.len() < period {
        return None;
    }
    let window = &prices[prices.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / period as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return Some(0.5);
    }
    let lower = mean - k * std;
    let upper = mean + k * std;
    let last = *window.last().expect("non-empty window");
    Some(((last - lower) / (upper - lower)).clamp(0.0, 1.0))
}

/// Replays the strategy over a price series.
pub fn replay(prices: &[f64], params: &StrategyParams) -> StrategyReport {
    let warmup = RSI_PERIOD.max(BOLLINGER_PERIOD) + 1;
    let mut report = StrategyReport::default();
    if prices.len() <= warmup {
        return report;
    }

    let mut entry: Option<f64> = None;
    let mut trade_returns: Vec<f64> = Vec::new();
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;

    for i in warmup..prices.len() {
        let seen = &prices[..=i];
        let price = prices[i];
        let Some(rsi_now) = rsi(seen, RSI_PERIOD) else {
            continue;
        };
        let Some(band_pos) = bollinger_position(seen, BOLLINGER_PERIOD, BOLLINGER_K) else {
            continue;
        };

        match entry {
            None => {
                if rsi_now < params.entry_threshold && band_pos < ENTRY_BAND_POSITION {
                    entry = Some(price);
                }
            }
            Some(entry_price) => {
                let change = (price - entry_price) / entry_price;
                let exit = rsi_now > params.exit_threshold
                    || band_pos > EXIT_BAND_POSITION
                    || change <= -params.stop_loss
                    || change >= params.take_profit;
                if exit {
                    trade_returns.push(change);
                    equity *= 1.0 + change;
                    peak = peak.max(equity);
                    let drawdown = (peak - equity) / peak;
                    report.max_drawdown = report.max_drawdown.max(drawdown);
                    entry = None;
                }
            }
        }
    }

    report.trades = trade_returns.len();
    report.wins = trade_returns.iter().filter(|r| **r > 0.0).count();
    report.total_return = equity - 1.0;
    report.win_rate = if report.trades > 0 {
        report.wins as f64 / report.trades as f64
    } else {
        0.0
    };
    report.sharpe = sharpe_proxy(&trade_returns);
    report
}

fn sharpe_proxy(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    mean / std
}

/// Collapses a report into the scalar the optimizer minimizes.
/// Non-finite intermediates collapse to `+INFINITY`.
pub fn fitness_of(report: &StrategyReport) -> f64 {
    let penalized_sharpe = report.sharpe * (1.0 - report.max_drawdown);
    let score = report.total_return + 0.5 * report.win_rate + 0.5 * penalized_sharpe;
    if !score.is_finite() {
        return f64::INFINITY;
    }
    -score
}

/// Fitness of a candidate position over a set of per-pair tick buffers:
/// the mean per-pair fitness, `+INFINITY` when no pair has enough data.
pub fn evaluate_position(position: &[f64], buffers: &[(&str, &[MarketTick])]) -> f64 {
    let params = StrategyParams::from_position(position);
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (_, ticks) in buffers {
        let prices: Vec<f64> = ticks.iter().map(|t| t.price).collect();
        let report = replay(&prices, &params);
        if report.trades == 0 && prices.len() <= RSI_PERIOD.max(BOLLINGER_PERIOD) + 1 {
            continue;
        }
        total += fitness_of(&report);
        pairs += 1;
    }
    if pairs == 0 {
        return f64::INFINITY;
    }
    let mean = total / pairs as f64;
    if mean.is_finite() {
        mean
    } else {
        f64::INFINITY
    }
}
