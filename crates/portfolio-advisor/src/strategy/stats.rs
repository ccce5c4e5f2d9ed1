//! Portfolio statistics over aligned per-period return series.

use crate::model::{PortfolioStats, StatModel};

/// z-score used for the annual max loss estimate
pub const MAX_LOSS_Z: f64 = 1.65;

/// Annualization parameters shared by every statistic
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Annualization {
    pub periods_per_year: f64,
    pub risk_free_rate: f64,
}

/// Weighted per-period portfolio returns.
///
/// `columns[i][t]` is the return of instrument `i` in period `t`; every column
/// has the same length.
pub fn portfolio_series(columns: &[&[f64]], weights: &[f64]) -> Vec<f64> {
    let periods = columns.first().map_or(0, |c| c.len());
    (0..periods)
        .map(|t| columns.iter().zip(weights).map(|(col, w)| w * col[t]).sum())
        .collect()
}

pub fn mean(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.iter().sum::<f64>() / series.len() as f64
}

/// Sample standard deviation (n - 1 denominator)
pub fn sample_std(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(series);
    let var = series.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Gini mean difference: average of |x_i - x_j| over ordered pairs i != j.
///
/// Computed from the sorted series in O(n log n).
pub fn gini_mean_difference(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }
    let mut sorted = series.to_vec();
    sorted.sort_by(f64::total_cmp);
    let nf = n as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (2.0 * (i as f64 + 1.0) - nf - 1.0) * x)
        .sum();
    2.0 * weighted / (nf * (nf - 1.0))
}

/// Largest peak-to-trough fall of the compounded path, in [0, 1]
pub fn max_drawdown(series: &[f64]) -> f64 {
    let mut wealth = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for r in series {
        wealth *= 1.0 + r;
        peak = peak.max(wealth);
        if peak > 0.0 {
            worst = worst.max((peak - wealth) / peak);
        }
    }
    worst.min(1.0)
}

/// Compounded change over the series (0.1 = +10%)
pub fn compounded_change(series: &[f64]) -> f64 {
    series.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// Full statistics of a portfolio period series
pub fn compute_stats(series: &[f64], model: StatModel, params: Annualization) -> PortfolioStats {
    let scale = params.periods_per_year.sqrt();
    let annual_return = mean(series) * params.periods_per_year;
    let annual_volatility = sample_std(series) * scale;
    let annual_dispersion = match model {
        StatModel::Markowitz => annual_volatility,
        StatModel::Gini => gini_mean_difference(series) / 2.0 * scale,
    };
    let sharpe_ratio = if annual_dispersion > f64::EPSILON {
        (annual_return - params.risk_free_rate) / annual_dispersion
    } else {
        0.0
    };

    PortfolioStats {
        annual_return,
        annual_volatility,
        annual_dispersion,
        sharpe_ratio,
        annual_max_loss: annual_return - MAX_LOSS_Z * annual_dispersion,
        max_drawdown: max_drawdown(series),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: Annualization = Annualization {
        periods_per_year: 252.0,
        risk_free_rate: 0.0,
    };

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_portfolio_series() {
        let a = [0.01, 0.02, -0.01];
        let b = [0.03, 0.00, 0.01];
        let series = portfolio_series(&[&a, &b], &[0.5, 0.5]);
        assert!(close(series[0], 0.02));
        assert!(close(series[1], 0.01));
        assert!(close(series[2], 0.0));
    }

    #[test]
    fn test_sample_std() {
        assert!(close(sample_std(&[1.0, 3.0]), 2.0_f64.sqrt()));
        assert_eq!(sample_std(&[1.0]), 0.0);
    }

    #[test]
    fn test_gini_matches_pairwise_definition() {
        let series = [0.03_f64, -0.01, 0.02, 0.0, -0.04];
        let n = series.len() as f64;
        let pairwise: f64 = series
            .iter()
            .flat_map(|a| series.iter().map(move |b| (a - b).abs()))
            .sum::<f64>()
            / (n * (n - 1.0));
        assert!(close(gini_mean_difference(&series), pairwise));
    }

    #[test]
    fn test_max_drawdown() {
        // 1.0 -> 1.1 -> 0.88 -> 0.968
        let dd = max_drawdown(&[0.10, -0.20, 0.10]);
        assert!(close(dd, 0.2));
        assert_eq!(max_drawdown(&[0.01, 0.02]), 0.0);
    }

    #[test]
    fn test_compute_stats_markowitz() {
        let series = [0.01, -0.01, 0.01, -0.01];
        let stats = compute_stats(&series, StatModel::Markowitz, PARAMS);
        assert!(close(stats.annual_return, 0.0));
        assert!(close(stats.annual_dispersion, stats.annual_volatility));
        assert!(stats.annual_volatility > 0.0);
        assert!(close(stats.annual_max_loss, -MAX_LOSS_Z * stats.annual_volatility));
    }

    #[test]
    fn test_zero_dispersion_sharpe_is_zero() {
        let stats = compute_stats(&[0.01, 0.01, 0.01], StatModel::Gini, PARAMS);
        assert_eq!(stats.annual_dispersion, 0.0);
        assert_eq!(stats.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_compounded_change() {
        assert!(close(compounded_change(&[0.1, 0.1]), 0.21));
        assert_eq!(compounded_change(&[]), 0.0);
    }
}
