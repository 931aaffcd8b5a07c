// 🔮 Forecast Engine - three bounded scenarios from a monthly revenue series
//
// Pipeline: drop partial months, check there is enough history, take the
// median of the recent stable period as baseline, estimate a clamped
// monthly growth rate, then project Conservative/Moderate/Optimistic for the
// first full months after today.

use crate::stats::{mean, median, round_to, std_dev};
use crate::temporal::YearMonth;
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// One month of input: total revenue and number of bookings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: YearMonth,
    pub revenue: f64,
    pub bookings: usize,
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Number of forecast months; fixed, not part of `ForecastConfig`
pub const FORECAST_HORIZON: usize = 3;

/// Unknown keys (e.g. `horizon`) are rejected when settings are loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Months needed after partial-month filtering
    pub min_months: usize,
    /// Size of the trailing window used for baseline and growth
    pub stable_months: usize,
    /// A month below this fraction of the median booking count is partial
    pub partial_month_ratio: f64,
    /// Month-over-month ratios at or beyond this magnitude are ignored
    pub outlier_growth: f64,
    /// Applied growth is clamped to ±this
    pub growth_cap: f64,
    /// Surviving ratios needed before their median is trusted
    pub min_growth_samples: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            min_months: 6,
            stable_months: 9,
            partial_month_ratio: 0.5,
            outlier_growth: 0.3,
            growth_cap: 0.03,
            min_growth_samples: 3,
        }
    }
}

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMonth {
    pub month: YearMonth,
    /// 1-based position within the horizon
    pub months_ahead: u32,
    pub conservative: f64,
    pub moderate: f64,
    pub optimistic: f64,
    /// Applied monthly growth as a fraction (0.01 = 1%)
    pub growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedMonth {
    pub month: YearMonth,
    pub bookings: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastStatistics {
    pub months_used: usize,
    pub stable_months: usize,
    pub all_time_average: f64,
    pub last_3_average: f64,
    pub last_6_average: f64,
    pub baseline: f64,
    /// Median of surviving growth ratios, before clamping
    pub median_growth: Option<f64>,
    pub growth_samples: usize,
    pub applied_growth: f64,
    pub stable_std_dev: f64,
    pub stable_min: f64,
    pub stable_max: f64,
    pub coefficient_of_variation_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub months: Vec<ForecastMonth>,
    pub statistics: ForecastStatistics,
    pub removed_partial_months: Vec<RemovedMonth>,
}

/// Not enough history is its own outcome, never a zero forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Forecast(ForecastResult),
    Insufficient { available: usize, required: usize },
}

impl ForecastOutcome {
    pub fn result(&self) -> Option<&ForecastResult> {
        match self {
            ForecastOutcome::Forecast(r) => Some(r),
            ForecastOutcome::Insufficient { .. } => None,
        }
    }
}

// ============================================================================
// FORECAST ENGINE
// ============================================================================

pub struct ForecastEngine {
    config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new() -> Self {
        Self::with_config(ForecastConfig::default())
    }

    pub fn with_config(config: ForecastConfig) -> Self {
        ForecastEngine { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// `monthly` must be in chronological order; `today` decides which
    /// months are already reached.
    pub fn forecast(&self, monthly: &[MonthlyPoint], today: NaiveDate) -> ForecastOutcome {
        let (kept, removed) = self.remove_partial_months(monthly);

        if kept.len() < self.config.min_months {
            warn!(
                "Insufficient data for forecasting ({} months, need at least {})",
                kept.len(),
                self.config.min_months
            );
            return ForecastOutcome::Insufficient {
                available: kept.len(),
                required: self.config.min_months,
            };
        }

        let revenues: Vec<f64> = kept.iter().map(|p| p.revenue).collect();
        let stable = &revenues[revenues.len() - self.config.stable_months.min(revenues.len())..];

        let baseline = median(stable).unwrap_or(0.0);
        let last_3_average = trailing_mean(&revenues, 3);
        let last_6_average = trailing_mean(&revenues, 6);

        let ratios = self.growth_ratios(stable);
        let median_growth = median(&ratios);
        let applied_growth = match median_growth {
            Some(g) if ratios.len() >= self.config.min_growth_samples => {
                g.clamp(-self.config.growth_cap, self.config.growth_cap)
            }
            _ => trend_heuristic(last_3_average, last_6_average),
        };

        let stable_std_dev = std_dev(stable).unwrap_or(0.0);
        let statistics = ForecastStatistics {
            months_used: kept.len(),
            stable_months: stable.len(),
            all_time_average: round_to(mean(&revenues).unwrap_or(0.0), 2),
            last_3_average: round_to(last_3_average, 2),
            last_6_average: round_to(last_6_average, 2),
            baseline: round_to(baseline, 2),
            median_growth: median_growth.map(|g| round_to(g, 4)),
            growth_samples: ratios.len(),
            applied_growth: round_to(applied_growth, 4),
            stable_std_dev: round_to(stable_std_dev, 2),
            stable_min: stable.iter().copied().fold(f64::INFINITY, f64::min),
            stable_max: stable.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            coefficient_of_variation_pct: if baseline > 0.0 {
                round_to(stable_std_dev / baseline * 100.0, 2)
            } else {
                0.0
            },
        };

        // Forecast starts after whichever is later: the data or today
        let last_month = kept.last().map(|p| p.month).unwrap_or_else(|| YearMonth::from_date(today));
        let first = last_month.max(YearMonth::from_date(today)).next();

        let months = (0..FORECAST_HORIZON)
            .map(|i| {
                let m = (i + 1) as u32;
                let (conservative, moderate, optimistic) = scenarios(baseline, applied_growth, m);
                ForecastMonth {
                    month: first.plus(i as i64),
                    months_ahead: m,
                    conservative: round_to(conservative, 2),
                    moderate: round_to(moderate, 2),
                    optimistic: round_to(optimistic, 2),
                    growth_rate: round_to(applied_growth, 4),
                }
            })
            .collect();

        info!(
            "Forecast from {}: baseline {:.2}, growth {:.2}%",
            first,
            baseline,
            applied_growth * 100.0
        );

        ForecastOutcome::Forecast(ForecastResult {
            months,
            statistics,
            removed_partial_months: removed,
        })
    }

    /// Drop months whose booking count is under the partial threshold. Only
    /// applied with at least 3 months; if fewer than 3 would survive, only
    /// the earliest month is dropped instead.
    fn remove_partial_months(&self, monthly: &[MonthlyPoint]) -> (Vec<MonthlyPoint>, Vec<RemovedMonth>) {
        if monthly.len() < 3 {
            return (monthly.to_vec(), Vec::new());
        }

        let bookings: Vec<f64> = monthly.iter().map(|p| p.bookings as f64).collect();
        let median_bookings = median(&bookings).unwrap_or(0.0);
        let threshold = median_bookings * self.config.partial_month_ratio;

        let (kept, partial): (Vec<MonthlyPoint>, Vec<MonthlyPoint>) =
            monthly.iter().partition(|p| p.bookings as f64 >= threshold);

        let removed_points = if kept.len() >= 3 {
            partial
        } else {
            monthly[..1].to_vec()
        };

        for p in &removed_points {
            warn!(
                "Removed partial month {} ({} bookings vs {:.0} median, {:.0} revenue)",
                p.month, p.bookings, median_bookings, p.revenue
            );
        }

        let kept = if kept.len() >= 3 { kept } else { monthly[1..].to_vec() };
        let removed = removed_points
            .into_iter()
            .map(|p| RemovedMonth {
                month: p.month,
                bookings: p.bookings,
                revenue: p.revenue,
            })
            .collect();

        (kept, removed)
    }

    /// Month-over-month ratios where the previous month earned something
    /// and the swing is below the outlier bound
    fn growth_ratios(&self, revenues: &[f64]) -> Vec<f64> {
        revenues
            .windows(2)
            .filter(|w| w[0] > 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .filter(|g| g.abs() < self.config.outlier_growth)
            .collect()
    }
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn trailing_mean(values: &[f64], n: usize) -> f64 {
    mean(&values[values.len().saturating_sub(n)..]).unwrap_or(0.0)
}

/// Coarse growth guess when too few ratios survive
fn trend_heuristic(last_3_average: f64, last_6_average: f64) -> f64 {
    if last_3_average > last_6_average {
        0.01
    } else if last_3_average < last_6_average * 0.95 {
        -0.01
    } else {
        0.0
    }
}

/// (conservative, moderate, optimistic) for month `m` of the horizon,
/// ordered so conservative <= moderate <= optimistic
fn scenarios(baseline: f64, growth: f64, m: u32) -> (f64, f64, f64) {
    let mf = m as f64;
    let (c, mo, o) = if growth >= 0.0 {
        (0.95, 1.0 + growth * mf, 1.0 + growth * mf * 1.5)
    } else {
        (1.0 + growth * mf * 1.2, 1.0, 1.02f64.powi(m as i32))
    };

    let moderate = baseline * mo;
    let conservative = (baseline * c).min(moderate);
    let optimistic = (baseline * o).max(moderate);
    (conservative, moderate, optimistic)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn series(start: &str, revenues: &[f64], bookings: &[usize]) -> Vec<MonthlyPoint> {
        let first: YearMonth = start.parse().unwrap();
        revenues
            .iter()
            .zip(bookings)
            .enumerate()
            .map(|(i, (&revenue, &bookings))| MonthlyPoint {
                month: first.plus(i as i64),
                revenue,
                bookings,
            })
            .collect()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn assert_ordered(result: &ForecastResult) {
        for m in &result.months {
            assert!(m.conservative <= m.moderate, "{:?}", m);
            assert!(m.moderate <= m.optimistic, "{:?}", m);
        }
    }

    #[test]
    fn test_nine_month_scenario() {
        let revenues = [1000.0, 1050.0, 1100.0, 1080.0, 1120.0, 1150.0, 1130.0, 1160.0, 1180.0];
        let monthly = series("2024-01", &revenues, &[20; 9]);

        let outcome = ForecastEngine::new().forecast(&monthly, date("2024-09-15"));
        let result = outcome.result().unwrap();

        assert_eq!(result.statistics.baseline, 1120.0);
        assert!(result.statistics.applied_growth <= 0.03);
        assert!(result.statistics.applied_growth > 0.0);
        assert_eq!(result.statistics.growth_samples, 8);
        assert!(result.removed_partial_months.is_empty());

        let months: Vec<String> = result.months.iter().map(|m| m.month.to_string()).collect();
        assert_eq!(months, vec!["2024-10", "2024-11", "2024-12"]);

        // Positive growth: conservative is a flat 5% haircut
        assert_eq!(result.months[0].conservative, 1064.0);
        assert!(result.months[2].moderate > result.months[0].moderate);
        assert_ordered(result);
    }

    #[test]
    fn test_growth_is_clamped() {
        let revenues: Vec<f64> = (0..8).map(|i| 1000.0 * 1.1f64.powi(i)).collect();
        let monthly = series("2024-01", &revenues, &[20; 8]);

        let result = ForecastEngine::new().forecast(&monthly, date("2024-08-01"));
        let stats = &result.result().unwrap().statistics;

        assert_eq!(stats.applied_growth, 0.03);
        assert!(stats.median_growth.unwrap() > 0.09);
    }

    #[test]
    fn test_negative_growth_scenarios() {
        let revenues: Vec<f64> = (0..7).map(|i| 1000.0 * 0.98f64.powi(i)).collect();
        let monthly = series("2024-01", &revenues, &[20; 7]);

        let outcome = ForecastEngine::new().forecast(&monthly, date("2024-07-10"));
        let result = outcome.result().unwrap();
        let baseline = result.statistics.baseline;

        assert_eq!(result.statistics.applied_growth, -0.02);
        for m in &result.months {
            assert_eq!(m.moderate, baseline);
            assert!(m.conservative < baseline);
            assert!(m.optimistic > baseline);
        }
        assert_ordered(result);
    }

    #[test]
    fn test_heuristic_when_growth_is_volatile() {
        // Every swing is beyond the outlier bound
        let revenues = [1000.0, 2000.0, 1000.0, 2000.0, 1000.0, 2000.0];
        let monthly = series("2024-01", &revenues, &[20; 6]);

        let result = ForecastEngine::new().forecast(&monthly, date("2024-06-01"));
        let stats = &result.result().unwrap().statistics;

        assert_eq!(stats.growth_samples, 0);
        assert_eq!(stats.median_growth, None);
        // last 3 avg (1666.67) > last 6 avg (1500)
        assert_eq!(stats.applied_growth, 0.01);
    }

    #[test]
    fn test_partial_first_month_removed() {
        let revenues = [100.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0];
        let monthly = series("2024-01", &revenues, &[2, 20, 20, 20, 20, 20, 20]);

        let outcome = ForecastEngine::new().forecast(&monthly, date("2024-07-20"));
        let result = outcome.result().unwrap();

        assert_eq!(result.removed_partial_months.len(), 1);
        assert_eq!(result.removed_partial_months[0].month.to_string(), "2024-01");
        assert_eq!(result.statistics.months_used, 6);
        assert_eq!(result.statistics.baseline, 1000.0);
        // Flat history: no growth, conservative still under moderate
        assert_eq!(result.months[0].moderate, 1000.0);
        assert_eq!(result.months[0].conservative, 950.0);
    }

    #[test]
    fn test_fallback_drops_only_first_month() {
        let monthly = series("2024-01", &[10.0, 10.0, 900.0, 900.0], &[1, 1, 100, 100]);

        let outcome = ForecastEngine::new().forecast(&monthly, date("2024-05-01"));

        assert_eq!(
            outcome,
            ForecastOutcome::Insufficient {
                available: 3,
                required: 6
            }
        );
    }

    #[test]
    fn test_insufficient_is_not_zero() {
        let monthly = series("2024-01", &[1000.0; 5], &[20; 5]);
        let outcome = ForecastEngine::new().forecast(&monthly, date("2024-05-15"));

        assert!(outcome.result().is_none());
        assert!(matches!(outcome, ForecastOutcome::Insufficient { available: 5, .. }));
    }

    #[test]
    fn test_horizon_skips_reached_months() {
        let monthly = series("2023-10", &[1000.0; 6], &[20; 6]);

        // Data ends 2024-03; today is June, so June is already reached
        let outcome = ForecastEngine::new().forecast(&monthly, date("2024-06-10"));
        let months: Vec<String> = outcome
            .result()
            .unwrap()
            .months
            .iter()
            .map(|m| m.month.to_string())
            .collect();

        assert_eq!(months, vec!["2024-07", "2024-08", "2024-09"]);
    }

    #[test]
    fn test_always_three_months() {
        let monthly = series("2022-01", &[1000.0; 24], &[20; 24]);
        let result = ForecastEngine::new().forecast(&monthly, date("2023-12-20"));
        let months = &result.result().unwrap().months;

        assert_eq!(months.len(), FORECAST_HORIZON);
        let ahead: Vec<u32> = months.iter().map(|m| m.months_ahead).collect();
        assert_eq!(ahead, vec![1, 2, 3]);
    }

    #[test]
    fn test_horizon_is_not_configurable() {
        let parsed: Result<ForecastConfig, _> = serde_json::from_value(serde_json::json!({"horizon": 6}));
        assert!(parsed.is_err());

        let parsed: ForecastConfig = serde_json::from_value(serde_json::json!({"stable_months": 12})).unwrap();
        assert_eq!(parsed.stable_months, 12);
        assert_eq!(parsed.min_months, 6);
    }

    #[test]
    fn test_stable_period_is_last_nine() {
        let mut revenues = vec![100.0, 150.0, 200.0];
        revenues.extend([1000.0; 9]);
        let monthly = series("2023-01", &revenues, &[20; 12]);

        let result = ForecastEngine::new().forecast(&monthly, date("2023-12-01"));
        let stats = &result.result().unwrap().statistics;

        assert_eq!(stats.stable_months, 9);
        assert_eq!(stats.baseline, 1000.0);
        assert_eq!(stats.stable_min, 1000.0);
        assert_eq!(stats.coefficient_of_variation_pct, 0.0);
    }
}
