use crate::types::{AnnualAggregate, TrendDirection, TrendResult};
use statrs::function::erf::erfc;
use std::collections::BTreeMap;

/// Minimum non-null annual totals required before a trend is computed.
pub const MIN_YEARS_FOR_TREND: usize = 4;

/// Two-sided significance level separating a reported trend from noise.
const ALPHA: f64 = 0.05;

/// Rank-based trend detection over per-station annual series.
///
/// Runs the original (tie-corrected) Mann-Kendall test and pairs it
/// with Sen's slope, the median of all pairwise slopes, as the robust
/// rate estimate. Stations with fewer than [`MIN_YEARS_FOR_TREND`]
/// valid annual totals are omitted from the result set.
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Trend statistics per station, from completeness-gated annual
    /// aggregates. Null totals never enter the test.
    pub fn analyze(&self, aggregates: &[AnnualAggregate]) -> Vec<TrendResult> {
        let mut series: BTreeMap<&str, Vec<(i32, f64)>> = BTreeMap::new();
        for agg in aggregates {
            if let Some(total) = agg.total {
                series
                    .entry(agg.station.as_str())
                    .or_default()
                    .push((agg.year, total));
            }
        }

        let mut results = Vec::new();
        for (station, mut pairs) in series {
            if pairs.len() < MIN_YEARS_FOR_TREND {
                log::debug!(
                    "Station '{}' has {} valid annual totals, skipping trend test",
                    station,
                    pairs.len()
                );
                continue;
            }
            pairs.sort_by_key(|&(year, _)| year);
            let values: Vec<f64> = pairs.iter().map(|&(_, v)| v).collect();
            let (z, p_value) = mann_kendall(&values);
            let slope = sens_slope(&pairs);
            let direction = if p_value < ALPHA {
                if z > 0.0 {
                    TrendDirection::Increasing
                } else {
                    TrendDirection::Decreasing
                }
            } else {
                TrendDirection::NoTrend
            };
            results.push(TrendResult {
                station: station.to_string(),
                direction,
                p_value,
                sens_slope: slope,
                n_years: values.len(),
            });
        }

        log::info!("Trend test produced results for {} stations", results.len());
        results
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Mann-Kendall test statistic and two-sided p-value.
///
/// Uses the tie-corrected variance and the ±1 continuity correction,
/// with the p-value taken from the standard normal tail.
fn mann_kendall(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    let mut s = 0i64;
    for i in 0..n - 1 {
        for j in i + 1..n {
            s += match values[j].partial_cmp(&values[i]) {
                Some(std::cmp::Ordering::Greater) => 1,
                Some(std::cmp::Ordering::Less) => -1,
                _ => 0,
            };
        }
    }

    // Tie groups shrink the variance of S.
    let mut tie_counts: BTreeMap<u64, u64> = BTreeMap::new();
    for v in values {
        *tie_counts.entry(v.to_bits()).or_insert(0) += 1;
    }
    let tie_term: f64 = tie_counts
        .values()
        .filter(|&&t| t > 1)
        .map(|&t| {
            let t = t as f64;
            t * (t - 1.0) * (2.0 * t + 5.0)
        })
        .sum();
    let nf = n as f64;
    let var_s = (nf * (nf - 1.0) * (2.0 * nf + 5.0) - tie_term) / 18.0;

    if var_s <= 0.0 || s == 0 {
        return (0.0, 1.0);
    }
    let std_s = var_s.sqrt();
    let z = if s > 0 {
        (s as f64 - 1.0) / std_s
    } else {
        (s as f64 + 1.0) / std_s
    };
    let p = erfc(z.abs() / std::f64::consts::SQRT_2);
    (z, p.clamp(0.0, 1.0))
}

/// Sen's slope: the median of all pairwise slopes over (year, value).
fn sens_slope(pairs: &[(i32, f64)]) -> f64 {
    let mut slopes = Vec::with_capacity(pairs.len() * (pairs.len() - 1) / 2);
    for i in 0..pairs.len() - 1 {
        for j in i + 1..pairs.len() {
            let dy = pairs[j].1 - pairs[i].1;
            let dx = (pairs[j].0 - pairs[i].0) as f64;
            if dx != 0.0 {
                slopes.push(dy / dx);
            }
        }
    }
    if slopes.is_empty() {
        return 0.0;
    }
    slopes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = slopes.len() / 2;
    if slopes.len() % 2 == 0 {
        (slopes[mid - 1] + slopes[mid]) / 2.0
    } else {
        slopes[mid]
    }
}
