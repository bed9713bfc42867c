use crate::types::{CorrelationMatrix, ObservationTable};
use chrono::NaiveDate;
use ndarray::Array2;
use std::collections::BTreeSet;

/// Pairwise Pearson correlation across station monthly series.
///
/// The observation table is pivoted to one column per station on a
/// shared month index; each station pair is correlated over the months
/// where both have a value (pairwise-complete). Fewer than two selected
/// stations is a no-op (`None`) rather than a degenerate 1x1 matrix.
pub struct CorrelationAnalyzer;

impl CorrelationAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn station_correlations(&self, observations: &ObservationTable) -> Option<CorrelationMatrix> {
        let stations = observations.station_names();
        if stations.len() < 2 {
            log::info!(
                "Correlation skipped: {} station(s) selected, need at least 2",
                stations.len()
            );
            return None;
        }

        let dates: BTreeSet<NaiveDate> = observations
            .rows()
            .iter()
            .filter_map(|o| o.date())
            .collect();
        let dates: Vec<NaiveDate> = dates.into_iter().collect();

        // Pivot: rows are months, columns are stations, NaN marks gaps.
        let mut pivot = Array2::<f64>::from_elem((dates.len(), stations.len()), f64::NAN);
        for obs in observations.rows() {
            let (Some(date), Some(value)) = (obs.date(), obs.value) else {
                continue;
            };
            let row = dates.binary_search(&date).ok()?;
            let col = stations.binary_search(&obs.station).ok()?;
            pivot[[row, col]] = value;
        }

        let n = stations.len();
        let mut values = Array2::<f64>::from_elem((n, n), f64::NAN);
        for i in 0..n {
            values[[i, i]] = 1.0;
            for j in i + 1..n {
                let r = pearson_pairwise(pivot.column(i), pivot.column(j));
                values[[i, j]] = r;
                values[[j, i]] = r;
            }
        }

        log::debug!(
            "Correlation matrix over {} stations and {} months",
            n,
            dates.len()
        );
        Some(CorrelationMatrix { stations, values })
    }
}

impl Default for CorrelationAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Pearson r over the positions where both columns hold a value.
/// NaN when fewer than two overlapping months exist or a series is
/// constant over the overlap.
fn pearson_pairwise(a: ndarray::ArrayView1<f64>, b: ndarray::ArrayView1<f64>) -> f64 {
    let paired: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(&x, &y)| (x, y))
        .collect();
    if paired.len() < 2 {
        return f64::NAN;
    }

    let n = paired.len() as f64;
    let mean_a = paired.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = paired.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in paired {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        f64::NAN
    } else {
        cov / denom
    }
}
