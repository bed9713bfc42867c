use crate::types::{Anomaly, Baseline, ObservationTable};
use std::collections::BTreeMap;

/// Computes per (station, calendar month) long-term baselines and
/// expresses observations as raw deviations from them.
///
/// Baselines must come from the full, year-unfiltered table so the
/// analysis window never leaks into its own reference; anomalies are
/// then evaluated on whatever filtered window the caller is viewing.
pub struct BaselineCalculator;

impl BaselineCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Mean, sample standard deviation, and count per (station, month),
    /// over every year present in `full_table`.
    ///
    /// Months with no non-null sample yield no baseline at all, so a
    /// downstream anomaly lookup comes back empty instead of dividing
    /// by zero.
    pub fn monthly_baselines(&self, full_table: &ObservationTable) -> Vec<Baseline> {
        let mut samples: BTreeMap<(String, u32), Vec<f64>> = BTreeMap::new();
        for obs in full_table.rows() {
            if let Some(value) = obs.value {
                samples
                    .entry((obs.station.clone(), obs.month))
                    .or_default()
                    .push(value);
            }
        }

        let baselines: Vec<Baseline> = samples
            .into_iter()
            .map(|((station, month), values)| {
                let count = values.len();
                let mean = values.iter().sum::<f64>() / count as f64;
                let std_dev = if count >= 2 {
                    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                    Some((ss / (count - 1) as f64).sqrt())
                } else {
                    None
                };
                Baseline {
                    station,
                    month,
                    mean,
                    std_dev,
                    count,
                }
            })
            .collect();

        log::debug!("Computed {} station-month baselines", baselines.len());
        baselines
    }

    /// Deviation of each non-null observation in `window` from its
    /// station/month baseline mean. Observations without a matching
    /// baseline are omitted.
    pub fn monthly_anomalies(&self, window: &ObservationTable, baselines: &[Baseline]) -> Vec<Anomaly> {
        let means: BTreeMap<(&str, u32), f64> = baselines
            .iter()
            .map(|b| ((b.station.as_str(), b.month), b.mean))
            .collect();

        window
            .rows()
            .iter()
            .filter_map(|obs| {
                let observed = obs.value?;
                let mean = *means.get(&(obs.station.as_str(), obs.month))?;
                Some(Anomaly {
                    station: obs.station.clone(),
                    year: obs.year,
                    month: obs.month,
                    observed,
                    baseline_mean: mean,
                    deviation: observed - mean,
                })
            })
            .collect()
    }
}

impl Default for BaselineCalculator {
    fn default() -> Self {
        Self::new()
    }
}
