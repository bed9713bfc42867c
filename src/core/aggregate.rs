use crate::types::{AnnualAggregate, ObservationTable};
use std::collections::{BTreeMap, BTreeSet};

/// Minimum distinct months with a non-null value for an annual total to
/// be considered valid. Fixed policy constant: partial-year totals are
/// not comparable across stations and must never pass as valid sums.
pub const MIN_MONTHS_PER_YEAR: u32 = 10;

/// Rolls monthly observations up to completeness-gated annual totals.
pub struct AnnualAggregator;

impl AnnualAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Group by (station, year), sum non-null values, and null every
    /// total with fewer than [`MIN_MONTHS_PER_YEAR`] contributing
    /// months. The (station, year) key survives either way, carrying
    /// its month count.
    pub fn aggregate(&self, observations: &ObservationTable) -> Vec<AnnualAggregate> {
        let mut groups: BTreeMap<(String, i32), (f64, BTreeSet<u32>)> = BTreeMap::new();
        for obs in observations.rows() {
            let entry = groups
                .entry((obs.station.clone(), obs.year))
                .or_insert((0.0, BTreeSet::new()));
            if let Some(value) = obs.value {
                entry.0 += value;
                entry.1.insert(obs.month);
            }
        }

        let mut nulled = 0usize;
        let aggregates: Vec<AnnualAggregate> = groups
            .into_iter()
            .map(|((station, year), (sum, months))| {
                let months_observed = months.len() as u32;
                let total = if months_observed >= MIN_MONTHS_PER_YEAR {
                    Some(sum)
                } else {
                    nulled += 1;
                    None
                };
                AnnualAggregate {
                    station,
                    year,
                    total,
                    months_observed,
                }
            })
            .collect();

        log::debug!(
            "Aggregated {} station-years ({} nulled below the {}-month threshold)",
            aggregates.len(),
            nulled,
            MIN_MONTHS_PER_YEAR
        );
        aggregates
    }
}

impl Default for AnnualAggregator {
    fn default() -> Self {
        Self::new()
    }
}
