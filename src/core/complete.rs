use crate::types::{Observation, ObservationTable, Origin, MONTHS_PER_YEAR};
use std::collections::BTreeMap;

/// Gap-filling engine for per-station monthly series.
///
/// Missing months inside a station's observed span (first to last month
/// with a non-null value) are filled by linear interpolation on the
/// station's own chronological month axis. Filled rows are tagged
/// [`Origin::Interpolated`]; non-null original rows pass through
/// untouched. The engine never extrapolates outside the span, and a
/// station with fewer than two non-null observations passes through
/// unchanged.
pub struct SeriesCompleter;

impl SeriesCompleter {
    pub fn new() -> Self {
        Self
    }

    /// Complete every station series in the table.
    pub fn complete(&self, table: &ObservationTable) -> ObservationTable {
        self.complete_with_progress(table, |_| {})
    }

    /// Complete every station series, reporting per-station progress.
    ///
    /// `progress` is invoked once per station with monotonically
    /// non-decreasing completion fractions in [0,1], from the calling
    /// thread. Callers that need cancellation should check their own
    /// flag inside the callback and unwind from there.
    pub fn complete_with_progress<F>(&self, table: &ObservationTable, mut progress: F) -> ObservationTable
    where
        F: FnMut(f32),
    {
        let groups = station_groups(table.rows());
        let n_stations = groups.len();
        log::info!(
            "Completing series for {} stations ({} observations)",
            n_stations,
            table.len()
        );

        let mut out: Vec<Observation> = Vec::with_capacity(table.len());
        let mut filled_total = 0usize;

        for (done, group) in groups.into_iter().enumerate() {
            filled_total += complete_station(group, &mut out);
            progress((done + 1) as f32 / n_stations as f32);
        }
        if n_stations == 0 {
            progress(1.0);
        }

        log::info!("Series completion synthesized {} monthly values", filled_total);
        ObservationTable::from_sorted_rows(out)
    }
}

impl Default for SeriesCompleter {
    fn default() -> Self {
        Self::new()
    }
}

/// Split the sorted row slice into per-station runs.
fn station_groups(rows: &[Observation]) -> Vec<&[Observation]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        if i == rows.len() || rows[i].station != rows[start].station {
            groups.push(&rows[start..i]);
            start = i;
        }
    }
    groups
}

/// Absolute month index; consecutive months differ by exactly 1.
fn month_index(year: i32, month: u32) -> i64 {
    year as i64 * MONTHS_PER_YEAR as i64 + (month as i64 - 1)
}

fn index_to_year_month(idx: i64) -> (i32, u32) {
    let year = idx.div_euclid(MONTHS_PER_YEAR as i64) as i32;
    let month = idx.rem_euclid(MONTHS_PER_YEAR as i64) as u32 + 1;
    (year, month)
}

/// Complete a single station's run of rows, appending to `out`.
/// Returns the number of synthesized values.
fn complete_station(group: &[Observation], out: &mut Vec<Observation>) -> usize {
    let valid: Vec<(i64, f64)> = group
        .iter()
        .filter_map(|o| o.value.map(|v| (month_index(o.year, o.month), v)))
        .collect();

    if valid.len() < 2 {
        log::debug!(
            "Station '{}' has {} valid observations, passing through",
            group[0].station,
            valid.len()
        );
        out.extend(group.iter().cloned());
        return 0;
    }

    let first = valid[0].0;
    let last = valid[valid.len() - 1].0;
    let existing: BTreeMap<i64, &Observation> = group
        .iter()
        .map(|o| (month_index(o.year, o.month), o))
        .collect();

    // Rows before the first valid month pass through (no extrapolation).
    out.extend(
        group
            .iter()
            .filter(|o| month_index(o.year, o.month) < first)
            .cloned(),
    );

    let mut filled = 0usize;
    let mut seg = 0; // valid[seg].0 <= idx <= valid[seg + 1].0
    for idx in first..=last {
        while seg + 1 < valid.len() && valid[seg + 1].0 <= idx {
            seg += 1;
        }
        match existing.get(&idx) {
            Some(obs) if obs.value.is_some() => out.push((*obs).clone()),
            _ => {
                // Missing or null month inside the span: synthesize it.
                let (i0, v0) = valid[seg];
                let (i1, v1) = valid[seg + 1];
                let value = v0 + (v1 - v0) * (idx - i0) as f64 / (i1 - i0) as f64;
                let (year, month) = index_to_year_month(idx);
                out.push(Observation {
                    station: group[0].station.clone(),
                    year,
                    month,
                    value: Some(value),
                    origin: Origin::Interpolated,
                });
                filled += 1;
            }
        }
    }

    // Rows after the last valid month also pass through.
    out.extend(
        group
            .iter()
            .filter(|o| month_index(o.year, o.month) > last)
            .cloned(),
    );

    filled
}
