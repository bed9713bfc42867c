use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Calendar months per year.
pub const MONTHS_PER_YEAR: u32 = 12;

/// Provenance of an observation value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Value as recorded by the station.
    Original,
    /// Value synthesized by the series completion engine.
    Interpolated,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Original => write!(f, "original"),
            Origin::Interpolated => write!(f, "interpolated"),
        }
    }
}

/// A single monthly precipitation observation in long format.
///
/// Identity is (station, year, month); `value` may be missing when the
/// station reported nothing usable for that month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub station: String,
    pub year: i32,
    pub month: u32,
    /// Precipitation in millimeters, `None` when not recorded.
    pub value: Option<f64>,
    pub origin: Origin,
}

impl Observation {
    /// First day of the observation's month, used as the pivot index
    /// for cross-station operations.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    fn key(&self) -> (&str, i32, u32) {
        (self.station.as_str(), self.year, self.month)
    }
}

/// The observation store: a long-format table with at most one row per
/// (station, year, month), sorted by that key.
///
/// Construction validates the key invariants; pipeline stages that
/// derive new tables keep them by building through
/// [`ObservationTable::from_rows`] or by transforming rows in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationTable {
    rows: Vec<Observation>,
}

impl ObservationTable {
    /// Build a table from unordered rows, enforcing the store invariants.
    ///
    /// Rows are sorted by (station, year, month). A month outside [1,12],
    /// a non-positive year, or a duplicate key is an `InvalidFormat` error.
    pub fn from_rows(mut rows: Vec<Observation>) -> PluviaResult<Self> {
        for obs in &rows {
            if obs.month < 1 || obs.month > MONTHS_PER_YEAR {
                return Err(PluviaError::InvalidFormat(format!(
                    "month {} out of range for station '{}' year {}",
                    obs.month, obs.station, obs.year
                )));
            }
            if obs.year <= 0 {
                return Err(PluviaError::InvalidFormat(format!(
                    "non-positive year {} for station '{}'",
                    obs.year, obs.station
                )));
            }
        }
        rows.sort_by(|a, b| a.key().cmp(&b.key()));
        for pair in rows.windows(2) {
            if pair[0].key() == pair[1].key() {
                return Err(PluviaError::InvalidFormat(format!(
                    "duplicate observation for station '{}' {}-{:02}",
                    pair[0].station, pair[0].year, pair[0].month
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Build a table from rows already sorted and key-unique.
    ///
    /// Only for pipeline stages that transform an existing table without
    /// disturbing its ordering or key uniqueness.
    pub(crate) fn from_sorted_rows(rows: Vec<Observation>) -> Self {
        debug_assert!(rows.windows(2).all(|pair| pair[0].key() < pair[1].key()));
        Self { rows }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct station names present in the table, sorted.
    pub fn station_names(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.rows.iter().map(|o| o.station.as_str()).collect();
        set.into_iter().map(String::from).collect()
    }

    /// Inclusive (min, max) year range covered by the table.
    pub fn year_span(&self) -> Option<(i32, i32)> {
        let min = self.rows.iter().map(|o| o.year).min()?;
        let max = self.rows.iter().map(|o| o.year).max()?;
        Some((min, max))
    }
}

/// Metadata for one rain gauge station.
///
/// Numeric fields that arrive malformed in the source metadata are
/// normalized at load time: `percent_complete` coerces into [0,100]
/// with malformed input becoming 0, and a non-numeric altitude becomes
/// `None` (which excludes the station from altitude-band filters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Registered gauge altitude in meters, when the metadata carries a
    /// parseable number.
    pub altitude: Option<f64>,
    pub municipality: String,
    pub region: String,
    /// Analysis grid cell identifier, when assigned.
    pub cell_id: Option<String>,
    /// Percentage of non-missing historical records, in [0,100].
    pub percent_complete: f64,
    /// DEM-sampled elevation in meters; optional enrichment.
    pub elevation_dem: Option<f64>,
}

/// The station table produced by one dataset load. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationTable {
    rows: Vec<Station>,
}

impl StationTable {
    /// Build a table of stations, sorted by name; duplicate names are an
    /// `InvalidFormat` error.
    pub fn from_rows(mut rows: Vec<Station>) -> PluviaResult<Self> {
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in rows.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(PluviaError::InvalidFormat(format!(
                    "duplicate station name '{}'",
                    pair[0].name
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Build a table from rows already sorted by name and name-unique.
    ///
    /// Only for code paths that subset or map an existing table without
    /// disturbing its ordering.
    pub(crate) fn from_sorted_rows(rows: Vec<Station>) -> Self {
        debug_assert!(rows.windows(2).all(|pair| pair[0].name < pair[1].name));
        Self { rows }
    }

    pub fn rows(&self) -> &[Station] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Station> {
        self.rows
            .binary_search_by(|s| s.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.rows[idx])
    }

    pub fn names(&self) -> Vec<String> {
        self.rows.iter().map(|s| s.name.clone()).collect()
    }
}

/// One row of the auxiliary macroclimate-index table (ENSO and related
/// indices), carried alongside the observations for downstream views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateIndexRecord {
    pub year: i32,
    pub month: u32,
    /// Oceanic Niño Index anomaly.
    pub oni: Option<f64>,
    /// Southern Oscillation Index.
    pub soi: Option<f64>,
    /// Indian Ocean Dipole index.
    pub iod: Option<f64>,
}

/// An immutable bundle of everything one dataset load produced.
///
/// Pipeline stages borrow a snapshot and derive fresh tables from it;
/// nothing mutates a snapshot in place. A reload builds a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub stations: StationTable,
    pub observations: ObservationTable,
    pub climate_indices: Vec<ClimateIndexRecord>,
}

/// Annual precipitation rollup for one (station, year).
///
/// `total` is `None` whenever fewer than
/// [`crate::core::aggregate::MIN_MONTHS_PER_YEAR`] distinct months
/// contributed, regardless of the partial sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualAggregate {
    pub station: String,
    pub year: i32,
    pub total: Option<f64>,
    pub months_observed: u32,
}

/// Long-term per (station, calendar month) reference statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub station: String,
    pub month: u32,
    pub mean: f64,
    /// Sample standard deviation; `None` below two samples.
    pub std_dev: Option<f64>,
    pub count: usize,
}

/// Deviation of one observation from its station/month baseline mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub station: String,
    pub year: i32,
    pub month: u32,
    pub observed: f64,
    pub baseline_mean: f64,
    /// observed − baseline mean (raw deviation, not a z-score).
    pub deviation: f64,
}

/// Direction reported by the Mann-Kendall test at α = 0.05.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    NoTrend,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::NoTrend => write!(f, "no trend"),
        }
    }
}

/// Monotonic-trend statistics for one station's annual series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub station: String,
    pub direction: TrendDirection,
    /// Two-sided p-value of the Mann-Kendall test.
    pub p_value: f64,
    /// Sen's slope estimate in mm/year.
    pub sens_slope: f64,
    /// Number of non-null annual totals the test ran on.
    pub n_years: usize,
}

/// Pairwise Pearson correlation across the selected stations' monthly
/// series. `values[[i, j]]` correlates `stations[i]` with `stations[j]`;
/// pairs with fewer than two overlapping months carry NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub stations: Vec<String>,
    pub values: Array2<f64>,
}

/// Error types for the precipitation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PluviaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for pipeline operations.
pub type PluviaResult<T> = Result<T, PluviaError>;
