use crate::types::{Observation, ObservationTable, PluviaError, PluviaResult, Station, StationTable};

/// Fixed altitude bands used for station selection, in meters.
///
/// Boundaries are inclusive on the upper end; the first band also
/// includes 0. A station at exactly 500 m falls in `B0To500`, and one
/// at exactly 3000 m falls in `B2000To3000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltitudeBand {
    B0To500,
    B500To1000,
    B1000To2000,
    B2000To3000,
    Above3000,
}

impl AltitudeBand {
    pub const ALL: [AltitudeBand; 5] = [
        AltitudeBand::B0To500,
        AltitudeBand::B500To1000,
        AltitudeBand::B1000To2000,
        AltitudeBand::B2000To3000,
        AltitudeBand::Above3000,
    ];

    /// Label as presented to users ("0-500", ..., ">3000").
    pub fn label(&self) -> &'static str {
        match self {
            AltitudeBand::B0To500 => "0-500",
            AltitudeBand::B500To1000 => "500-1000",
            AltitudeBand::B1000To2000 => "1000-2000",
            AltitudeBand::B2000To3000 => "2000-3000",
            AltitudeBand::Above3000 => ">3000",
        }
    }

    /// Parse a user-facing band label.
    pub fn parse(label: &str) -> PluviaResult<Self> {
        match label.trim() {
            "0-500" => Ok(AltitudeBand::B0To500),
            "500-1000" => Ok(AltitudeBand::B500To1000),
            "1000-2000" => Ok(AltitudeBand::B1000To2000),
            "2000-3000" => Ok(AltitudeBand::B2000To3000),
            ">3000" => Ok(AltitudeBand::Above3000),
            other => Err(PluviaError::InvalidFormat(format!(
                "unknown altitude band '{}'",
                other
            ))),
        }
    }

    pub fn contains(&self, altitude: f64) -> bool {
        match self {
            AltitudeBand::B0To500 => (0.0..=500.0).contains(&altitude),
            AltitudeBand::B500To1000 => altitude > 500.0 && altitude <= 1000.0,
            AltitudeBand::B1000To2000 => altitude > 1000.0 && altitude <= 2000.0,
            AltitudeBand::B2000To3000 => altitude > 2000.0 && altitude <= 3000.0,
            AltitudeBand::Above3000 => altitude > 3000.0,
        }
    }
}

impl std::fmt::Display for AltitudeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Station-level selection predicates.
///
/// The filter is the conjunction of all non-empty predicate sets; an
/// empty set (or a zero minimum percentage) imposes no constraint.
/// Stations without a numeric altitude are excluded by any non-empty
/// altitude filter.
#[derive(Debug, Clone, Default)]
pub struct StationFilter {
    /// Minimum `percent_complete`, in [0,100]; 0 disables the predicate.
    pub min_data_percent: f64,
    pub altitude_bands: Vec<AltitudeBand>,
    pub regions: Vec<String>,
    pub municipalities: Vec<String>,
    pub cells: Vec<String>,
}

impl StationFilter {
    pub fn matches(&self, station: &Station) -> bool {
        if self.min_data_percent > 0.0 && station.percent_complete < self.min_data_percent {
            return false;
        }
        if !self.altitude_bands.is_empty() {
            match station.altitude {
                Some(alt) => {
                    if !self.altitude_bands.iter().any(|band| band.contains(alt)) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if !self.regions.is_empty() && !self.regions.iter().any(|r| r == &station.region) {
            return false;
        }
        if !self.municipalities.is_empty()
            && !self.municipalities.iter().any(|m| m == &station.municipality)
        {
            return false;
        }
        if !self.cells.is_empty() {
            match &station.cell_id {
                Some(cell) => {
                    if !self.cells.iter().any(|c| c == cell) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    /// Apply the filter to a station table, producing a new table.
    pub fn apply(&self, stations: &StationTable) -> StationTable {
        let kept: Vec<Station> = stations
            .rows()
            .iter()
            .filter(|s| self.matches(s))
            .cloned()
            .collect();
        log::debug!(
            "Station filter kept {} of {} stations",
            kept.len(),
            stations.len()
        );
        // Input table is already name-unique and sorted; filtering keeps both.
        StationTable::from_sorted_rows(kept)
    }
}

/// Observation-level selection: station subset, inclusive year range,
/// calendar month set, and the preprocessing toggles for dropping
/// missing or zero values.
#[derive(Debug, Clone, Default)]
pub struct SeriesSelection {
    /// Stations to keep; empty keeps all.
    pub stations: Vec<String>,
    /// Inclusive `(min_year, max_year)`; `None` keeps all years.
    pub year_range: Option<(i32, i32)>,
    /// Calendar months to keep; empty keeps all twelve.
    pub months: Vec<u32>,
    /// Drop rows whose value is missing.
    pub exclude_missing: bool,
    /// Drop rows whose value is exactly zero (keeps only positive rain).
    pub exclude_zeros: bool,
}

impl SeriesSelection {
    fn keeps(&self, obs: &Observation) -> bool {
        if !self.stations.is_empty() && !self.stations.iter().any(|s| s == &obs.station) {
            return false;
        }
        if let Some((min_year, max_year)) = self.year_range {
            if obs.year < min_year || obs.year > max_year {
                return false;
            }
        }
        if !self.months.is_empty() && !self.months.contains(&obs.month) {
            return false;
        }
        match obs.value {
            None if self.exclude_missing => false,
            Some(v) if self.exclude_zeros && v <= 0.0 => false,
            _ => true,
        }
    }

    /// Restrict an observation table, producing a new table.
    pub fn apply(&self, observations: &ObservationTable) -> ObservationTable {
        let kept: Vec<Observation> = observations
            .rows()
            .iter()
            .filter(|o| self.keeps(o))
            .cloned()
            .collect();
        log::debug!(
            "Series selection kept {} of {} observations",
            kept.len(),
            observations.len()
        );
        // Filtering a sorted, key-unique table preserves both properties.
        ObservationTable::from_sorted_rows(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Origin;

    fn station(name: &str, altitude: Option<f64>, region: &str, percent: f64) -> Station {
        Station {
            name: name.to_string(),
            latitude: 6.0,
            longitude: -75.0,
            altitude,
            municipality: "Medellin".to_string(),
            region: region.to_string(),
            cell_id: Some("C7".to_string()),
            percent_complete: percent,
            elevation_dem: None,
        }
    }

    #[test]
    fn test_altitude_band_boundaries() {
        assert!(AltitudeBand::B0To500.contains(0.0));
        assert!(AltitudeBand::B0To500.contains(500.0));
        assert!(!AltitudeBand::B500To1000.contains(500.0));
        assert!(AltitudeBand::B2000To3000.contains(3000.0));
        assert!(!AltitudeBand::Above3000.contains(3000.0));
        assert!(AltitudeBand::Above3000.contains(3000.1));
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let table = StationTable::from_rows(vec![
            station("A", Some(100.0), "Antioquia", 50.0),
            station("B", None, "Caldas", 0.0),
        ])
        .unwrap();
        let filtered = StationFilter::default().apply(&table);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_conjunction_of_predicates() {
        let table = StationTable::from_rows(vec![
            station("A", Some(400.0), "Antioquia", 95.0),
            station("B", Some(400.0), "Caldas", 95.0),
            station("C", Some(2500.0), "Antioquia", 95.0),
            station("D", Some(400.0), "Antioquia", 10.0),
        ])
        .unwrap();
        let filter = StationFilter {
            min_data_percent: 80.0,
            altitude_bands: vec![AltitudeBand::B0To500],
            regions: vec!["Antioquia".to_string()],
            ..Default::default()
        };
        let filtered = filter.apply(&table);
        assert_eq!(filtered.names(), vec!["A".to_string()]);
    }

    #[test]
    fn test_non_numeric_altitude_excluded_by_altitude_filter() {
        let table = StationTable::from_rows(vec![station("A", None, "Antioquia", 95.0)]).unwrap();
        let filter = StationFilter {
            altitude_bands: vec![AltitudeBand::Above3000],
            ..Default::default()
        };
        assert!(filter.apply(&table).is_empty());
    }

    #[test]
    fn test_band_labels_round_trip() {
        for band in AltitudeBand::ALL {
            assert_eq!(AltitudeBand::parse(band.label()).unwrap(), band);
        }
        assert!(AltitudeBand::parse("500-2000").is_err());
    }

    #[test]
    fn test_series_selection_window() {
        let rows = vec![
            Observation {
                station: "A".to_string(),
                year: 1999,
                month: 6,
                value: Some(120.0),
                origin: Origin::Original,
            },
            Observation {
                station: "A".to_string(),
                year: 2000,
                month: 6,
                value: Some(0.0),
                origin: Origin::Original,
            },
            Observation {
                station: "A".to_string(),
                year: 2000,
                month: 7,
                value: None,
                origin: Origin::Original,
            },
            Observation {
                station: "B".to_string(),
                year: 2000,
                month: 6,
                value: Some(80.0),
                origin: Origin::Original,
            },
        ];
        let table = ObservationTable::from_rows(rows).unwrap();

        let selection = SeriesSelection {
            stations: vec!["A".to_string()],
            year_range: Some((2000, 2000)),
            months: vec![6, 7],
            exclude_missing: true,
            exclude_zeros: true,
        };
        let filtered = selection.apply(&table);
        assert!(filtered.is_empty());

        let selection = SeriesSelection {
            stations: vec!["A".to_string()],
            year_range: Some((2000, 2000)),
            ..Default::default()
        };
        assert_eq!(selection.apply(&table).len(), 2);
    }
}
