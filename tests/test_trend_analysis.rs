use pluvia::core::{AnnualAggregator, CorrelationAnalyzer, TrendAnalyzer, MIN_YEARS_FOR_TREND};
use pluvia::types::{AnnualAggregate, Observation, ObservationTable, Origin, TrendDirection};

fn full_year(station: &str, year: i32, monthly: f64) -> Vec<Observation> {
    (1..=12u32)
        .map(|month| Observation {
            station: station.to_string(),
            year,
            month,
            value: Some(monthly),
            origin: Origin::Original,
        })
        .collect()
}

#[test]
fn test_trend_from_aggregated_series() {
    let _ = env_logger::builder().is_test(true).try_init();

    // Wetter: +5 mm/month each year. Flat: constant. Short: 3 years.
    let mut rows = Vec::new();
    for year in 2000..=2009 {
        rows.extend(full_year("Wetter", year, 100.0 + (year - 2000) as f64 * 5.0));
        rows.extend(full_year("Flat", year, 80.0));
    }
    for year in 2000..=2002 {
        rows.extend(full_year("Short", year, 60.0));
    }
    let table = ObservationTable::from_rows(rows).unwrap();

    let aggregates = AnnualAggregator::new().aggregate(&table);
    let trends = TrendAnalyzer::new().analyze(&aggregates);

    // Short is omitted, not errored.
    assert_eq!(trends.len(), 2);
    assert!(trends.iter().all(|t| t.station != "Short"));

    let wetter = trends.iter().find(|t| t.station == "Wetter").unwrap();
    assert_eq!(wetter.direction, TrendDirection::Increasing);
    assert!(wetter.p_value < 0.05);
    // +5 mm/month over 12 months is +60 mm/year.
    assert!((wetter.sens_slope - 60.0).abs() < 1e-9);

    let flat = trends.iter().find(|t| t.station == "Flat").unwrap();
    assert_eq!(flat.direction, TrendDirection::NoTrend);
    assert_eq!(flat.p_value, 1.0);
}

#[test]
fn test_minimum_series_length_boundary() {
    let mk_aggs = |n: usize| -> Vec<AnnualAggregate> {
        (0..n)
            .map(|i| AnnualAggregate {
                station: "S".to_string(),
                year: 2000 + i as i32,
                total: Some(100.0 + i as f64),
                months_observed: 12,
            })
            .collect()
    };

    assert!(TrendAnalyzer::new()
        .analyze(&mk_aggs(MIN_YEARS_FOR_TREND - 1))
        .is_empty());
    assert_eq!(
        TrendAnalyzer::new().analyze(&mk_aggs(MIN_YEARS_FOR_TREND)).len(),
        1
    );
}

#[test]
fn test_nulled_years_leave_gaps_in_the_test_series() {
    // Eight years, but three of them fail the completeness gate.
    let mut rows = Vec::new();
    for year in 2000..=2007 {
        if (2002..=2004).contains(&year) {
            // Only 6 months recorded: the aggregate gets nulled.
            for month in 1..=6u32 {
                rows.push(Observation {
                    station: "Patchy".to_string(),
                    year,
                    month,
                    value: Some(999.0),
                    origin: Origin::Original,
                });
            }
        } else {
            rows.extend(full_year("Patchy", year, 50.0 + (year - 2000) as f64));
        }
    }
    let table = ObservationTable::from_rows(rows).unwrap();
    let aggregates = AnnualAggregator::new().aggregate(&table);
    let trends = TrendAnalyzer::new().analyze(&aggregates);

    assert_eq!(trends.len(), 1);
    // The big partial sums never leak into the test.
    assert_eq!(trends[0].n_years, 5);
    assert!(trends[0].sens_slope > 0.0);
}

#[test]
fn test_correlation_of_duplicated_station_is_one() {
    let mut rows = Vec::new();
    for (i, value) in [12.0, 48.0, 3.0, 91.0, 30.0, 65.0].iter().enumerate() {
        for name in ["Gauge", "Gauge-twin"] {
            rows.push(Observation {
                station: name.to_string(),
                year: 2000,
                month: i as u32 + 1,
                value: Some(*value),
                origin: Origin::Original,
            });
        }
    }
    let table = ObservationTable::from_rows(rows).unwrap();
    let matrix = CorrelationAnalyzer::new()
        .station_correlations(&table)
        .expect("two stations selected");

    let twin = matrix
        .stations
        .iter()
        .position(|s| s == "Gauge-twin")
        .unwrap();
    let gauge = matrix.stations.iter().position(|s| s == "Gauge").unwrap();
    assert!((matrix.values[[gauge, twin]] - 1.0).abs() < 1e-12);
    assert!((matrix.values[[twin, gauge]] - 1.0).abs() < 1e-12);
}
