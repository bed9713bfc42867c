use pluvia::core::{AnalysisMode, AnalysisPipeline, SeriesSelection, StationFilter};
use pluvia::types::{
    DatasetSnapshot, Observation, ObservationTable, Origin, Station, StationTable, TrendDirection,
};

/// Two stations, eleven years. "Humid" rises steadily and has a gap in
/// 2005; "Dry" is flat with a short record.
fn build_snapshot() -> DatasetSnapshot {
    let stations = StationTable::from_rows(vec![
        Station {
            name: "Humid".to_string(),
            latitude: 6.3,
            longitude: -75.5,
            altitude: Some(1800.0),
            municipality: "Medellin".to_string(),
            region: "Antioquia".to_string(),
            cell_id: Some("C4".to_string()),
            percent_complete: 95.0,
            elevation_dem: None,
        },
        Station {
            name: "Dry".to_string(),
            latitude: 4.5,
            longitude: -74.1,
            altitude: Some(2600.0),
            municipality: "Bogota".to_string(),
            region: "Cundinamarca".to_string(),
            cell_id: Some("C9".to_string()),
            percent_complete: 55.0,
            elevation_dem: None,
        },
    ])
    .unwrap();

    let mut rows = Vec::new();
    for year in 2000..=2010 {
        for month in 1..=12u32 {
            // Gap: Humid reports nothing from Mar to Jun 2005.
            if year == 2005 && (3..=6).contains(&month) {
                continue;
            }
            rows.push(Observation {
                station: "Humid".to_string(),
                year,
                month,
                value: Some(60.0 + (year - 2000) as f64 * 12.0 + month as f64),
                origin: Origin::Original,
            });
        }
    }
    for year in 2004..=2008 {
        for month in 1..=12u32 {
            rows.push(Observation {
                station: "Dry".to_string(),
                year,
                month,
                value: Some(20.0),
                origin: Origin::Original,
            });
        }
    }

    DatasetSnapshot {
        stations,
        observations: ObservationTable::from_rows(rows).unwrap(),
        climate_indices: Vec::new(),
    }
}

#[test]
fn test_full_run_original_mode() {
    let _ = env_logger::builder().is_test(true).try_init();
    let snapshot = build_snapshot();
    let pipeline = AnalysisPipeline::new();

    let output = pipeline.run(
        &snapshot,
        &StationFilter::default(),
        &SeriesSelection::default(),
        AnalysisMode::Original,
    );

    assert_eq!(output.summary.selected_stations, 2);
    assert_eq!(output.summary.total_stations, 2);
    assert_eq!(output.summary.year_range, Some((2000, 2010)));

    // 2005 has only 8 observed months for Humid: nulled aggregate.
    let humid_2005 = output
        .annual
        .iter()
        .find(|a| a.station == "Humid" && a.year == 2005)
        .expect("aggregate key must survive nullification");
    assert_eq!(humid_2005.months_observed, 8);
    assert_eq!(humid_2005.total, None);

    // A complete year sums exactly.
    let humid_2000 = output
        .annual
        .iter()
        .find(|a| a.station == "Humid" && a.year == 2000)
        .unwrap();
    let expected: f64 = (1..=12).map(|m| 60.0 + m as f64).sum();
    assert_eq!(humid_2000.total, Some(expected));
}

#[test]
fn test_completed_mode_restores_the_gap_year() {
    let snapshot = build_snapshot();
    let pipeline = AnalysisPipeline::new();

    let mut fractions: Vec<f32> = Vec::new();
    let output = pipeline.run_with_progress(
        &snapshot,
        &StationFilter::default(),
        &SeriesSelection::default(),
        AnalysisMode::Completed,
        |f| fractions.push(f),
    );

    assert!(!fractions.is_empty());
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*fractions.last().unwrap(), 1.0);

    let humid_2005 = output
        .annual
        .iter()
        .find(|a| a.station == "Humid" && a.year == 2005)
        .unwrap();
    assert_eq!(humid_2005.months_observed, 12);
    assert!(humid_2005.total.is_some());

    // Synthesized rows carry the interpolated origin tag.
    let filled: Vec<_> = output
        .monthly
        .rows()
        .iter()
        .filter(|o| o.origin == Origin::Interpolated)
        .collect();
    assert_eq!(filled.len(), 4);
    assert!(filled.iter().all(|o| o.station == "Humid" && o.year == 2005));
}

#[test]
fn test_station_filter_narrows_every_output() {
    let snapshot = build_snapshot();
    let pipeline = AnalysisPipeline::new();

    let filter = StationFilter {
        regions: vec!["Antioquia".to_string()],
        ..Default::default()
    };
    let output = pipeline.run(
        &snapshot,
        &filter,
        &SeriesSelection::default(),
        AnalysisMode::Original,
    );

    assert_eq!(output.stations.names(), vec!["Humid".to_string()]);
    assert!(output.monthly.rows().iter().all(|o| o.station == "Humid"));
    assert!(output.annual.iter().all(|a| a.station == "Humid"));
    // One station: correlation is an observable no-op.
    assert!(pipeline.correlation(&output).is_none());
}

#[test]
fn test_on_demand_products() {
    let snapshot = build_snapshot();
    let pipeline = AnalysisPipeline::new();
    let output = pipeline.run(
        &snapshot,
        &StationFilter::default(),
        &SeriesSelection {
            year_range: Some((2004, 2008)),
            ..Default::default()
        },
        AnalysisMode::Original,
    );

    // Anomalies are computed against the full-record baseline, so a
    // window observation equal to the all-years mean deviates by zero.
    let anomalies = pipeline.anomalies(&snapshot, &output);
    assert!(!anomalies.is_empty());
    let dry = anomalies.iter().find(|a| a.station == "Dry").unwrap();
    assert!(dry.deviation.abs() < 1e-12); // constant series sits on its own baseline

    // Humid rises ~12 mm/year over its full record; Dry is constant.
    // Trends read the full window so the rank test has years to work with.
    let full_output = pipeline.run(
        &snapshot,
        &StationFilter::default(),
        &SeriesSelection::default(),
        AnalysisMode::Original,
    );
    let trends = pipeline.trends(&full_output);
    let humid = trends.iter().find(|t| t.station == "Humid").unwrap();
    assert_eq!(humid.direction, TrendDirection::Increasing);
    assert!(humid.sens_slope > 0.0);
    let dry = trends.iter().find(|t| t.station == "Dry").unwrap();
    assert_eq!(dry.direction, TrendDirection::NoTrend);

    let matrix = pipeline.correlation(&output).unwrap();
    assert_eq!(matrix.stations.len(), 2);
    assert_eq!(matrix.values[[0, 0]], 1.0);
}

#[test]
fn test_row_drop_toggles_run_after_completion() {
    let stations = StationTable::from_rows(vec![Station {
        name: "Gauge".to_string(),
        latitude: 6.0,
        longitude: -75.4,
        altitude: Some(1200.0),
        municipality: "Medellin".to_string(),
        region: "Antioquia".to_string(),
        cell_id: None,
        percent_complete: 90.0,
        elevation_dem: None,
    }])
    .unwrap();
    // Jan 10, Feb 0 (a dry but real month), Mar 30, Apr missing, May 50.
    let rows = vec![
        (1, Some(10.0)),
        (2, Some(0.0)),
        (3, Some(30.0)),
        (4, None),
        (5, Some(50.0)),
    ]
    .into_iter()
    .map(|(month, value)| Observation {
        station: "Gauge".to_string(),
        year: 2000,
        month,
        value,
        origin: Origin::Original,
    })
    .collect();
    let snapshot = DatasetSnapshot {
        stations,
        observations: ObservationTable::from_rows(rows).unwrap(),
        climate_indices: Vec::new(),
    };

    let selection = SeriesSelection {
        exclude_missing: true,
        exclude_zeros: true,
        ..Default::default()
    };
    let output = AnalysisPipeline::new().run(
        &snapshot,
        &StationFilter::default(),
        &selection,
        AnalysisMode::Completed,
    );

    // The zero month passes through interpolation untouched and is
    // dropped afterward; it is never bridged into a synthesized value.
    assert!(output.monthly.rows().iter().all(|o| o.month != 2));

    // The genuinely missing month gets filled before the drops run.
    let apr = output
        .monthly
        .rows()
        .iter()
        .find(|o| o.month == 4)
        .expect("gap month must be interpolated, not dropped");
    assert_eq!(apr.origin, Origin::Interpolated);
    assert_eq!(apr.value, Some(40.0));

    assert_eq!(output.monthly.len(), 4); // Jan, Mar, Apr, May
}

#[test]
fn test_rerun_determinism_across_modes() {
    let snapshot = build_snapshot();
    let pipeline = AnalysisPipeline::new();
    for mode in [AnalysisMode::Original, AnalysisMode::Completed] {
        let a = pipeline.run(
            &snapshot,
            &StationFilter::default(),
            &SeriesSelection::default(),
            mode,
        );
        let b = pipeline.run(
            &snapshot,
            &StationFilter::default(),
            &SeriesSelection::default(),
            mode,
        );
        assert_eq!(a.monthly, b.monthly);
        assert_eq!(a.annual, b.annual);
        assert_eq!(a.summary, b.summary);
    }
}
