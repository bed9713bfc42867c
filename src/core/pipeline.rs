use crate::core::aggregate::AnnualAggregator;
use crate::core::anomaly::BaselineCalculator;
use crate::core::complete::SeriesCompleter;
use crate::core::correlation::CorrelationAnalyzer;
use crate::core::filter::{SeriesSelection, StationFilter};
use crate::core::trend::TrendAnalyzer;
use crate::types::{
    Anomaly, AnnualAggregate, CorrelationMatrix, DatasetSnapshot, ObservationTable, StationTable,
    TrendResult,
};
use serde::{Deserialize, Serialize};

/// Whether the monthly table feeding the analyses is the raw series or
/// the gap-completed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisMode {
    /// Use the observations as recorded.
    Original,
    /// Run the series completion engine before aggregating.
    Completed,
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisMode::Original => write!(f, "original data"),
            AnalysisMode::Completed => write!(f, "completed series"),
        }
    }
}

/// Counters describing one pipeline run, for report headers and
/// dashboard summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSummary {
    pub selected_stations: usize,
    pub total_stations: usize,
    /// Active year window, inclusive; `None` when no restriction and no
    /// data to infer one from.
    pub year_range: Option<(i32, i32)>,
    pub mode: AnalysisMode,
}

/// Tabular products of one pipeline run, recomputed fresh on every
/// parameter change. Consumers (charts, maps, report generators) read
/// these; nothing mutates them in place.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub stations: StationTable,
    pub monthly: ObservationTable,
    pub annual: Vec<AnnualAggregate>,
    pub summary: SelectionSummary,
}

/// Orchestrates the analysis stages over an immutable dataset snapshot:
/// station filtering, series selection, optional completion, and the
/// completeness-gated annual rollup, plus the on-demand anomaly, trend,
/// and correlation products.
///
/// Every run recomputes from the snapshot; the core keeps no cache and
/// no state between calls, so concurrent callers each work from their
/// own snapshot reference without coordination.
pub struct AnalysisPipeline {
    completer: SeriesCompleter,
    aggregator: AnnualAggregator,
    baseline_calc: BaselineCalculator,
    trend_analyzer: TrendAnalyzer,
    correlation_analyzer: CorrelationAnalyzer,
}

impl AnalysisPipeline {
    pub fn new() -> Self {
        Self {
            completer: SeriesCompleter::new(),
            aggregator: AnnualAggregator::new(),
            baseline_calc: BaselineCalculator::new(),
            trend_analyzer: TrendAnalyzer::new(),
            correlation_analyzer: CorrelationAnalyzer::new(),
        }
    }

    /// Run filtering, selection, optional completion, and aggregation.
    pub fn run(
        &self,
        snapshot: &DatasetSnapshot,
        station_filter: &StationFilter,
        selection: &SeriesSelection,
        mode: AnalysisMode,
    ) -> PipelineOutput {
        self.run_with_progress(snapshot, station_filter, selection, mode, |_| {})
    }

    /// Same as [`AnalysisPipeline::run`], forwarding completion-stage
    /// progress fractions to `progress` when the mode asks for
    /// completed series.
    pub fn run_with_progress<F>(
        &self,
        snapshot: &DatasetSnapshot,
        station_filter: &StationFilter,
        selection: &SeriesSelection,
        mode: AnalysisMode,
        progress: F,
    ) -> PipelineOutput
    where
        F: FnMut(f32),
    {
        log::info!(
            "Pipeline run: mode '{}', {} stations in snapshot",
            mode,
            snapshot.stations.len()
        );

        let filtered_stations = station_filter.apply(&snapshot.stations);

        // The effective station set is the requested list restricted to
        // the stations that survived the metadata filter.
        let effective_stations: Vec<String> = if selection.stations.is_empty() {
            filtered_stations.names()
        } else {
            selection
                .stations
                .iter()
                .filter(|name| filtered_stations.get(name).is_some())
                .cloned()
                .collect()
        };

        // Row-drop toggles apply after completion, so interpolation sees
        // the zeros and gaps it is meant to bridge.
        let window = SeriesSelection {
            stations: effective_stations.clone(),
            year_range: selection.year_range,
            months: selection.months.clone(),
            exclude_missing: false,
            exclude_zeros: false,
        };
        // An empty effective set is a constraint that matched nothing,
        // not "no station constraint": the run yields empty tables.
        let mut monthly = if effective_stations.is_empty() {
            ObservationTable::default()
        } else {
            window.apply(&snapshot.observations)
        };

        if mode == AnalysisMode::Completed {
            monthly = self.completer.complete_with_progress(&monthly, progress);
        }

        if selection.exclude_missing || selection.exclude_zeros {
            let drops = SeriesSelection {
                exclude_missing: selection.exclude_missing,
                exclude_zeros: selection.exclude_zeros,
                ..Default::default()
            };
            monthly = drops.apply(&monthly);
        }

        let annual = self.aggregator.aggregate(&monthly);
        let year_range = selection.year_range.or_else(|| monthly.year_span());

        let summary = SelectionSummary {
            selected_stations: effective_stations.len(),
            total_stations: snapshot.stations.len(),
            year_range,
            mode,
        };
        log::info!(
            "Pipeline run finished: {}/{} stations, {} monthly rows, {} station-years",
            summary.selected_stations,
            summary.total_stations,
            monthly.len(),
            annual.len()
        );

        PipelineOutput {
            stations: filtered_stations,
            monthly,
            annual,
            summary,
        }
    }

    /// Monthly anomalies for a run's window, with baselines always taken
    /// from the snapshot's full observation table so the analysis window
    /// never shapes its own reference.
    pub fn anomalies(&self, snapshot: &DatasetSnapshot, output: &PipelineOutput) -> Vec<Anomaly> {
        let baselines = self.baseline_calc.monthly_baselines(&snapshot.observations);
        self.baseline_calc
            .monthly_anomalies(&output.monthly, &baselines)
    }

    /// Per-station Mann-Kendall / Sen's slope results for a run.
    pub fn trends(&self, output: &PipelineOutput) -> Vec<TrendResult> {
        self.trend_analyzer.analyze(&output.annual)
    }

    /// Station-pair correlation matrix for a run; `None` below two
    /// selected stations.
    pub fn correlation(&self, output: &PipelineOutput) -> Option<CorrelationMatrix> {
        self.correlation_analyzer
            .station_correlations(&output.monthly)
    }
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new()
    }
}
