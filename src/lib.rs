//! Pluvia: A Fast, Modular Precipitation Time-Series Analysis Engine
//!
//! This library turns multi-station monthly precipitation records of
//! uneven length and quality into analysis-ready tables: gap-completed
//! series, completeness-gated annual totals, baseline-relative monthly
//! anomalies, and non-parametric (Mann-Kendall / Sen's slope) trend
//! statistics, plus station-pair correlation matrices.
//!
//! The pipeline operates on an immutable [`DatasetSnapshot`] produced by
//! one dataset load; every derived table is recomputed fresh from it on
//! each parameter change, so visualization and report layers can consume
//! the outputs without coordination.

pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    Anomaly, AnnualAggregate, Baseline, ClimateIndexRecord, CorrelationMatrix, DatasetSnapshot,
    Observation, ObservationTable, Origin, PluviaError, PluviaResult, Station, StationTable,
    TrendDirection, TrendResult,
};

pub use crate::core::{
    AltitudeBand, AnalysisMode, AnalysisPipeline, AnnualAggregator, BaselineCalculator,
    CorrelationAnalyzer, PipelineOutput, SelectionSummary, SeriesCompleter, SeriesSelection,
    StationFilter, TrendAnalyzer,
};

pub use io::{DatasetLoader, DatasetSource, DemGrid, RemoteFetcher};
