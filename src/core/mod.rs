//! Core precipitation analysis stages

pub mod aggregate;
pub mod anomaly;
pub mod complete;
pub mod correlation;
pub mod filter;
pub mod pipeline;
pub mod trend;

// Re-export main types
pub use aggregate::{AnnualAggregator, MIN_MONTHS_PER_YEAR};
pub use anomaly::BaselineCalculator;
pub use complete::SeriesCompleter;
pub use correlation::CorrelationAnalyzer;
pub use filter::{AltitudeBand, SeriesSelection, StationFilter};
pub use pipeline::{AnalysisMode, AnalysisPipeline, PipelineOutput, SelectionSummary};
pub use trend::{TrendAnalyzer, MIN_YEARS_FOR_TREND};
