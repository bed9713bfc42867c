//! Dataset boundary adapters: CSV ingestion, remote retrieval, and
//! optional DEM elevation enrichment.

pub mod elevation;
pub mod fetch;
pub mod loader;

pub use elevation::{enrich_stations, DemGrid};
pub use fetch::{DatasetSource, RemoteFetcher};
pub use loader::DatasetLoader;
