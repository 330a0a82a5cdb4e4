//! Compares a fixed-weight portfolio with a benchmark index over daily closes.

pub mod cache;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetcher;
pub mod overrides;
pub mod portfolio;
pub mod provider;
pub mod report;
pub mod synthetic;
pub mod types;

pub use dashboard::{build, Dashboard};
pub use error::{DashboardError, FetchFailure};
pub use fetcher::{BenchmarkFallback, PriceBatch, PriceFetcher};
pub use types::{Allocation, BenchmarkIndex, BenchmarkSource, CumulativeIndex, PriceSeries};
