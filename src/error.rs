use thiserror::Error;

/// Why a single identifier was left out of a price batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchFailure {
    #[error("request failed: {0}")]
    Request(String),
    #[error("provider returned no usable prices")]
    Empty,
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("no price data could be retrieved for any instrument")]
    NoDataAvailable,

    #[error("none of the allocated instruments have price data")]
    NoValidHoldings,

    #[error("benchmark {identifier} is unavailable: {reason}")]
    BenchmarkUnavailable {
        identifier: String,
        reason: FetchFailure,
    },

    #[error("invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("override file, row {row}: {message}")]
    OverrideFile { row: usize, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
