use std::path::PathBuf;
use std::time::Duration;

use chrono::{Duration as Days, NaiveDate, Utc};

use crate::error::{DashboardError, Result};
use crate::fetcher::BenchmarkFallback;
use crate::portfolio::DEFAULT_BENCHMARK;

const DEFAULT_LOOKBACK_DAYS: i64 = 365;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_CHART_PATH: &str = "performance.svg";
const DEFAULT_SYNTHETIC_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub benchmark: String,
    pub start_date: NaiveDate,
    pub cache_ttl: Duration,
    pub allocation_path: Option<PathBuf>,
    pub overrides_path: Option<PathBuf>,
    pub chart_path: PathBuf,
    // demo only: replace a missing benchmark with a seeded random walk
    pub synthetic_fallback: bool,
    pub synthetic_seed: u64,
}

impl Config {
    /// Reads `DASHBOARD_*` variables, after loading a `.env` file if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let start_date = match lookup("DASHBOARD_START_DATE") {
            Some(raw) => parse_date(&raw)?,
            None => Utc::now().date_naive() - Days::days(DEFAULT_LOOKBACK_DAYS),
        };

        Ok(Self {
            benchmark: lookup("DASHBOARD_BENCHMARK")
                .unwrap_or_else(|| DEFAULT_BENCHMARK.to_string()),
            start_date,
            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "DASHBOARD_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )?),
            allocation_path: lookup("DASHBOARD_ALLOCATION").map(PathBuf::from),
            overrides_path: lookup("DASHBOARD_OVERRIDES").map(PathBuf::from),
            chart_path: lookup("DASHBOARD_CHART")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHART_PATH)),
            synthetic_fallback: parse_or(&lookup, "DASHBOARD_SYNTHETIC_FALLBACK", false)?,
            synthetic_seed: parse_or(&lookup, "DASHBOARD_SYNTHETIC_SEED", DEFAULT_SYNTHETIC_SEED)?,
        })
    }

    pub fn benchmark_fallback(&self) -> BenchmarkFallback {
        if self.synthetic_fallback {
            BenchmarkFallback::Synthetic {
                seed: self.synthetic_seed,
            }
        } else {
            BenchmarkFallback::Fail
        }
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| DashboardError::Config(format!("bad date {:?}: {}", raw, e)))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DashboardError::Config(format!("{} has an invalid value {:?}", key, raw))),
        None => Ok(default),
    }
}
