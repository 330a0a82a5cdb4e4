use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use time::OffsetDateTime;
use tracing::debug;
use yahoo_finance_api::{YahooConnector, YahooError};

use crate::error::FetchFailure;
use crate::types::DailyBar;

/// Source of daily price history for one identifier, from `start` up to now.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn daily_bars(
        &self,
        identifier: &str,
        start: NaiveDate,
    ) -> Result<Vec<DailyBar>, FetchFailure>;
}

pub struct YahooProvider {
    client: YahooConnector,
}

impl std::fmt::Debug for YahooProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "YahooProvider {{ }}")
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooProvider {
    pub fn new() -> Self {
        Self {
            client: YahooConnector::new(),
        }
    }
}

#[async_trait]
impl QuoteProvider for YahooProvider {
    async fn daily_bars(
        &self,
        identifier: &str,
        start: NaiveDate,
    ) -> Result<Vec<DailyBar>, FetchFailure> {
        let start = to_offset_date_time(start)?;
        let end = OffsetDateTime::now_utc();
        debug!("requesting {} history from {}", identifier, start.date());

        let res = self
            .client
            .get_quote_history(identifier, start, end)
            .await
            .map_err(|e| FetchFailure::Request(e.to_string()))?;
        let quotes = match res.quotes() {
            Ok(quotes) => quotes,
            Err(YahooError::EmptyDataSet) => return Err(FetchFailure::Empty),
            Err(e) => return Err(FetchFailure::Malformed(e.to_string())),
        };

        let mut bars = Vec::with_capacity(quotes.len());
        for quote in quotes {
            let date = i64::try_from(quote.timestamp)
                .ok()
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    FetchFailure::Malformed(format!("bad timestamp {}", quote.timestamp))
                })?;
            bars.push(DailyBar {
                date,
                close: Some(quote.close),
                adjclose: Some(quote.adjclose),
            });
        }
        Ok(bars)
    }
}

fn to_offset_date_time(date: NaiveDate) -> Result<OffsetDateTime, FetchFailure> {
    let ts = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    OffsetDateTime::from_unix_timestamp(ts).map_err(|e| FetchFailure::Request(e.to_string()))
}
