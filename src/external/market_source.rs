use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::SourceBar;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("symbol not known to the provider")]
    NotFound,
}

impl SourceError {
    /// Transient errors are worth retrying with a fixed delay; the rest
    /// fail the symbol immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Network(_) | SourceError::RateLimited)
    }
}

/// Upstream market-data provider.
///
/// The returned bars double as the trading calendar: a bar for a date is the
/// proof that date was a trading day for that symbol, which is how unscheduled
/// market closures are handled without a static holiday table.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Daily bars for `[start, end_exclusive)`. An empty vec means no trading
    /// occurred in the window (holiday, or the instrument was not listed yet);
    /// it is not an error.
    async fn daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<SourceBar>, SourceError>;
}
