use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// One persisted OHLCV observation for a (symbol, date) pair.
// The UNIQUE(symbol, date) constraint in storage is the idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adjusted_close: Option<f64>,
    pub volume: i64,
    pub created_at: DateTime<Utc>, // set once, server-side
}

/// One upstream observation as returned by the market-data source,
/// before validation. Prices are optional because the provider can
/// return gaps in individual indicator arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adjusted_close: Option<f64>,
    pub volume: i64,
}

impl SourceBar {
    /// All four of open/high/low/close present.
    pub fn has_full_ohlc(&self) -> bool {
        self.open.is_some() && self.high.is_some() && self.low.is_some() && self.close.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // The --show inspection path emits bars as JSON lines; field names
    // must stay aligned with the storage columns.
    #[test]
    fn test_daily_bar_serializes_with_storage_column_names() {
        let bar = DailyBar {
            symbol: "SPY".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: Some(470.0),
            high: Some(472.0),
            low: Some(469.0),
            close: Some(471.5),
            adjusted_close: Some(471.5),
            volume: 10_000,
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap(),
        };

        let json = serde_json::to_value(&bar).unwrap();
        assert_eq!(json["symbol"], "SPY");
        assert_eq!(json["date"], "2024-01-02");
        assert_eq!(json["adjusted_close"], 471.5);
        assert_eq!(json["volume"], 10_000);
    }
}
