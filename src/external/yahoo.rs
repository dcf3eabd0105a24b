use crate::external::market_source::{MarketSource, SourceError};
use crate::models::SourceBar;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::time::Duration;

pub struct YahooSource {
    client: reqwest::Client,
}

impl YahooSource {
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self { client })
    }
}

// Minimal response structs (only what we need)
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    #[allow(dead_code)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
    #[serde(default)]
    adjclose: Vec<YahooAdjClose>,
}

#[derive(Debug, Deserialize, Default)]
struct YahooQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct YahooAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn to_epoch(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[async_trait]
impl MarketSource for YahooSource {
    async fn daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<SourceBar>, SourceError> {
        let period1 = to_epoch(start);
        let period2 = to_epoch(end_exclusive);

        let url = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{ticker}\
             ?period1={period1}&period2={period2}&interval=1d&events=div%2Csplit"
        );

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }

        // A symbol with no data in range still returns 200 with an empty
        // result; 404 means the ticker itself is unknown (delisted or bad),
        // which the caller caches so later runs skip it.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound);
        }

        let body = resp
            .json::<YahooChartResponse>()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let result = match body.chart.result.and_then(|mut r| r.pop()) {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };

        if result.timestamp.is_empty() {
            return Ok(Vec::new());
        }

        // timestamp aligns with each indicator list by index
        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::BadResponse("missing quote".into()))?;

        let adjclose = result
            .indicators
            .adjclose
            .into_iter()
            .next()
            .map(|a| a.adjclose)
            .unwrap_or_default();

        let mut out = Vec::with_capacity(result.timestamp.len());

        for (i, ts) in result.timestamp.iter().enumerate() {
            let dt = DateTime::from_timestamp(*ts, 0)
                .ok_or_else(|| SourceError::Parse("bad timestamp".into()))?;
            let date = dt.date_naive();

            let at = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();

            out.push(SourceBar {
                date,
                open: at(&quote.open),
                high: at(&quote.high),
                low: at(&quote.low),
                close: at(&quote.close),
                adjusted_close: adjclose.get(i).copied().flatten(),
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            });
        }

        // Ensure ascending by date; collapse the occasional duplicate
        // timestamp (live bar repeated at session close).
        out.sort_by_key(|b| b.date);
        out.dedup_by_key(|b| b.date);

        Ok(out)
    }
}
