use chrono::{Duration as ChronoDuration, FixedOffset, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::db::BarStore;
use crate::errors::AppError;
use crate::external::market_source::{MarketSource, SourceError};
use crate::models::{ConflictPolicy, SourceBar, Universe};
use crate::services::failure_cache::{FailureCache, FailureType};
use crate::services::rate_limiter::RateLimiter;

/// Tuning knobs for one reconciler instance. The defaults match the
/// production politeness budget; tests zero the delays.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Minimum gap between consecutive provider calls.
    pub request_gap: Duration,
    /// Cap on in-flight provider calls.
    pub max_concurrent_requests: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            request_gap: Duration::from_millis(1500),
            max_concurrent_requests: 1,
        }
    }
}

impl ReconcilerConfig {
    /// Zero-delay variant for tests and dry runs.
    pub fn fast() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::ZERO,
            request_gap: Duration::ZERO,
            max_concurrent_requests: 1,
        }
    }
}

/// Why one symbol's fetch did not persist anything.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("symbol not known to the provider")]
    UnknownSymbol,
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("storage error: {0}")]
    Storage(#[from] AppError),
}

/// Outcome of `fetch_and_persist` for one symbol.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Bars verified present in storage after the batch commit.
    Success(usize),
    /// The provider had nothing for the window (holiday, not listed yet).
    NoData,
    Failed(FetchFailure),
}

/// Per-run counters, reported once per universe.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum RunMode {
    /// Window starts at the symbol's cursor (last persisted date + 1).
    Incremental,
    /// Window starts at the universe's historical floor.
    Backfill,
}

/// Incremental-fetch reconciler for one symbol universe.
///
/// Determines, per symbol, which trading dates are missing from storage,
/// fetches only those from the provider, and persists them idempotently.
/// The trading calendar is whatever the provider returns for the window;
/// there is no static holiday table, so unscheduled closures come out right
/// by construction.
pub struct Reconciler {
    universe: Universe,
    source: Arc<dyn MarketSource>,
    store: Arc<dyn BarStore>,
    config: ReconcilerConfig,
    rate_limiter: RateLimiter,
    failure_cache: Arc<FailureCache>,
}

impl Reconciler {
    pub fn new(
        universe: Universe,
        source: Arc<dyn MarketSource>,
        store: Arc<dyn BarStore>,
        failure_cache: Arc<FailureCache>,
        config: ReconcilerConfig,
    ) -> Self {
        let rate_limiter =
            RateLimiter::new(config.max_concurrent_requests, config.request_gap);
        Self {
            universe,
            source,
            store,
            config,
            rate_limiter,
            failure_cache,
        }
    }

    pub fn universe(&self) -> Universe {
        self.universe
    }

    /// "Today" in the universe's market timezone. NSE universes close their
    /// window on the IST calendar day; US ETFs use UTC.
    fn default_end_date(&self) -> NaiveDate {
        match self.universe {
            Universe::EtfUs => Utc::now().date_naive(),
            _ => {
                let ist = FixedOffset::east_opt(5 * 3600 + 1800)
                    .expect("valid IST offset");
                Utc::now().with_timezone(&ist).date_naive()
            }
        }
    }

    /// Lower bound of the next fetch window: the day after the last
    /// persisted bar, or the universe floor when the symbol has no data.
    ///
    /// Derived from MAX(date) on every call rather than a stored cursor, so
    /// it can never drift from what is actually persisted.
    pub async fn resolve_start(&self, symbol: &str) -> Result<NaiveDate, AppError> {
        match self.store.max_date(symbol).await? {
            Some(last) => Ok(last + ChronoDuration::days(1)),
            None => Ok(self.universe.floor_date()),
        }
    }

    /// Trading dates in `[start, end]` the provider has bars for but storage
    /// does not, ascending. Empty when `start > end` (nothing to do, not an
    /// error). Idempotent: repeated calls without intervening writes return
    /// the same answer, and the answer only shrinks as storage fills.
    pub async fn compute_missing_dates(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, FetchFailure> {
        if start > end {
            return Ok(Vec::new());
        }

        let existing = self.store.existing_dates(symbol, start, end).await?;

        let ticker = self.universe.provider_symbol(symbol);
        let bars = self.fetch_with_retry(symbol, &ticker, start, end).await?;
        let traded: BTreeSet<NaiveDate> = bars.iter().map(|b| b.date).collect();

        Ok(traded.difference(&existing).copied().collect())
    }

    /// Download the window, validate, filter to exactly `missing`, and
    /// upsert as one atomic batch under `policy`.
    pub async fn fetch_and_persist(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        missing: &[NaiveDate],
        policy: ConflictPolicy,
    ) -> FetchOutcome {
        let ticker = self.universe.provider_symbol(symbol);

        let bars = match self.fetch_with_retry(symbol, &ticker, start, end).await {
            Ok(bars) => bars,
            Err(failure) => return FetchOutcome::Failed(failure),
        };

        if bars.is_empty() {
            return FetchOutcome::NoData;
        }

        let bars = match validate_batch(symbol, bars) {
            Ok(bars) => bars,
            Err(reason) => {
                return FetchOutcome::Failed(FetchFailure::ValidationFailed(reason))
            }
        };

        // The provider can return a superset around the window bounds
        // (inclusive/exclusive mismatch, timezone spill). Keep exactly the
        // dates the diff asked for; the date comparison is typed, never a
        // formatted-string comparison.
        let wanted: BTreeSet<NaiveDate> = missing.iter().copied().collect();
        let filtered: Vec<SourceBar> =
            bars.into_iter().filter(|b| wanted.contains(&b.date)).collect();

        if filtered.is_empty() {
            debug!("{}: downloaded rows covered no missing dates", symbol);
            return FetchOutcome::NoData;
        }

        if let Err(e) = self.store.upsert_symbol_info(symbol).await {
            return FetchOutcome::Failed(FetchFailure::Storage(e));
        }

        match self.store.upsert_batch(symbol, &filtered, policy).await {
            Ok(count) => FetchOutcome::Success(count),
            Err(e) => FetchOutcome::Failed(FetchFailure::Storage(e)),
        }
    }

    /// Bring every symbol in the universe up to `end_date` (default: today
    /// in the market's timezone), fetching only missing trading days.
    pub async fn run_incremental_update(&self, end_date: Option<NaiveDate>) -> RunSummary {
        self.run(end_date, RunMode::Incremental).await
    }

    /// One-shot seed from the universe's historical floor. Safe to re-run:
    /// existing bars are left untouched.
    pub async fn run_full_backfill(&self, end_date: Option<NaiveDate>) -> RunSummary {
        self.run(end_date, RunMode::Backfill).await
    }

    async fn run(&self, end_date: Option<NaiveDate>, mode: RunMode) -> RunSummary {
        let end = end_date.unwrap_or_else(|| self.default_end_date());
        let symbols = self.universe.symbols();
        let total = symbols.len();

        info!(
            "{}: processing {} symbols up to {}",
            self.universe.name(),
            total,
            end
        );

        let mut summary = RunSummary::default();

        for (i, symbol) in symbols.iter().enumerate() {
            debug!("Progress: {}/{} - {}", i + 1, total, symbol);

            if let Some(failure) = self.failure_cache.is_failed(symbol) {
                info!(
                    "{}: skipping, recent {:?} failure cached until TTL expires",
                    symbol, failure.error_type
                );
                summary.skipped += 1;
                continue;
            }

            let (start, policy) = match mode {
                RunMode::Incremental => match self.resolve_start(symbol).await {
                    Ok(start) => (start, self.universe.incremental_policy()),
                    Err(e) => {
                        error!("{}: failed to resolve fetch window: {}", symbol, e);
                        summary.failed += 1;
                        continue;
                    }
                },
                RunMode::Backfill => {
                    (self.universe.floor_date(), ConflictPolicy::DoNothing)
                }
            };

            if start > end {
                debug!("{}: start {} is past end {}, up to date", symbol, start, end);
                summary.skipped += 1;
                continue;
            }

            let missing = match self.compute_missing_dates(symbol, start, end).await {
                Ok(missing) => missing,
                Err(failure) => {
                    error!("{}: could not compute missing dates: {}", symbol, failure);
                    self.note_failure(symbol, &failure);
                    summary.failed += 1;
                    continue;
                }
            };

            if missing.is_empty() {
                debug!("{}: all trading days already in storage", symbol);
                summary.skipped += 1;
                continue;
            }

            info!(
                "{}: {} missing trading days between {} and {}",
                symbol,
                missing.len(),
                start,
                end
            );

            match self
                .fetch_and_persist(symbol, start, end, &missing, policy)
                .await
            {
                FetchOutcome::Success(count) => {
                    info!("{}: persisted {} bars", symbol, count);
                    self.failure_cache.clear(symbol);
                    summary.successful += 1;
                }
                FetchOutcome::NoData => {
                    info!("{}: no data for the requested window", symbol);
                    summary.skipped += 1;
                }
                FetchOutcome::Failed(failure) => {
                    error!("{}: {}", symbol, failure);
                    self.note_failure(symbol, &failure);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "{}: run complete. successful: {}, failed: {}, skipped: {}",
            self.universe.name(),
            summary.successful,
            summary.failed,
            summary.skipped
        );

        summary
    }

    /// One provider call per attempt, transient errors retried with a fixed
    /// pause. No partial-attempt state carries over; end bound is made
    /// exclusive here so callers think in inclusive windows.
    async fn fetch_with_retry(
        &self,
        symbol: &str,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SourceBar>, FetchFailure> {
        let end_exclusive = end + ChronoDuration::days(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = {
                let _permit = self.rate_limiter.acquire().await;
                self.source.daily_history(ticker, start, end_exclusive).await
            };

            match result {
                Ok(bars) => return Ok(bars),
                Err(SourceError::NotFound) => return Err(FetchFailure::UnknownSymbol),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        symbol, attempt, self.config.max_retries, e, self.config.retry_delay
                    );
                    sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(FetchFailure::SourceUnavailable(e.to_string())),
            }
        }
    }

    fn note_failure(&self, symbol: &str, failure: &FetchFailure) {
        let error_type = match failure {
            FetchFailure::UnknownSymbol => FailureType::NotFound,
            FetchFailure::SourceUnavailable(_) => FailureType::ApiError,
            FetchFailure::ValidationFailed(_) => FailureType::ApiError,
            // Storage trouble is on our side; the symbol is fine and the
            // next run recomputes the same missing dates.
            FetchFailure::Storage(_) => return,
        };
        self.failure_cache.record_failure(symbol, error_type);
    }
}

/// Batch validation before persisting.
///
/// Any negative price or volume rejects the whole batch (partial persistence
/// of a batch the caller could not fully vet is worse than retrying later).
/// Rows missing any of open/high/low/close are dropped individually. Zero
/// prices are suspicious but legal for thinly-traded instruments.
fn validate_batch(symbol: &str, bars: Vec<SourceBar>) -> Result<Vec<SourceBar>, String> {
    let mut kept = Vec::with_capacity(bars.len());
    let mut dropped_incomplete = 0usize;

    for bar in bars {
        for (name, value) in [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
            ("adjusted_close", bar.adjusted_close),
        ] {
            if let Some(v) = value {
                if v < 0.0 {
                    return Err(format!(
                        "negative {} price {} on {}",
                        name, v, bar.date
                    ));
                }
                if v == 0.0 {
                    warn!("{}: zero {} price on {}", symbol, name, bar.date);
                }
            }
        }

        if bar.volume < 0 {
            return Err(format!("negative volume {} on {}", bar.volume, bar.date));
        }

        if !bar.has_full_ohlc() {
            dropped_incomplete += 1;
            continue;
        }

        kept.push(bar);
    }

    if dropped_incomplete > 0 {
        warn!(
            "{}: dropped {} rows missing one of open/high/low/close",
            symbol, dropped_incomplete
        );
    }

    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, close: f64) -> SourceBar {
        SourceBar {
            date: date.parse().unwrap(),
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close: Some(close),
            adjusted_close: Some(close),
            volume: 1000,
        }
    }

    #[test]
    fn test_negative_close_rejects_whole_batch() {
        let mut bars: Vec<SourceBar> = (1..=19)
            .map(|d| bar(&format!("2024-01-{:02}", d), 100.0))
            .collect();
        let mut bad = bar("2024-01-20", 100.0);
        bad.close = Some(-5.0);
        bars.push(bad);

        assert!(validate_batch("ABC", bars).is_err());
    }

    #[test]
    fn test_negative_volume_rejects_whole_batch() {
        let mut b = bar("2024-01-02", 100.0);
        b.volume = -1;
        assert!(validate_batch("ABC", vec![b]).is_err());
    }

    #[test]
    fn test_zero_price_is_kept() {
        let mut b = bar("2024-01-02", 0.0);
        b.volume = 0;
        let kept = validate_batch("LIQUIDBEES", vec![b]).unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_row_missing_ohlc_field_is_dropped_not_fatal() {
        let good = bar("2024-01-02", 100.0);
        let mut incomplete = bar("2024-01-03", 100.0);
        incomplete.high = None;

        let kept = validate_batch("ABC", vec![good.clone(), incomplete]).unwrap();
        assert_eq!(kept, vec![good]);
    }

    #[test]
    fn test_empty_batch_validates() {
        assert_eq!(validate_batch("ABC", Vec::new()).unwrap(), Vec::new());
    }
}
