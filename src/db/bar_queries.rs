use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::BTreeSet;
use tracing::{error, warn};

use crate::errors::AppError;
use crate::models::{ConflictPolicy, DailyBar, SourceBar, Universe};

/// Storage seam the reconciler works against.
///
/// The `UNIQUE(symbol, date)` constraint behind `upsert_batch` is the
/// correctness backstop against duplicate writes from overlapping runs.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Dates in `[start, end]` that already hold a bar for `symbol`.
    async fn existing_dates(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>, AppError>;

    /// Most recent persisted date for `symbol`, if any.
    async fn max_date(&self, symbol: &str) -> Result<Option<NaiveDate>, AppError>;

    /// Atomically upsert a batch of bars for `symbol` and return the number
    /// of `(symbol, date)` keys verified present afterwards. Either the whole
    /// batch commits or none of it does.
    async fn upsert_batch(
        &self,
        symbol: &str,
        bars: &[SourceBar],
        policy: ConflictPolicy,
    ) -> Result<usize, AppError>;

    /// Register or refresh the symbol's metadata row.
    async fn upsert_symbol_info(&self, symbol: &str) -> Result<(), AppError>;
}

/// Postgres-backed store, one instance per universe table.
#[derive(Clone)]
pub struct PgBarStore {
    pool: PgPool,
    universe: Universe,
}

impl PgBarStore {
    pub fn new(pool: PgPool, universe: Universe) -> Self {
        Self { pool, universe }
    }

    pub fn universe(&self) -> Universe {
        self.universe
    }

    async fn insert_bars(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        symbol: &str,
        bars: &[SourceBar],
        policy: ConflictPolicy,
    ) -> Result<(), sqlx::Error> {
        let table = self.universe.data_table();

        let conflict_clause = match policy {
            ConflictPolicy::DoNothing => "DO NOTHING",
            // The latest bar can be revised upstream until market close.
            ConflictPolicy::UpdateLatest => {
                "DO UPDATE SET \
                 close = EXCLUDED.close, \
                 adjusted_close = EXCLUDED.adjusted_close, \
                 volume = EXCLUDED.volume"
            }
        };

        let sql = format!(
            "INSERT INTO {table} \
             (symbol, date, open, high, low, close, adjusted_close, volume) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (symbol, date) {conflict_clause}"
        );

        for bar in bars {
            sqlx::query(&sql)
                .bind(symbol)
                .bind(bar.date)
                .bind(bar.open)
                .bind(bar.high)
                .bind(bar.low)
                .bind(bar.close)
                .bind(bar.adjusted_close)
                .bind(bar.volume)
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }

    async fn count_for_dates(
        &self,
        symbol: &str,
        dates: &[NaiveDate],
    ) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE symbol = $1 AND date = ANY($2)",
            self.universe.data_table()
        );

        let row = sqlx::query(&sql)
            .bind(symbol)
            .bind(dates)
            .fetch_one(&self.pool)
            .await?;

        row.try_get::<i64, _>(0)
    }

    /// Dates from `dates` that are absent from storage, used to report
    /// silent partial-insert failures after a batch commit.
    async fn missing_after_save(
        &self,
        symbol: &str,
        dates: &[NaiveDate],
    ) -> Result<Vec<NaiveDate>, sqlx::Error> {
        let sql = format!(
            "SELECT date FROM {} WHERE symbol = $1 AND date = ANY($2)",
            self.universe.data_table()
        );

        let rows = sqlx::query(&sql)
            .bind(symbol)
            .bind(dates)
            .fetch_all(&self.pool)
            .await?;

        let mut saved = BTreeSet::new();
        for row in rows {
            saved.insert(row.try_get::<NaiveDate, _>(0)?);
        }

        Ok(dates.iter().copied().filter(|d| !saved.contains(d)).collect())
    }

    /// Full history for one symbol, oldest first.
    pub async fn fetch_all(&self, symbol: &str) -> Result<Vec<DailyBar>, AppError> {
        let sql = format!(
            "SELECT symbol, date, open, high, low, close, adjusted_close, volume, created_at \
             FROM {} WHERE symbol = $1 ORDER BY date ASC",
            self.universe.data_table()
        );

        sqlx::query_as::<_, DailyBar>(&sql)
            .bind(symbol)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Db)
    }
}

#[async_trait]
impl BarStore for PgBarStore {
    async fn existing_dates(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>, AppError> {
        let sql = format!(
            "SELECT DISTINCT date FROM {} \
             WHERE symbol = $1 AND date >= $2 AND date <= $3 \
             ORDER BY date",
            self.universe.data_table()
        );

        let rows = sqlx::query(&sql)
            .bind(symbol)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Db)?;

        let mut dates = BTreeSet::new();
        for row in rows {
            dates.insert(row.try_get::<NaiveDate, _>(0).map_err(AppError::Db)?);
        }

        Ok(dates)
    }

    async fn max_date(&self, symbol: &str) -> Result<Option<NaiveDate>, AppError> {
        let sql = format!(
            "SELECT MAX(date) FROM {} WHERE symbol = $1",
            self.universe.data_table()
        );

        let row = sqlx::query(&sql)
            .bind(symbol)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Db)?;

        row.try_get::<Option<NaiveDate>, _>(0).map_err(AppError::Db)
    }

    async fn upsert_batch(
        &self,
        symbol: &str,
        bars: &[SourceBar],
        policy: ConflictPolicy,
    ) -> Result<usize, AppError> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin transaction for {}: {}", symbol, e);
            AppError::Db(e)
        })?;

        self.insert_bars(&mut tx, symbol, bars, policy)
            .await
            .map_err(|e| {
                error!("Failed to upsert bars for {}: {}", symbol, e);
                AppError::Db(e)
            })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit batch for {}: {}", symbol, e);
            AppError::Db(e)
        })?;

        // rows_affected undercounts under ON CONFLICT DO NOTHING, so the
        // persisted count comes from re-querying the written keys.
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        let verified = self
            .count_for_dates(symbol, &dates)
            .await
            .map_err(AppError::Db)?;

        if (verified as usize) < bars.len() {
            let missing = self
                .missing_after_save(symbol, &dates)
                .await
                .map_err(AppError::Db)?;
            warn!(
                "{}: only {} of {} bars present after save, missing dates: {:?}",
                symbol,
                verified,
                bars.len(),
                missing
            );
        }

        Ok(verified as usize)
    }

    async fn upsert_symbol_info(&self, symbol: &str) -> Result<(), AppError> {
        let sql = format!(
            "INSERT INTO {} (symbol, name, type) VALUES ($1, $2, $3) \
             ON CONFLICT (symbol) DO UPDATE SET \
             name = EXCLUDED.name, type = EXCLUDED.type",
            self.universe.info_table()
        );

        sqlx::query(&sql)
            .bind(symbol)
            .bind(symbol)
            .bind(self.universe.instrument_type())
            .execute(&self.pool)
            .await
            .map_err(AppError::Db)?;

        Ok(())
    }
}
