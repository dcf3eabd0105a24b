use sqlx::PgPool;
use sqlx::Row;
use tracing::info;

use crate::errors::AppError;
use crate::models::Universe;

/// Create the per-universe tables and indexes if they do not exist yet.
///
/// The `UNIQUE(symbol, date)` constraint on each data table is the hard
/// contract the reconciler's idempotent upsert relies on.
pub async fn init_schema(pool: &PgPool) -> Result<(), AppError> {
    for universe in Universe::ALL {
        let info = universe.info_table();
        let data = universe.data_table();

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {info} (
                id SERIAL PRIMARY KEY,
                symbol TEXT UNIQUE NOT NULL,
                name TEXT,
                type TEXT,
                created_at TIMESTAMPTZ DEFAULT NOW()
            )"
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {data} (
                id SERIAL PRIMARY KEY,
                symbol TEXT NOT NULL,
                date DATE NOT NULL,
                open DOUBLE PRECISION,
                high DOUBLE PRECISION,
                low DOUBLE PRECISION,
                close DOUBLE PRECISION,
                adjusted_close DOUBLE PRECISION,
                volume BIGINT,
                created_at TIMESTAMPTZ DEFAULT NOW(),
                UNIQUE(symbol, date)
            )"
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{data}_symbol_date ON {data} (symbol, date)"
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{data}_date ON {data} (date)"
        ))
        .execute(pool)
        .await?;
    }

    info!("Database schema initialized");
    Ok(())
}

/// Aggregate figures for one universe table, logged at the end of a run.
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_records: i64,
    pub unique_symbols: i64,
    pub min_date: Option<chrono::NaiveDate>,
    pub max_date: Option<chrono::NaiveDate>,
}

pub async fn storage_stats(pool: &PgPool, universe: Universe) -> Result<StorageStats, AppError> {
    let table = universe.data_table();

    let row = sqlx::query(&format!(
        "SELECT COUNT(*), COUNT(DISTINCT symbol), MIN(date), MAX(date) FROM {table}"
    ))
    .fetch_one(pool)
    .await?;

    Ok(StorageStats {
        total_records: row.try_get(0)?,
        unique_symbols: row.try_get(1)?,
        min_date: row.try_get(2)?,
        max_date: row.try_get(3)?,
    })
}

pub fn log_stats(universe: Universe, stats: &StorageStats) {
    info!(
        "{}: {} records, {} symbols, date range {:?}..{:?}",
        universe.name(),
        stats.total_records,
        stats.unique_symbols,
        stats.min_date,
        stats.max_date
    );
}
