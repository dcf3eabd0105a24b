use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use marketsync::db::{self, PgBarStore};
use marketsync::external::yahoo::YahooSource;
use marketsync::logging::{init_logging, LoggingConfig};
use marketsync::models::Universe;
use marketsync::services::failure_cache::FailureCache;
use marketsync::services::reconciler::{Reconciler, ReconcilerConfig};

enum Mode {
    Update,
    Backfill,
}

struct CliArgs {
    mode: Mode,
    universes: Vec<Universe>,
    end_date: Option<NaiveDate>,
    show: Option<String>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut mode = Mode::Update;
    let mut universes: Vec<Universe> = Vec::new();
    let mut end_date = None;
    let mut show = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "update" => mode = Mode::Update,
            "backfill" | "--backfill" => mode = Mode::Backfill,
            "etf-india" => universes.push(Universe::EtfIndia),
            "stock-india" => universes.push(Universe::StockIndia),
            "etf-us" => universes.push(Universe::EtfUs),
            "index" => universes.push(Universe::Index),
            other if other.starts_with("--end-date=") => {
                let raw = other.trim_start_matches("--end-date=");
                let parsed = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .with_context(|| format!("invalid --end-date '{raw}'"))?;
                end_date = Some(parsed);
            }
            other if other.starts_with("--show=") => {
                show = Some(other.trim_start_matches("--show=").to_string());
            }
            other => bail!(
                "unknown argument '{other}'. Usage: marketsync [update|backfill] \
                 [etf-india|stock-india|etf-us|index ...] [--end-date=YYYY-MM-DD] \
                 [--show=SYMBOL]"
            ),
        }
    }

    if universes.is_empty() {
        universes = Universe::ALL.to_vec();
    }

    Ok(CliArgs {
        mode,
        universes,
        end_date,
        show,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_logging(LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let args = parse_args()?;

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    db::init_schema(&pool).await?;

    // Inspection mode: dump one symbol's stored history as JSON lines.
    if let Some(symbol) = &args.show {
        let universe = match args.universes.as_slice() {
            [u] => *u,
            _ => bail!("--show requires exactly one universe"),
        };
        let store = PgBarStore::new(pool.clone(), universe);
        for bar in store.fetch_all(symbol).await? {
            println!("{}", serde_json::to_string(&bar)?);
        }
        return Ok(());
    }

    let source = Arc::new(
        YahooSource::new().map_err(|e| anyhow::anyhow!("failed to build provider: {e}"))?,
    );
    let failure_cache = Arc::new(FailureCache::new());

    for universe in &args.universes {
        let store = Arc::new(PgBarStore::new(pool.clone(), *universe));
        let reconciler = Reconciler::new(
            *universe,
            source.clone(),
            store,
            failure_cache.clone(),
            ReconcilerConfig::default(),
        );

        let summary = match args.mode {
            Mode::Update => reconciler.run_incremental_update(args.end_date).await,
            Mode::Backfill => reconciler.run_full_backfill(args.end_date).await,
        };

        info!(
            "{}: successful: {}, failed: {}, skipped: {}",
            universe.name(),
            summary.successful,
            summary.failed,
            summary.skipped
        );

        let stats = db::storage_stats(&pool, *universe).await?;
        db::log_stats(*universe, &stats);
    }

    Ok(())
}
