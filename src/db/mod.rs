pub mod bar_queries;
pub mod schema;

pub use bar_queries::{BarStore, PgBarStore};
pub use schema::{init_schema, log_stats, storage_stats, StorageStats};
