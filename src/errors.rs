use thiserror::Error;

/// Service-level error at the storage seam. Validation problems are
/// reported through the reconciler's own outcome type, not here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}
