pub mod failure_cache;
pub mod rate_limiter;
pub mod reconciler;
