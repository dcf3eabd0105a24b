use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Information about a failed fetch for a symbol
#[derive(Debug, Clone)]
pub struct FailureInfo {
    pub failed_at: DateTime<Utc>,
    pub error_type: FailureType,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureType {
    NotFound,    // Symbol unknown to the provider (delisted or bad ticker)
    RateLimited, // Temporary rate limit
    ApiError,    // Other provider errors
}

/// Thread-safe cache of symbols whose fetch recently failed.
/// Keeps overlapping runs from burning upstream quota on known-bad symbols.
#[derive(Clone, Default)]
pub struct FailureCache {
    cache: Arc<DashMap<String, FailureInfo>>,
}

impl FailureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a symbol has a still-valid recorded failure.
    pub fn is_failed(&self, symbol: &str) -> Option<FailureInfo> {
        if let Some(entry) = self.cache.get(symbol) {
            let info = entry.value().clone();
            let expiry = info.failed_at + Duration::hours(info.ttl_hours);

            if Utc::now() < expiry {
                return Some(info);
            }
            // TTL expired, drop the stale entry
            drop(entry);
            self.cache.remove(symbol);
        }
        None
    }

    pub fn record_failure(&self, symbol: &str, error_type: FailureType) {
        let ttl_hours = match error_type {
            FailureType::NotFound => 24,
            FailureType::RateLimited => 1,
            FailureType::ApiError => 6,
        };

        self.cache.insert(
            symbol.to_string(),
            FailureInfo {
                failed_at: Utc::now(),
                error_type,
                ttl_hours,
            },
        );
    }

    /// Clear a symbol after a successful fetch.
    pub fn clear(&self, symbol: &str) {
        self.cache.remove(symbol);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_records_and_retrieves_failures() {
        let cache = FailureCache::new();

        cache.record_failure("BADTICKER", FailureType::NotFound);

        let result = cache.is_failed("BADTICKER");
        assert!(result.is_some());
        assert_eq!(result.unwrap().error_type, FailureType::NotFound);
    }

    #[test]
    fn test_cache_clears_symbol_after_success() {
        let cache = FailureCache::new();

        cache.record_failure("GOLDBEES", FailureType::ApiError);
        assert!(cache.is_failed("GOLDBEES").is_some());

        cache.clear("GOLDBEES");
        assert!(cache.is_failed("GOLDBEES").is_none());
    }

    #[test]
    fn test_ttl_varies_by_error_type() {
        let cache = FailureCache::new();

        cache.record_failure("GONE", FailureType::NotFound);
        cache.record_failure("THROTTLED", FailureType::RateLimited);

        assert_eq!(cache.is_failed("GONE").unwrap().ttl_hours, 24);
        assert_eq!(cache.is_failed("THROTTLED").unwrap().ttl_hours, 1);
    }
}
