//! Process-wide pipeline counters.
//!
//! Every field is only ever touched with atomic increments, so the struct can be shared
//! freely between request tasks behind an `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    requests_served: AtomicU64,
    pages_fetched: AtomicU64,
    page_failures: AtomicU64,
    enrichment_attempts: AtomicU64,
    repositories_enriched: AtomicU64,
    enrichment_exhausted: AtomicU64,
    channel_failures: AtomicU64,
    suppressed_channel_errors: AtomicU64,
    token_refreshes: AtomicU64,
    token_refresh_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_served: u64,
    pub pages_fetched: u64,
    pub page_failures: u64,
    pub enrichment_attempts: u64,
    pub repositories_enriched: u64,
    pub enrichment_exhausted: u64,
    pub channel_failures: u64,
    pub suppressed_channel_errors: u64,
    pub token_refreshes: u64,
    pub token_refresh_failures: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_failure(&self) {
        self.page_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enrichment_attempt(&self) {
        self.enrichment_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enriched(&self) {
        self.repositories_enriched.fetch_add(1, Ordering::Relaxed);
    }

    /// An item was dropped after spending its whole attempt budget.
    pub fn record_enrichment_exhausted(&self) {
        self.enrichment_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_channel_failure(&self) {
        self.channel_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A channel failure that was not forwarded because an earlier one already was.
    pub fn record_suppressed_channel_error(&self) {
        self.suppressed_channel_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_token_refresh(&self) {
        self.token_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_token_refresh_failure(&self) {
        self.token_refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_served: self.requests_served.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            page_failures: self.page_failures.load(Ordering::Relaxed),
            enrichment_attempts: self.enrichment_attempts.load(Ordering::Relaxed),
            repositories_enriched: self.repositories_enriched.load(Ordering::Relaxed),
            enrichment_exhausted: self.enrichment_exhausted.load(Ordering::Relaxed),
            channel_failures: self.channel_failures.load(Ordering::Relaxed),
            suppressed_channel_errors: self.suppressed_channel_errors.load(Ordering::Relaxed),
            token_refreshes: self.token_refreshes.load(Ordering::Relaxed),
            token_refresh_failures: self.token_refresh_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let metrics = Arc::new(PipelineMetrics::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                tokio::spawn(async move {
                    for _ in 0..250 {
                        metrics.record_enrichment_attempt();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(metrics.snapshot().enrichment_attempts, 2000);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = PipelineMetrics::new();
        metrics.record_request();
        metrics.record_enrichment_exhausted();

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["requests_served"], 1);
        assert_eq!(json["enrichment_exhausted"], 1);
        assert_eq!(json["pages_fetched"], 0);
    }
}
