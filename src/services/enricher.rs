//! Commit-count enrichment with a bounded attempt budget.

use std::sync::Arc;

use rand::Rng;
use tokio::time::{Duration, sleep};
use tracing::{debug, warn};

use crate::github::RepositoryApi;
use crate::services::PipelineMetrics;
use crate::types::{EnrichedRepository, RepositorySummary};

/// Default number of commit-count attempts per repository
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    /// Attempts per repository, including the first one
    pub max_attempts: u32,
    pub commits_per_page: u32,
    /// Bounds of the random pause taken before each retry
    pub retry_min_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            commits_per_page: 100,
            retry_min_delay: Duration::from_millis(10),
            retry_max_delay: Duration::from_millis(50),
        }
    }
}

/// Turns a [`RepositorySummary`] into an [`EnrichedRepository`] or drops it.
///
/// A zero count and a request error both consume one attempt. Running out of attempts
/// is not an error for the caller; the item is simply skipped.
#[derive(Clone)]
pub struct CommitEnricher<A> {
    api: A,
    settings: EnrichmentSettings,
    metrics: Arc<PipelineMetrics>,
}

impl<A: RepositoryApi> CommitEnricher<A> {
    pub fn new(api: A, settings: EnrichmentSettings, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            api,
            settings,
            metrics,
        }
    }

    pub async fn enrich(&self, summary: RepositorySummary) -> Option<EnrichedRepository> {
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.retry_delay();
                debug!(
                    "Retrying commit count for {} (attempt {}/{}) after {:?}",
                    summary.repository_id, attempt, max_attempts, delay
                );
                sleep(delay).await;
            }

            self.metrics.record_enrichment_attempt();

            match self
                .api
                .commit_count(&summary, self.settings.commits_per_page)
                .await
            {
                Ok(count) => {
                    if let Some(enriched) = EnrichedRepository::new(summary.clone(), count) {
                        self.metrics.record_enriched();
                        return Some(enriched);
                    }
                    debug!(
                        "Commit count for {} was zero on attempt {}",
                        summary.repository_id, attempt
                    );
                }
                Err(e) => {
                    debug!(
                        "Commit count for {} failed on attempt {} (retryable: {}): {}",
                        summary.repository_id,
                        attempt,
                        e.is_retryable(),
                        e
                    );
                }
            }
        }

        warn!(
            "Dropping {} after {} commit count attempts",
            summary.repository_id, max_attempts
        );
        self.metrics.record_enrichment_exhausted();
        None
    }

    fn retry_delay(&self) -> Duration {
        let min = self.settings.retry_min_delay.as_millis() as u64;
        let max = self.settings.retry_max_delay.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}
