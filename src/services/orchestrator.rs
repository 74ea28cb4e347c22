//! Per-request wiring of token, channels, merger and accumulator.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::formatter::timeout_notice;
use crate::github::{CredentialRefreshError, FetchError, RepositoryApiProvider, TokenExchange};
use crate::services::{
    DEFAULT_MAX_CONCURRENT_ENRICHMENTS, EnrichmentSettings, LanguageChannel, PaginationSettings,
    PipelineMetrics, PipelineResult, ResponseAccumulator, TokenManager, fan_in,
};
use crate::types::LanguageQuery;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub pagination: PaginationSettings,
    pub enrichment: EnrichmentSettings,
    pub max_concurrent_enrichments: usize,
    /// Capacity of every bounded queue in the pipeline
    pub channel_buffer: usize,
    /// `None` waits for completion however long it takes
    pub request_timeout: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            pagination: PaginationSettings::default(),
            enrichment: EnrichmentSettings::default(),
            max_concurrent_enrichments: DEFAULT_MAX_CONCURRENT_ENRICHMENTS,
            channel_buffer: 100,
            request_timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// Reasons a request produces no pipeline run at all
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    NoLanguages,
    CredentialRefreshFailed(CredentialRefreshError),
    ClientSetup(FetchError),
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoLanguages => write!(f, "No language filter in request"),
            Self::CredentialRefreshFailed(e) => write!(f, "{}", e),
            Self::ClientSetup(e) => write!(f, "Failed to set up GitHub client: {}", e),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<CredentialRefreshError> for OrchestratorError {
    fn from(e: CredentialRefreshError) -> Self {
        Self::CredentialRefreshFailed(e)
    }
}

/// Process-wide request context: API provider, token cache, settings and counters.
pub struct Orchestrator<P, X> {
    provider: P,
    tokens: Arc<TokenManager<X>>,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

impl<P: RepositoryApiProvider, X: TokenExchange> Orchestrator<P, X> {
    pub fn new(
        provider: P,
        tokens: Arc<TokenManager<X>>,
        settings: PipelineSettings,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            provider,
            tokens,
            settings,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Runs the whole pipeline for `query` and returns the response body.
    ///
    /// Channel failures end up inside the body; only a missing language, a failed
    /// credential refresh or a client that cannot be built are returned as errors.
    pub async fn run(&self, query: LanguageQuery) -> Result<PipelineResult, OrchestratorError> {
        if query.is_empty() {
            return Err(OrchestratorError::NoLanguages);
        }
        self.metrics.record_request();

        // One deadline covers the credential step and the pipeline run.
        let deadline = self
            .settings
            .request_timeout
            .map(|timeout| Instant::now() + timeout);

        let credential = match deadline {
            Some(deadline) => timeout_at(deadline, self.tokens.get_valid_token())
                .await
                .map_err(|_| {
                    warn!("Timed out waiting for an access credential");
                    CredentialRefreshError::new(format!(
                        "timed out after {:?} waiting for an access token",
                        self.settings.request_timeout.unwrap_or_default()
                    ))
                })??,
            None => self.tokens.get_valid_token().await?,
        };
        let api = self
            .provider
            .connect(&credential)
            .map_err(OrchestratorError::ClientSetup)?;

        let languages = query.into_languages();
        info!(
            "Analyzing {} language(s): {}",
            languages.len(),
            languages
                .iter()
                .map(|language| language.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let cancel = CancellationToken::new();
        let (events, mut merger) = fan_in(
            languages.len(),
            self.settings.channel_buffer,
            Arc::clone(&self.metrics),
        );

        let channel_handles: Vec<_> = languages
            .into_iter()
            .map(|language| {
                let channel = LanguageChannel::new(
                    api.clone(),
                    language,
                    self.settings.pagination.clone(),
                    self.settings.enrichment.clone(),
                    Arc::clone(&self.metrics),
                )
                .with_max_concurrent_enrichments(self.settings.max_concurrent_enrichments)
                .with_buffer(self.settings.channel_buffer);
                tokio::spawn(channel.run(events.clone(), cancel.clone()))
            })
            .collect();
        // Channels hold the only senders from here on.
        drop(events);

        let mut accumulator = ResponseAccumulator::new();
        let mut done = accumulator.done_signal();
        let driver = tokio::spawn(async move {
            while let Some(event) = merger.next().await {
                accumulator.apply(event);
            }
            accumulator.complete()
        });

        let finished = match deadline {
            Some(deadline) => timeout_at(deadline, done.wait()).await.is_ok(),
            None => {
                done.wait().await;
                true
            }
        };

        if !finished {
            let timeout = self.settings.request_timeout.unwrap_or_default();
            warn!("Request timed out after {:?}, returning partial result", timeout);
            cancel.cancel();

            // Channels and driver keep draining in the background.
            tokio::spawn(async move {
                join_all(channel_handles).await;
                let _ = driver.await;
                debug!("Timed out request finished draining");
            });

            let mut partial = done.snapshot();
            partial.body.push_str(&timeout_notice(timeout));
            partial.timed_out = true;
            return Ok(partial);
        }

        cancel.cancel();
        for joined in join_all(channel_handles).await {
            if let Err(e) = joined {
                warn!("Language channel task failed: {}", e);
            }
        }

        match driver.await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("Response accumulator task failed: {}", e);
                Ok(done.snapshot())
            }
        }
    }
}
