//! One language's stream of enriched repositories.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::github::{FetchError, RepositoryApi};
use crate::services::{
    CommitEnricher, EnrichmentSettings, PageSource, PaginationSettings, PipelineMetrics,
};
use crate::types::{EnrichedRepository, Language};

/// Default cap on in-flight commit-count lookups per language
pub const DEFAULT_MAX_CONCURRENT_ENRICHMENTS: usize = 16;

/// Fatal failure of a whole language
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFailure {
    pub language: Language,
    pub reason: String,
}

impl ChannelFailure {
    pub fn new(language: Language, reason: impl Into<String>) -> Self {
        Self {
            language,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ChannelFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error encountered : {}", self.language, self.reason)
    }
}

impl From<(Language, FetchError)> for ChannelFailure {
    fn from((language, error): (Language, FetchError)) -> Self {
        Self::new(language, error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Repository(EnrichedRepository),
    Failed(ChannelFailure),
    /// Last event of every channel, sent after all of its enrichment tasks resolved
    Completed(Language),
}

pub struct LanguageChannel<A> {
    api: A,
    language: Language,
    pagination: PaginationSettings,
    enrichment: EnrichmentSettings,
    max_concurrent_enrichments: usize,
    buffer: usize,
    metrics: Arc<PipelineMetrics>,
}

impl<A: RepositoryApi> LanguageChannel<A> {
    pub fn new(
        api: A,
        language: Language,
        pagination: PaginationSettings,
        enrichment: EnrichmentSettings,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            api,
            language,
            pagination,
            enrichment,
            max_concurrent_enrichments: DEFAULT_MAX_CONCURRENT_ENRICHMENTS,
            buffer: 100,
            metrics,
        }
    }

    pub fn with_max_concurrent_enrichments(mut self, max_concurrent_enrichments: usize) -> Self {
        self.max_concurrent_enrichments =
            max_concurrent_enrichments.clamp(1, Semaphore::MAX_PERMITS);
        self
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Drives pagination and enrichment until both are finished, then sends
    /// [`ChannelEvent::Completed`].
    ///
    /// A pagination failure is forwarded as soon as it is seen. Enrichments that were
    /// already spawned still run to completion and their results are still forwarded.
    pub async fn run(self, events: mpsc::Sender<ChannelEvent>, cancel: CancellationToken) {
        let language = self.language.clone();
        let (tx, mut summaries) = mpsc::channel(self.buffer);

        let source = PageSource::new(
            self.api.clone(),
            language.clone(),
            self.pagination.clone(),
            Arc::clone(&self.metrics),
        );
        let source_handle = tokio::spawn(source.run(tx, cancel.clone()));

        let enricher = CommitEnricher::new(
            self.api.clone(),
            self.enrichment.clone(),
            Arc::clone(&self.metrics),
        );
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_enrichments));
        let mut tasks: JoinSet<Option<EnrichedRepository>> = JoinSet::new();
        let mut failure: Option<ChannelFailure> = None;
        let mut spawned = 0usize;

        loop {
            tokio::select! {
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    Self::forward_enrichment(&language, joined, &events).await;
                }
                item = summaries.recv() => match item {
                    Some(Ok(summary)) => {
                        let enricher = enricher.clone();
                        let semaphore = Arc::clone(&semaphore);
                        spawned += 1;
                        tasks.spawn(async move {
                            let _permit = semaphore.acquire_owned().await.ok()?;
                            enricher.enrich(summary).await
                        });
                    }
                    Some(Err(e)) => {
                        let channel_failure = ChannelFailure::from((language.clone(), e));
                        self.report_failure(&channel_failure, &events).await;
                        failure = Some(channel_failure);
                        break;
                    }
                    None => break,
                },
            }
        }

        // Page source has nothing more to say; make sure it has actually returned.
        match source_handle.await {
            Ok(Ok(report)) => {
                debug!(
                    "Pagination for {} finished after {} pages ({:?}), {} repositories",
                    language, report.pages_fetched, report.stopped_by, report.repositories_emitted
                );
            }
            Ok(Err(e)) => {
                if failure.is_none() {
                    let channel_failure = ChannelFailure::from((language.clone(), e));
                    self.report_failure(&channel_failure, &events).await;
                    failure = Some(channel_failure);
                }
            }
            Err(join_error) => {
                if failure.is_none() {
                    let channel_failure = ChannelFailure::new(
                        language.clone(),
                        format!("pagination task failed: {}", join_error),
                    );
                    self.report_failure(&channel_failure, &events).await;
                    failure = Some(channel_failure);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            Self::forward_enrichment(&language, joined, &events).await;
        }

        if failure.is_none() {
            if cancel.is_cancelled() {
                info!("Analysis of {} stopped early after {} repositories", language, spawned);
            } else {
                info!("Successfully analyzed all repos under the language {}", language);
            }
        }

        if events.send(ChannelEvent::Completed(language.clone())).await.is_err() {
            debug!("Merger for {} closed before completion was reported", language);
        }
    }

    async fn report_failure(&self, failure: &ChannelFailure, events: &mpsc::Sender<ChannelEvent>) {
        warn!("{}", failure);
        self.metrics.record_channel_failure();
        if events.send(ChannelEvent::Failed(failure.clone())).await.is_err() {
            debug!("Merger closed before failure of {} was reported", failure.language);
        }
    }

    async fn forward_enrichment(
        language: &Language,
        joined: Result<Option<EnrichedRepository>, tokio::task::JoinError>,
        events: &mpsc::Sender<ChannelEvent>,
    ) {
        match joined {
            Ok(Some(enriched)) => {
                if events.send(ChannelEvent::Repository(enriched)).await.is_err() {
                    debug!("Merger for {} closed, discarding enriched repository", language);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Enrichment task for {} failed: {}", language, e),
        }
    }
}
