//! Paged repository search for one language.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::github::{FetchError, RepositoryApi};
use crate::services::PipelineMetrics;
use crate::types::{Language, RepositorySummary};

/// Default number of search pages fetched per language
pub const DEFAULT_PAGE_LIMIT: u32 = 2;

/// Largest page size the search endpoint accepts
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub page_limit: u32,
    pub per_page: u32,
    /// Also stop once `page * per_page` reaches the reported total count
    pub stop_at_total_count: bool,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            per_page: MAX_PER_PAGE,
            stop_at_total_count: false,
        }
    }
}

/// How a [`PageSource`] run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStop {
    PageLimit,
    ShortPage,
    TotalCount,
    Cancelled,
    ReceiverClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationReport {
    pub pages_fetched: u32,
    pub repositories_emitted: u64,
    pub total_count: Option<u64>,
    pub stopped_by: PaginationStop,
}

/// Emits every repository of one language across sequentially fetched pages.
///
/// Page `n + 1` is requested only after page `n` has arrived and all of its items have
/// been handed to the consumer, so output order is page order then item order.
pub struct PageSource<A> {
    api: A,
    language: Language,
    settings: PaginationSettings,
    metrics: Arc<PipelineMetrics>,
}

impl<A: RepositoryApi> PageSource<A> {
    pub fn new(
        api: A,
        language: Language,
        settings: PaginationSettings,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            api,
            language,
            settings,
            metrics,
        }
    }

    /// Streams repositories into `tx` until a stop rule fires.
    ///
    /// A page failure is sent as the final `Err` item and also returned; nothing is
    /// emitted after it.
    pub async fn run(
        self,
        tx: mpsc::Sender<Result<RepositorySummary, FetchError>>,
        cancel: CancellationToken,
    ) -> Result<PaginationReport, FetchError> {
        let per_page = self.settings.per_page.clamp(1, MAX_PER_PAGE);
        let mut report = PaginationReport {
            pages_fetched: 0,
            repositories_emitted: 0,
            total_count: None,
            stopped_by: PaginationStop::PageLimit,
        };

        info!("Fetching repositories with language {}", self.language);

        for page in 1..=self.settings.page_limit {
            if cancel.is_cancelled() {
                debug!("Pagination for {} cancelled before page {}", self.language, page);
                report.stopped_by = PaginationStop::Cancelled;
                return Ok(report);
            }

            let search = tokio::select! {
                _ = cancel.cancelled() => {
                    report.stopped_by = PaginationStop::Cancelled;
                    return Ok(report);
                }
                result = self.api.search_repositories(&self.language, page, per_page) => result,
            };

            let search_page = match search {
                Ok(search_page) => search_page,
                Err(e) => {
                    self.metrics.record_page_failure();
                    warn!(
                        "Search page {} for {} failed: {}",
                        page, self.language, e
                    );
                    // The consumer may already be gone; the error is returned either way.
                    let _ = tx.send(Err(e.clone())).await;
                    return Err(e);
                }
            };

            self.metrics.record_page_fetched();
            report.pages_fetched = page;

            if report.total_count.is_none() {
                info!(
                    "The total count of repositories found under the {} is {}",
                    self.language, search_page.total_count
                );
                report.total_count = Some(search_page.total_count);
            }

            let received = search_page.items.len();
            debug!(
                "Search page {} for {} returned {} repositories",
                page, self.language, received
            );

            for item in search_page.items {
                if tx.send(Ok(item)).await.is_err() {
                    debug!("Consumer for {} went away, stopping pagination", self.language);
                    report.stopped_by = PaginationStop::ReceiverClosed;
                    return Ok(report);
                }
                report.repositories_emitted += 1;
            }

            if received < per_page as usize {
                report.stopped_by = PaginationStop::ShortPage;
                return Ok(report);
            }

            if self.settings.stop_at_total_count
                && u64::from(page) * u64::from(per_page) >= search_page.total_count
            {
                report.stopped_by = PaginationStop::TotalCount;
                return Ok(report);
            }
        }

        report.stopped_by = PaginationStop::PageLimit;
        Ok(report)
    }
}
