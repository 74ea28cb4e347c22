pub mod accumulator;
pub mod channel;
pub mod enricher;
pub mod merger;
pub mod metrics;
pub mod orchestrator;
pub mod page_source;
pub mod token;

pub use accumulator::{DoneSignal, PipelineResult, ResponseAccumulator};
pub use channel::{
    ChannelEvent, ChannelFailure, DEFAULT_MAX_CONCURRENT_ENRICHMENTS, LanguageChannel,
};
pub use enricher::{CommitEnricher, DEFAULT_MAX_ATTEMPTS, EnrichmentSettings};
pub use merger::{MergedEvent, Merger, fan_in};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use orchestrator::{Orchestrator, OrchestratorError, PipelineSettings};
pub use page_source::{
    DEFAULT_PAGE_LIMIT, MAX_PER_PAGE, PageSource, PaginationReport, PaginationSettings,
    PaginationStop,
};
pub use token::{TokenManager, TokenSettings};
