//! Plain-text rendering of pipeline output and request errors.

use std::time::Duration;

use crate::services::ChannelFailure;
use crate::types::EnrichedRepository;

/// Body returned when no repository survived enrichment
pub const NO_REPOSITORIES_FOUND: &str = "No repositories found.";

/// Body of the 400 response for a request without languages
pub const MISSING_LANGUAGE_BODY: &str =
    "Invalid request - language parameter is missing from query";

/// One response line per enriched repository.
pub fn repository_line(repository: &EnrichedRepository) -> String {
    format!(
        "Owner : {}, Repository : {}, Number of commits: {}\n",
        repository.owner(),
        repository.summary().name(),
        repository.commit_count()
    )
}

pub fn channel_error_line(failure: &ChannelFailure) -> String {
    format!("{}\n", failure)
}

pub fn timeout_notice(timeout: Duration) -> String {
    format!(
        "Request timed out after {}s, results above may be incomplete\n",
        timeout.as_secs()
    )
}

/// Body of the 405 response
pub fn invalid_method_body(method: &str) -> String {
    format!("Invalid request - {}", method)
}
