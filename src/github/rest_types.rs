//! Response shapes for the GitHub REST endpoints the pipeline reads.
//!
//! Only the fields the pipeline consumes are declared; everything else in the payload
//! is ignored during deserialization.

use serde::{Deserialize, Serialize};

use crate::types::{RepositorySummary, SearchPage};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRepositoriesResponse {
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<RepositoryItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryItem {
    pub id: u64,
    pub name: String,
    pub owner: OwnerItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerItem {
    pub login: String,
}

impl From<RepositoryItem> for RepositorySummary {
    fn from(item: RepositoryItem) -> Self {
        RepositorySummary::new(item.id, item.owner.login, item.name)
    }
}

impl From<SearchRepositoriesResponse> for SearchPage {
    fn from(response: SearchRepositoriesResponse) -> Self {
        SearchPage {
            total_count: response.total_count,
            items: response.items.into_iter().map(Into::into).collect(),
        }
    }
}

/// Query string for `GET /search/repositories`
#[derive(Debug, Clone, Serialize)]
pub struct SearchRepositoriesParams {
    pub q: String,
    pub page: u32,
    pub per_page: u32,
}

/// Query string for `GET /repos/{owner}/{repo}/commits`
#[derive(Debug, Clone, Serialize)]
pub struct ListCommitsParams {
    pub per_page: u32,
}
