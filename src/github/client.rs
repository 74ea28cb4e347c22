use std::future::Future;

use http::header::{ACCEPT, HeaderName, USER_AGENT};
use octocrab::Octocrab;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::github::error::FetchError;
use crate::github::rest_types::{
    ListCommitsParams, SearchRepositoriesParams, SearchRepositoriesResponse,
};
use crate::types::{Credential, Language, RepositorySummary, SearchPage};

/// Default GitHub REST API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Caller identification sent with every outbound request
pub const DEFAULT_USER_AGENT: &str = "repo-pulse";

const GITHUB_API_VERSION: &str = "2022-11-28";

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Paged repository search and per-repository commit listing.
///
/// Implementations are bound to one credential for their whole lifetime.
pub trait RepositoryApi: Clone + Send + Sync + 'static {
    /// Fetches one page of repositories written in `language`. Pages start at 1.
    fn search_repositories(
        &self,
        language: &Language,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<SearchPage, FetchError>> + Send;

    /// Returns the number of commits listed for `repository`, capped at `per_page`.
    /// Zero is a valid answer (empty repository or empty listing).
    fn commit_count(
        &self,
        repository: &RepositorySummary,
        per_page: u32,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send;
}

/// Builds a credential-bound [`RepositoryApi`] for one request.
pub trait RepositoryApiProvider: Send + Sync + 'static {
    type Api: RepositoryApi;

    fn connect(&self, credential: &Credential) -> Result<Self::Api, FetchError>;
}

/// Connection settings shared by every client the factory builds
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct GitHubClient {
    pub(crate) client: octocrab::Octocrab,
    timeout: Duration,
}

impl GitHubClient {
    pub fn new(credential: &Credential, config: &GitHubClientConfig) -> Result<Self, FetchError> {
        let timeout_duration = config.timeout;
        let connection_timeout = if timeout_duration < Duration::from_secs(10) {
            std::cmp::max(timeout_duration, Duration::from_secs(1))
        } else {
            Duration::from_secs(30)
        };

        let read_write_timeout = std::cmp::max(timeout_duration, Duration::from_secs(1));

        let client = Octocrab::builder()
            .base_uri(config.base_url.as_str())
            .map_err(FetchError::from_octocrab_error)?
            .personal_token(credential.access_token().to_string())
            .add_header(USER_AGENT, config.user_agent.clone())
            .add_header(ACCEPT, GITHUB_MEDIA_TYPE.to_string())
            .add_header(
                HeaderName::from_static("x-github-api-version"),
                GITHUB_API_VERSION.to_string(),
            )
            .set_connect_timeout(Some(connection_timeout))
            .set_read_timeout(Some(read_write_timeout))
            .set_write_timeout(Some(read_write_timeout))
            .build()
            .map_err(FetchError::from_octocrab_error)?;

        Ok(Self {
            client,
            timeout: read_write_timeout,
        })
    }

    /// Runs one GET request with an overall deadline.
    async fn get_json<R, P>(&self, route: &str, params: &P) -> Result<R, FetchError>
    where
        R: serde::de::DeserializeOwned,
        P: serde::Serialize + ?Sized,
    {
        let start_time = std::time::Instant::now();

        let response: R = tokio::time::timeout(self.timeout, self.client.get(route, Some(params)))
            .await
            .map_err(|_| {
                FetchError::Transport(format!(
                    "GET {} timed out after {:?}",
                    route,
                    start_time.elapsed()
                ))
            })?
            .map_err(FetchError::from_octocrab_error)?;

        debug!("GET {} completed in {:?}", route, start_time.elapsed());
        Ok(response)
    }
}

impl RepositoryApi for GitHubClient {
    async fn search_repositories(
        &self,
        language: &Language,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, FetchError> {
        let params = SearchRepositoriesParams {
            q: language.search_qualifier(),
            page,
            per_page,
        };

        let response: SearchRepositoriesResponse =
            self.get_json("/search/repositories", &params).await?;

        if response.incomplete_results {
            info!(
                "Search for {} page {} reported incomplete results",
                language, page
            );
        }

        Ok(response.into())
    }

    async fn commit_count(
        &self,
        repository: &RepositorySummary,
        per_page: u32,
    ) -> Result<u64, FetchError> {
        let route = format!(
            "/repos/{}/{}/commits",
            repository.owner(),
            repository.name()
        );
        let commits: Vec<serde_json::Value> = self
            .get_json(&route, &ListCommitsParams { per_page })
            .await?;

        Ok(commits.len() as u64)
    }
}

/// Production [`RepositoryApiProvider`] that builds one [`GitHubClient`] per credential
#[derive(Debug, Clone, Default)]
pub struct GitHubClientFactory {
    config: GitHubClientConfig,
}

impl GitHubClientFactory {
    pub fn new(config: GitHubClientConfig) -> Self {
        Self { config }
    }
}

impl RepositoryApiProvider for GitHubClientFactory {
    type Api = GitHubClient;

    fn connect(&self, credential: &Credential) -> Result<GitHubClient, FetchError> {
        GitHubClient::new(credential, &self.config)
    }
}
