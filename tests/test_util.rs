//! Shared fakes for the pipeline integration tests.
//!
//! `FakeRepositoryApi` serves scripted search pages and commit counts from memory and
//! records every call; `FakeTokenExchange` counts token exchanges.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use repo_pulse::github::{
    CredentialRefreshError, FetchError, RepositoryApi, RepositoryApiProvider, TokenExchange,
};
use repo_pulse::services::{
    EnrichmentSettings, Orchestrator, PaginationSettings, PipelineMetrics, PipelineSettings,
    TokenManager, TokenSettings,
};
use repo_pulse::types::{Credential, Language, RepositorySummary, SearchPage, TokenGrant};

#[derive(Default)]
struct FakeState {
    pages: Mutex<HashMap<(String, u32), Result<SearchPage, FetchError>>>,
    search_delays: Mutex<HashMap<String, Duration>>,
    commit_scripts: Mutex<HashMap<u64, Vec<Result<u64, FetchError>>>>,
    commit_delays: Mutex<HashMap<u64, Duration>>,
    search_calls: Mutex<Vec<(String, u32)>>,
    commit_calls: Mutex<HashMap<u64, usize>>,
    searches_in_flight: Mutex<HashMap<String, usize>>,
    max_searches_in_flight: Mutex<HashMap<String, usize>>,
}

/// In-memory [`RepositoryApi`]. Clones share scripts and call records.
#[derive(Clone, Default)]
pub struct FakeRepositoryApi {
    state: Arc<FakeState>,
}

impl FakeRepositoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts one search page. Pages that were never scripted come back empty.
    pub fn with_page(self, language: &str, page: u32, total_count: u64, items: Vec<RepositorySummary>) -> Self {
        self.state
            .pages
            .lock()
            .unwrap()
            .insert((language.to_string(), page), Ok(SearchPage { total_count, items }));
        self
    }

    pub fn with_page_error(self, language: &str, page: u32, error: FetchError) -> Self {
        self.state
            .pages
            .lock()
            .unwrap()
            .insert((language.to_string(), page), Err(error));
        self
    }

    pub fn with_search_delay(self, language: &str, delay: Duration) -> Self {
        self.state
            .search_delays
            .lock()
            .unwrap()
            .insert(language.to_string(), delay);
        self
    }

    /// Scripts the commit-count answers for one repository, one entry per attempt.
    /// The last entry repeats; unscripted repositories report one commit.
    pub fn with_commits(self, repository_id: u64, script: Vec<Result<u64, FetchError>>) -> Self {
        self.state
            .commit_scripts
            .lock()
            .unwrap()
            .insert(repository_id, script);
        self
    }

    pub fn with_commit_delay(self, repository_id: u64, delay: Duration) -> Self {
        self.state
            .commit_delays
            .lock()
            .unwrap()
            .insert(repository_id, delay);
        self
    }

    pub fn search_calls(&self) -> Vec<(String, u32)> {
        self.state.search_calls.lock().unwrap().clone()
    }

    pub fn search_call_count(&self) -> usize {
        self.state.search_calls.lock().unwrap().len()
    }

    pub fn commit_calls(&self, repository_id: u64) -> usize {
        self.state
            .commit_calls
            .lock()
            .unwrap()
            .get(&repository_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_commit_calls(&self) -> usize {
        self.state.commit_calls.lock().unwrap().values().sum()
    }

    pub fn max_searches_in_flight(&self, language: &str) -> usize {
        self.state
            .max_searches_in_flight
            .lock()
            .unwrap()
            .get(language)
            .copied()
            .unwrap_or(0)
    }
}

impl RepositoryApi for FakeRepositoryApi {
    async fn search_repositories(
        &self,
        language: &Language,
        page: u32,
        _per_page: u32,
    ) -> Result<SearchPage, FetchError> {
        let key = language.as_str().to_string();
        self.state
            .search_calls
            .lock()
            .unwrap()
            .push((key.clone(), page));
        {
            let mut in_flight = self.state.searches_in_flight.lock().unwrap();
            let current = in_flight.entry(key.clone()).or_insert(0);
            *current += 1;
            let mut max = self.state.max_searches_in_flight.lock().unwrap();
            let max_entry = max.entry(key.clone()).or_insert(0);
            *max_entry = (*max_entry).max(*current);
        }

        let delay = self.state.search_delays.lock().unwrap().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self
            .state
            .pages
            .lock()
            .unwrap()
            .get(&(key.clone(), page))
            .cloned()
            .unwrap_or(Ok(SearchPage {
                total_count: 0,
                items: Vec::new(),
            }));

        *self
            .state
            .searches_in_flight
            .lock()
            .unwrap()
            .entry(key)
            .or_insert(1) -= 1;
        result
    }

    async fn commit_count(
        &self,
        repository: &RepositorySummary,
        _per_page: u32,
    ) -> Result<u64, FetchError> {
        let attempt = {
            let mut calls = self.state.commit_calls.lock().unwrap();
            let count = calls.entry(repository.id).or_insert(0);
            *count += 1;
            *count
        };

        let delay = self
            .state
            .commit_delays
            .lock()
            .unwrap()
            .get(&repository.id)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripts = self.state.commit_scripts.lock().unwrap();
        match scripts.get(&repository.id) {
            Some(script) if !script.is_empty() => {
                script[(attempt - 1).min(script.len() - 1)].clone()
            }
            _ => Ok(1),
        }
    }
}

/// Provider handing out clones of one [`FakeRepositoryApi`]
#[derive(Clone)]
pub struct FakeProvider {
    pub api: FakeRepositoryApi,
    tokens_seen: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    pub fn new(api: FakeRepositoryApi) -> Self {
        Self {
            api,
            tokens_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }
}

impl RepositoryApiProvider for FakeProvider {
    type Api = FakeRepositoryApi;

    fn connect(&self, credential: &Credential) -> Result<FakeRepositoryApi, FetchError> {
        self.tokens_seen
            .lock()
            .unwrap()
            .push(credential.access_token().to_string());
        Ok(self.api.clone())
    }
}

/// Counting [`TokenExchange`]
#[derive(Clone)]
pub struct FakeTokenExchange {
    calls: Arc<AtomicUsize>,
    expires_in: Option<u64>,
    delay: Duration,
    failure: Option<String>,
}

impl FakeTokenExchange {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            expires_in: Some(3600),
            delay: Duration::from_millis(0),
            failure: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_expires_in(mut self, expires_in: Option<u64>) -> Self {
        self.expires_in = expires_in;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenExchange for FakeTokenExchange {
    async fn exchange(
        &self,
        _previous: Option<&Credential>,
    ) -> Result<TokenGrant, CredentialRefreshError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(CredentialRefreshError::new(message.clone()));
        }
        Ok(TokenGrant {
            access_token: format!("token-{}", call),
            expires_in: self.expires_in,
            refresh_token: None,
        })
    }
}

pub fn repo(id: u64, owner: &str, name: &str) -> RepositorySummary {
    RepositorySummary::new(id, owner, name)
}

pub fn line(owner: &str, name: &str, commits: u64) -> String {
    format!(
        "Owner : {}, Repository : {}, Number of commits: {}",
        owner, name, commits
    )
}

/// Body lines in sorted order, for comparisons that ignore enrichment order.
pub fn sorted_lines(body: &str) -> Vec<String> {
    let mut lines: Vec<String> = body.lines().map(str::to_string).collect();
    lines.sort();
    lines
}

/// Default settings with retry pauses short enough for tests.
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        pagination: PaginationSettings::default(),
        enrichment: EnrichmentSettings {
            retry_min_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(2),
            ..EnrichmentSettings::default()
        },
        request_timeout: Some(Duration::from_secs(10)),
        ..PipelineSettings::default()
    }
}

pub fn orchestrator(
    provider: FakeProvider,
    exchange: FakeTokenExchange,
    settings: PipelineSettings,
) -> Arc<Orchestrator<FakeProvider, FakeTokenExchange>> {
    let metrics = Arc::new(PipelineMetrics::new());
    let tokens = TokenManager::new(exchange, TokenSettings::default(), Arc::clone(&metrics));
    Arc::new(Orchestrator::new(
        provider,
        Arc::new(tokens),
        settings,
        metrics,
    ))
}
