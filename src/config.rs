//! Application configuration.
//!
//! Values are layered: built-in defaults, then the TOML file, then `REPO_PULSE_*`
//! environment variables. Command-line flags are applied on top by the binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::github::client::{DEFAULT_API_BASE_URL, DEFAULT_USER_AGENT};
use crate::github::oauth::DEFAULT_TOKEN_URL;
use crate::github::{
    GitHubClientConfig, GitHubClientFactory, OAuthClientConfig, OAuthTokenExchange,
    PersonalAccessToken, TokenSource,
};
use crate::services::{
    EnrichmentSettings, MAX_PER_PAGE, Orchestrator, PaginationSettings, PipelineMetrics,
    PipelineSettings, TokenManager, TokenSettings,
};
use crate::types::MAX_LIFETIME_SECS;

pub const ENV_GITHUB_TOKEN: &str = "REPO_PULSE_GITHUB_TOKEN";
pub const ENV_CLIENT_ID: &str = "REPO_PULSE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REPO_PULSE_CLIENT_SECRET";
pub const ENV_AUTHORIZATION_CODE: &str = "REPO_PULSE_AUTHORIZATION_CODE";

/// Upper bound for `pipeline.max_concurrent_enrichments`
pub const MAX_CONCURRENT_ENRICHMENTS: usize = 1024;

const CONFIG_DIR_NAME: &str = "repo-pulse";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub oauth: OAuthConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5050".to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base_url: String,
    pub user_agent: String,
    /// Personal access token; takes precedence over the OAuth settings
    pub personal_token: Option<String>,
    pub request_timeout_secs: u64,
    /// Lifetime assumed for tokens issued without `expires_in`
    pub token_lifetime_secs: u64,
    pub token_expiry_skew_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            personal_token: None,
            request_timeout_secs: 30,
            token_lifetime_secs: 8 * 60 * 60,
            token_expiry_skew_secs: 0,
        }
    }
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_base_url", &self.api_base_url)
            .field("user_agent", &self.user_agent)
            .field("has_personal_token", &self.personal_token.is_some())
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .field("token_expiry_skew_secs", &self.token_expiry_skew_secs)
            .finish()
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: String,
    pub redirect_uri: String,
    pub scope: String,
    pub authorization_code: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            redirect_uri: "http://localhost:3000".to_string(),
            scope: "repo".to_string(),
            authorization_code: None,
        }
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("has_client_secret", &self.client_secret.is_some())
            .field("token_url", &self.token_url)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("has_authorization_code", &self.authorization_code.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub page_limit: u32,
    pub per_page: u32,
    pub stop_at_total_count: bool,
    pub max_attempts: u32,
    pub commits_per_page: u32,
    pub retry_min_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub max_concurrent_enrichments: usize,
    pub channel_buffer: usize,
    /// 0 disables the request timeout
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_limit: 2,
            per_page: 100,
            stop_at_total_count: false,
            max_attempts: 3,
            commits_per_page: 100,
            retry_min_delay_ms: 10,
            retry_max_delay_ms: 50,
            max_concurrent_enrichments: 16,
            channel_buffer: 100,
            request_timeout_secs: 120,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or the default location when `path` is `None`.
    ///
    /// An explicit path must exist; a missing default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("No configuration file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration TOML")
    }

    /// Overrides values with non-empty `REPO_PULSE_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Some(token) = env_value(ENV_GITHUB_TOKEN) {
            self.github.personal_token = Some(token);
        }
        if let Some(client_id) = env_value(ENV_CLIENT_ID) {
            self.oauth.client_id = Some(client_id);
        }
        if let Some(client_secret) = env_value(ENV_CLIENT_SECRET) {
            self.oauth.client_secret = Some(client_secret);
        }
        if let Some(code) = env_value(ENV_AUTHORIZATION_CODE) {
            self.oauth.authorization_code = Some(code);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_address()?;

        url::Url::parse(&self.github.api_base_url)
            .with_context(|| format!("Invalid api_base_url: {}", self.github.api_base_url))?;

        if !(1..=MAX_PER_PAGE).contains(&self.pipeline.per_page) {
            bail!(
                "per_page must be between 1 and {}, got {}",
                MAX_PER_PAGE,
                self.pipeline.per_page
            );
        }
        if self.pipeline.commits_per_page == 0 || self.pipeline.commits_per_page > MAX_PER_PAGE {
            bail!(
                "commits_per_page must be between 1 and {}, got {}",
                MAX_PER_PAGE,
                self.pipeline.commits_per_page
            );
        }
        if self.pipeline.page_limit == 0 {
            bail!("page_limit must be at least 1");
        }
        if !(1..=MAX_CONCURRENT_ENRICHMENTS).contains(&self.pipeline.max_concurrent_enrichments) {
            bail!(
                "max_concurrent_enrichments must be between 1 and {}, got {}",
                MAX_CONCURRENT_ENRICHMENTS,
                self.pipeline.max_concurrent_enrichments
            );
        }
        if self.pipeline.channel_buffer == 0 {
            bail!("channel_buffer must be at least 1");
        }
        if self.pipeline.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.pipeline.retry_min_delay_ms > self.pipeline.retry_max_delay_ms {
            bail!(
                "retry_min_delay_ms ({}) is greater than retry_max_delay_ms ({})",
                self.pipeline.retry_min_delay_ms,
                self.pipeline.retry_max_delay_ms
            );
        }

        if self.github.personal_token.is_none() {
            url::Url::parse(&self.oauth.token_url)
                .with_context(|| format!("Invalid token_url: {}", self.oauth.token_url))?;
        }
        self.token_source().map(|_| ())
    }

    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.server
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let pipeline = &self.pipeline;
        PipelineSettings {
            pagination: PaginationSettings {
                page_limit: pipeline.page_limit,
                per_page: pipeline.per_page,
                stop_at_total_count: pipeline.stop_at_total_count,
            },
            enrichment: EnrichmentSettings {
                max_attempts: pipeline.max_attempts,
                commits_per_page: pipeline.commits_per_page,
                retry_min_delay: Duration::from_millis(pipeline.retry_min_delay_ms),
                retry_max_delay: Duration::from_millis(pipeline.retry_max_delay_ms),
            },
            max_concurrent_enrichments: pipeline.max_concurrent_enrichments,
            channel_buffer: pipeline.channel_buffer,
            request_timeout: match pipeline.request_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            default_lifetime: chrono::Duration::seconds(
                self.github.token_lifetime_secs.min(MAX_LIFETIME_SECS) as i64,
            ),
            expiry_skew: chrono::Duration::seconds(
                self.github.token_expiry_skew_secs.min(MAX_LIFETIME_SECS) as i64,
            ),
        }
    }

    /// Personal token if one is configured, otherwise the OAuth application.
    pub fn token_source(&self) -> Result<TokenSource> {
        if let Some(token) = &self.github.personal_token {
            return Ok(TokenSource::Personal(PersonalAccessToken::new(
                token.clone(),
                self.token_settings().default_lifetime,
            )));
        }

        let (Some(client_id), Some(client_secret)) =
            (&self.oauth.client_id, &self.oauth.client_secret)
        else {
            bail!(
                "No GitHub credentials configured: set {} or the OAuth client id and secret ({}, {})",
                ENV_GITHUB_TOKEN,
                ENV_CLIENT_ID,
                ENV_CLIENT_SECRET
            );
        };
        if self.oauth.authorization_code.is_none() {
            bail!(
                "OAuth client configured without an authorization code; set {}",
                ENV_AUTHORIZATION_CODE
            );
        }

        Ok(TokenSource::OAuth(OAuthTokenExchange::new(OAuthClientConfig {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            token_url: self.oauth.token_url.clone(),
            redirect_uri: self.oauth.redirect_uri.clone(),
            scope: self.oauth.scope.clone(),
            authorization_code: self.oauth.authorization_code.clone(),
            user_agent: self.github.user_agent.clone(),
            timeout: Duration::from_secs(self.github.request_timeout_secs),
        })?))
    }

    pub fn client_factory(&self) -> GitHubClientFactory {
        GitHubClientFactory::new(GitHubClientConfig {
            base_url: self.github.api_base_url.clone(),
            user_agent: self.github.user_agent.clone(),
            timeout: Duration::from_secs(self.github.request_timeout_secs),
        })
    }

    /// Builds the process-wide request context.
    pub fn build_orchestrator(&self) -> Result<Orchestrator<GitHubClientFactory, TokenSource>> {
        let metrics = Arc::new(PipelineMetrics::new());
        let tokens = TokenManager::new(
            self.token_source()?,
            self.token_settings(),
            Arc::clone(&metrics),
        );
        Ok(Orchestrator::new(
            self.client_factory(),
            Arc::new(tokens),
            self.pipeline_settings(),
            metrics,
        ))
    }
}

/// `<config_dir>/repo-pulse/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn clear_env() {
        for name in [
            ENV_GITHUB_TOKEN,
            ENV_CLIENT_ID,
            ENV_CLIENT_SECRET,
            ENV_AUTHORIZATION_CODE,
        ] {
            unsafe { std::env::remove_var(name) };
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address, "127.0.0.1:5050");
        assert_eq!(config.oauth.redirect_uri, "http://localhost:3000");
        assert_eq!(config.oauth.scope, "repo");

        let settings = config.pipeline_settings();
        assert_eq!(settings.pagination.page_limit, 2);
        assert_eq!(settings.pagination.per_page, 100);
        assert_eq!(settings.enrichment.max_attempts, 3);
        assert_eq!(settings.request_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
bind_address = "0.0.0.0:8080"

[github]
personal_token = "ghp_file"

[pipeline]
page_limit = 5
request_timeout_secs = 0
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.github.personal_token.as_deref(), Some("ghp_file"));
        assert_eq!(config.github.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.pipeline.page_limit, 5);
        assert_eq!(config.pipeline.per_page, 100);
        assert_eq!(config.pipeline_settings().request_timeout, None);
        config.validate().unwrap();
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = AppConfig::default();
        config.github.personal_token = Some("ghp_test".to_string());
        config.validate().unwrap();

        let mut bad_page = config.clone();
        bad_page.pipeline.per_page = 101;
        assert!(bad_page.validate().is_err());

        let mut bad_attempts = config.clone();
        bad_attempts.pipeline.max_attempts = 0;
        assert!(bad_attempts.validate().is_err());

        let mut no_pages = config.clone();
        no_pages.pipeline.page_limit = 0;
        assert!(no_pages.validate().is_err());

        let mut no_enrichments = config.clone();
        no_enrichments.pipeline.max_concurrent_enrichments = 0;
        assert!(no_enrichments.validate().is_err());

        let mut too_many_enrichments = config.clone();
        too_many_enrichments.pipeline.max_concurrent_enrichments = usize::MAX;
        assert!(too_many_enrichments.validate().is_err());

        let mut no_buffer = config.clone();
        no_buffer.pipeline.channel_buffer = 0;
        assert!(no_buffer.validate().is_err());

        let mut bad_address = config.clone();
        bad_address.server.bind_address = "localhost".to_string();
        assert!(bad_address.validate().is_err());

        let mut bad_url = config.clone();
        bad_url.github.api_base_url = "not a url".to_string();
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_credentials_are_required() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());

        let mut oauth_without_code = AppConfig::default();
        oauth_without_code.oauth.client_id = Some("id".to_string());
        oauth_without_code.oauth.client_secret = Some("secret".to_string());
        assert!(oauth_without_code.token_source().is_err());

        let mut oauth = oauth_without_code.clone();
        oauth.oauth.authorization_code = Some("code".to_string());
        assert!(matches!(oauth.token_source().unwrap(), TokenSource::OAuth(_)));
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        clear_env();
        let mut config =
            AppConfig::from_toml_str("[github]\npersonal_token = \"ghp_file\"\n").unwrap();

        unsafe {
            std::env::set_var(ENV_GITHUB_TOKEN, "ghp_env");
            std::env::set_var(ENV_CLIENT_ID, "  ");
        }
        config.apply_env();
        clear_env();

        assert_eq!(config.github.personal_token.as_deref(), Some("ghp_env"));
        assert_eq!(config.oauth.client_id, None);
    }

    #[test]
    #[serial]
    fn test_oauth_settings_from_environment() {
        clear_env();
        let mut config = AppConfig::default();

        unsafe {
            std::env::set_var(ENV_CLIENT_ID, "client");
            std::env::set_var(ENV_CLIENT_SECRET, "secret");
            std::env::set_var(ENV_AUTHORIZATION_CODE, "code");
        }
        config.apply_env();
        clear_env();

        config.validate().unwrap();
        assert!(matches!(config.token_source().unwrap(), TokenSource::OAuth(_)));
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.github.personal_token = Some("ghp_secret_value".to_string());
        config.oauth.client_secret = Some("oauth_secret_value".to_string());

        let debug = format!("{:?}", config);
        assert!(!debug.contains("ghp_secret_value"));
        assert!(!debug.contains("oauth_secret_value"));
    }
}
