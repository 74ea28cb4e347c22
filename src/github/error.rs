/// Failure of a single outbound GitHub request (a search page or a commit listing).
///
/// Fatal to a language channel when a search page fails; counts as one failed attempt
/// when a commit listing fails.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Rate limiting errors (429, or 403 mentioning the rate limit)
    RateLimit(String),
    /// GitHub answered with a non-success status
    Status { status: u16, message: String },
    /// Connection, timeout or other transport-level failure
    Transport(String),
    /// The response body could not be decoded
    Decode(String),
}

impl FetchError {
    /// Convert octocrab error to the matching fetch error category
    pub fn from_octocrab_error(error: octocrab::Error) -> Self {
        tracing::debug!("Raw octocrab error: {:?}", error);

        let result = match &error {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                let detailed_error = format!(
                    "Message: {}, Documentation: {:?}",
                    source.message, source.documentation_url
                );

                match status {
                    429 => {
                        tracing::warn!("Rate limit (429) detected for GitHub API request");
                        Self::RateLimit(detailed_error)
                    }
                    403 if source.message.contains("rate limit") => {
                        tracing::warn!(
                            "Rate limit (403) detected for GitHub API request: {}",
                            source.message
                        );
                        Self::RateLimit(detailed_error)
                    }
                    _ => Self::Status {
                        status,
                        message: detailed_error,
                    },
                }
            }
            octocrab::Error::Http { .. } => Self::Transport(format!("HTTP layer error: {}", error)),
            octocrab::Error::Hyper { .. } => {
                Self::Transport(format!("Hyper HTTP error: {}", error))
            }
            octocrab::Error::Json { .. } => Self::Decode(format!("JSON parsing error: {}", error)),
            octocrab::Error::Uri { .. } => Self::Transport(format!("URI parsing error: {}", error)),
            _ => Self::Transport(format!("Unknown error type: {}", error)),
        };

        tracing::debug!(
            "Error classification result: {:?} for error: {}",
            result,
            error
        );
        result
    }

    /// Whether repeating the same request could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit(_) | Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            Self::Status { status, message } => {
                write!(f, "GitHub API returned status {}: {}", status, message)
            }
            Self::Transport(msg) => write!(f, "Transport error: {}", msg),
            Self::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// The token exchange failed; no usable credential is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRefreshError {
    message: String,
}

impl CredentialRefreshError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for CredentialRefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential refresh failed: {}", self.message)
    }
}

impl std::error::Error for CredentialRefreshError {}
