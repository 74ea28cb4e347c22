//! Access credential types shared by the token manager and the outbound clients.

use chrono::{DateTime, Duration, Utc};

/// Upper bound on any credential lifetime (ten years); longer ones are clamped
pub const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Bearer token plus the instant it stops being valid.
///
/// `expires_at == None` means the expiry is unknown, which is treated as expired.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
    refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Whether the credential can still be used at `now`, treating it as expired `skew`
    /// before its real expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => now + skew < expires_at,
            None => false,
        }
    }

    /// True when `self` expires strictly later than `other`.
    pub fn is_fresher_than(&self, other: &Credential) -> bool {
        match (self.expires_at, other.expires_at) {
            (Some(mine), Some(theirs)) => mine > theirs,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

// Keeps tokens out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// What a token exchange hands back before it is turned into a [`Credential`].
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds, when the token endpoint reports one
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
}

impl TokenGrant {
    /// Converts the grant into a credential, anchoring the relative lifetime at `issued_at`.
    /// `default_lifetime` applies when the endpoint did not report a lifetime.
    pub fn into_credential(self, issued_at: DateTime<Utc>, default_lifetime: Duration) -> Credential {
        let lifetime = self
            .expires_in
            .map(|secs| Duration::seconds(secs.min(MAX_LIFETIME_SECS) as i64))
            .unwrap_or(default_lifetime);
        Credential::new(self.access_token, Some(issued_at + lifetime))
            .with_refresh_token(self.refresh_token)
    }
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}
