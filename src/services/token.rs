//! Process-wide access credential with single-flight refresh.
//!
//! Readers take the published credential through a short read lock and never wait on a
//! refresh while the credential is valid. When it has lapsed, callers queue on the refresh
//! gate; the first one through performs the exchange and every caller that queued during
//! that exchange receives its outcome, success or failure, without exchanging again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::github::{CredentialRefreshError, TokenExchange};
use crate::services::PipelineMetrics;
use crate::types::Credential;

#[derive(Debug, Clone)]
pub struct TokenSettings {
    /// Lifetime assumed when the token endpoint does not report one
    pub default_lifetime: Duration,
    /// Treat a credential as expired this long before its real expiry
    pub expiry_skew: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            default_lifetime: Duration::hours(8),
            expiry_skew: Duration::zero(),
        }
    }
}

type RefreshOutcome = Result<Arc<Credential>, CredentialRefreshError>;

#[derive(Default)]
struct RefreshGate {
    last_outcome: Option<RefreshOutcome>,
}

pub struct TokenManager<X> {
    exchange: X,
    settings: TokenSettings,
    published: RwLock<Option<Arc<Credential>>>,
    gate: Mutex<RefreshGate>,
    // Bumped under the gate after every exchange; lets a waiter tell whether an
    // exchange ran while it was queued.
    refresh_attempts: AtomicU64,
    metrics: Arc<PipelineMetrics>,
}

impl<X: TokenExchange> TokenManager<X> {
    pub fn new(exchange: X, settings: TokenSettings, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            exchange,
            settings,
            published: RwLock::new(None),
            gate: Mutex::new(RefreshGate::default()),
            refresh_attempts: AtomicU64::new(0),
            metrics,
        }
    }

    /// Seeds the cache, e.g. with a credential obtained before startup.
    pub fn with_credential(self, credential: Credential) -> Self {
        self.publish(Arc::new(credential));
        self
    }

    /// The cached credential, valid or not.
    pub fn current(&self) -> Option<Arc<Credential>> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of exchanges performed so far (successful or not).
    pub fn refresh_attempts(&self) -> u64 {
        self.refresh_attempts.load(Ordering::Acquire)
    }

    /// Returns a credential that is valid now, refreshing it at most once per expiry.
    pub async fn get_valid_token(&self) -> Result<Arc<Credential>, CredentialRefreshError> {
        if let Some(credential) = self.valid_credential() {
            return Ok(credential);
        }

        let observed_attempts = self.refresh_attempts.load(Ordering::Acquire);
        let mut gate = self.gate.lock().await;

        if let Some(credential) = self.valid_credential() {
            debug!("Credential refreshed by a concurrent caller");
            return Ok(credential);
        }

        if self.refresh_attempts.load(Ordering::Acquire) != observed_attempts {
            if let Some(outcome) = &gate.last_outcome {
                debug!("Reusing the outcome of the refresh that ran while waiting");
                return outcome.clone();
            }
        }

        let outcome = self.refresh().await;
        gate.last_outcome = Some(outcome.clone());
        self.refresh_attempts.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn refresh(&self) -> RefreshOutcome {
        let previous = self.current();
        info!("Access credential missing or expired, refreshing");

        match self.exchange.exchange(previous.as_deref()).await {
            Ok(grant) => {
                let credential = Arc::new(
                    grant.into_credential(Utc::now(), self.settings.default_lifetime),
                );
                if let Some(previous) = previous
                    .as_deref()
                    .filter(|previous| !credential.is_fresher_than(previous))
                {
                    warn!(
                        "Refreshed credential does not expire later than the one it replaces ({:?} <= {:?})",
                        credential.expires_at(),
                        previous.expires_at()
                    );
                    self.metrics.record_token_refresh_failure();
                    return Err(CredentialRefreshError::new(
                        "token endpoint issued a credential that expires no later than the current one",
                    ));
                }
                self.publish(Arc::clone(&credential));
                self.metrics.record_token_refresh();
                info!(
                    "Access credential refreshed, valid until {:?}",
                    credential.expires_at()
                );
                Ok(credential)
            }
            Err(e) => {
                self.metrics.record_token_refresh_failure();
                error!("{}", e);
                Err(e)
            }
        }
    }

    fn valid_credential(&self) -> Option<Arc<Credential>> {
        self.current()
            .filter(|credential| credential.is_valid_at(Utc::now(), self.settings.expiry_skew))
    }

    fn publish(&self, credential: Arc<Credential>) {
        *self.published.write().unwrap_or_else(|e| e.into_inner()) = Some(credential);
    }
}
