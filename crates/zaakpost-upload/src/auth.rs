//! Token acquisition and caching.
//!
//! [`TokenCache`] owns the single cached bearer credential for the
//! subsystem. Concurrent callers of [`TokenCache::get_token`] while no
//! valid credential is cached are coalesced onto one in-flight acquisition
//! (a [`Shared`] future stored in the cache state), so the primary provider
//! is invoked at most once at any time.
//!
//! Acquisition itself is a two-provider affair: the silent primary
//! provider, with a fallback to the interactive secondary provider on
//! failure codes the user can recover from (consent, blocked popup,
//! ambiguous account). Retry policy does not live here — callers that want
//! retries wrap acquisition in [`Backoff`](crate::retry::Backoff).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, warn};

use crate::claims::peek_claims;
use crate::config::UploadConfig;
use crate::error::{AuthError, AuthErrorCode};

/// A provider that can acquire a bearer token for a set of scopes.
///
/// Two implementations are expected from the embedding application: a
/// silent one (cached account, refresh token) and an interactive one that
/// may show UI. Both are external collaborators; this crate only defines
/// the seam.
#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    /// Acquire a bearer token granting `scopes`.
    async fn acquire_token(&self, scopes: &[String]) -> Result<String, AuthError>;
}

/// A cached credential: the raw bearer value plus its expiry.
///
/// Replaced wholesale on refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    /// The bearer token value.
    pub value: String,
    /// When the token stops being valid.
    pub expires_at: DateTime<Utc>,
}

type AcquisitionFuture = Shared<BoxFuture<'static, Result<CachedToken, AuthError>>>;

struct CacheState {
    cached: Option<CachedToken>,
    inflight: Option<AcquisitionFuture>,
    /// Bumped on every new acquisition and on invalidation, so completions
    /// of a superseded acquisition do not clobber newer state.
    generation: u64,
}

/// Deduplicating cache for the subsystem's single bearer credential.
pub struct TokenCache {
    primary: Arc<dyn TokenAcquirer>,
    interactive: Option<Arc<dyn TokenAcquirer>>,
    scopes: Arc<Vec<String>>,
    expected_audience: Arc<String>,
    token_margin: Duration,
    default_lifetime: Duration,
    state: Mutex<CacheState>,
}

impl TokenCache {
    /// Create a cache over a silent primary provider.
    pub fn new(primary: Arc<dyn TokenAcquirer>, config: &UploadConfig) -> Self {
        Self {
            primary,
            interactive: None,
            scopes: Arc::new(config.scopes.clone()),
            expected_audience: Arc::new(config.expected_audience.clone()),
            token_margin: config.token_margin,
            default_lifetime: config.default_token_lifetime,
            state: Mutex::new(CacheState {
                cached: None,
                inflight: None,
                generation: 0,
            }),
        }
    }

    /// Configure the interactive fallback provider.
    pub fn with_interactive(mut self, interactive: Arc<dyn TokenAcquirer>) -> Self {
        self.interactive = Some(interactive);
        self
    }

    /// Return a valid bearer token, acquiring one if necessary.
    ///
    /// A cached token is reused only while it stays valid beyond the
    /// configured safety margin. Concurrent callers share one acquisition.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        let (fut, my_generation) = {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);

            if let Some(token) = &state.cached {
                if self.is_fresh(token) {
                    return Ok(token.value.clone());
                }
                debug!(expires_at = %token.expires_at, "cached token inside safety margin, refreshing");
            }

            match &state.inflight {
                Some(fut) => (fut.clone(), state.generation),
                None => {
                    state.generation += 1;
                    let fut = Self::acquire(
                        self.primary.clone(),
                        self.interactive.clone(),
                        self.scopes.clone(),
                        self.expected_audience.clone(),
                        self.default_lifetime,
                    )
                    .boxed()
                    .shared();
                    state.inflight = Some(fut.clone());
                    (fut, state.generation)
                }
            }
        };

        let result = fut.await;

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.generation == my_generation {
            state.inflight = None;
            match &result {
                Ok(token) => state.cached = Some(token.clone()),
                Err(_) => state.cached = None,
            }
        }

        result.map(|token| token.value)
    }

    /// Drop the cached credential and any in-flight acquisition marker.
    ///
    /// Does not abort the in-flight network call; its eventual result is
    /// simply not read into the cache.
    pub fn invalidate(&self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.cached = None;
        state.inflight = None;
        state.generation += 1;
    }

    fn is_fresh(&self, token: &CachedToken) -> bool {
        let margin =
            chrono::Duration::from_std(self.token_margin).unwrap_or(chrono::Duration::MAX);
        token.expires_at - Utc::now() > margin
    }

    /// One full acquisition: primary, interactive fallback, claim checks,
    /// and at most one interactive scope-upgrade attempt.
    async fn acquire(
        primary: Arc<dyn TokenAcquirer>,
        interactive: Option<Arc<dyn TokenAcquirer>>,
        scopes: Arc<Vec<String>>,
        audience: Arc<String>,
        default_lifetime: Duration,
    ) -> Result<CachedToken, AuthError> {
        let raw = match primary.acquire_token(&scopes).await {
            Ok(raw) => raw,
            Err(err) if err.code.needs_interactive() => {
                let Some(interactive) = &interactive else {
                    return Err(err);
                };
                warn!(code = ?err.code, "silent acquisition failed, falling back to interactive provider");
                interactive.acquire_token(&scopes).await?
            }
            Err(err) => return Err(err),
        };

        match Self::validate_and_stamp(raw, &scopes, &audience, default_lifetime) {
            Ok(token) => Ok(token),
            Err(err)
                if matches!(
                    err.code,
                    AuthErrorCode::WrongAudience | AuthErrorCode::MissingScopes
                ) && interactive.is_some() =>
            {
                // One scope-upgrade attempt before giving up.
                warn!(code = ?err.code, "acquired token failed validation, requesting upgrade interactively");
                let interactive = interactive.as_ref().unwrap_or(&primary);
                let upgraded = interactive.acquire_token(&scopes).await?;
                Self::validate_and_stamp(upgraded, &scopes, &audience, default_lifetime)
            }
            Err(err) => Err(err),
        }
    }

    /// Check audience and scopes and attach an expiry.
    ///
    /// Opaque tokens carry no claims: they skip both checks and get the
    /// configured default lifetime.
    fn validate_and_stamp(
        raw: String,
        scopes: &[String],
        audience: &str,
        default_lifetime: Duration,
    ) -> Result<CachedToken, AuthError> {
        let claims = peek_claims(&raw);

        if let Some(claims) = &claims {
            if let Some(aud) = &claims.audience {
                if aud != audience {
                    return Err(AuthError::new(
                        AuthErrorCode::WrongAudience,
                        format!("token addressed to {aud}, expected {audience}"),
                    ));
                }
            }
            if !claims.scopes.is_empty() && !claims.covers_scopes(scopes) {
                return Err(AuthError::new(
                    AuthErrorCode::MissingScopes,
                    "token is missing required scopes",
                ));
            }
        }

        let default_lifetime =
            chrono::Duration::from_std(default_lifetime).unwrap_or(chrono::Duration::MAX);
        let expires_at = claims
            .and_then(|c| c.expires_at)
            .unwrap_or_else(|| Utc::now() + default_lifetime);

        debug!(%expires_at, "acquired token cached");
        Ok(CachedToken {
            value: raw,
            expires_at,
        })
    }
}
