//! Bearer-token claim peeking.
//!
//! The token cache needs three claims from an acquired token: the expiry
//! (`exp`), the audience (`aud`), and the granted scopes (`scp`). This is
//! not signature validation — the upstream validates the token; we only
//! read the payload segment to drive cache lifetime and scope checks.
//!
//! Opaque (non three-segment) tokens yield [`None`], in which case the
//! cache falls back to its configured default lifetime and skips the
//! audience/scope checks.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};

/// Claims peeked out of a bearer token payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenClaims {
    /// Expiry instant from the `exp` claim.
    pub expires_at: Option<DateTime<Utc>>,

    /// Audience from the `aud` claim.
    pub audience: Option<String>,

    /// Granted scopes from the space-separated `scp` claim.
    pub scopes: Vec<String>,
}

impl TokenClaims {
    /// Whether every required scope was granted.
    ///
    /// Required scopes are often fully-qualified resource URIs while the
    /// `scp` claim carries bare scope names, so the comparison accepts a
    /// granted scope that matches the last path segment of a requirement.
    pub fn covers_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|req| {
            let short = req.rsplit('/').next().unwrap_or(req);
            self.scopes.iter().any(|s| s == req || s == short)
        })
    }
}

/// Decode the payload segment of a three-segment bearer token.
///
/// Returns `None` for opaque tokens or undecodable payloads.
pub fn peek_claims(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let (_, payload, _) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;

    let expires_at = value
        .get("exp")
        .and_then(|v| v.as_i64())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    let audience = value
        .get("aud")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let scopes = value
        .get("scp")
        .and_then(|v| v.as_str())
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    Some(TokenClaims {
        expires_at,
        audience,
        scopes,
    })
}
