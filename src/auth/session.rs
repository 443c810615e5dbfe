// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Short-lived session token exchange and caching.
//!
//! The long-lived OAuth token never talks to the chat API directly; it is
//! exchanged for a session token bound to a dynamic API endpoint. Session
//! tokens expire within minutes-to-hours, so renewal happens transparently
//! before every use, behind a single-flight guard.

use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::AuthError;
use crate::http;

/// Tokens this close to nominal expiry are treated as already expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Short-lived API credential obtained by exchanging the OAuth token.
/// Carries the dynamic endpoint all API requests must target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Token sent as `Authorization: Bearer` on API requests
    pub token: String,

    /// Base URL for `/models`, `/chat/completions`, etc.
    pub api_endpoint: String,

    /// Unix timestamp when the token expires
    pub expires_at: i64,
}

impl SessionToken {
    /// Whether the token has expired or is about to (60 second buffer).
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.expires_at - EXPIRY_BUFFER_SECS
    }

    /// Remaining seconds until nominal expiry.
    pub fn remaining_seconds(&self) -> i64 {
        (self.expires_at - chrono::Utc::now().timestamp()).max(0)
    }

    pub fn models_url(&self) -> String {
        format!("{}/models", self.api_endpoint)
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_endpoint)
    }

    /// Alternative responses API on the same endpoint.
    pub fn responses_url(&self) -> String {
        format!("{}/responses", self.api_endpoint)
    }
}

/// Exchanges a long-lived OAuth token for session tokens and caches the
/// result.
///
/// Renewal is single-flight: the cache lock is held across the whole
/// exchange (check, network call, store) and released only when the
/// operation completes, so N concurrent callers produce exactly one
/// upstream request and all observe its result. A failed exchange releases
/// the lock normally; later callers retry rather than block forever.
pub struct SessionTokenManager {
    client: reqwest::Client,
    exchange_url: String,
    cached: Mutex<Option<SessionToken>>,
}

impl Default for SessionTokenManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTokenManager {
    pub fn new() -> Self {
        Self::with_exchange_url(crate::auth::token_exchange_url(None))
    }

    /// Manager for a GitHub Enterprise deployment.
    pub fn for_enterprise(enterprise_uri: &str) -> Self {
        Self::with_exchange_url(crate::auth::token_exchange_url(Some(enterprise_uri)))
    }

    pub fn with_exchange_url(exchange_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            exchange_url: exchange_url.into(),
            cached: Mutex::new(None),
        }
    }

    /// Returns a non-expired session token, exchanging the OAuth token for
    /// a fresh one only when the cache is empty or stale. A cached valid
    /// token is returned without any network traffic.
    pub async fn ensure_valid(&self, oauth_token: &str) -> Result<SessionToken, AuthError> {
        if oauth_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        // Held across the exchange: late joiners wait for the in-flight
        // request instead of issuing their own.
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.clone());
            }
        }

        let fresh = self.exchange(oauth_token).await?;
        tracing::debug!(
            target: "copilot.auth",
            remaining = fresh.remaining_seconds(),
            endpoint = %fresh.api_endpoint,
            "session token refreshed"
        );
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drops the cached token, forcing the next call to re-exchange. Used
    /// when a downstream call reports the session as rejected.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Primes the cache, e.g. with a token restored from a previous run.
    pub async fn seed(&self, token: SessionToken) {
        *self.cached.lock().await = Some(token);
    }

    /// Current cached token, expired or not.
    pub async fn cached(&self) -> Option<SessionToken> {
        self.cached.lock().await.clone()
    }

    async fn exchange(&self, oauth_token: &str) -> Result<SessionToken, AuthError> {
        // The long-lived credential uses the `token` scheme; `Bearer` is
        // reserved for the session token itself.
        let request = self
            .client
            .get(&self.exchange_url)
            .header("Accept", "application/json")
            .header("Authorization", format!("token {oauth_token}"))
            .timeout(http::REQUEST_TIMEOUT);

        let response = http::apply_copilot_headers(request)
            .send()
            .await
            .map_err(AuthError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 => AuthError::InvalidOrExpired,
                403 => AuthError::AccessDenied,
                code => {
                    let body = response.text().await.unwrap_or_default();
                    AuthError::Other(format!("token exchange failed ({code}): {body}"))
                }
            });
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|err| AuthError::MalformedResponse(err.to_string()))?;
        parse_session_token(&doc)
    }
}

fn parse_session_token(doc: &Value) -> Result<SessionToken, AuthError> {
    let token = doc.get("token").and_then(Value::as_str).unwrap_or_default();
    let api_endpoint = doc
        .pointer("/endpoints/api")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if token.is_empty() || api_endpoint.is_empty() {
        return Err(AuthError::MalformedResponse(
            "token exchange response missing required fields".to_string(),
        ));
    }

    Ok(SessionToken {
        token: token.to_string(),
        api_endpoint: api_endpoint.to_string(),
        expires_at: doc.get("expires_at").and_then(Value::as_i64).unwrap_or(0),
    })
}
