// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Interactive acquisition of a long-lived OAuth token via the GitHub
//! device flow.
//!
//! The caller displays the user code and verification URI (via the
//! progress callback), the user authorizes in a browser, and we poll the
//! token endpoint until it hands out an access token or the code expires.
//! The poll loop is a seconds-to-minutes suspend-and-retry cycle and must
//! stay cancellable at every suspension point.

use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::auth::{discovery, COPILOT_CLIENT_ID, GITHUB_ACCESS_TOKEN_URL, GITHUB_DEVICE_CODE_URL};
use crate::error::AuthError;

const DEFAULT_EXPIRES_IN_SECS: u64 = 900;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Backoff added when the server answers `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

const OAUTH_SCOPE: &str = "read:user";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Pending authorization to display to the user while the poll loop runs.
/// Lives only for the duration of one authentication attempt.
#[derive(Debug, Clone)]
pub struct DeviceAuthorization {
    /// Code the user enters on the verification page
    pub user_code: String,

    /// Page the user authorizes on
    pub verification_uri: String,

    /// Seconds until the device code expires
    pub expires_in: u64,

    /// Server-requested seconds between polls
    pub interval: u64,

    device_code: String,
}

/// Polling OAuth device-flow authenticator.
pub struct DeviceFlow {
    client: reqwest::Client,
    device_code_url: String,
    access_token_url: String,
    client_id: String,
    persist_on_success: bool,
}

impl Default for DeviceFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceFlow {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            device_code_url: GITHUB_DEVICE_CODE_URL.to_string(),
            access_token_url: GITHUB_ACCESS_TOKEN_URL.to_string(),
            client_id: COPILOT_CLIENT_ID.to_string(),
            persist_on_success: true,
        }
    }

    /// Override the OAuth endpoints (GitHub Enterprise hosts, tests).
    pub fn with_endpoints(
        device_code_url: impl Into<String>,
        access_token_url: impl Into<String>,
    ) -> Self {
        Self {
            device_code_url: device_code_url.into(),
            access_token_url: access_token_url.into(),
            ..Self::new()
        }
    }

    /// Whether a successful sign-in is written back to the local config
    /// store. On by default.
    pub fn persist_on_success(mut self, persist: bool) -> Self {
        self.persist_on_success = persist;
        self
    }

    /// Runs the full device flow. `on_code` is invoked exactly once, as
    /// soon as the user code is known, so the caller can display it and
    /// open the verification page. Cancelling `cancel` aborts the poll
    /// loop promptly at its next suspension point.
    pub async fn authenticate<F>(
        &self,
        on_code: F,
        cancel: &CancellationToken,
    ) -> Result<String, AuthError>
    where
        F: FnOnce(&DeviceAuthorization),
    {
        let authorization = self.request_device_authorization().await?;
        on_code(&authorization);
        self.poll_for_token(&authorization, cancel).await
    }

    async fn request_device_authorization(&self) -> Result<DeviceAuthorization, AuthError> {
        let response = self
            .client
            .post(&self.device_code_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", OAUTH_SCOPE),
            ])
            .send()
            .await
            .map_err(AuthError::transport)?;

        if !response.status().is_success() {
            return Err(AuthError::Network(format!(
                "failed to initiate device flow: HTTP {}",
                response.status().as_u16()
            )));
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|err| AuthError::MalformedResponse(err.to_string()))?;

        let device_code = require_str(&doc, "device_code")?;
        let user_code = require_str(&doc, "user_code")?;
        let verification_uri = require_str(&doc, "verification_uri")?;

        Ok(DeviceAuthorization {
            user_code,
            verification_uri,
            expires_in: doc
                .get("expires_in")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            interval: doc
                .get("interval")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            device_code,
        })
    }

    async fn poll_for_token(
        &self,
        authorization: &DeviceAuthorization,
        cancel: &CancellationToken,
    ) -> Result<String, AuthError> {
        let deadline = Instant::now() + Duration::from_secs(authorization.expires_in);
        let mut interval = Duration::from_secs(authorization.interval);

        while Instant::now() < deadline {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                _ = sleep(interval) => {}
            }

            let response = self
                .client
                .post(&self.access_token_url)
                .header("Accept", "application/json")
                .form(&[
                    ("client_id", self.client_id.as_str()),
                    ("device_code", authorization.device_code.as_str()),
                    ("grant_type", DEVICE_CODE_GRANT),
                ])
                .send()
                .await
                .map_err(AuthError::transport)?;

            let doc: Value = response
                .json()
                .await
                .map_err(|err| AuthError::MalformedResponse(err.to_string()))?;

            match classify_poll_response(&doc) {
                PollOutcome::Granted(token) => {
                    tracing::info!(target: "copilot.auth", "device flow authentication complete");
                    if self.persist_on_success {
                        discovery::persist_token(&token);
                    }
                    return Ok(token);
                }
                PollOutcome::Pending => {}
                PollOutcome::SlowDown => interval += SLOW_DOWN_STEP,
                PollOutcome::Denied => return Err(AuthError::Denied),
                PollOutcome::Expired => return Err(AuthError::Expired),
                PollOutcome::Failed(code) => return Err(AuthError::Other(code)),
            }
        }

        Err(AuthError::Expired)
    }
}

fn require_str(doc: &Value, field: &str) -> Result<String, AuthError> {
    doc.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AuthError::MalformedResponse(format!("{field} missing from response")))
}

/// What a single poll of the token endpoint told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    Granted(String),
    Pending,
    SlowDown,
    Denied,
    Expired,
    Failed(String),
}

pub(crate) fn classify_poll_response(doc: &Value) -> PollOutcome {
    if let Some(token) = doc.get("access_token").and_then(Value::as_str) {
        return PollOutcome::Granted(token.to_string());
    }
    match doc.get("error").and_then(Value::as_str) {
        Some("authorization_pending") => PollOutcome::Pending,
        Some("slow_down") => PollOutcome::SlowDown,
        Some("expired_token") => PollOutcome::Expired,
        Some("access_denied") => PollOutcome::Denied,
        Some(code) => PollOutcome::Failed(code.to_string()),
        // Neither a token nor an error: keep polling.
        None => PollOutcome::Pending,
    }
}
