// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! High-level Copilot provider facade.
//!
//! Ties token discovery, interactive sign-in, session management, and the
//! model catalog together behind the handful of operations a host
//! application actually performs: connect, sign in, refresh models.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::{discovery, DeviceAuthorization, DeviceFlow, SessionToken, SessionTokenManager};
use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::error::AuthError;
use crate::Result;

pub struct CopilotProvider {
    sessions: Arc<SessionTokenManager>,
    catalog: ModelCatalog,
    oauth_token: Option<String>,
    auto_discover: bool,
}

impl Default for CopilotProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CopilotProvider {
    pub fn new() -> Self {
        Self::with_sessions(Arc::new(SessionTokenManager::new()))
    }

    /// Provider against a GitHub Enterprise deployment.
    pub fn for_enterprise(enterprise_uri: &str) -> Self {
        Self::with_sessions(Arc::new(SessionTokenManager::for_enterprise(enterprise_uri)))
    }

    pub fn with_sessions(sessions: Arc<SessionTokenManager>) -> Self {
        Self {
            sessions,
            catalog: ModelCatalog::new(),
            oauth_token: None,
            auto_discover: true,
        }
    }

    /// Disables the config-file scan; a token must then be supplied
    /// explicitly or acquired via [`Self::sign_in`].
    pub fn auto_discover_enabled(mut self, enabled: bool) -> Self {
        self.auto_discover = enabled;
        self
    }

    pub fn set_oauth_token(&mut self, token: impl Into<String>) {
        self.oauth_token = Some(token.into());
    }

    pub fn oauth_token(&self) -> Option<&str> {
        self.oauth_token.as_deref()
    }

    /// Shared session manager, for building a
    /// [`crate::chat::CopilotChatClient`] on the same credentials.
    pub fn sessions(&self) -> Arc<SessionTokenManager> {
        Arc::clone(&self.sessions)
    }

    /// Scans IDE config files for an existing OAuth token and stores the
    /// first one found. Returns whether a token was discovered.
    pub async fn auto_discover(&mut self) -> bool {
        self.sessions.invalidate().await;

        let found = tokio::task::spawn_blocking(discovery::discover_token)
            .await
            .ok()
            .flatten();

        match found {
            Some(token) => {
                tracing::info!(target: "copilot.auth", "OAuth token auto-discovered");
                self.oauth_token = Some(token);
                true
            }
            None => {
                tracing::warn!(
                    target: "copilot.auth",
                    "no OAuth token found in config files; sign-in required"
                );
                false
            }
        }
    }

    /// Runs the interactive device flow and stores the resulting token.
    pub async fn sign_in<F>(
        &mut self,
        on_code: F,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), AuthError>
    where
        F: FnOnce(&DeviceAuthorization),
    {
        let token = DeviceFlow::new().authenticate(on_code, cancel).await?;
        self.oauth_token = Some(token);
        self.sessions.invalidate().await;
        Ok(())
    }

    /// Ensures a working session, auto-discovering a token first when
    /// allowed and none is set.
    pub async fn connect(&mut self) -> std::result::Result<SessionToken, AuthError> {
        if self.auto_discover && self.oauth_token.is_none() {
            self.auto_discover().await;
        }
        let Some(token) = self.oauth_token.clone() else {
            return Err(AuthError::MissingToken);
        };
        self.sessions.ensure_valid(&token).await
    }

    /// Fetches the current model catalog. A failed fetch drops the cached
    /// session token so the next attempt re-exchanges from scratch.
    pub async fn refresh_models(&mut self) -> Result<Vec<ModelDescriptor>> {
        let session = self.connect().await?;

        match self.catalog.fetch_models(&session).await {
            Ok(models) => {
                tracing::info!(target: "copilot.catalog", count = models.len(), "discovered models");
                Ok(models)
            }
            Err(err) => {
                self.sessions.invalidate().await;
                Err(err.into())
            }
        }
    }
}
