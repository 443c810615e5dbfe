// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Remote chat-completion call against the session endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::SessionTokenManager;
use crate::chat::history::{ChatMessage, Role};
use crate::error::TurnError;
use crate::http;

/// Seam between the turn orchestrator and the remote model.
#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    /// Sends the full ordered transcript and returns the assistant reply.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, TurnError>;
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Copilot-backed completion client. Renews the session token through the
/// shared manager before every call, so a turn never goes out with a stale
/// credential.
pub struct CopilotChatClient {
    client: reqwest::Client,
    sessions: Arc<SessionTokenManager>,
    oauth_token: String,
    model: String,
}

impl CopilotChatClient {
    pub fn new(
        sessions: Arc<SessionTokenManager>,
        oauth_token: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            sessions,
            oauth_token: oauth_token.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn wire_role(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[async_trait]
impl ChatCompletionClient for CopilotChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, TurnError> {
        let session = self.sessions.ensure_valid(&self.oauth_token).await?;

        let body = CompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: Self::wire_role(m.role),
                    content: &m.content,
                })
                .collect(),
        };

        let request = self
            .client
            .post(session.chat_completions_url())
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", session.token))
            .timeout(http::REQUEST_TIMEOUT)
            .json(&body);

        let response = http::apply_copilot_headers(request)
            .send()
            .await
            .map_err(TurnError::transport)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            if status == 401 {
                // A rejected session token is stale; drop it so the next
                // turn re-exchanges.
                self.sessions.invalidate().await;
            }
            let message = response.text().await.unwrap_or_default();
            return Err(TurnError::Upstream { status, message });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|err| TurnError::MalformedResponse(err.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                TurnError::MalformedResponse("completion response contained no choices".to_string())
            })
    }
}
