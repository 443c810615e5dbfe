// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Composition of one chat turn.
//!
//! A turn is: keep the system prompt current, fold in the latest reference
//! text, append the user message, call the model with the full transcript,
//! append the reply. The history mutex serializes concurrent turns - the
//! individual upserts are not atomic against interleaving.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::chat::completions::ChatCompletionClient;
use crate::chat::history::{ChatMessage, HistoryManager};
use crate::config::ChatOptions;
use crate::error::TurnError;

pub struct ChatTurnOrchestrator {
    client: Option<Arc<dyn ChatCompletionClient>>,
    history: Mutex<HistoryManager>,
    options: ChatOptions,
}

impl ChatTurnOrchestrator {
    pub fn new(options: ChatOptions) -> Self {
        let history = HistoryManager::new(options.reference_text.clone());
        Self {
            client: None,
            history: Mutex::new(history),
            options,
        }
    }

    /// Wires the completion client. Until this is called every turn fails
    /// with [`TurnError::NotConfigured`].
    pub fn with_client(mut self, client: Arc<dyn ChatCompletionClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Updates the system prompt used for subsequent turns.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.options.system_prompt = prompt.into();
    }

    /// Runs one request/response cycle and returns the assistant reply.
    ///
    /// On failure the user message stays in the transcript so the caller
    /// can retry or edit it.
    pub async fn send_turn(
        &self,
        user_text: &str,
        reference_text: &str,
    ) -> Result<String, TurnError> {
        let Some(client) = self.client.as_ref() else {
            return Err(TurnError::NotConfigured);
        };

        let mut history = self.history.lock().await;
        history.set_system_prompt(&self.options.system_prompt, false);
        history.upsert_reference_text(&truncate_chars(
            reference_text,
            self.options.max_reference_chars,
        ));
        history.push_user(user_text);

        log_transcript(&history);

        let reply = client.complete(history.messages()).await?;
        tracing::debug!(target: "copilot.chat", chars = reply.len(), "assistant reply received");
        history.push_assistant(&reply);
        Ok(reply)
    }

    /// Starts a new conversation, keeping only a fresh system message.
    pub async fn clear_conversation(&self) {
        self.history.lock().await.clear();
    }

    /// Snapshot of the transcript, for persistence or display.
    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.history.lock().await.messages().to_vec()
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn log_transcript(history: &HistoryManager) {
    if tracing::enabled!(target: "copilot.chat", tracing::Level::DEBUG) {
        for message in history.messages() {
            tracing::debug!(
                target: "copilot.chat",
                role = ?message.role,
                content = %message.content,
                "transcript"
            );
        }
    }
}
