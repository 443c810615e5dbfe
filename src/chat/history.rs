// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation transcript and the reference-text replacement state machine.
//!
//! The transcript holds at most one System message. Reference text (an
//! external document the conversation is anchored to) is carried by a
//! dedicated message; when the text changes mid-conversation the configured
//! [`ReferenceTextPolicy`] decides what happens to the stale carrier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ReferenceTextConfig;

/// Code fence wrapping the reference text inside its carrier message.
const REFERENCE_TEXT_CODEBLOCK_DELIM: &str = "\n```\n";

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier for the message
    pub id: Uuid,

    /// Role of the message sender
    pub role: Role,

    /// Content of the message
    pub content: String,

    /// When the message was created
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// What happens to the stale reference-text carrier when the text changes.
///
/// For large reference texts we don't want to keep resending old versions,
/// but every option trades tokens against how much the model can infer
/// about earlier answers. ChangeOldToPlaceholder is likely best.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReferenceTextPolicy {
    /// Reference text handling is off entirely
    Disabled,

    /// Replace the old carrier's content with a short placeholder noting
    /// the text changed, and append the new version at the end
    ChangeOldToPlaceholder,

    /// Leave stale carriers untouched; versions accumulate over the
    /// conversation so the model can see how the text evolved
    LeaveOldInplace,

    /// Rewrite the original carrier where it stands. Changes history
    /// retroactively: earlier answers stay anchored to text that no longer
    /// matches
    UpdateInPlace,

    /// Remove the old carrier entirely and append the new version
    DeleteOld,
}

/// Owns the ordered transcript and keeps it consistent as the system
/// prompt and reference text change underneath it.
pub struct HistoryManager {
    messages: Vec<ChatMessage>,
    reference: ReferenceTextConfig,
    last_system_prompt: Option<String>,
    last_reference_text: String,
}

impl HistoryManager {
    pub fn new(reference: ReferenceTextConfig) -> Self {
        Self {
            messages: Vec::new(),
            reference,
            last_system_prompt: None,
            last_reference_text: String::new(),
        }
    }

    /// The full ordered transcript.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Replaces the System message when the prompt text changed since the
    /// last call. Idempotent unless `force` is set.
    pub fn set_system_prompt(&mut self, prompt: &str, force: bool) {
        if !force && self.last_system_prompt.as_deref() == Some(prompt) {
            return;
        }
        if let Some(at) = self.messages.iter().position(|m| m.role == Role::System) {
            self.messages.remove(at);
        }
        self.messages.push(ChatMessage::system(prompt));
        self.last_system_prompt = Some(prompt.to_string());
    }

    /// Folds a changed reference text into the transcript under the
    /// configured policy. No-op when the policy is Disabled or the text
    /// matches what was last sent.
    pub fn upsert_reference_text(&mut self, text: &str) {
        if self.last_reference_text == text
            || self.reference.policy == ReferenceTextPolicy::Disabled
        {
            return;
        }
        self.last_reference_text = text.to_string();

        let prefix = self.carrier_prefix();
        let content = format!("{prefix}{text}{REFERENCE_TEXT_CODEBLOCK_DELIM}\n");
        let role = self.reference.carrier_role;

        let existing = self
            .messages
            .iter()
            .rposition(|m| m.role == role && m.content.starts_with(&prefix));

        let Some(at) = existing else {
            self.messages.push(ChatMessage::new(role, content));
            return;
        };

        match self.reference.policy {
            ReferenceTextPolicy::UpdateInPlace => {
                // Rewrite where it stands; no new message.
                self.messages[at].content = content;
            }
            ReferenceTextPolicy::ChangeOldToPlaceholder => {
                self.messages[at].content = self.reference.placeholder_text();
                self.messages.push(ChatMessage::new(role, content));
            }
            ReferenceTextPolicy::LeaveOldInplace => {
                self.messages.push(ChatMessage::new(role, content));
            }
            ReferenceTextPolicy::DeleteOld => {
                self.messages.remove(at);
                self.messages.push(ChatMessage::new(role, content));
            }
            // Returned above.
            ReferenceTextPolicy::Disabled => {}
        }
    }

    /// Empties the transcript and reseeds the system message, forgetting
    /// the last-sent reference text. Call when starting a new conversation.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_reference_text.clear();
        let prompt = self.last_system_prompt.clone().unwrap_or_default();
        self.set_system_prompt(&prompt, true);
    }

    /// Prefix identifying a reference-text carrier message.
    pub fn carrier_prefix(&self) -> String {
        format!("{}:{}", self.reference.header, REFERENCE_TEXT_CODEBLOCK_DELIM)
    }
}
