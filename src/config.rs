// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat configuration
//!
//! Options controlling the system prompt and how a changing reference text
//! is folded into the conversation history.

use serde::{Deserialize, Serialize};

use crate::chat::history::{ReferenceTextPolicy, Role};

/// Default cap on the reference text attached to a turn.
pub const DEFAULT_MAX_REFERENCE_CHARS: usize = 5000;

/// Options for a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    /// System prompt applied before every turn
    pub system_prompt: String,

    /// Reference text longer than this is truncated before sending
    pub max_reference_chars: usize,

    /// Reference-text handling
    pub reference_text: ReferenceTextConfig,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            max_reference_chars: DEFAULT_MAX_REFERENCE_CHARS,
            reference_text: ReferenceTextConfig::default(),
        }
    }
}

/// How reference text is labelled, stored, and replaced in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceTextConfig {
    /// Replacement policy applied when the text changes mid-conversation
    pub policy: ReferenceTextPolicy,

    /// Message header naming the reference text, e.g. "Users current webpage html"
    pub header: String,

    /// Role the carrier message is stored under. Upstream rejects
    /// developer/tool roles for this content today, so the default is User.
    pub carrier_role: Role,

    /// Override for the placeholder left behind under ChangeOldToPlaceholder.
    /// When None a default derived from `header` is used.
    pub placeholder: Option<String>,
}

impl Default for ReferenceTextConfig {
    fn default() -> Self {
        Self {
            policy: ReferenceTextPolicy::ChangeOldToPlaceholder,
            header: "Reference Text".to_string(),
            carrier_role: Role::User,
            placeholder: None,
        }
    }
}

impl ReferenceTextConfig {
    /// Whether reference text handling is active at all.
    pub fn enabled(&self) -> bool {
        self.policy != ReferenceTextPolicy::Disabled
    }

    /// Text left behind where a stale reference text used to be.
    pub fn placeholder_text(&self) -> String {
        self.placeholder.clone().unwrap_or_else(|| {
            format!(
                "The old content for {} was here but changed. It has been removed to shorten history new version found later.",
                self.header
            )
        })
    }
}
