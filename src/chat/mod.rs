// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation state and turn orchestration.

pub mod completions;
pub mod history;
pub mod orchestrator;

pub use completions::{ChatCompletionClient, CopilotChatClient};
pub use history::{ChatMessage, HistoryManager, ReferenceTextPolicy, Role};
pub use orchestrator::ChatTurnOrchestrator;
