// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model catalog retrieval and normalization.
//!
//! The models endpoint has shipped two response shapes over time: a bare
//! array of model objects and an object wrapping the array under `data`.
//! Parsing tolerates both, and a malformed entry is dropped without
//! aborting the rest of the catalog.

use serde_json::Value;

use crate::auth::SessionToken;
use crate::error::CatalogError;
use crate::http;

/// Immutable snapshot of one callable model. The catalog as a whole is
/// replaced on each fetch; descriptors are never merged incrementally.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub id: String,

    /// Cleaned display name (preview/beta markers stripped)
    pub name: String,

    pub vendor: Option<String>,

    /// Capability family, e.g. "gpt-4o"
    pub family: Option<String>,

    /// Billing multiplier relative to the base model rate
    pub token_multiplier: Option<f64>,

    pub max_input_tokens: Option<u64>,
    pub max_output_tokens: Option<u64>,

    pub is_preview: bool,
    pub is_beta: bool,
}

impl ModelDescriptor {
    /// Name decorated with cost and stability tags for a model picker,
    /// e.g. `GPT-4o [1x]` or `Claude Opus [10x, Preview]`.
    pub fn display_name(&self) -> String {
        let mut tags: Vec<String> = Vec::new();

        // Token multiplier first, it is the "cost".
        if let Some(multiplier) = self.token_multiplier {
            if multiplier == 0.0 {
                tags.push("free".to_string());
            } else if multiplier == 1.0 {
                tags.push("1x".to_string());
            } else {
                tags.push(format!("{multiplier}x"));
            }
        }

        if self.is_beta {
            tags.push("Beta".to_string());
        } else if self.is_preview {
            tags.push("Preview".to_string());
        }

        if tags.is_empty() {
            self.name.clone()
        } else {
            format!("{} [{}]", self.name, tags.join(", "))
        }
    }

    /// Multi-line metadata summary suitable for a tooltip.
    pub fn tooltip(&self) -> String {
        let mut lines = vec![format!("ID: {}", self.id)];

        if let Some(vendor) = &self.vendor {
            lines.push(format!("Vendor: {vendor}"));
        }
        if let Some(family) = &self.family {
            lines.push(format!("Family: {family}"));
        }
        if let Some(multiplier) = self.token_multiplier {
            lines.push(format!("Token Rate: {multiplier}x"));
        }
        if let Some(max) = self.max_input_tokens {
            lines.push(format!("Max Input: {max} tokens"));
        }
        if let Some(max) = self.max_output_tokens {
            lines.push(format!("Max Output: {max} tokens"));
        }

        if self.is_beta {
            lines.push("Beta - may be unstable".to_string());
        } else if self.is_preview {
            lines.push("Preview - subject to change".to_string());
        }

        lines.join("\n")
    }
}

/// Fetches the list of callable models from the session endpoint.
pub struct ModelCatalog {
    client: reqwest::Client,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Retrieves the models available to this session, filtered, cleaned,
    /// and sorted. The returned list replaces any previous snapshot.
    pub async fn fetch_models(
        &self,
        session: &SessionToken,
    ) -> Result<Vec<ModelDescriptor>, CatalogError> {
        let request = self
            .client
            .get(session.models_url())
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", session.token))
            .timeout(http::REQUEST_TIMEOUT);

        let response = http::apply_copilot_headers(request)
            .send()
            .await
            .map_err(CatalogError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 => CatalogError::InvalidOrExpired,
                403 => CatalogError::AccessDenied,
                code => CatalogError::Upstream(code),
            });
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|err| CatalogError::MalformedResponse(err.to_string()))?;

        let models = parse_catalog(&doc);
        tracing::debug!(target: "copilot.catalog", count = models.len(), "model catalog fetched");
        Ok(models)
    }
}

/// Accepts either a bare array of model objects or `{"data": [...]}`.
pub(crate) fn parse_catalog(doc: &Value) -> Vec<ModelDescriptor> {
    let empty = Vec::new();
    let entries = match doc {
        Value::Array(entries) => entries,
        _ => doc.get("data").and_then(Value::as_array).unwrap_or(&empty),
    };

    let mut models: Vec<ModelDescriptor> = entries.iter().filter_map(parse_entry).collect();
    sort_models(&mut models);
    models
}

/// Parses one catalog entry. Returns None for entries that are filtered
/// out (disabled, hidden from the picker, no id) or whose shape is not
/// usable, so one bad entry never aborts the whole fetch.
fn parse_entry(entry: &Value) -> Option<ModelDescriptor> {
    let id = entry.get("id").and_then(Value::as_str).unwrap_or_default();
    if id.is_empty() {
        return None;
    }

    if let Some(state) = entry.pointer("/policy/state").and_then(Value::as_str) {
        if state != "enabled" {
            return None;
        }
    }

    if entry.get("model_picker_enabled").and_then(Value::as_bool) == Some(false) {
        return None;
    }

    let mut model = ModelDescriptor {
        id: id.to_string(),
        name: entry.get("name").and_then(Value::as_str).unwrap_or(id).to_string(),
        vendor: entry
            .get("vendor")
            .and_then(Value::as_str)
            .map(str::to_string),
        family: entry
            .pointer("/capabilities/family")
            .and_then(Value::as_str)
            .map(str::to_string),
        token_multiplier: entry.pointer("/billing/multiplier").and_then(Value::as_f64),
        max_input_tokens: entry
            .pointer("/capabilities/limits/max_prompt_tokens")
            .and_then(Value::as_u64),
        max_output_tokens: entry
            .pointer("/capabilities/limits/max_output_tokens")
            .and_then(Value::as_u64),
        // Premium models are surfaced as preview.
        is_preview: entry
            .pointer("/billing/is_premium")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        is_beta: false,
    };

    // Default chat models are never preview.
    if entry.get("is_chat_default").and_then(Value::as_bool) == Some(true) {
        model.is_preview = false;
    }

    if model.name.to_ascii_lowercase().contains("beta") {
        model.is_beta = true;
    }
    model.name = scrub_name(&model.name);

    Some(model)
}

/// Strips the preview/beta markers upstream bakes into display names.
fn scrub_name(name: &str) -> String {
    let mut cleaned = name.to_string();
    for tag in ["(preview)", "(beta)", "preview", "beta"] {
        cleaned = remove_ignore_ascii_case(&cleaned, tag);
    }
    let mut cleaned = cleaned.trim().to_string();
    while cleaned.contains("  ") {
        cleaned = cleaned.replace("  ", " ");
    }
    cleaned
}

fn remove_ignore_ascii_case(haystack: &str, needle: &str) -> String {
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut at = 0;
    while let Some(found) = lower_haystack[at..].find(&lower_needle) {
        out.push_str(&haystack[at..at + found]);
        at += found + lower_needle.len();
    }
    out.push_str(&haystack[at..]);
    out
}

/// Stable three-key sort: generally-available models first, then cheaper
/// (missing multiplier counts as 1.0), then by name.
fn sort_models(models: &mut [ModelDescriptor]) {
    models.sort_by(|a, b| {
        (a.is_beta || a.is_preview)
            .cmp(&(b.is_beta || b.is_preview))
            .then_with(|| {
                a.token_multiplier
                    .unwrap_or(1.0)
                    .total_cmp(&b.token_multiplier.unwrap_or(1.0))
            })
            .then_with(|| a.name.cmp(&b.name))
    });
}
