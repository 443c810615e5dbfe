// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Best-effort discovery of a previously issued Copilot OAuth token.
//!
//! IDE integrations (JetBrains, VS Code, Neovim) persist the OAuth token in
//! well-known JSON config files. We scan those locations so users who
//! already signed in elsewhere never see a sign-in prompt.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

const CONFIG_DIR_NAME: &str = "github-copilot";

/// App key our own sign-ins persist under in apps.json.
const PERSIST_APP_KEY: &str = "regexpress";

/// Config files scanned for an `oauth_token`, in priority order:
/// 1. local app data `apps.json` (JetBrains IDEs)
/// 2. roaming config `hosts.json` (older Neovim/VSCode format)
/// 3. `~/.config/github-copilot/apps.json` (cross-platform fallback)
pub fn possible_token_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if let Some(dir) = dirs::data_local_dir() {
        locations.push(dir.join(CONFIG_DIR_NAME).join("apps.json"));
    }
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join(CONFIG_DIR_NAME).join("hosts.json"));
    }
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".config").join(CONFIG_DIR_NAME).join("apps.json"));
    }

    locations
}

/// Scans the conventional config locations and returns the first token
/// found. Unreadable or malformed files are skipped silently.
pub fn discover_token() -> Option<String> {
    discover_token_in(&possible_token_locations())
}

fn discover_token_in(paths: &[PathBuf]) -> Option<String> {
    paths.iter().find_map(|path| {
        let raw = fs::read_to_string(path).ok()?;
        let doc: Value = serde_json::from_str(&raw).ok()?;
        extract_oauth_token(&doc)
    })
}

/// Entries are keyed by app id (apps.json) or host (hosts.json); the token
/// sits one level deep either way.
fn extract_oauth_token(doc: &Value) -> Option<String> {
    doc.as_object()?.values().find_map(|entry| {
        entry
            .get("oauth_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

/// Saves a freshly acquired token to the primary config location so later
/// sessions (and other IDE integrations) can discover it. Failure is logged
/// and swallowed: the token is still usable for this session.
pub fn persist_token(token: &str) {
    let Some(path) = possible_token_locations().into_iter().next() else {
        return;
    };
    if let Err(err) = persist_token_at(&path, token) {
        tracing::warn!(target: "copilot.auth", %err, path = %path.display(), "failed to persist OAuth token");
    }
}

fn persist_token_at(path: &Path, token: &str) -> std::io::Result<()> {
    // Merge with an existing file so unrelated app entries survive.
    let mut doc: Map<String, Value> = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();

    doc.insert(PERSIST_APP_KEY.to_string(), json!({ "oauth_token": token }));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(&Value::Object(doc))?;
    fs::write(path, raw)
}
