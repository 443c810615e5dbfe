// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shared HTTP plumbing for Copilot API calls.

use reqwest::RequestBuilder;
use std::time::Duration;

/// Timeout applied to authenticated API requests.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Headers upstream requires verbatim on every authenticated call.
pub(crate) const COPILOT_HEADERS: [(&str, &str); 4] = [
    ("User-Agent", "GitHubCopilotChat/0.24.2025012401"),
    ("Copilot-Integration-Id", "vscode-chat"),
    ("Editor-Version", "vscode/1.103.2"),
    ("x-github-api-version", "2025-05-01"),
];

pub(crate) fn apply_copilot_headers(mut request: RequestBuilder) -> RequestBuilder {
    for (name, value) in COPILOT_HEADERS {
        request = request.header(name, value);
    }
    request
}
