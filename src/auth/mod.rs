// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Credential acquisition and session lifecycle for the Copilot API.
//!
//! The flow is two-step:
//! 1. a long-lived OAuth token, discovered from IDE config files or acquired
//!    interactively via the GitHub device flow
//! 2. a short-lived session token + dynamic API endpoint, obtained by
//!    exchanging the OAuth token and renewed single-flight on expiry

pub mod device_flow;
pub mod discovery;
pub mod session;

pub use device_flow::{DeviceAuthorization, DeviceFlow};
pub use session::{SessionToken, SessionTokenManager};

/// OAuth client id of the VS Code Copilot extension.
pub(crate) const COPILOT_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";

pub(crate) const GITHUB_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub(crate) const GITHUB_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub(crate) const GITHUB_TOKEN_EXCHANGE_URL: &str =
    "https://api.github.com/copilot_internal/v2/token";

/// Token-exchange URL, honoring an optional GitHub Enterprise deployment
/// (e.g. `https://github.mycompany.com`).
pub fn token_exchange_url(enterprise_uri: Option<&str>) -> String {
    match enterprise_uri {
        None | Some("") => GITHUB_TOKEN_EXCHANGE_URL.to_string(),
        Some(uri) => format!("https://api.{}/copilot_internal/v2/token", parse_domain(uri)),
    }
}

/// Extracts the bare domain from an enterprise URI.
fn parse_domain(uri: &str) -> &str {
    let uri = uri.trim_end_matches('/');
    let uri = strip_scheme(uri, "https://");
    let uri = strip_scheme(uri, "http://");
    uri.split('/').next().unwrap_or(uri)
}

fn strip_scheme<'a>(uri: &'a str, scheme: &str) -> &'a str {
    match uri.get(..scheme.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(scheme) => &uri[scheme.len()..],
        _ => uri,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_exchange_url_default() {
        assert_eq!(
            token_exchange_url(None),
            "https://api.github.com/copilot_internal/v2/token"
        );
        assert_eq!(
            token_exchange_url(Some("")),
            "https://api.github.com/copilot_internal/v2/token"
        );
    }

    #[test]
    fn test_token_exchange_url_enterprise() {
        assert_eq!(
            token_exchange_url(Some("https://github.mycompany.com")),
            "https://api.github.mycompany.com/copilot_internal/v2/token"
        );
    }

    #[test]
    fn test_parse_domain_strips_scheme_and_path() {
        assert_eq!(parse_domain("https://github.example.com/org/repo"), "github.example.com");
        assert_eq!(parse_domain("http://github.example.com/"), "github.example.com");
        assert_eq!(parse_domain("github.example.com"), "github.example.com");
    }

    #[test]
    fn test_parse_domain_case_insensitive_scheme() {
        assert_eq!(parse_domain("HTTPS://Github.Example.Com"), "Github.Example.Com");
    }
}
