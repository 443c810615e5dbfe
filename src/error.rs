// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for copilot-chat
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for copilot-chat operations
#[derive(Error, Debug)]
pub enum CopilotError {
    /// Authentication and credential lifecycle errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Model catalog errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Chat turn errors
    #[error("Chat error: {0}")]
    Turn(#[from] TurnError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Credential acquisition and session exchange errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Server unreachable or transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out. Kept separate from Network because the caller's
    /// remediation advice differs.
    #[error("Request timed out. Please check your internet connection.")]
    Timeout,

    /// The long-lived OAuth token was rejected
    #[error("OAuth token is invalid or expired. Please re-authenticate.")]
    InvalidOrExpired,

    /// The account has no Copilot entitlement
    #[error("Access denied. Your GitHub account may not have Copilot access.")]
    AccessDenied,

    /// The user rejected the device-flow authorization
    #[error("Authentication was denied by the user.")]
    Denied,

    /// The device-flow code expired before the user authorized it
    #[error("Authentication timed out. Please try again.")]
    Expired,

    /// The device flow was cancelled by the caller
    #[error("Authentication was cancelled.")]
    Cancelled,

    /// No long-lived token is available to exchange
    #[error("No OAuth token available. Please provide a token or enable auto-discovery.")]
    MissingToken,

    /// The server answered with a shape we cannot use
    #[error("Malformed response from server: {0}")]
    MalformedResponse(String),

    /// Any other upstream-reported error code
    #[error("Authentication error: {0}")]
    Other(String),
}

/// Model catalog fetch errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Server unreachable or transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Request timed out. Please check your internet connection.")]
    Timeout,

    /// The session token was rejected
    #[error("API token is invalid or expired. Please re-authenticate with Copilot.")]
    InvalidOrExpired,

    /// The subscription has no access to the models API
    #[error("Access denied. Your Copilot subscription may not have access to this API.")]
    AccessDenied,

    /// Any other non-success status
    #[error("API error: {0}")]
    Upstream(u16),

    /// The response body was not usable JSON
    #[error("Failed to parse API response: {0}")]
    MalformedResponse(String),
}

/// Chat turn errors
#[derive(Error, Debug)]
pub enum TurnError {
    /// No completion client has been wired
    #[error("AI service not configured. Please check provider settings.")]
    NotConfigured,

    /// Session renewal failed before the request was sent
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The completion endpoint reported an error
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Server unreachable or transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Request timed out. Please check your internet connection.")]
    Timeout,

    /// The response body was not usable
    #[error("Malformed response from server: {0}")]
    MalformedResponse(String),
}

impl AuthError {
    /// Maps a transport failure, keeping timeouts distinct.
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

impl CatalogError {
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout
        } else {
            CatalogError::Network(err.to_string())
        }
    }
}

impl TurnError {
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TurnError::Timeout
        } else {
            TurnError::Network(err.to_string())
        }
    }
}

/// Result type alias for copilot-chat operations
pub type Result<T> = std::result::Result<T, CopilotError>;
