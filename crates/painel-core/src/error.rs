// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Painel metrics service.

use thiserror::Error;

/// The primary error type used across all Painel crates.
#[derive(Debug, Error)]
pub enum PainelError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The proxy or remote CRM call failed (network, non-2xx, or an explicit
    /// `{error, error_description}` payload).
    #[error("remote call error: {message}")]
    Remote {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote call exceeded the request timeout.
    #[error("remote call timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A metrics fetch was requested while one was already in flight.
    ///
    /// Expected under periodic/manual trigger races; callers treat it as a
    /// benign no-op, not a failure.
    #[error("a metrics fetch is already in progress")]
    FetchBusy,

    /// Internal or unexpected errors (malformed remote payloads, logic bugs).
    #[error("internal error: {0}")]
    Internal(String),
}

impl PainelError {
    /// Shorthand for a remote error without an underlying source.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true for the benign "fetch already in progress" signal.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::FetchBusy)
    }
}
