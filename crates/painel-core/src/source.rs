// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The remote record source trait abstracting the CRM proxy call surface.
//!
//! Everything Painel knows about the CRM goes through one method-call
//! primitive: `call(method, params)`. The concrete proxy client lives in
//! `painel-bitrix`; tests substitute in-memory fakes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::PainelError;

/// A successful response from the remote record source.
///
/// The list method paginates in fixed-size pages and may include a `next`
/// offset hint; some server implementations omit it even when more data
/// exists, so callers must never rely on its presence alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallResponse {
    /// Method-specific payload (a record array for list calls, an object
    /// with `result_total` for batch calls, field metadata for schema calls).
    #[serde(default)]
    pub result: Value,

    /// Offset of the next page, when the source chooses to report one.
    #[serde(default)]
    pub next: Option<u64>,

    /// Total matching record count, when the source reports one.
    #[serde(default)]
    pub total: Option<u64>,
}

/// Remote procedure call surface of the CRM, as exposed by the proxy.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Invokes a CRM REST method with the given parameters.
    ///
    /// Implementations must map explicit `{error, error_description}`
    /// payloads to [`PainelError::Remote`] rather than returning them as
    /// results.
    async fn call(&self, method: &str, params: Value) -> Result<CallResponse, PainelError>;
}
