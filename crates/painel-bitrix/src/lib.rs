// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bitrix24-style CRM access for Painel.
//!
//! Implements the remote half of the metrics engine: the proxy HTTP client
//! (with the shared rate limiter), API-native filter expressions, the
//! pagination walker, batched count requests, the cached city resolver, and
//! export record retrieval. Everything funnels through the single
//! `call(method, params)` primitive defined in `painel-core`.

pub mod batch;
pub mod client;
pub mod export;
pub mod filter;
pub mod pagination;
pub mod schema;

pub use batch::{CountQuery, count_batch};
pub use client::{ProxyClient, RateLimiter};
pub use export::{export_query, export_records};
pub use filter::FilterExpr;
pub use pagination::{ListQuery, fetch_all_pages};
pub use schema::CityResolver;

/// CRM REST method names used by this crate.
pub mod methods {
    /// Paginated record list (supports `filter`, `select`, `order`, `start`).
    pub const LIST: &str = "crm.contact.list";
    /// Field metadata lookup, including enumeration items.
    pub const FIELDS: &str = "crm.contact.fields";
    /// Batched sub-calls with a `result_total` totals map.
    pub const BATCH: &str = "batch";
}
