// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Painel metrics service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Defaults reflect the known deployment: the CRM
//! custom-field ids, the five responsible users, and the status values that
//! must never count as "sent".

use std::collections::BTreeMap;

use painel_core::RecordFields;
use serde::{Deserialize, Serialize};

/// Top-level Painel configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to the known
/// deployment's values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PainelConfig {
    /// CRM proxy endpoint and call pacing.
    #[serde(default)]
    pub crm: CrmConfig,

    /// CRM custom-field identifiers.
    #[serde(default)]
    pub fields: FieldsConfig,

    /// Responsible users (the per-user grouping dimension).
    #[serde(default)]
    pub team: TeamConfig,

    /// Aggregation behavior.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// CRM proxy endpoint and call pacing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrmConfig {
    /// URL of the server-side proxy that forwards `{method, params}` calls.
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum interval between remote calls, in milliseconds.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    /// List page size. The remote caps pages at 50; larger values only
    /// break the walker's termination check.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            proxy_url: default_proxy_url(),
            timeout_secs: default_timeout_secs(),
            rate_limit_ms: default_rate_limit_ms(),
            page_size: default_page_size(),
        }
    }
}

fn default_proxy_url() -> String {
    "http://localhost:3000/api/crm-proxy".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_ms() -> u64 {
    500
}

fn default_page_size() -> usize {
    50
}

/// CRM custom-field identifiers for the date, status, and city dimensions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FieldsConfig {
    /// "Sent" date field.
    #[serde(default = "default_sent_field")]
    pub sent: String,

    /// "Released" date field.
    #[serde(default = "default_released_field")]
    pub released: String,

    /// Status field.
    #[serde(default = "default_status_field")]
    pub status: String,

    /// City/region enumeration field.
    #[serde(default = "default_city_field")]
    pub city: String,
}

impl FieldsConfig {
    /// Converts to the core field-id bundle used by record parsing.
    pub fn record_fields(&self) -> RecordFields {
        RecordFields {
            sent: self.sent.clone(),
            released: self.released.clone(),
            status: self.status.clone(),
            city: self.city.clone(),
        }
    }
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            sent: default_sent_field(),
            released: default_released_field(),
            status: default_status_field(),
            city: default_city_field(),
        }
    }
}

fn default_sent_field() -> String {
    "UF_CRM_1659459001630".to_string()
}

fn default_released_field() -> String {
    "UF_CRM_1669498023605".to_string()
}

fn default_status_field() -> String {
    "UF_CRM_1659459407558".to_string()
}

fn default_city_field() -> String {
    "UF_CRM_1660064582829".to_string()
}

/// Responsible users, `display name -> CRM user id`.
///
/// Immutable for the process lifetime; the design supports an arbitrary set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TeamConfig {
    #[serde(default = "default_responsible")]
    pub responsible: BTreeMap<String, i64>,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            responsible: default_responsible(),
        }
    }
}

fn default_responsible() -> BTreeMap<String, i64> {
    BTreeMap::from([
        ("Carolini Braguini".to_string(), 4984),
        ("Melissa".to_string(), 4986),
        ("Beatriz Angelo".to_string(), 4988),
        ("Fernanda Raphaelly".to_string(), 4990),
        ("Kerolay Oliveira".to_string(), 4992),
    ])
}

/// Aggregation behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Status values that must never count as "sent" even when a sent date
    /// is present. Opaque business configuration, not interpreted.
    #[serde(default = "default_excluded_statuses")]
    pub excluded_statuses: Vec<String>,

    /// Enables the per-city breakdown. Forces the full-scan aggregation
    /// strategy, since the remote counting endpoint cannot group.
    #[serde(default)]
    pub city_breakdown: bool,

    /// Periodic refresh interval in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Optional `YYYY-MM-DD` lower bound pre-filtering the full scan to
    /// records whose sent or released date is at or after it. Unset means
    /// a full scan.
    #[serde(default)]
    pub scan_floor: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            excluded_statuses: default_excluded_statuses(),
            city_breakdown: false,
            poll_interval_secs: default_poll_interval_secs(),
            scan_floor: None,
        }
    }
}

fn default_excluded_statuses() -> Vec<String> {
    vec![
        "Confirmar".to_string(),
        "Cancelado".to_string(),
        "Abrindo MEI".to_string(),
    ]
}

fn default_poll_interval_secs() -> u64 {
    30
}
