// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types: CRM records and the aggregated metrics summary.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

/// Identifiers of the CRM custom fields a deployment maps its dates,
/// status, and city classification onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFields {
    /// Field holding the "sent" timestamp.
    pub sent: String,
    /// Field holding the "released" timestamp.
    pub released: String,
    /// Field holding the enum-like status string.
    pub status: String,
    /// Field holding the city/category reference id.
    pub city: String,
}

/// A read-only snapshot of one CRM record, fetched fresh every cycle and
/// discarded after folding. Never created or mutated by this system.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub assigned_user_id: Option<i64>,
    pub sent_at: Option<NaiveDateTime>,
    pub released_at: Option<NaiveDateTime>,
    pub category_id: Option<String>,
    pub status: Option<String>,
}

impl Record {
    /// Parses a raw list-method entry into a [`Record`].
    ///
    /// The remote serializes absent custom fields as `null`, `""`, or
    /// `false`, and numeric ids as either numbers or strings; all of those
    /// shapes are tolerated. Unparseable timestamps read as absent.
    pub fn from_value(raw: &Value, fields: &RecordFields) -> Self {
        Self {
            id: scalar_string(raw.get("ID")).unwrap_or_default(),
            assigned_user_id: scalar_i64(raw.get("ASSIGNED_BY_ID")),
            sent_at: scalar_string(raw.get(fields.sent.as_str()))
                .as_deref()
                .and_then(parse_crm_timestamp),
            released_at: scalar_string(raw.get(fields.released.as_str()))
                .as_deref()
                .and_then(parse_crm_timestamp),
            category_id: scalar_string(raw.get(fields.city.as_str())),
            status: scalar_string(raw.get(fields.status.as_str())),
        }
    }
}

/// Parses a CRM timestamp string into a naive local timestamp.
///
/// The remote emits ISO-8601 with a zone offset on reads but accepts
/// `YYYY-MM-DD HH:MM:SS` in filters; date-only values mean midnight. The
/// zone offset is dropped rather than converted: window comparisons happen
/// in the CRM's local time.
pub fn parse_crm_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

/// Reads a JSON scalar as a non-empty string, tolerating numbers.
fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a JSON scalar as an i64, tolerating stringified numbers.
fn scalar_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Per-bucket sent/released counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub sent: u64,
    pub released: u64,
}

/// The aggregation engine's sole output.
///
/// Created fresh each cycle, immutable once published, and superseded
/// wholesale by the next cycle's result. Grand totals include records whose
/// assigned user is unknown or absent; those records appear in no
/// per-responsible bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_sent: u64,
    pub total_released: u64,
    pub by_responsible: BTreeMap<String, Tally>,
    /// Present only when the city breakdown is enabled.
    pub by_city: Option<BTreeMap<String, Tally>>,
}
