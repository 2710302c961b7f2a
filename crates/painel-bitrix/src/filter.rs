// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API-native filter expressions.
//!
//! The CRM filters with operator-prefixed keys in a JSON object:
//! `>=FIELD`/`<FIELD` for ranges, `=FIELD` for equality, `!FIELD` with an
//! array for not-in-set, and a nested `{LOGIC: "OR", ...}` object for
//! disjunction. Date windows always serialize as the half-open pair
//! `>= startOfDay(start)` / `< startOfDay(end + 1 day)`; see
//! [`painel_core::ReportWindow`] for why the inclusive variant is avoided.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use painel_core::{PainelError, ReportWindow};
use serde_json::{Map, Value, json};

/// Formats a filter boundary the way the CRM expects (`YYYY-MM-DD HH:MM:SS`).
pub fn format_boundary(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// A filter expression, built key by key, ANDed together by the remote.
///
/// Entry order is preserved so built filters serialize deterministically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpr {
    entries: Vec<(String, Value)>,
}

impl FilterExpr {
    /// Half-open window constraint on a date field.
    ///
    /// A window with `start > end` produces crossed bounds (`>= X` and
    /// `< Y` with `Y <= X`), which match nothing; that is the documented
    /// contract-violation behavior, never a silent bound swap.
    pub fn window(field: &str, window: &ReportWindow) -> Self {
        Self {
            entries: vec![
                (
                    format!(">={field}"),
                    Value::String(format_boundary(window.start_bound())),
                ),
                (
                    format!("<{field}"),
                    Value::String(format_boundary(window.end_bound())),
                ),
            ],
        }
    }

    /// Open-ended lower bound on a date field (used for the scan pre-filter).
    pub fn at_or_after(field: &str, floor: NaiveDate) -> Self {
        Self {
            entries: vec![(
                format!(">={field}"),
                Value::String(format_boundary(floor.and_time(NaiveTime::MIN))),
            )],
        }
    }

    /// Adds an equality constraint, ANDed with the existing entries.
    pub fn and_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.entries.push((format!("={field}"), value.into()));
        self
    }

    /// Adds a not-in-set constraint, ANDed with the existing entries.
    pub fn and_not_in(mut self, field: &str, values: &[String]) -> Self {
        self.entries.push((
            format!("!{field}"),
            Value::Array(values.iter().map(|v| Value::String(v.clone())).collect()),
        ));
        self
    }

    /// Combines two filters with OR, for callers matching either of two
    /// independent field windows.
    pub fn either(a: Self, b: Self) -> Self {
        Self {
            entries: vec![
                ("LOGIC".to_string(), json!("OR")),
                ("0".to_string(), a.into_value()),
                ("1".to_string(), b.into_value()),
            ],
        }
    }

    /// Serializes to the JSON object the list method's `filter` param takes.
    pub fn into_value(self) -> Value {
        Value::Object(self.entries.into_iter().collect::<Map<_, _>>())
    }

    /// Serializes to flat `filter[KEY]=value` query pairs for batch command
    /// strings. Array values expand to indexed keys; nested OR filters have
    /// no flat encoding and are rejected.
    pub fn to_query_pairs(&self) -> Result<Vec<(String, String)>, PainelError> {
        let mut pairs = Vec::new();
        for (key, value) in &self.entries {
            match value {
                Value::String(s) => pairs.push((format!("filter[{key}]"), s.clone())),
                Value::Number(n) => pairs.push((format!("filter[{key}]"), n.to_string())),
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        let text = item
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| item.to_string());
                        pairs.push((format!("filter[{key}][{i}]"), text));
                    }
                }
                _ => {
                    return Err(PainelError::Internal(format!(
                        "filter key `{key}` cannot be encoded as flat query pairs"
                    )));
                }
            }
        }
        Ok(pairs)
    }
}
