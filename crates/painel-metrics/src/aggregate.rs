// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The aggregation engine: raw records or raw counts in, [`MetricsSummary`] out.
//!
//! Two strategies exist because the remote offers two shapes of answer:
//!
//! - **Counting** ([`build_count_plan`] + [`CountPlan::summary_from`]): one
//!   batched call of count-only sub-queries. Cheap, no record transfer, but
//!   the counting endpoint returns scalar totals and cannot group.
//! - **Folding** ([`fold_records`]): fetch every candidate record and fold
//!   client-side. Required whenever the per-city breakdown is on.
//!
//! The sent and released checks on a record are independent: one record may
//! count toward both metrics in the same cycle.

use std::collections::{BTreeMap, HashMap, HashSet};

use painel_bitrix::{CountQuery, FilterExpr};
use painel_core::{MetricsSummary, PainelError, Record, RecordFields, ReportWindow, Tally};

/// Batch sub-query name for the overall sent count.
pub const SENT_TOTAL: &str = "sent_total";
/// Batch sub-query name for the overall released count.
pub const RELEASED_TOTAL: &str = "released_total";

/// Inputs for one client-side fold cycle.
#[derive(Debug)]
pub struct FoldParams<'a> {
    pub sent_window: ReportWindow,
    pub released_window: ReportWindow,
    /// CRM user id to display name, for per-responsible attribution.
    pub responsible_by_id: &'a HashMap<i64, String>,
    /// Status values that must never count as "sent".
    pub excluded_statuses: &'a HashSet<String>,
    /// Pre-resolved category labels; `Some` enables the city breakdown.
    pub city_labels: Option<&'a HashMap<String, String>>,
}

/// Folds a record set into a fresh summary (Strategy B).
///
/// Records with an unknown or absent assigned user count in the grand
/// totals but in no per-responsible bucket; that asymmetry is the
/// attribution contract, not a bug. Known responsible users always appear
/// in the map, zeroed when they matched nothing.
pub fn fold_records(records: &[Record], params: &FoldParams<'_>) -> MetricsSummary {
    let mut summary = MetricsSummary {
        by_city: params.city_labels.map(|_| BTreeMap::new()),
        ..MetricsSummary::default()
    };
    for name in params.responsible_by_id.values() {
        summary.by_responsible.insert(name.clone(), Tally::default());
    }

    for record in records {
        if let Some(sent_at) = record.sent_at {
            let excluded = record
                .status
                .as_deref()
                .is_some_and(|s| params.excluded_statuses.contains(s));
            if !excluded && params.sent_window.contains(sent_at) {
                summary.total_sent += 1;
                if let Some(name) = record
                    .assigned_user_id
                    .and_then(|id| params.responsible_by_id.get(&id))
                {
                    summary.by_responsible.entry(name.clone()).or_default().sent += 1;
                }
                if let (Some(cities), Some(category)) =
                    (summary.by_city.as_mut(), record.category_id.as_deref())
                {
                    cities.entry(city_label(params, category)).or_default().sent += 1;
                }
            }
        }

        if let Some(released_at) = record.released_at
            && params.released_window.contains(released_at)
        {
            summary.total_released += 1;
            if let Some(name) = record
                .assigned_user_id
                .and_then(|id| params.responsible_by_id.get(&id))
            {
                summary
                    .by_responsible
                    .entry(name.clone())
                    .or_default()
                    .released += 1;
            }
            if let (Some(cities), Some(category)) =
                (summary.by_city.as_mut(), record.category_id.as_deref())
            {
                cities
                    .entry(city_label(params, category))
                    .or_default()
                    .released += 1;
            }
        }
    }

    summary
}

/// Unresolved category ids stay visible under their raw id.
fn city_label(params: &FoldParams<'_>, category: &str) -> String {
    params
        .city_labels
        .and_then(|labels| labels.get(category))
        .cloned()
        .unwrap_or_else(|| category.to_string())
}

/// The typed batch plan for one counting cycle (Strategy A):
/// `2 + 2 × |responsible users|` count-only sub-queries plus the key
/// bookkeeping needed to reassemble the summary from the totals map.
#[derive(Debug)]
pub struct CountPlan {
    pub queries: Vec<CountQuery>,
    per_user: Vec<PerUserKeys>,
}

#[derive(Debug)]
struct PerUserKeys {
    name: String,
    sent_key: String,
    released_key: String,
}

/// Builds the count plan for the given windows and responsible users.
///
/// The sent-side sub-queries embed the status exclusion as a `!FIELD`
/// filter so both strategies agree on totals.
pub fn build_count_plan(
    fields: &RecordFields,
    sent_window: &ReportWindow,
    released_window: &ReportWindow,
    responsible: &BTreeMap<String, i64>,
    excluded_statuses: &[String],
) -> CountPlan {
    let sent_filter = || {
        let filter = FilterExpr::window(&fields.sent, sent_window);
        if excluded_statuses.is_empty() {
            filter
        } else {
            filter.and_not_in(&fields.status, excluded_statuses)
        }
    };
    let released_filter = || FilterExpr::window(&fields.released, released_window);

    let mut queries = vec![
        CountQuery::new(SENT_TOTAL, sent_filter()),
        CountQuery::new(RELEASED_TOTAL, released_filter()),
    ];
    let mut per_user = Vec::with_capacity(responsible.len());
    for (name, id) in responsible {
        let sent_key = format!("sent_{}", slug(name));
        let released_key = format!("released_{}", slug(name));
        queries.push(CountQuery::new(
            sent_key.clone(),
            sent_filter().and_eq("ASSIGNED_BY_ID", *id),
        ));
        queries.push(CountQuery::new(
            released_key.clone(),
            released_filter().and_eq("ASSIGNED_BY_ID", *id),
        ));
        per_user.push(PerUserKeys {
            name: name.clone(),
            sent_key,
            released_key,
        });
    }

    CountPlan { queries, per_user }
}

impl CountPlan {
    /// Assembles a summary from the batch totals. No city breakdown: the
    /// counting endpoint cannot group.
    pub fn summary_from(&self, counts: &BTreeMap<String, u64>) -> Result<MetricsSummary, PainelError> {
        let take = |key: &str| {
            counts
                .get(key)
                .copied()
                .ok_or_else(|| PainelError::Internal(format!("count plan key `{key}` missing")))
        };

        let mut summary = MetricsSummary {
            total_sent: take(SENT_TOTAL)?,
            total_released: take(RELEASED_TOTAL)?,
            ..MetricsSummary::default()
        };
        for user in &self.per_user {
            summary.by_responsible.insert(
                user.name.clone(),
                Tally {
                    sent: take(&user.sent_key)?,
                    released: take(&user.released_key)?,
                },
            );
        }
        Ok(summary)
    }
}

/// Batch command names must stay within `[a-z0-9_]`.
fn slug(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
