// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record retrieval for spreadsheet export.
//!
//! Serialization of the export itself is a separate collaborator; this
//! module only produces the complete, ordered record list the exporter
//! consumes, via the pagination walker.

use painel_core::{PainelError, Record, RecordFields, RecordSource, ReportWindow};
use serde_json::Value;

use crate::filter::FilterExpr;
use crate::pagination::{ListQuery, fetch_all_pages};

/// Built-in contact fields included in every export.
pub const EXPORT_BASE_SELECT: &[&str] = &[
    "ID",
    "NAME",
    "SECOND_NAME",
    "LAST_NAME",
    "PHONE",
    "EMAIL",
    "ASSIGNED_BY_ID",
    "DATE_CREATE",
];

fn export_select(fields: &RecordFields) -> Vec<String> {
    EXPORT_BASE_SELECT
        .iter()
        .map(|f| f.to_string())
        .chain([
            fields.sent.clone(),
            fields.released.clone(),
            fields.status.clone(),
            fields.city.clone(),
        ])
        .collect()
}

/// List query for records whose sent date falls in the window,
/// newest first.
pub fn export_query(fields: &RecordFields, window: &ReportWindow) -> ListQuery {
    ListQuery::selecting(export_select(fields))
        .with_filter(FilterExpr::window(&fields.sent, window))
        .with_order("ID", "DESC")
}

/// List query for records matching the sent window OR the released window.
pub fn export_query_either_window(
    fields: &RecordFields,
    sent: &ReportWindow,
    released: &ReportWindow,
) -> ListQuery {
    ListQuery::selecting(export_select(fields))
        .with_filter(FilterExpr::either(
            FilterExpr::window(&fields.sent, sent),
            FilterExpr::window(&fields.released, released),
        ))
        .with_order("ID", "DESC")
}

/// Fetches the full export record set for the sent window.
pub async fn export_records(
    source: &dyn RecordSource,
    fields: &RecordFields,
    window: &ReportWindow,
    page_size: usize,
) -> Result<Vec<Value>, PainelError> {
    fetch_all_pages(source, &export_query(fields, window), page_size).await
}

/// Parses raw export rows into typed records (used by callers that need the
/// parsed view rather than the raw spreadsheet columns).
pub fn parse_export_rows(rows: &[Value], fields: &RecordFields) -> Vec<Record> {
    rows.iter().map(|row| Record::from_value(row, fields)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fields() -> RecordFields {
        RecordFields {
            sent: "UF_CRM_SENT".into(),
            released: "UF_CRM_RELEASED".into(),
            status: "UF_CRM_STATUS".into(),
            city: "UF_CRM_CITY".into(),
        }
    }

    fn window() -> ReportWindow {
        ReportWindow::new(
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 8).unwrap(),
        )
    }

    #[test]
    fn export_query_selects_contact_and_custom_fields() {
        let query = export_query(&fields(), &window());
        assert!(query.select.iter().any(|f| f == "PHONE"));
        assert!(query.select.iter().any(|f| f == "UF_CRM_STATUS"));
        assert_eq!(query.order, Some(("ID".to_string(), "DESC".to_string())));

        let params = query.params(0);
        assert_eq!(params["filter"][">=UF_CRM_SENT"], "2025-09-01 00:00:00");
        assert_eq!(params["filter"]["<UF_CRM_SENT"], "2025-09-09 00:00:00");
    }

    #[test]
    fn either_window_query_builds_or_filter() {
        let released = ReportWindow::new(
            NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 31).unwrap(),
        );
        let query = export_query_either_window(&fields(), &window(), &released);
        let params = query.params(0);
        assert_eq!(params["filter"]["LOGIC"], "OR");
        assert_eq!(params["filter"]["0"][">=UF_CRM_SENT"], "2025-09-01 00:00:00");
        assert_eq!(
            params["filter"]["1"]["<UF_CRM_RELEASED"],
            "2025-09-01 00:00:00"
        );
    }

    #[test]
    fn parse_export_rows_produces_typed_records() {
        let rows = vec![serde_json::json!({
            "ID": "9",
            "ASSIGNED_BY_ID": 4984,
            "UF_CRM_SENT": "2025-09-08 10:00:00"
        })];
        let records = parse_export_rows(&rows, &fields());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "9");
        assert_eq!(records[0].assigned_user_id, Some(4984));
    }
}
