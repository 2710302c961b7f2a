// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batched count-only requests.
//!
//! One `batch` call bundles N independent list sub-queries, each with
//! `start = -1` ("return no rows, just the total"). Totals are read
//! exclusively from the response's `result_total` map, keyed by sub-query
//! name: the per-command `result` entries are observed to be empty even
//! when the totals map is fully populated, so they are never consulted.

use std::collections::BTreeMap;

use painel_core::{PainelError, RecordSource};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::filter::FilterExpr;
use crate::methods;

/// One named count-only sub-query of a batch call.
///
/// Modeling these as a typed list (instead of ad-hoc string-keyed command
/// maps) keeps the sub-query names and the totals lookup in one place.
#[derive(Debug, Clone)]
pub struct CountQuery {
    pub name: String,
    pub filter: FilterExpr,
}

impl CountQuery {
    pub fn new(name: impl Into<String>, filter: FilterExpr) -> Self {
        Self {
            name: name.into(),
            filter,
        }
    }

    /// Renders the sub-query as a batch command string:
    /// `crm.contact.list?start=-1&filter[...]=...`.
    pub fn command(&self) -> Result<String, PainelError> {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("start", "-1");
        for (key, value) in self.filter.to_query_pairs()? {
            query.append_pair(&key, &value);
        }
        Ok(format!("{}?{}", methods::LIST, query.finish()))
    }
}

/// Issues one batch call and returns the totals keyed by sub-query name.
///
/// Every requested name must appear in `result_total`; a missing entry is a
/// remote contract violation, not a zero.
pub async fn count_batch(
    source: &dyn RecordSource,
    queries: &[CountQuery],
) -> Result<BTreeMap<String, u64>, PainelError> {
    let mut cmd = Map::new();
    for query in queries {
        cmd.insert(query.name.clone(), Value::String(query.command()?));
    }
    debug!(sub_queries = queries.len(), "dispatching batched count call");

    let response = source
        .call(methods::BATCH, json!({ "halt": 0, "cmd": cmd }))
        .await?;
    let totals = response
        .result
        .get("result_total")
        .and_then(Value::as_object)
        .ok_or_else(|| PainelError::remote("batch response has no result_total section"))?;

    let mut counts = BTreeMap::new();
    for query in queries {
        let value = totals.get(&query.name).ok_or_else(|| {
            PainelError::remote(format!("batch totals missing entry `{}`", query.name))
        })?;
        let count = value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| {
                PainelError::remote(format!(
                    "batch total `{}` is not a count: {value}",
                    query.name
                ))
            })?;
        counts.insert(query.name.clone(), count);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProxyClient;
    use painel_config::CrmConfig;
    use painel_core::ReportWindow;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sent_window_filter() -> FilterExpr {
        let window = ReportWindow::new(
            chrono::NaiveDate::from_ymd_opt(2025, 9, 8).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 9, 8).unwrap(),
        );
        FilterExpr::window("UF_CRM_SENT", &window)
    }

    fn test_client(base_url: &str) -> ProxyClient {
        let config = CrmConfig {
            proxy_url: "http://unused.invalid".into(),
            timeout_secs: 5,
            rate_limit_ms: 0,
            page_size: 50,
        };
        ProxyClient::from_config(&config)
            .unwrap()
            .with_base_url(base_url.to_string())
    }

    #[test]
    fn command_encodes_count_only_query() {
        let query = CountQuery::new("sent_total", sent_window_filter());
        let command = query.command().unwrap();
        assert!(command.starts_with("crm.contact.list?start=-1&"));
        assert!(command.contains("2025-09-08+00%3A00%3A00"), "got: {command}");
        assert!(command.contains("2025-09-09+00%3A00%3A00"), "got: {command}");
    }

    #[tokio::test]
    async fn totals_come_from_result_total_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "batch"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    // Per-command results empty; only the totals map counts.
                    "result": {},
                    "result_total": {"sent_total": 4, "released_total": "7"}
                }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let queries = vec![
            CountQuery::new("sent_total", sent_window_filter()),
            CountQuery::new("released_total", sent_window_filter()),
        ];
        let counts = count_batch(&client, &queries).await.unwrap();
        assert_eq!(counts.get("sent_total"), Some(&4));
        assert_eq!(counts.get("released_total"), Some(&7));
    }

    #[tokio::test]
    async fn missing_total_entry_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"result_total": {"sent_total": 4}}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let queries = vec![
            CountQuery::new("sent_total", sent_window_filter()),
            CountQuery::new("released_total", sent_window_filter()),
        ];
        let err = count_batch(&client, &queries).await.unwrap_err();
        assert!(err.to_string().contains("released_total"), "got: {err}");
    }

    #[tokio::test]
    async fn absent_result_total_section_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"result": {"result": {}}})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let queries = vec![CountQuery::new("sent_total", sent_window_filter())];
        let err = count_batch(&client, &queries).await.unwrap_err();
        assert!(err.to_string().contains("result_total"), "got: {err}");
    }
}
