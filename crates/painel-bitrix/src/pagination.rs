// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pagination walker for the record list endpoint.
//!
//! Retrieves the complete record set for client-side aggregation by walking
//! pages until exhaustion. Termination uses a dual condition, whichever
//! comes first: a page shorter than the page size, or an absent next-offset
//! hint. Some server implementations omit the hint even when more data
//! exists, so relying on hint presence alone can loop forever or truncate.

use painel_core::{PainelError, RecordSource};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::filter::FilterExpr;
use crate::methods;

/// Parameters of a record list request, minus the page offset.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filter: Option<FilterExpr>,
    pub select: Vec<String>,
    pub order: Option<(String, String)>,
}

impl ListQuery {
    /// A query selecting the given fields, unfiltered and unordered.
    pub fn selecting<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            select: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_order(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        self.order = Some((field.into(), direction.into()));
        self
    }

    /// Builds the list method params for one page at the given offset.
    pub fn params(&self, start: u64) -> Value {
        let mut params = Map::new();
        params.insert("start".to_string(), json!(start));
        if let Some(filter) = &self.filter {
            params.insert("filter".to_string(), filter.clone().into_value());
        }
        if !self.select.is_empty() {
            params.insert("select".to_string(), json!(self.select));
        }
        if let Some((field, direction)) = &self.order {
            params.insert("order".to_string(), json!({ field: direction }));
        }
        Value::Object(params)
    }
}

/// Walks the list endpoint until exhaustion and returns all pages
/// concatenated in source order, without de-duplication.
///
/// Pages are fetched strictly sequentially: page N's next-offset hint
/// determines page N+1's request. Any page failure aborts the walk and
/// propagates; the caller discards whatever was accumulated (no
/// partial-result contract).
pub async fn fetch_all_pages(
    source: &dyn RecordSource,
    query: &ListQuery,
    page_size: usize,
) -> Result<Vec<Value>, PainelError> {
    let mut records = Vec::new();
    let mut start = 0u64;
    let mut pages = 0u32;

    loop {
        let response = source.call(methods::LIST, query.params(start)).await?;
        let page = match response.result {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(PainelError::remote(format!(
                    "list result is not an array: {other}"
                )));
            }
        };

        let page_len = page.len();
        pages += 1;
        debug!(page = pages, page_len, start, "list page fetched");
        records.extend(page);

        if page_len < page_size {
            break;
        }
        match response.next {
            Some(next) => start = next,
            None => {
                // A full page with no continuation hint may mask more data,
                // but an unbounded loop is worse. Stop and leave a trace.
                warn!(
                    page = pages,
                    page_len, "full page without a next-offset hint; treating as exhausted"
                );
                break;
            }
        }
    }

    debug!(total = records.len(), pages, "pagination walk complete");
    Ok(records)
}
