// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! City/category label resolution with process-lifetime caching.
//!
//! The city dimension on a record is an opaque enumeration item id; the
//! human-readable labels live in the CRM schema. The resolver fetches the
//! full id-to-label mapping once and caches it for the process lifetime,
//! including a negative "lookup failed" state so repeated failures do not
//! hammer the remote. Unresolved ids fall back to the raw id string, so
//! unknown cities stay visible instead of being dropped.

use std::collections::HashMap;
use std::sync::Arc;

use painel_core::{PainelError, RecordSource};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::methods;

#[derive(Debug)]
enum CacheState {
    Loaded(HashMap<String, String>),
    Unavailable,
}

/// Resolves city enumeration ids to display labels.
pub struct CityResolver {
    source: Arc<dyn RecordSource>,
    field: String,
    cache: Mutex<Option<CacheState>>,
}

impl CityResolver {
    /// Creates a resolver for the given enumeration field id.
    pub fn new(source: Arc<dyn RecordSource>, field: impl Into<String>) -> Self {
        Self {
            source,
            field: field.into(),
            cache: Mutex::new(None),
        }
    }

    /// Resolves one id, falling back to the id itself when unknown or when
    /// the schema lookup previously failed.
    pub async fn resolve(&self, id: &str) -> String {
        let guard = self.ensure_loaded().await;
        match guard.as_ref() {
            Some(CacheState::Loaded(labels)) => {
                labels.get(id).cloned().unwrap_or_else(|| id.to_string())
            }
            _ => id.to_string(),
        }
    }

    /// Resolves a set of distinct ids in one pass, for pre-resolving every
    /// category seen in a cycle before folding.
    pub async fn resolve_all<'a, I>(&self, ids: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let guard = self.ensure_loaded().await;
        let lookup = |id: &str| match guard.as_ref() {
            Some(CacheState::Loaded(labels)) => {
                labels.get(id).cloned().unwrap_or_else(|| id.to_string())
            }
            _ => id.to_string(),
        };
        ids.into_iter().map(|id| (id.to_string(), lookup(id))).collect()
    }

    /// Populates the cache on first use. Holding the lock across the fetch
    /// keeps concurrent first callers from issuing duplicate schema calls.
    async fn ensure_loaded(&self) -> tokio::sync::MutexGuard<'_, Option<CacheState>> {
        let mut guard = self.cache.lock().await;
        if guard.is_none() {
            match self.fetch_labels().await {
                Ok(labels) => {
                    info!(field = %self.field, labels = labels.len(), "city labels loaded");
                    *guard = Some(CacheState::Loaded(labels));
                }
                Err(e) => {
                    warn!(field = %self.field, error = %e, "city label lookup failed; raw ids will be shown");
                    *guard = Some(CacheState::Unavailable);
                }
            }
        }
        guard
    }

    async fn fetch_labels(&self) -> Result<HashMap<String, String>, PainelError> {
        let response = self.source.call(methods::FIELDS, json!({})).await?;
        let field = response.result.get(&self.field).ok_or_else(|| {
            PainelError::remote(format!("schema has no field `{}`", self.field))
        })?;
        let items = field.get("items").and_then(Value::as_array).ok_or_else(|| {
            PainelError::remote(format!("field `{}` has no enumeration items", self.field))
        })?;

        let mut labels = HashMap::new();
        for item in items {
            let id = match item.get("ID") {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => continue,
            };
            if let Some(label) = item.get("VALUE").and_then(Value::as_str) {
                labels.insert(id, label.to_string());
            }
        }
        Ok(labels)
    }
}
