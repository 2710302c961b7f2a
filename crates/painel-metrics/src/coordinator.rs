// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fetch coordinator: owns the published summary, the dashboard
//! filters, and the single-flight refresh discipline.
//!
//! At most one aggregation cycle runs at a time. A refresh requested while
//! one is in flight fails fast with [`PainelError::FetchBusy`] instead of
//! queueing; the periodic driver and the filter-change path both treat that
//! as benign. A failed cycle never touches the published summary, so
//! readers keep seeing the last good data.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Local, NaiveDate, Utc};
use painel_bitrix::pagination::{ListQuery, fetch_all_pages};
use painel_bitrix::schema::CityResolver;
use painel_bitrix::{FilterExpr, count_batch};
use painel_config::PainelConfig;
use painel_core::{MetricsSummary, PainelError, Record, RecordFields, RecordSource, ReportWindow};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::aggregate::{FoldParams, build_count_plan, fold_records};

/// The two independent reporting windows a dashboard session selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardFilters {
    pub sent_window: ReportWindow,
    pub released_window: ReportWindow,
}

impl DashboardFilters {
    /// Both windows set to the current local date.
    pub fn today() -> Self {
        let today = Local::now().date_naive();
        Self {
            sent_window: ReportWindow::single_day(today),
            released_window: ReportWindow::single_day(today),
        }
    }
}

/// A partial filter update; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterPatch {
    pub sent_window: Option<ReportWindow>,
    pub released_window: Option<ReportWindow>,
}

/// Coordinates aggregation cycles and publishes their results.
///
/// Readers never block on a running cycle: the summary and last-update
/// timestamp are lock-free swaps, and [`Coordinator::subscribe`] gives a
/// watch channel that ticks once per successful publish.
pub struct Coordinator {
    source: Arc<dyn RecordSource>,
    resolver: Option<Arc<CityResolver>>,
    fields: RecordFields,
    responsible: BTreeMap<String, i64>,
    responsible_by_id: HashMap<i64, String>,
    excluded_list: Vec<String>,
    excluded_set: HashSet<String>,
    scan_floor: Option<NaiveDate>,
    page_size: usize,
    poll_interval: std::time::Duration,
    city_breakdown: bool,
    in_flight: AtomicBool,
    summary: ArcSwap<MetricsSummary>,
    last_update: ArcSwapOption<DateTime<Utc>>,
    filters: Mutex<DashboardFilters>,
    updates: watch::Sender<u64>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Builds a coordinator from validated configuration.
    ///
    /// `resolver` is required when the city breakdown is enabled; the
    /// mismatch is a wiring error reported as [`PainelError::Config`].
    pub fn new(
        source: Arc<dyn RecordSource>,
        resolver: Option<Arc<CityResolver>>,
        config: &PainelConfig,
    ) -> Result<Self, PainelError> {
        if config.metrics.city_breakdown && resolver.is_none() {
            return Err(PainelError::Config(
                "city breakdown enabled but no city resolver was provided".into(),
            ));
        }
        let scan_floor = config
            .metrics
            .scan_floor
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    PainelError::Config(format!("metrics.scan_floor `{raw}` is not a date"))
                })
            })
            .transpose()?;

        let responsible = config.team.responsible.clone();
        let responsible_by_id = responsible
            .iter()
            .map(|(name, id)| (*id, name.clone()))
            .collect();
        let excluded_list = config.metrics.excluded_statuses.clone();
        let excluded_set = excluded_list.iter().cloned().collect();

        let (updates, _) = watch::channel(0);
        Ok(Self {
            source,
            resolver,
            fields: config.fields.record_fields(),
            responsible,
            responsible_by_id,
            excluded_list,
            excluded_set,
            scan_floor,
            page_size: config.crm.page_size,
            poll_interval: std::time::Duration::from_secs(config.metrics.poll_interval_secs),
            city_breakdown: config.metrics.city_breakdown,
            in_flight: AtomicBool::new(false),
            summary: ArcSwap::from_pointee(MetricsSummary::default()),
            last_update: ArcSwapOption::empty(),
            filters: Mutex::new(DashboardFilters::today()),
            updates,
        })
    }

    /// The most recently published summary.
    pub fn summary(&self) -> Arc<MetricsSummary> {
        self.summary.load_full()
    }

    /// When the last successful cycle published, if any has.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update.load_full().map(|ts| *ts)
    }

    /// A receiver that changes once per successful publish.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// The filters the next cycle will aggregate over.
    pub async fn current_filters(&self) -> DashboardFilters {
        *self.filters.lock().await
    }

    /// Applies a filter change and immediately refreshes.
    ///
    /// A concurrent in-flight cycle makes the refresh a no-op; the new
    /// windows still take effect on the next cycle.
    pub async fn set_filters(self: &Arc<Self>, patch: FilterPatch) {
        {
            let mut filters = self.filters.lock().await;
            if let Some(window) = patch.sent_window {
                filters.sent_window = window;
            }
            if let Some(window) = patch.released_window {
                filters.released_window = window;
            }
        }
        match self.refresh().await {
            Ok(()) => {}
            Err(e) if e.is_busy() => {
                debug!("filter change while a cycle is in flight; next cycle picks it up");
            }
            Err(e) => warn!(error = %e, "refresh after filter change failed"),
        }
    }

    /// Runs one aggregation cycle and publishes the result.
    ///
    /// Returns [`PainelError::FetchBusy`] without touching the remote when a
    /// cycle is already running.
    pub async fn refresh(&self) -> Result<(), PainelError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PainelError::FetchBusy);
        }

        let started = Instant::now();
        let filters = *self.filters.lock().await;
        let result = self.run_cycle(filters).await;
        self.in_flight.store(false, Ordering::Release);

        let summary = result?;
        info!(
            total_sent = summary.total_sent,
            total_released = summary.total_released,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "metrics cycle published"
        );
        self.summary.store(Arc::new(summary));
        self.last_update.store(Some(Arc::new(Utc::now())));
        self.updates.send_modify(|n| *n += 1);
        Ok(())
    }

    /// Drives periodic refreshes until the process exits.
    ///
    /// Busy ticks are skipped quietly; failed cycles are logged and the
    /// previously published summary stays up.
    pub async fn run_periodic(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.refresh().await {
                Ok(()) => {}
                Err(e) if e.is_busy() => debug!("periodic tick skipped; cycle in flight"),
                Err(e) => warn!(error = %e, "periodic metrics cycle failed"),
            }
        }
    }

    async fn run_cycle(&self, filters: DashboardFilters) -> Result<MetricsSummary, PainelError> {
        if self.city_breakdown {
            self.fold_cycle(filters).await
        } else {
            self.count_cycle(filters).await
        }
    }

    /// Counting strategy: one batched call of count-only sub-queries.
    async fn count_cycle(&self, filters: DashboardFilters) -> Result<MetricsSummary, PainelError> {
        let plan = build_count_plan(
            &self.fields,
            &filters.sent_window,
            &filters.released_window,
            &self.responsible,
            &self.excluded_list,
        );
        let counts = count_batch(self.source.as_ref(), &plan.queries).await?;
        plan.summary_from(&counts)
    }

    /// Full-scan strategy: walk every candidate record and fold client-side.
    async fn fold_cycle(&self, filters: DashboardFilters) -> Result<MetricsSummary, PainelError> {
        let rows = fetch_all_pages(self.source.as_ref(), &self.scan_query(), self.page_size).await?;
        let records: Vec<Record> = rows
            .iter()
            .map(|row| Record::from_value(row, &self.fields))
            .collect();
        debug!(records = records.len(), "scan complete, folding");

        let categories: HashSet<&str> = records
            .iter()
            .filter_map(|r| r.category_id.as_deref())
            .collect();
        let city_labels = match &self.resolver {
            Some(resolver) => Some(resolver.resolve_all(categories).await),
            None => None,
        };

        Ok(fold_records(
            &records,
            &FoldParams {
                sent_window: filters.sent_window,
                released_window: filters.released_window,
                responsible_by_id: &self.responsible_by_id,
                excluded_statuses: &self.excluded_set,
                city_labels: city_labels.as_ref(),
            },
        ))
    }

    /// The scan fetches only the columns folding reads. The optional floor
    /// pre-filters to records whose sent or released date is at or after
    /// it; windows are still enforced client-side during the fold.
    fn scan_query(&self) -> ListQuery {
        let query = ListQuery::selecting([
            "ID".to_string(),
            "ASSIGNED_BY_ID".to_string(),
            self.fields.sent.clone(),
            self.fields.released.clone(),
            self.fields.status.clone(),
            self.fields.city.clone(),
        ]);
        match self.scan_floor {
            Some(floor) => query.with_filter(FilterExpr::either(
                FilterExpr::at_or_after(&self.fields.sent, floor),
                FilterExpr::at_or_after(&self.fields.released, floor),
            )),
            None => query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use painel_core::CallResponse;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn test_config(city_breakdown: bool) -> PainelConfig {
        let mut config = PainelConfig::default();
        config.team.responsible =
            BTreeMap::from([("Ana Souza".to_string(), 101), ("Bruno Lima".to_string(), 102)]);
        config.metrics.excluded_statuses = vec!["Cancelado".to_string()];
        config.metrics.city_breakdown = city_breakdown;
        config.fields.sent = "UF_CRM_SENT".to_string();
        config.fields.released = "UF_CRM_RELEASED".to_string();
        config.fields.status = "UF_CRM_STATUS".to_string();
        config.fields.city = "UF_CRM_CITY".to_string();
        config
    }

    async fn set_windows(coordinator: &Arc<Coordinator>, date: NaiveDate) {
        let mut filters = coordinator.filters.lock().await;
        filters.sent_window = ReportWindow::single_day(date);
        filters.released_window = ReportWindow::new(
            date.pred_opt().unwrap().pred_opt().unwrap(),
            date,
        );
    }

    /// Blocks every call until released, counting attempts.
    struct GatedSource {
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordSource for GatedSource {
        async fn call(&self, _method: &str, _params: Value) -> Result<CallResponse, PainelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(CallResponse {
                result: json!({"result_total": {}}),
                next: None,
                total: None,
            })
        }
    }

    /// Replays a scripted sequence of responses.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<CallResponse, PainelError>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<CallResponse, PainelError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    #[async_trait]
    impl RecordSource for ScriptedSource {
        async fn call(&self, _method: &str, _params: Value) -> Result<CallResponse, PainelError> {
            self.script
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(PainelError::Internal("script exhausted".into())))
        }
    }

    fn batch_response(pairs: &[(&str, u64)]) -> CallResponse {
        let totals: serde_json::Map<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        CallResponse {
            result: json!({"result": {}, "result_total": totals}),
            next: None,
            total: None,
        }
    }

    fn full_batch_response() -> CallResponse {
        batch_response(&[
            ("sent_total", 5),
            ("released_total", 8),
            ("sent_ana_souza", 3),
            ("released_ana_souza", 4),
            ("sent_bruno_lima", 1),
            ("released_bruno_lima", 2),
        ])
    }

    #[tokio::test]
    async fn concurrent_refresh_fails_fast_with_busy() {
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let coordinator = Arc::new(
            Coordinator::new(source.clone(), None, &test_config(false)).unwrap(),
        );

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        // Wait until the first cycle is inside the remote call.
        while source.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let second = coordinator.refresh().await;
        assert!(matches!(second, Err(PainelError::FetchBusy)));
        // Fail-fast means the busy refresh never reached the remote.
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        source.gate.notify_one();
        // The gated batch response is missing expected keys, so the first
        // cycle errors; the flag must be released regardless.
        assert!(first.await.unwrap().is_err());

        // Pre-store a permit so the third cycle's call passes the gate.
        source.gate.notify_one();
        let third = coordinator.refresh().await;
        assert!(!matches!(third, Err(PainelError::FetchBusy)));
    }

    #[tokio::test]
    async fn count_cycle_publishes_summary_and_timestamp() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(full_batch_response())]));
        let coordinator = Arc::new(Coordinator::new(source, None, &test_config(false)).unwrap());
        let mut updates = coordinator.subscribe();

        assert!(coordinator.last_update().is_none());
        coordinator.refresh().await.unwrap();

        let summary = coordinator.summary();
        assert_eq!(summary.total_sent, 5);
        assert_eq!(summary.total_released, 8);
        assert_eq!(summary.by_responsible["Ana Souza"].sent, 3);
        assert_eq!(summary.by_responsible["Bruno Lima"].released, 2);
        assert!(summary.by_city.is_none());
        assert!(coordinator.last_update().is_some());
        assert!(updates.has_changed().unwrap());
    }

    #[tokio::test]
    async fn failed_cycle_preserves_previous_summary() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(full_batch_response()),
            Err(PainelError::remote("proxy down")),
        ]));
        let coordinator = Arc::new(Coordinator::new(source, None, &test_config(false)).unwrap());

        coordinator.refresh().await.unwrap();
        let published_at = coordinator.last_update().unwrap();

        assert!(coordinator.refresh().await.is_err());
        assert_eq!(coordinator.summary().total_sent, 5);
        assert_eq!(coordinator.last_update(), Some(published_at));
    }

    #[tokio::test]
    async fn set_filters_applies_patch_and_refreshes() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(full_batch_response())]));
        let coordinator = Arc::new(Coordinator::new(source, None, &test_config(false)).unwrap());

        let sent = ReportWindow::single_day(NaiveDate::from_ymd_opt(2025, 9, 8).unwrap());
        coordinator
            .set_filters(FilterPatch {
                sent_window: Some(sent),
                released_window: None,
            })
            .await;

        let filters = coordinator.current_filters().await;
        assert_eq!(filters.sent_window, sent);
        assert_eq!(coordinator.summary().total_sent, 5);
    }

    /// Dispatches on method name: list pages for the scan, schema for the
    /// city resolver.
    struct FoldSource {
        rows: Vec<Value>,
    }

    #[async_trait]
    impl RecordSource for FoldSource {
        async fn call(&self, method: &str, _params: Value) -> Result<CallResponse, PainelError> {
            match method {
                "crm.contact.list" => Ok(CallResponse {
                    result: Value::Array(self.rows.clone()),
                    next: None,
                    total: Some(self.rows.len() as u64),
                }),
                "crm.contact.fields" => Ok(CallResponse {
                    result: json!({
                        "UF_CRM_CITY": {
                            "type": "enumeration",
                            "items": [{"ID": "48", "VALUE": "São Paulo"}]
                        }
                    }),
                    next: None,
                    total: None,
                }),
                other => Err(PainelError::Internal(format!("unexpected method {other}"))),
            }
        }
    }

    #[tokio::test]
    async fn fold_cycle_produces_city_breakdown() {
        let rows = vec![
            json!({
                "ID": "1",
                "ASSIGNED_BY_ID": 101,
                "UF_CRM_SENT": "2025-09-08 10:00:00",
                "UF_CRM_CITY": "48"
            }),
            json!({
                "ID": "2",
                "ASSIGNED_BY_ID": 101,
                "UF_CRM_SENT": "2025-09-08 11:00:00",
                "UF_CRM_STATUS": "Cancelado",
                "UF_CRM_CITY": "48"
            }),
            json!({
                "ID": "3",
                "ASSIGNED_BY_ID": 102,
                "UF_CRM_SENT": "2025-09-08 12:00:00",
                "UF_CRM_CITY": "999"
            }),
            json!({
                "ID": "4",
                "ASSIGNED_BY_ID": 102,
                "UF_CRM_RELEASED": "2025-09-07 09:00:00",
                "UF_CRM_CITY": "48"
            }),
        ];
        let source: Arc<dyn RecordSource> = Arc::new(FoldSource { rows });
        let resolver = Arc::new(CityResolver::new(source.clone(), "UF_CRM_CITY"));
        let coordinator = Arc::new(
            Coordinator::new(source, Some(resolver), &test_config(true)).unwrap(),
        );
        set_windows(&coordinator, NaiveDate::from_ymd_opt(2025, 9, 8).unwrap()).await;

        coordinator.refresh().await.unwrap();
        let summary = coordinator.summary();
        assert_eq!(summary.total_sent, 2);
        assert_eq!(summary.total_released, 1);
        assert_eq!(summary.by_responsible["Ana Souza"].sent, 1);
        assert_eq!(summary.by_responsible["Bruno Lima"].sent, 1);
        let cities = summary.by_city.as_ref().expect("breakdown enabled");
        assert_eq!(cities["São Paulo"].sent, 1);
        assert_eq!(cities["999"].sent, 1);
        assert_eq!(cities["São Paulo"].released, 1);
    }

    #[tokio::test]
    async fn city_breakdown_without_resolver_is_a_config_error() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let err = Coordinator::new(source, None, &test_config(true)).unwrap_err();
        assert!(matches!(err, PainelError::Config(_)));
    }

    #[test]
    fn bad_scan_floor_is_a_config_error() {
        let mut config = test_config(false);
        config.metrics.scan_floor = Some("next tuesday".to_string());
        let source = Arc::new(ScriptedSource::new(vec![]));
        let err = Coordinator::new(source, None, &config).unwrap_err();
        assert!(matches!(err, PainelError::Config(_)));
    }
}
