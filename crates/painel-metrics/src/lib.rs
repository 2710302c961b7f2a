// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregation engine and fetch coordinator for Painel.
//!
//! [`aggregate`] turns raw counts or raw records into a
//! [`painel_core::MetricsSummary`]; [`coordinator`] owns the refresh
//! lifecycle around it: single-flight cycles, filter state, periodic
//! polling, and lock-free publication of results.

pub mod aggregate;
pub mod coordinator;

pub use aggregate::{CountPlan, FoldParams, build_count_plan, fold_records};
pub use coordinator::{Coordinator, DashboardFilters, FilterPatch};
