// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Painel CRM metrics service.
//!
//! This crate provides the shared error type, the domain types (records,
//! reporting windows, the aggregated summary), and the [`RecordSource`]
//! trait every remote CRM access goes through.

pub mod error;
pub mod source;
pub mod types;
pub mod window;

pub use error::PainelError;
pub use source::{CallResponse, RecordSource};
pub use types::{MetricsSummary, Record, RecordFields, Tally};
pub use window::ReportWindow;
