// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as a usable proxy URL, the remote's page-size ceiling,
//! and well-formed user and field identifiers.

use crate::diagnostic::ConfigError;
use crate::model::PainelConfig;

/// The remote list endpoint's hard page-size ceiling.
pub const MAX_PAGE_SIZE: usize = 50;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &PainelConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let url = config.crm.proxy_url.trim();
    if url.is_empty() {
        errors.push(ConfigError::Validation {
            message: "crm.proxy_url must not be empty".to_string(),
        });
    } else if !url.starts_with("http://") && !url.starts_with("https://") {
        errors.push(ConfigError::Validation {
            message: format!("crm.proxy_url `{url}` must start with http:// or https://"),
        });
    }

    if config.crm.page_size == 0 || config.crm.page_size > MAX_PAGE_SIZE {
        errors.push(ConfigError::Validation {
            message: format!(
                "crm.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                config.crm.page_size
            ),
        });
    }

    if config.crm.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "crm.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.metrics.poll_interval_secs < 5 {
        errors.push(ConfigError::Validation {
            message: format!(
                "metrics.poll_interval_secs must be at least 5, got {}",
                config.metrics.poll_interval_secs
            ),
        });
    }

    if config.team.responsible.is_empty() {
        errors.push(ConfigError::Validation {
            message: "team.responsible must contain at least one user".to_string(),
        });
    }

    for (name, id) in &config.team.responsible {
        if name.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "team.responsible contains an empty user name".to_string(),
            });
        }
        if *id <= 0 {
            errors.push(ConfigError::Validation {
                message: format!("team.responsible `{name}` has non-positive user id {id}"),
            });
        }
    }

    for (label, value) in [
        ("fields.sent", &config.fields.sent),
        ("fields.released", &config.fields.released),
        ("fields.status", &config.fields.status),
        ("fields.city", &config.fields.city),
    ] {
        if value.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{label} must not be empty"),
            });
        }
    }

    if let Some(floor) = &config.metrics.scan_floor
        && chrono::NaiveDate::parse_from_str(floor, "%Y-%m-%d").is_err()
    {
        errors.push(ConfigError::Validation {
            message: format!("metrics.scan_floor `{floor}` is not a YYYY-MM-DD date"),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
