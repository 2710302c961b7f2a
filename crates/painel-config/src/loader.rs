// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./painel.toml` > `~/.config/painel/painel.toml`
//! > `/etc/painel/painel.toml` with environment variable overrides via the
//! `PAINEL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PainelConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/painel/painel.toml` (system-wide)
/// 3. `~/.config/painel/painel.toml` (user XDG config)
/// 4. `./painel.toml` (local directory)
/// 5. `PAINEL_*` environment variables
pub fn load_config() -> Result<PainelConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PainelConfig::default()))
        .merge(Toml::file("/etc/painel/painel.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("painel/painel.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("painel.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<PainelConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PainelConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PainelConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PainelConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `PAINEL_CRM_RATE_LIMIT_MS` must map to
/// `crm.rate_limit_ms`, not `crm.rate.limit.ms`.
fn env_provider() -> Env {
    Env::prefixed("PAINEL_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("crm_", "crm.", 1)
            .replacen("fields_", "fields.", 1)
            .replacen("team_", "team.", 1)
            .replacen("metrics_", "metrics.", 1);
        mapped.into()
    })
}
