// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use crate::constants::{labels, retry, DEFAULT_EXCLUDED_NAMESPACES};
use crate::reconcile::backoff::BackoffPolicy;
use crate::types::NamespaceRecord;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Default tracing filter when RUST_LOG is not set
    pub log_level: String,
    /// Namespaces that never receive a finalizer or child resources
    pub excluded_namespaces: Vec<String>,
    /// Only reconcile namespaces labeled `managed-by=namespace-operator`
    pub managed_only: bool,
    /// Hard limits applied when a namespace has no quota annotation
    pub default_resource_quota: Option<BTreeMap<String, String>>,
    /// Consecutive retryable failures before a namespace is left for the next event
    pub max_attempts: u32,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    /// Run the NamespaceSet reconciler
    pub enable_namespace_sets: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            excluded_namespaces: DEFAULT_EXCLUDED_NAMESPACES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            managed_only: false,
            default_resource_quota: None,
            max_attempts: retry::MAX_ATTEMPTS,
            backoff_initial: Duration::from_millis(retry::INITIAL_DELAY_MS),
            backoff_max: Duration::from_secs(retry::MAX_DELAY_SECS),
            enable_namespace_sets: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let log_level = lookup("LOG_LEVEL")
            .map(|v| v.to_lowercase())
            .unwrap_or(defaults.log_level);

        let excluded_namespaces = match lookup("EXCLUDED_NAMESPACES") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.excluded_namespaces,
        };

        let managed_only =
            parse_bool(lookup("MANAGED_ONLY"), "MANAGED_ONLY", defaults.managed_only)?;

        let default_resource_quota = lookup("DEFAULT_RESOURCE_QUOTA")
            .map(|v| serde_json::from_str::<BTreeMap<String, String>>(&v))
            .transpose()
            .context("DEFAULT_RESOURCE_QUOTA must be a JSON object of string values")?;

        let max_attempts = lookup("RECONCILE_MAX_ATTEMPTS")
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("RECONCILE_MAX_ATTEMPTS must be a positive integer")?
            .unwrap_or(defaults.max_attempts)
            .max(1);

        let backoff_initial = lookup("BACKOFF_INITIAL_MS")
            .map(|v| v.parse::<u64>().map(Duration::from_millis))
            .transpose()
            .context("BACKOFF_INITIAL_MS must be an integer")?
            .unwrap_or(defaults.backoff_initial);

        let backoff_max = lookup("BACKOFF_MAX_SECS")
            .map(|v| v.parse::<u64>().map(Duration::from_secs))
            .transpose()
            .context("BACKOFF_MAX_SECS must be an integer")?
            .unwrap_or(defaults.backoff_max);

        let enable_namespace_sets = parse_bool(
            lookup("ENABLE_NAMESPACE_SETS"),
            "ENABLE_NAMESPACE_SETS",
            defaults.enable_namespace_sets,
        )?;

        Ok(Config {
            log_level,
            excluded_namespaces,
            managed_only,
            default_resource_quota,
            max_attempts,
            backoff_initial,
            backoff_max,
            enable_namespace_sets,
        })
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.backoff_initial, self.backoff_max, retry::MULTIPLIER)
    }

    /// Whether a namespace should get a finalizer and child resources
    pub fn is_in_scope(&self, record: &NamespaceRecord) -> bool {
        if self.excluded_namespaces.iter().any(|n| n == &record.name) {
            return false;
        }
        !self.managed_only
            || record
                .labels
                .get(labels::MANAGED_BY)
                .is_some_and(|v| v == labels::MANAGED_BY_VALUE)
    }
}

fn parse_bool(value: Option<String>, key: &str, default: bool) -> Result<bool> {
    match value {
        Some(v) => v
            .trim()
            .parse::<bool>()
            .with_context(|| format!("{} must be true or false", key)),
        None => Ok(default),
    }
}
