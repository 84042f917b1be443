//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate plugin manifests
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before any service starts

use std::collections::HashSet;
use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;
use tracing::Level;

use crate::config::schema::AppConfig;

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a merged configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.app.name.trim().is_empty() {
        errors.push(ValidationError::new("app.name", "must not be empty"));
    }

    if Level::from_str(&config.logging.level).is_err() {
        errors.push(ValidationError::new(
            "logging.level",
            format!("unknown level '{}'", config.logging.level),
        ));
    }

    let timeouts = [
        ("timeouts.startup_secs", config.timeouts.startup_secs),
        ("timeouts.service_stop_secs", config.timeouts.service_stop_secs),
        ("timeouts.background_stop_secs", config.timeouts.background_stop_secs),
        ("monitor.interval_secs", config.monitor.interval_secs),
        ("monitor.heartbeat_secs", config.monitor.heartbeat_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.health.endpoint_enabled && SocketAddr::from_str(&config.health.bind_address).is_err() {
        errors.push(ValidationError::new(
            "health.bind_address",
            format!("'{}' is not a socket address", config.health.bind_address),
        ));
    }

    if config.observability.metrics_enabled
        && SocketAddr::from_str(&config.observability.metrics_address).is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let mut seen = HashSet::new();
    for manifest in &config.plugins.manifests {
        if manifest.name.trim().is_empty() {
            errors.push(ValidationError::new("plugins.manifests", "plugin name must not be empty"));
        } else if !seen.insert(manifest.name.as_str()) {
            errors.push(ValidationError::new(
                "plugins.manifests",
                format!("duplicate plugin '{}'", manifest.name),
            ));
        }
        if manifest.entry_point.trim().is_empty() {
            errors.push(ValidationError::new(
                "plugins.manifests",
                format!("plugin '{}' has no entry point", manifest.name),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PluginManifest;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.app.name = " ".into();
        config.logging.level = "loud".into();
        config.timeouts.startup_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].field, "app.name");
        assert_eq!(errors[1].field, "logging.level");
        assert_eq!(errors[2].field, "timeouts.startup_secs");
    }

    #[test]
    fn test_duplicate_plugin_names() {
        let mut config = AppConfig::default();
        let manifest = PluginManifest {
            name: "Radio".into(),
            description: String::new(),
            entry_point: "radio".into(),
            api_version: 1,
            capabilities: Vec::new(),
        };
        config.plugins.manifests = vec![manifest.clone(), manifest];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("duplicate plugin 'Radio'"));
    }

    #[test]
    fn test_health_address_checked_only_when_enabled() {
        let mut config = AppConfig::default();
        config.health.bind_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.health.endpoint_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
