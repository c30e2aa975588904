// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, positive attempt counts, and known log levels.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::HeraldConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &HeraldConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.dispatch.default_transport.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "dispatch.default_transport must not be empty".to_string(),
        });
    }

    if config.dispatch.default_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.default_attempts must be at least 1".to_string(),
        });
    }

    if config.dispatch.max_backoff_ms < config.dispatch.backoff_delay_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "dispatch.max_backoff_ms ({}) must not be smaller than dispatch.backoff_delay_ms ({})",
                config.dispatch.max_backoff_ms, config.dispatch.backoff_delay_ms
            ),
        });
    }

    if config.worker.concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.concurrency must be at least 1".to_string(),
        });
    }

    if config.worker.poll_interval_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.poll_interval_ms must be greater than 0".to_string(),
        });
    }

    let mut seen_queues = HashSet::new();
    for (i, queue) in config.worker.queues.iter().enumerate() {
        if queue.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("worker.queues[{i}] must not be empty"),
            });
        } else if !seen_queues.insert(queue.as_str()) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate queue `{queue}` in worker.queues"),
            });
        }
    }

    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
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

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&HeraldConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = HeraldConfig::default();
        config.storage.database_path = "  ".into();
        config.dispatch.default_attempts = 0;
        config.worker.concurrency = 0;
        config.logging.level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn duplicate_and_blank_queues_are_rejected() {
        let mut config = HeraldConfig::default();
        config.worker.queues = vec!["email".into(), "email".into(), "".into()];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("duplicate queue"));
    }

    #[test]
    fn backoff_cap_below_base_is_rejected() {
        let mut config = HeraldConfig::default();
        config.dispatch.backoff_delay_ms = 10_000;
        config.dispatch.max_backoff_ms = 1_000;
        assert!(validate_config(&config).is_err());
    }
}
