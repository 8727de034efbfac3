// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: provider names, timeouts, retention ceilings, bind address.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    }

    if config.server.request_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "server.request_timeout_ms must be positive".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.memory.max_messages == 0 {
        errors.push(ConfigError::Validation {
            message: "memory.max_messages must be at least 1".to_string(),
        });
    }

    if config.memory.max_tool_results == 0 {
        errors.push(ConfigError::Validation {
            message: "memory.max_tool_results must be at least 1".to_string(),
        });
    }

    if config.orchestrator.max_iterations == 0 {
        errors.push(ConfigError::Validation {
            message: "orchestrator.max_iterations must be at least 1".to_string(),
        });
    }

    let mut seen_names = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        if provider.name.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("providers[{i}].name must not be empty"),
            });
        }
        if !seen_names.insert(&provider.name) {
            errors.push(ConfigError::Validation {
                message: format!(
                    "duplicate provider name `{}` in [[providers]] array",
                    provider.name
                ),
            });
        }
        if provider.timeout_ms == 0 {
            errors.push(ConfigError::Validation {
                message: format!("providers[{i}].timeout_ms must be positive"),
            });
        }
        // Per-provider timeouts longer than the request budget would let a
        // single provider consume the entire turn.
        if provider.timeout_ms > config.server.request_timeout_ms {
            errors.push(ConfigError::Validation {
                message: format!(
                    "providers[{i}].timeout_ms ({}) exceeds server.request_timeout_ms ({})",
                    provider.timeout_ms, config.server.request_timeout_ms
                ),
            });
        }
    }

    for (i, tool) in config.tools.known.iter().enumerate() {
        if tool.name.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("tools.known[{i}].name must not be empty"),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config: ParleyConfig = toml::from_str("").unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = ParleyConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))
        ));
    }

    #[test]
    fn duplicate_provider_names_fail_validation() {
        let toml_str = r#"
[[providers]]
name = "anthropic"
model = "claude-sonnet-4-20250514"

[[providers]]
name = "anthropic"
model = "claude-haiku-4-5-20250901"
"#;
        let config: ParleyConfig = toml::from_str(toml_str).unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("duplicate provider name"))
        ));
    }

    #[test]
    fn provider_timeout_above_request_budget_fails() {
        let toml_str = r#"
[server]
request_timeout_ms = 10000

[[providers]]
name = "anthropic"
model = "claude-sonnet-4-20250514"
timeout_ms = 30000
"#;
        let config: ParleyConfig = toml::from_str(toml_str).unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("exceeds server.request_timeout_ms"))
        ));
    }

    #[test]
    fn zero_max_iterations_fails() {
        let mut config = ParleyConfig::default();
        config.orchestrator.max_iterations = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("max_iterations"))
        ));
    }
}
