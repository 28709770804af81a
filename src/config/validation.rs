//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, limits >= 1)
//! - Check relations between settings (force window covers debounce window)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: OperatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::OperatorConfig;

const LOG_FORMATS: [&str; 2] = ["pretty", "compact"];

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &OperatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let agent = &config.agent;

    let positive = [
        ("agent.debounce_window_ms", agent.debounce_window_ms),
        ("agent.force_window_ms", agent.force_window_ms),
        ("agent.tick_interval_ms", agent.tick_interval_ms),
        ("agent.event_retry_delay_ms", agent.event_retry_delay_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if agent.force_window_ms < agent.debounce_window_ms {
        errors.push(ValidationError::new(
            "agent.force_window_ms",
            format!(
                "must be at least agent.debounce_window_ms ({})",
                agent.debounce_window_ms
            ),
        ));
    }
    if agent.retry_limit == 0 {
        errors.push(ValidationError::new("agent.retry_limit", "must be at least 1"));
    }
    if agent.max_pending_retries == 0 {
        errors.push(ValidationError::new(
            "agent.max_pending_retries",
            "must be at least 1",
        ));
    }
    if config.commiter.segment_size == 0 {
        errors.push(ValidationError::new("commiter.segment_size", "must be at least 1"));
    }
    if config.commiter.channel_capacity == 0 {
        errors.push(ValidationError::new(
            "commiter.channel_capacity",
            "must be at least 1",
        ));
    }
    if !LOG_FORMATS.contains(&config.observability.log_format.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}'", config.observability.log_format),
        ));
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
    fn test_default_config_is_valid() {
        assert!(validate_config(&OperatorConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = OperatorConfig::default();
        config.agent.debounce_window_ms = 0;
        config.commiter.segment_size = 0;
        config.observability.log_format = "xml".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "agent.debounce_window_ms",
                "commiter.segment_size",
                "observability.log_format"
            ]
        );
    }

    #[test]
    fn test_force_window_must_cover_debounce() {
        let mut config = OperatorConfig::default();
        config.agent.debounce_window_ms = 5_000;
        config.agent.force_window_ms = 1_000;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "agent.force_window_ms");
    }
}
